use super::DbConn;
use crate::domain::{
    FallbackReason, ReviewItem, ReviewItemStatus, ReviewQueueSummary, TaskType,
};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row};
use std::str::FromStr;

const SELECT_COLUMNS: &str = r#"
    SELECT id, item_id, task_type, content, reason, attempts_json, error_log_json,
           status, resolved_label, created_at, resolved_at
    FROM review_items
"#;

/// Repository for the append-only review queue.
///
/// Rows are never deleted; resolving flips the status and records the label.
pub struct ReviewItemRepository {
    conn: DbConn,
}

impl ReviewItemRepository {
    pub fn new(conn: DbConn) -> Self {
        Self { conn }
    }

    pub fn insert(&self, item: &ReviewItem) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .expect("ReviewItemRepository: failed to acquire database lock");
        let attempts_json = serde_json::to_string(&item.attempts)?;
        let error_log_json = serde_json::to_string(&item.error_log)?;

        conn.execute(
            r#"
            INSERT INTO review_items (
                id, item_id, task_type, content, reason, attempts_json, error_log_json,
                status, resolved_label, created_at, resolved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            rusqlite::params![
                item.id,
                item.item_id,
                item.task_type.to_string(),
                item.content,
                item.reason.to_string(),
                attempts_json,
                error_log_json,
                item.status.to_string(),
                item.resolved_label,
                item.created_at,
                item.resolved_at
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<ReviewItem>> {
        let conn = self
            .conn
            .lock()
            .expect("ReviewItemRepository: failed to acquire database lock");
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let item = conn
            .query_row(&sql, [id], Self::row_to_item)
            .optional()?;
        Ok(item)
    }

    /// Pending items, oldest first.
    pub fn list_pending(&self) -> Result<Vec<ReviewItem>> {
        let conn = self
            .conn
            .lock()
            .expect("ReviewItemRepository: failed to acquire database lock");
        let sql = format!("{SELECT_COLUMNS} WHERE status = 'pending' ORDER BY created_at, rowid");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_item)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn list_all(&self) -> Result<Vec<ReviewItem>> {
        let conn = self
            .conn
            .lock()
            .expect("ReviewItemRepository: failed to acquire database lock");
        let sql = format!("{SELECT_COLUMNS} ORDER BY created_at, rowid");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_item)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Mark a pending item resolved. Returns the number of rows changed, which
    /// is 0 when the item is unknown or already resolved.
    pub fn resolve(&self, id: &str, label: &str, resolved_at: &str) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .expect("ReviewItemRepository: failed to acquire database lock");
        let affected = conn.execute(
            r#"
            UPDATE review_items
            SET status = 'resolved', resolved_label = ?2, resolved_at = ?3
            WHERE id = ?1 AND status = 'pending'
            "#,
            (id, label, resolved_at),
        )?;
        Ok(affected)
    }

    pub fn summary(&self) -> Result<ReviewQueueSummary> {
        let conn = self
            .conn
            .lock()
            .expect("ReviewItemRepository: failed to acquire database lock");
        let mut stmt =
            conn.prepare("SELECT status, reason, COUNT(*) FROM review_items GROUP BY status, reason")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut summary = ReviewQueueSummary::default();
        for row in rows {
            let (status, reason, count) = row?;
            let count = count as usize;
            if status == "pending" {
                summary.pending += count;
                *summary.by_reason.entry(reason).or_default() += count;
            } else {
                summary.resolved += count;
            }
        }
        Ok(summary)
    }

    fn row_to_item(row: &Row) -> rusqlite::Result<ReviewItem> {
        let task_type: String = row.get(2)?;
        let reason: String = row.get(4)?;
        let attempts_json: String = row.get(5)?;
        let error_log_json: String = row.get(6)?;
        let status: String = row.get(7)?;

        Ok(ReviewItem {
            id: row.get(0)?,
            item_id: row.get(1)?,
            task_type: TaskType::from_str(&task_type).unwrap_or_default(),
            content: row.get(3)?,
            reason: FallbackReason::from_str(&reason).unwrap_or(FallbackReason::RetryLimit),
            attempts: serde_json::from_str(&attempts_json).unwrap_or_default(),
            error_log: serde_json::from_str(&error_log_json).unwrap_or_default(),
            status: ReviewItemStatus::from_str(&status).unwrap_or_default(),
            resolved_label: row.get(8)?,
            created_at: row.get(9)?,
            resolved_at: row.get(10)?,
        })
    }
}
