//! Manual review queue for items the labeling pipeline escalated.

use crate::application::labeling::EscalationSink;
use crate::domain::{
    FallbackReason, ReviewItem, ReviewItemId, ReviewItemStatus, ReviewQueueError,
    ReviewQueueSummary, WorkItem,
};
use crate::infra::db::ReviewItemRepository;
use chrono::Utc;
use uuid::Uuid;

pub struct ReviewQueue {
    repo: ReviewItemRepository,
}

impl ReviewQueue {
    pub fn new(repo: ReviewItemRepository) -> Self {
        Self { repo }
    }

    /// Append an escalated item with its full attempt history.
    pub fn enqueue(
        &self,
        item: &WorkItem,
        reason: FallbackReason,
        error_log: &[String],
    ) -> Result<ReviewItem, ReviewQueueError> {
        let record = ReviewItem {
            id: Uuid::new_v4().to_string(),
            item_id: item.id.clone(),
            task_type: item.task_type,
            content: item.content.clone(),
            reason,
            attempts: item.attempts.clone(),
            error_log: error_log.to_vec(),
            status: ReviewItemStatus::Pending,
            resolved_label: None,
            created_at: Utc::now().to_rfc3339(),
            resolved_at: None,
        };
        self.repo.insert(&record)?;
        log::info!(
            "Queued {} for manual review ({}, {} attempts)",
            item.id,
            reason,
            record.attempts.len()
        );
        Ok(record)
    }

    pub fn find_by_id(&self, id: &str) -> Result<ReviewItem, ReviewQueueError> {
        self.repo
            .find_by_id(id)?
            .ok_or_else(|| ReviewQueueError::NotFound(id.to_string()))
    }

    /// Pending items, oldest first.
    pub fn list_pending(&self) -> Result<Vec<ReviewItem>, ReviewQueueError> {
        Ok(self.repo.list_pending()?)
    }

    pub fn list_all(&self) -> Result<Vec<ReviewItem>, ReviewQueueError> {
        Ok(self.repo.list_all()?)
    }

    /// Record a human label. The item leaves the pending view but keeps its history.
    pub fn resolve(&self, id: &str, label: &str) -> Result<ReviewItem, ReviewQueueError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(ReviewQueueError::EmptyLabel);
        }
        let existing = self.find_by_id(id)?;
        if existing.status == ReviewItemStatus::Resolved {
            return Err(ReviewQueueError::AlreadyResolved(id.to_string()));
        }

        let updated = self.repo.resolve(id, label, &Utc::now().to_rfc3339())?;
        if updated == 0 {
            // Resolved concurrently between the read and the write.
            return Err(ReviewQueueError::AlreadyResolved(id.to_string()));
        }
        log::info!("Resolved review item {} as '{}'", id, label);
        self.find_by_id(id)
    }

    pub fn summary(&self) -> Result<ReviewQueueSummary, ReviewQueueError> {
        Ok(self.repo.summary()?)
    }

    /// One JSON object per line. Resolved items are included only on request.
    pub fn export_jsonl(&self, include_resolved: bool) -> Result<String, ReviewQueueError> {
        let items = if include_resolved {
            self.list_all()?
        } else {
            self.list_pending()?
        };
        let mut out = String::new();
        for item in &items {
            let line = serde_json::to_string(item).map_err(anyhow::Error::from)?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }
}

impl EscalationSink for ReviewQueue {
    fn escalate(
        &self,
        item: &WorkItem,
        reason: FallbackReason,
        error_log: &[String],
    ) -> anyhow::Result<ReviewItemId> {
        Ok(self.enqueue(item, reason, error_log)?.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;
    use crate::infra::db::Database;

    fn queue() -> ReviewQueue {
        let db = Database::open_in_memory().unwrap();
        ReviewQueue::new(db.review_item_repo())
    }

    fn escalated_item(id: &str) -> WorkItem {
        let mut item = WorkItem::new(id, "foo bar", TaskType::Sentiment);
        item.retry_count = 3;
        item
    }

    #[test]
    fn test_enqueue_and_resolve() {
        let queue = queue();
        let record = queue
            .enqueue(
                &escalated_item("row-1"),
                FallbackReason::RetryLimit,
                &["critic rejected".to_string()],
            )
            .unwrap();
        assert_eq!(queue.list_pending().unwrap().len(), 1);

        let resolved = queue.resolve(&record.id, " NEGATIVE ").unwrap();
        assert_eq!(resolved.status, ReviewItemStatus::Resolved);
        assert_eq!(resolved.resolved_label.as_deref(), Some("NEGATIVE"));
        assert_eq!(resolved.error_log, vec!["critic rejected"]);
        assert!(queue.list_pending().unwrap().is_empty());
        assert_eq!(queue.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_errors() {
        let queue = queue();
        let record = queue
            .enqueue(&escalated_item("row-1"), FallbackReason::ParsingError, &[])
            .unwrap();

        assert!(matches!(
            queue.resolve(&record.id, "  "),
            Err(ReviewQueueError::EmptyLabel)
        ));
        assert!(matches!(
            queue.resolve("missing", "X"),
            Err(ReviewQueueError::NotFound(_))
        ));
        queue.resolve(&record.id, "POSITIVE").unwrap();
        assert!(matches!(
            queue.resolve(&record.id, "NEGATIVE"),
            Err(ReviewQueueError::AlreadyResolved(_))
        ));
    }

    #[test]
    fn test_export_jsonl() {
        let queue = queue();
        let first = queue
            .enqueue(&escalated_item("a"), FallbackReason::RetryLimit, &[])
            .unwrap();
        queue
            .enqueue(&escalated_item("b"), FallbackReason::LowConfidence, &[])
            .unwrap();
        queue.resolve(&first.id, "MIXED").unwrap();

        let pending = queue.export_jsonl(false).unwrap();
        assert_eq!(pending.lines().count(), 1);
        let row: serde_json::Value = serde_json::from_str(pending.lines().next().unwrap()).unwrap();
        assert_eq!(row["item_id"], "b");
        assert_eq!(row["reason"], "LOW_CONFIDENCE");

        assert_eq!(queue.export_jsonl(true).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_sink_returns_record_id() {
        let queue = queue();
        let id = queue
            .escalate(&escalated_item("x"), FallbackReason::ValidationError, &[])
            .unwrap();
        assert_eq!(queue.find_by_id(&id).unwrap().item_id, "x");
        assert_eq!(
            queue.summary().unwrap().by_reason.get("VALIDATION_ERROR"),
            Some(&1)
        );
    }
}
