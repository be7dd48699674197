use super::DbConn;
use crate::domain::{ArtifactKind, Project, ProjectStats, ProjectSummary};
use anyhow::Result;
use chrono::Utc;
use rusqlite::{OptionalExtension, Row};
use std::str::FromStr;
use uuid::Uuid;

/// Repository for project rows.
pub struct ProjectRepository {
    conn: DbConn,
}

impl ProjectRepository {
    pub fn new(conn: DbConn) -> Self {
        Self { conn }
    }

    pub fn create(&self, name: &str, description: &str) -> Result<Project> {
        let conn = self
            .conn
            .lock()
            .expect("ProjectRepository: failed to acquire database lock");

        let now = Utc::now().to_rfc3339();
        let project = Project {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            created_at: now.clone(),
            updated_at: now,
        };

        conn.execute(
            r#"
            INSERT INTO projects (id, name, description, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            (
                &project.id,
                &project.name,
                &project.description,
                &project.created_at,
                &project.updated_at,
            ),
        )?;
        Ok(project)
    }

    pub fn list_all(&self) -> Result<Vec<Project>> {
        let conn = self
            .conn
            .lock()
            .expect("ProjectRepository: failed to acquire database lock");
        let mut stmt = conn.prepare(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM projects
            ORDER BY updated_at DESC, rowid DESC
            "#,
        )?;

        let rows = stmt.query_map([], Self::row_to_project)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<Project>> {
        let conn = self
            .conn
            .lock()
            .expect("ProjectRepository: failed to acquire database lock");
        let project = conn
            .query_row(
                "SELECT id, name, description, created_at, updated_at FROM projects WHERE id = ?1",
                [id],
                Self::row_to_project,
            )
            .optional()?;
        Ok(project)
    }

    /// Update name and/or description. Returns `None` when the project does not exist.
    pub fn update(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<Project>> {
        let conn = self
            .conn
            .lock()
            .expect("ProjectRepository: failed to acquire database lock");

        let now = Utc::now().to_rfc3339();
        let rows = conn.execute(
            r#"
            UPDATE projects
            SET name = COALESCE(?2, name),
                description = COALESCE(?3, description),
                updated_at = ?4
            WHERE id = ?1
            "#,
            rusqlite::params![id, name, description, now],
        )?;

        if rows == 0 {
            return Ok(None);
        }

        drop(conn);
        self.find_by_id(id)
    }

    /// Delete a project and, via `ON DELETE CASCADE`, all of its artifact rows.
    ///
    /// Runs in one transaction. `before_commit` receives the number of artifact
    /// rows that are about to go and runs after the delete but before commit;
    /// if it fails the transaction rolls back and nothing is removed.
    pub fn delete_with<F>(&self, id: &str, before_commit: F) -> Result<usize>
    where
        F: FnOnce(usize) -> Result<()>,
    {
        let mut conn = self
            .conn
            .lock()
            .expect("ProjectRepository: failed to acquire database lock");
        let tx = conn.transaction()?;

        let artifact_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM artifacts WHERE project_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        let deleted = tx.execute("DELETE FROM projects WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Ok(0);
        }

        let remaining: i64 = tx.query_row(
            "SELECT COUNT(*) FROM artifacts WHERE project_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        if remaining != 0 {
            anyhow::bail!("cascade left {remaining} artifacts behind for project {id}");
        }

        before_commit(artifact_count as usize)?;
        tx.commit()?;
        Ok(deleted)
    }

    pub fn delete(&self, id: &str) -> Result<usize> {
        self.delete_with(id, |_| Ok(()))
    }

    /// Projects ordered by most recent activity, with their artifact counts.
    pub fn recent(&self, limit: usize) -> Result<Vec<ProjectSummary>> {
        let conn = self
            .conn
            .lock()
            .expect("ProjectRepository: failed to acquire database lock");
        let mut stmt = conn.prepare(
            r#"
            SELECT p.id, p.name, p.description, p.created_at, p.updated_at, COUNT(a.id)
            FROM projects p
            LEFT JOIN artifacts a ON a.project_id = p.id
            GROUP BY p.id
            ORDER BY p.updated_at DESC, p.rowid DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            Ok(ProjectSummary {
                project: Self::row_to_project(row)?,
                artifact_count: row.get::<_, i64>(5)? as usize,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn stats(&self, id: &str) -> Result<ProjectStats> {
        let conn = self
            .conn
            .lock()
            .expect("ProjectRepository: failed to acquire database lock");
        let mut stmt = conn.prepare(
            "SELECT kind, COUNT(*) FROM artifacts WHERE project_id = ?1 GROUP BY kind",
        )?;
        let rows = stmt.query_map([id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut stats = ProjectStats::default();
        for row in rows {
            let (kind, count) = row?;
            let Ok(kind) = ArtifactKind::from_str(&kind) else {
                log::warn!("Skipping unknown artifact kind '{}' in stats", kind);
                continue;
            };
            stats.artifact_count += count as usize;
            stats.by_kind.insert(kind, count as usize);
        }
        Ok(stats)
    }

    fn row_to_project(row: &Row) -> rusqlite::Result<Project> {
        Ok(Project {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}
