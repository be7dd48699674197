//! SQLite database setup and connection management for PaperTrail
//! Handles database initialization, schema creation, and connection management.

use anyhow::Result;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const SCHEMA_VERSION: i32 = 1;

/// Database wrapper that manages SQLite connections
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Create an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        };
        db.init()?;
        Ok(db)
    }

    /// Create or open the database at a specific path
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        };
        db.init()?;
        log::debug!("opened database at {}", db.describe());
        Ok(db)
    }

    /// Path of the database file, or `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn describe(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string())
    }

    /// Initialize database schema
    fn init(&self) -> Result<()> {
        let conn = self.conn.lock().expect("Database: failed to acquire lock");

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let existing_version: i32 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if existing_version == 0 {
            Self::create_schema(&conn)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        } else if existing_version > SCHEMA_VERSION {
            anyhow::bail!(
                "Database schema version {} is newer than supported version {}",
                existing_version,
                SCHEMA_VERSION
            );
        }

        Ok(())
    }

    /// Get a reference to the connection
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    pub fn project_repo(&self) -> crate::infra::db::repository::ProjectRepository {
        crate::infra::db::repository::ProjectRepository::new(self.connection())
    }

    pub fn artifact_repo(&self) -> crate::infra::db::repository::ArtifactRepository {
        crate::infra::db::repository::ArtifactRepository::new(self.connection())
    }

    pub fn review_item_repo(&self) -> crate::infra::db::repository::ReviewItemRepository {
        crate::infra::db::repository::ReviewItemRepository::new(self.connection())
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS artifacts (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN (
                    'topic_exploration','hypothesis_validation','roadmap',
                    'literature_analysis','design_critique','cleaned_data','labeled_data'
                )),
                name TEXT NOT NULL,
                filename TEXT NOT NULL,
                metadata_json TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS review_items (
                id TEXT PRIMARY KEY,
                item_id TEXT NOT NULL,
                task_type TEXT NOT NULL,
                content TEXT NOT NULL,
                reason TEXT NOT NULL,
                attempts_json TEXT NOT NULL,
                error_log_json TEXT NOT NULL DEFAULT '[]',
                status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending','resolved')),
                resolved_label TEXT,
                created_at TEXT NOT NULL,
                resolved_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_artifacts_project_id ON artifacts(project_id);
            CREATE INDEX IF NOT EXISTS idx_review_items_status ON review_items(status, created_at);
            "#,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.path().is_none());
        let conn = db.connection();
        let guard = conn.lock().unwrap();
        let res: i32 = guard.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(res, 1);
    }

    #[test]
    fn test_schema_version_and_foreign_keys() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let guard = conn.lock().unwrap();
        let version: i32 = guard
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        let fk: i32 = guard
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_reopen_file_database_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("papertrail.db");
        {
            let db = Database::open_at(&path).unwrap();
            let conn = db.connection();
            let guard = conn.lock().unwrap();
            guard
                .execute(
                    "INSERT INTO projects (id, name, created_at, updated_at) VALUES ('p1', 'P', 'now', 'now')",
                    [],
                )
                .unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        let conn = db.connection();
        let guard = conn.lock().unwrap();
        let count: i32 = guard
            .query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
                .unwrap();
        }
        let err = Database::open_at(&path).err().expect("should fail");
        assert!(err.to_string().contains("newer"));
    }
}
