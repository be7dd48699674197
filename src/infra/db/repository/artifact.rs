use super::DbConn;
use crate::domain::{Artifact, ArtifactKind};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row};
use std::str::FromStr;

/// Repository for artifact rows. Payload files are handled by `PayloadStore`.
pub struct ArtifactRepository {
    conn: DbConn,
}

impl ArtifactRepository {
    pub fn new(conn: DbConn) -> Self {
        Self { conn }
    }

    /// Insert an artifact row and bump the owning project's `updated_at`.
    pub fn save(&self, artifact: &Artifact) -> Result<()> {
        let mut conn = self
            .conn
            .lock()
            .expect("ArtifactRepository: failed to acquire database lock");
        let metadata_json = serde_json::to_string(&artifact.metadata)?;

        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO artifacts (id, project_id, kind, name, filename, metadata_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            (
                &artifact.id,
                &artifact.project_id,
                artifact.kind.to_string(),
                &artifact.name,
                &artifact.filename,
                &metadata_json,
                &artifact.created_at,
            ),
        )?;
        tx.execute(
            "UPDATE projects SET updated_at = ?1 WHERE id = ?2",
            (&artifact.created_at, &artifact.project_id),
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Artifacts of a project, newest first.
    pub fn list_by_project(&self, project_id: &str) -> Result<Vec<Artifact>> {
        let conn = self
            .conn
            .lock()
            .expect("ArtifactRepository: failed to acquire database lock");
        let mut stmt = conn.prepare(
            r#"
            SELECT id, project_id, kind, name, filename, metadata_json, created_at
            FROM artifacts
            WHERE project_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )?;

        let rows = stmt.query_map([project_id], Self::row_to_artifact)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<Artifact>> {
        let conn = self
            .conn
            .lock()
            .expect("ArtifactRepository: failed to acquire database lock");
        let artifact = conn
            .query_row(
                r#"
                SELECT id, project_id, kind, name, filename, metadata_json, created_at
                FROM artifacts WHERE id = ?1
                "#,
                [id],
                Self::row_to_artifact,
            )
            .optional()?;
        Ok(artifact)
    }

    pub fn count_by_project(&self, project_id: &str) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .expect("ArtifactRepository: failed to acquire database lock");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM artifacts WHERE project_id = ?1",
            [project_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn delete(&self, id: &str) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .expect("ArtifactRepository: failed to acquire database lock");
        let affected = conn.execute("DELETE FROM artifacts WHERE id = ?1", [id])?;
        Ok(affected)
    }

    fn row_to_artifact(row: &Row) -> rusqlite::Result<Artifact> {
        let kind: String = row.get(2)?;
        let kind = ArtifactKind::from_str(&kind).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;
        let metadata_json: String = row.get(5)?;
        let metadata = serde_json::from_str(&metadata_json).unwrap_or_default();

        Ok(Artifact {
            id: row.get(0)?,
            project_id: row.get(1)?,
            kind,
            name: row.get(3)?,
            filename: row.get(4)?,
            metadata,
            created_at: row.get(6)?,
        })
    }
}
