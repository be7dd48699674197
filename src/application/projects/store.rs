use super::render;
use crate::domain::{
    Artifact, ArtifactKind, Project, ProjectError, ProjectStats, ProjectSummary,
};
use crate::infra::db::{ArtifactRepository, Database, ProjectRepository};
use crate::infra::payload::PayloadStore;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// What a cascade delete removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeletedProject {
    pub artifacts: usize,
    pub payload_files: usize,
}

/// Projects and artifacts: rows in SQLite, payloads as JSON files.
pub struct ProjectStore {
    projects: ProjectRepository,
    artifacts: ArtifactRepository,
    payloads: PayloadStore,
}

impl ProjectStore {
    pub fn new(db: &Database, payloads: PayloadStore) -> Self {
        Self {
            projects: db.project_repo(),
            artifacts: db.artifact_repo(),
            payloads,
        }
    }

    pub fn payloads(&self) -> &PayloadStore {
        &self.payloads
    }

    pub fn create_project(&self, name: &str, description: &str) -> Result<Project, ProjectError> {
        let name = validate_name(name)?;
        let project = self.projects.create(name, description.trim())?;
        log::info!("Created project {} ({})", project.name, project.id);
        Ok(project)
    }

    /// All projects, most recently updated first.
    pub fn list_projects(&self) -> Result<Vec<Project>, ProjectError> {
        Ok(self.projects.list_all()?)
    }

    pub fn get_project(&self, id: &str) -> Result<Project, ProjectError> {
        self.projects
            .find_by_id(id)?
            .ok_or_else(|| ProjectError::NotFound(id.to_string()))
    }

    pub fn update_project(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Project, ProjectError> {
        let name = name.map(validate_name).transpose()?;
        self.projects
            .update(id, name, description.map(str::trim))?
            .ok_or_else(|| ProjectError::NotFound(id.to_string()))
    }

    /// Delete a project, its artifact rows and its payload directory atomically.
    ///
    /// The payload directory is removed inside the transaction; if that fails
    /// the rows stay put.
    pub fn delete_project(&self, id: &str) -> Result<DeletedProject, ProjectError> {
        let mut removed = DeletedProject {
            artifacts: 0,
            payload_files: 0,
        };
        let deleted = self.projects.delete_with(id, |artifact_count| {
            removed.artifacts = artifact_count;
            removed.payload_files = self.payloads.remove_project(id)?;
            Ok(())
        })?;
        if deleted == 0 {
            return Err(ProjectError::NotFound(id.to_string()));
        }
        log::info!(
            "Deleted project {} ({} artifacts, {} payload files)",
            id,
            removed.artifacts,
            removed.payload_files
        );
        Ok(removed)
    }

    /// Write the payload file, then the row. A failed insert removes the file again.
    pub fn save_artifact(
        &self,
        project_id: &str,
        kind: ArtifactKind,
        name: &str,
        data: &Value,
        metadata: Map<String, Value>,
    ) -> Result<Artifact, ProjectError> {
        self.get_project(project_id)?;

        let id = Uuid::new_v4().to_string();
        let artifact = Artifact {
            filename: format!("{kind}_{id}.json"),
            id,
            project_id: project_id.to_string(),
            kind,
            name: name.trim().to_string(),
            metadata,
            created_at: Utc::now().to_rfc3339(),
        };

        self.payloads
            .write_json(project_id, &artifact.filename, data)?;
        if let Err(err) = self.artifacts.save(&artifact) {
            if let Err(cleanup) = self.payloads.remove(project_id, &artifact.filename) {
                log::warn!(
                    "Could not remove orphaned payload {}: {:#}",
                    artifact.filename,
                    cleanup
                );
            }
            return Err(err.into());
        }

        log::info!(
            "Saved {} artifact '{}' to project {}",
            kind,
            artifact.name,
            project_id
        );
        Ok(artifact)
    }

    /// Artifacts of a project, newest first.
    pub fn list_artifacts(&self, project_id: &str) -> Result<Vec<Artifact>, ProjectError> {
        self.get_project(project_id)?;
        Ok(self.artifacts.list_by_project(project_id)?)
    }

    pub fn get_artifact(&self, id: &str) -> Result<Artifact, ProjectError> {
        self.artifacts
            .find_by_id(id)?
            .ok_or_else(|| ProjectError::ArtifactNotFound(id.to_string()))
    }

    /// Stored payload, or `None` if the file has gone missing.
    pub fn load_artifact_data(&self, artifact: &Artifact) -> Result<Option<Value>, ProjectError> {
        Ok(self
            .payloads
            .read_json(&artifact.project_id, &artifact.filename)?)
    }

    /// Markdown view of an artifact's payload.
    pub fn render_artifact(&self, artifact: &Artifact) -> Result<String, ProjectError> {
        let data = self.load_artifact_data(artifact)?;
        Ok(match data {
            Some(data) => render::render_artifact(artifact, &data),
            None => format!(
                "## {}\n\n_Artifact data file not found._\n",
                artifact.name
            ),
        })
    }

    pub fn project_stats(&self, id: &str) -> Result<ProjectStats, ProjectError> {
        self.get_project(id)?;
        Ok(self.projects.stats(id)?)
    }

    pub fn recent_projects(&self, limit: usize) -> Result<Vec<ProjectSummary>, ProjectError> {
        Ok(self.projects.recent(limit)?)
    }
}

fn validate_name(name: &str) -> Result<&str, ProjectError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ProjectError::InvalidName("name must not be empty".into()));
    }
    if name.chars().count() > 200 {
        return Err(ProjectError::InvalidName(
            "name must be at most 200 characters".into(),
        ));
    }
    Ok(name)
}
