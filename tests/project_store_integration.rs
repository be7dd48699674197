//! Project store against an on-disk database and payload tree.

use papertrail::application::projects::ProjectStore;
use papertrail::domain::{ArtifactKind, ProjectError};
use papertrail::infra::db::Database;
use papertrail::infra::payload::PayloadStore;
use serde_json::{Map, json};

#[test]
fn test_delete_project_removes_rows_and_payload_files() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let db = Database::open_at(dir.path().join("papertrail.db"))?;
    let store = ProjectStore::new(&db, PayloadStore::new(dir.path().join("projects")));

    let project = store.create_project("Sleep and memory", "REM studies")?;
    let other = store.create_project("Keep me", "")?;

    let kinds = [
        ArtifactKind::TopicExploration,
        ArtifactKind::Roadmap,
        ArtifactKind::LabeledData,
    ];
    for (i, kind) in kinds.into_iter().enumerate() {
        store.save_artifact(
            &project.id,
            kind,
            &format!("result {i}"),
            &json!({"n": i}),
            Map::new(),
        )?;
    }
    store.save_artifact(
        &other.id,
        ArtifactKind::Roadmap,
        "survivor",
        &json!({"steps": []}),
        Map::new(),
    )?;

    assert_eq!(store.list_artifacts(&project.id)?.len(), 3);
    assert_eq!(store.payloads().file_count(&project.id)?, 3);

    let removed = store.delete_project(&project.id)?;
    assert_eq!(removed.artifacts, 3);
    assert_eq!(removed.payload_files, 3);

    assert!(matches!(
        store.get_project(&project.id),
        Err(ProjectError::NotFound(_))
    ));
    assert!(matches!(
        store.list_artifacts(&project.id),
        Err(ProjectError::NotFound(_))
    ));
    assert_eq!(db.artifact_repo().count_by_project(&project.id)?, 0);
    assert_eq!(store.payloads().file_count(&project.id)?, 0);
    assert!(!dir.path().join("projects").join(&project.id).exists());

    assert_eq!(store.list_artifacts(&other.id)?.len(), 1);
    assert_eq!(store.payloads().file_count(&other.id)?, 1);
    Ok(())
}

#[test]
fn test_projects_survive_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("papertrail.db");
    let payload_root = dir.path().join("projects");

    let (project_id, artifact_id) = {
        let db = Database::open_at(&db_path)?;
        let store = ProjectStore::new(&db, PayloadStore::new(&payload_root));
        let project = store.create_project("Persisted", "")?;
        let artifact = store.save_artifact(
            &project.id,
            ArtifactKind::HypothesisValidation,
            "Blue light",
            &json!({"hypothesis": "Blue light delays sleep", "result": {"verdict": "Supported"}}),
            Map::new(),
        )?;
        (project.id, artifact.id)
    };

    let db = Database::open_at(&db_path)?;
    let store = ProjectStore::new(&db, PayloadStore::new(&payload_root));
    assert_eq!(store.get_project(&project_id)?.name, "Persisted");

    let artifact = store.get_artifact(&artifact_id)?;
    let data = store.load_artifact_data(&artifact)?.expect("payload on disk");
    assert_eq!(data["result"]["verdict"], "Supported");

    let stats = store.project_stats(&project_id)?;
    assert_eq!(stats.artifact_count, 1);
    assert_eq!(
        stats.by_kind.get(&ArtifactKind::HypothesisValidation),
        Some(&1)
    );

    let recent = store.recent_projects(3)?;
    assert_eq!(recent[0].project.id, project_id);
    assert_eq!(recent[0].artifact_count, 1);
    Ok(())
}
