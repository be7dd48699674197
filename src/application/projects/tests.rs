use super::*;
use crate::domain::{ArtifactKind, ProjectError};
use crate::infra::db::Database;
use crate::infra::payload::PayloadStore;
use serde_json::{Map, json};

fn store() -> (ProjectStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in_memory().unwrap();
    let store = ProjectStore::new(&db, PayloadStore::new(dir.path().join("projects")));
    (store, dir)
}

fn artifact_fixture(kind: ArtifactKind) -> crate::domain::Artifact {
    crate::domain::Artifact {
        id: "a1".into(),
        project_id: "p1".into(),
        kind,
        name: "Saved result".into(),
        filename: format!("{kind}_a1.json"),
        metadata: Map::new(),
        created_at: "2024-03-05T10:20:30+00:00".into(),
    }
}

#[test]
fn test_create_rejects_blank_names() {
    let (store, _dir) = store();
    assert!(matches!(
        store.create_project("   ", ""),
        Err(ProjectError::InvalidName(_))
    ));
    let project = store.create_project("  Sleep  ", " notes ").unwrap();
    assert_eq!(project.name, "Sleep");
    assert_eq!(project.description, "notes");
}

#[test]
fn test_save_and_load_artifact() {
    let (store, _dir) = store();
    let project = store.create_project("Sleep", "").unwrap();
    let data = json!({"topic": "sleep", "result": {"themes": ["circadian rhythm"]}});
    let mut metadata = Map::new();
    metadata.insert("mode".into(), json!("discovery"));

    let artifact = store
        .save_artifact(
            &project.id,
            ArtifactKind::TopicExploration,
            "First pass",
            &data,
            metadata,
        )
        .unwrap();
    assert_eq!(
        artifact.filename,
        format!("topic_exploration_{}.json", artifact.id)
    );
    assert_eq!(store.load_artifact_data(&artifact).unwrap(), Some(data));
    assert_eq!(store.get_artifact(&artifact.id).unwrap().metadata["mode"], "discovery");
    assert_eq!(store.list_artifacts(&project.id).unwrap().len(), 1);

    let bumped = store.get_project(&project.id).unwrap();
    assert_eq!(bumped.updated_at, artifact.created_at);
}

#[test]
fn test_save_artifact_to_missing_project_leaves_no_file() {
    let (store, _dir) = store();
    let err = store
        .save_artifact("ghost", ArtifactKind::Roadmap, "x", &json!({}), Map::new())
        .unwrap_err();
    assert!(matches!(err, ProjectError::NotFound(_)));
    assert_eq!(store.payloads().file_count("ghost").unwrap(), 0);
}

#[test]
fn test_delete_project_removes_rows_and_files() {
    let (store, _dir) = store();
    let project = store.create_project("Doomed", "").unwrap();
    for kind in [
        ArtifactKind::Roadmap,
        ArtifactKind::DesignCritique,
        ArtifactKind::LabeledData,
    ] {
        store
            .save_artifact(&project.id, kind, "x", &json!({"k": 1}), Map::new())
            .unwrap();
    }
    assert_eq!(store.payloads().file_count(&project.id).unwrap(), 3);

    let removed = store.delete_project(&project.id).unwrap();
    assert_eq!(removed.artifacts, 3);
    assert_eq!(removed.payload_files, 3);
    assert_eq!(store.payloads().file_count(&project.id).unwrap(), 0);
    assert!(matches!(
        store.list_artifacts(&project.id),
        Err(ProjectError::NotFound(_))
    ));
    assert!(matches!(
        store.delete_project(&project.id),
        Err(ProjectError::NotFound(_))
    ));
}

#[test]
fn test_update_and_stats() {
    let (store, _dir) = store();
    let project = store.create_project("A", "").unwrap();
    let updated = store
        .update_project(&project.id, Some("B"), None)
        .unwrap();
    assert_eq!(updated.name, "B");
    assert!(matches!(
        store.update_project(&project.id, Some(""), None),
        Err(ProjectError::InvalidName(_))
    ));
    assert!(matches!(
        store.update_project("missing", None, Some("d")),
        Err(ProjectError::NotFound(_))
    ));

    store
        .save_artifact(&project.id, ArtifactKind::Roadmap, "r1", &json!({}), Map::new())
        .unwrap();
    store
        .save_artifact(&project.id, ArtifactKind::Roadmap, "r2", &json!({}), Map::new())
        .unwrap();
    let stats = store.project_stats(&project.id).unwrap();
    assert_eq!(stats.artifact_count, 2);
    assert_eq!(stats.by_kind[&ArtifactKind::Roadmap], 2);

    let recent = store.recent_projects(3).unwrap();
    assert_eq!(recent[0].artifact_count, 2);
}

#[test]
fn test_render_missing_payload_file() {
    let (store, _dir) = store();
    let project = store.create_project("P", "").unwrap();
    let artifact = store
        .save_artifact(&project.id, ArtifactKind::Roadmap, "Plan", &json!({}), Map::new())
        .unwrap();
    store
        .payloads()
        .remove(&project.id, &artifact.filename)
        .unwrap();
    assert_eq!(store.load_artifact_data(&artifact).unwrap(), None);
    assert!(
        store
            .render_artifact(&artifact)
            .unwrap()
            .contains("data file not found")
    );
}

#[test]
fn test_render_topic_exploration() {
    let md = render_artifact(
        &artifact_fixture(ArtifactKind::TopicExploration),
        &json!({
            "topic": "Blue light",
            "paper_count": 8,
            "result": {
                "themes": ["Melatonin suppression"],
                "gaps": ["Long-term effects"],
                "ideas": [{"title": "Screen curfew", "feasibility": "High", "description": "RCT"}]
            }
        }),
    );
    assert!(md.starts_with("## Saved result\n"));
    assert!(md.contains("_Topic Exploration, saved 2024-03-05 10:20_"));
    assert!(md.contains("**Topic:** Blue light"));
    assert!(md.contains("_8 papers analyzed_"));
    assert!(md.contains("- Melatonin suppression"));
    assert!(md.contains("**Ideas (1):**\n- **Screen curfew** [High] RCT"));
}

#[test]
fn test_render_hypothesis_scores() {
    let md = render_artifact(
        &artifact_fixture(ArtifactKind::HypothesisValidation),
        &json!({
            "hypothesis": "Caffeine delays sleep onset",
            "result": {"verdict": "Strong", "support_score": 0.82, "novelty_score": 0.3}
        }),
    );
    assert!(md.contains("**Verdict:** Strong"));
    assert!(md.contains("| Support | 82% |"));
    assert!(md.contains("| Novelty | 30% |"));
    assert!(!md.contains("Feasibility"));
}

#[test]
fn test_render_roadmap_orders_steps() {
    let md = render_artifact(
        &artifact_fixture(ArtifactKind::Roadmap),
        &json!({
            "topic": "Sleep",
            "result": {
                "complexity": "Beginner",
                "methodology_steps": [
                    {"step": 2, "title": "Analyse", "estimated_time": "1w", "description": "stats"},
                    {"step": 1, "title": "Collect", "estimated_time": "2w", "description": "survey"}
                ],
                "suggested_datasets": [{"name": "NHANES", "description": "health survey", "url": "https://example.org"}]
            }
        }),
    );
    let collect = md.find("1. **Collect**").unwrap();
    let analyse = md.find("2. **Analyse**").unwrap();
    assert!(collect < analyse);
    assert!(md.contains("**Datasets (1):**\n- **NHANES**: health survey (<https://example.org>)"));
}

#[test]
fn test_render_literature_analysis() {
    let md = render_artifact(
        &artifact_fixture(ArtifactKind::LiteratureAnalysis),
        &json!({
            "topic": "Naps",
            "result": {
                "debate_intensity": "Active",
                "contested_claims": [{"claim": "Naps help memory", "why_it_matters": "policy"}],
                "open_questions": [{"question": "Optimal length?", "opportunity": "dose study"}]
            }
        }),
    );
    assert!(md.contains("**Debate intensity:** Active"));
    assert!(md.contains("**Contested Claims (1):**\n- **Naps help memory**: policy"));
    assert!(md.contains("- Optimal length? _(dose study)_"));
}

#[test]
fn test_render_design_critique_sorts_by_severity() {
    let md = render_artifact(
        &artifact_fixture(ArtifactKind::DesignCritique),
        &json!({
            "experiment": "Give students coffee",
            "result": {
                "confounds": [{"description": "No blinding", "severity": "Minor"}],
                "missing_controls": [{"description": "No placebo", "severity": "Critical"}],
                "methodological_concerns": [{"description": "Tiny sample", "severity": "Major"}]
            }
        }),
    );
    assert!(md.contains("**Issues:** 3 total (1 critical, 1 major)"));
    let critical = md.find("[Critical] No placebo").unwrap();
    let major = md.find("[Major] Tiny sample").unwrap();
    let minor = md.find("[Minor] No blinding").unwrap();
    assert!(critical < major && major < minor);
}

#[test]
fn test_render_tabular_preview() {
    let rows: Vec<_> = (0..25)
        .map(|i| json!({"text": format!("row {i}"), "label": "POSITIVE"}))
        .collect();
    let md = render_artifact(&artifact_fixture(ArtifactKind::LabeledData), &json!(rows));
    assert!(md.contains("| label | text |") || md.contains("| text | label |"));
    assert!(md.contains("row 19 |"));
    assert!(!md.contains("row 20 |"));
    assert!(md.contains("_25 rows × 2 columns_"));
}

#[test]
fn test_render_unknown_shape_falls_back_to_json() {
    let md = render_artifact(
        &artifact_fixture(ArtifactKind::Roadmap),
        &json!({"something": "else"}),
    );
    assert!(md.contains("```json"));
    assert!(md.contains("\"something\": \"else\""));

    let md = render_artifact(&artifact_fixture(ArtifactKind::CleanedData), &json!({"a": 1}));
    assert!(md.contains("```json"));
}
