use crate::domain::{
    Artifact, ArtifactKind, AttemptOutcome, FallbackReason, LabelAttempt, ReviewItem,
    ReviewItemStatus, TaskType,
};
use crate::infra::db::Database;
use crate::infra::db::repository::*;

fn artifact(id: &str, project_id: &str, kind: ArtifactKind, created_at: &str) -> Artifact {
    let mut metadata = serde_json::Map::new();
    metadata.insert("rows".into(), serde_json::json!(12));
    Artifact {
        id: id.into(),
        project_id: project_id.into(),
        kind,
        name: format!("{kind} {id}"),
        filename: format!("{kind}_{id}.json"),
        metadata,
        created_at: created_at.into(),
    }
}

fn review_item(id: &str, reason: FallbackReason, created_at: &str) -> ReviewItem {
    ReviewItem {
        id: id.into(),
        item_id: format!("row-{id}"),
        task_type: TaskType::Sentiment,
        content: "foo bar".into(),
        reason,
        attempts: vec![LabelAttempt {
            attempt: 1,
            label: "POSITIVE".into(),
            confidence: 70,
            rationale: "upbeat".into(),
            feedback_in: None,
            verdict: None,
            outcome: AttemptOutcome::Rejected,
            feedback_out: Some("not upbeat".into()),
        }],
        error_log: vec!["critic rejected attempt 1".into()],
        status: ReviewItemStatus::Pending,
        resolved_label: None,
        created_at: created_at.into(),
        resolved_at: None,
    }
}

#[test]
fn test_project_repository_crud() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    let repo = ProjectRepository::new(db.connection());

    let project = repo.create("Sleep study", "")?;
    assert_eq!(repo.list_all()?.len(), 1);

    let found = repo.find_by_id(&project.id)?.expect("project");
    assert_eq!(found.name, "Sleep study");
    assert_eq!(found.description, "");

    let updated = repo
        .update(&project.id, None, Some("Effects of blue light"))?
        .expect("updated");
    assert_eq!(updated.name, "Sleep study");
    assert_eq!(updated.description, "Effects of blue light");
    assert!(updated.updated_at >= project.updated_at);

    assert!(repo.update("missing", Some("x"), None)?.is_none());

    assert_eq!(repo.delete(&project.id)?, 1);
    assert!(repo.find_by_id(&project.id)?.is_none());
    assert_eq!(repo.delete(&project.id)?, 0);

    Ok(())
}

#[test]
fn test_artifact_save_bumps_project_and_cascades() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    let projects = ProjectRepository::new(db.connection());
    let artifacts = ArtifactRepository::new(db.connection());

    let project = projects.create("P", "d")?;
    artifacts.save(&artifact(
        "a1",
        &project.id,
        ArtifactKind::Roadmap,
        "2099-01-01T00:00:00+00:00",
    ))?;
    artifacts.save(&artifact(
        "a2",
        &project.id,
        ArtifactKind::LabeledData,
        "2099-01-02T00:00:00+00:00",
    ))?;

    let listed = artifacts.list_by_project(&project.id)?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, "a2");
    assert_eq!(listed[0].metadata["rows"], 12);

    let bumped = projects.find_by_id(&project.id)?.expect("project");
    assert_eq!(bumped.updated_at, "2099-01-02T00:00:00+00:00");

    let stats = projects.stats(&project.id)?;
    assert_eq!(stats.artifact_count, 2);
    assert_eq!(stats.by_kind.get(&ArtifactKind::Roadmap), Some(&1));

    projects.delete(&project.id)?;
    assert_eq!(artifacts.count_by_project(&project.id)?, 0);
    assert!(artifacts.find_by_id("a1")?.is_none());

    Ok(())
}

#[test]
fn test_artifact_requires_existing_project() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    let artifacts = ArtifactRepository::new(db.connection());

    let result = artifacts.save(&artifact("a1", "ghost", ArtifactKind::Roadmap, "now"));
    assert!(result.is_err());
    Ok(())
}

#[test]
fn test_delete_with_rolls_back_when_hook_fails() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    let projects = ProjectRepository::new(db.connection());
    let artifacts = ArtifactRepository::new(db.connection());

    let project = projects.create("P", "")?;
    artifacts.save(&artifact("a1", &project.id, ArtifactKind::Roadmap, "now"))?;

    let result = projects.delete_with(&project.id, |count| {
        assert_eq!(count, 1);
        anyhow::bail!("disk on fire")
    });
    assert!(result.is_err());

    assert!(projects.find_by_id(&project.id)?.is_some());
    assert_eq!(artifacts.count_by_project(&project.id)?, 1);
    Ok(())
}

#[test]
fn test_recent_projects_carry_artifact_counts() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    let projects = ProjectRepository::new(db.connection());
    let artifacts = ArtifactRepository::new(db.connection());

    let older = projects.create("older", "")?;
    let newer = projects.create("newer", "")?;
    artifacts.save(&artifact(
        "a1",
        &older.id,
        ArtifactKind::DesignCritique,
        "2099-01-01T00:00:00+00:00",
    ))?;

    let recent = projects.recent(1)?;
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].project.id, older.id);
    assert_eq!(recent[0].artifact_count, 1);

    let all = projects.recent(10)?;
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].project.id, newer.id);
    assert_eq!(all[1].artifact_count, 0);
    Ok(())
}

#[test]
fn test_review_item_repository_resolve_and_summary() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    let repo = ReviewItemRepository::new(db.connection());

    repo.insert(&review_item("r1", FallbackReason::RetryLimit, "2024-01-01"))?;
    repo.insert(&review_item("r2", FallbackReason::ParsingError, "2024-01-02"))?;
    repo.insert(&review_item("r3", FallbackReason::RetryLimit, "2024-01-03"))?;

    let pending = repo.list_pending()?;
    assert_eq!(
        pending.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
        vec!["r1", "r2", "r3"]
    );
    assert_eq!(pending[0].attempts.len(), 1);
    assert_eq!(pending[0].attempts[0].feedback_out.as_deref(), Some("not upbeat"));

    assert_eq!(repo.resolve("r1", "NEGATIVE", "2024-02-01")?, 1);
    assert_eq!(repo.resolve("r1", "POSITIVE", "2024-02-02")?, 0);
    assert_eq!(repo.resolve("nope", "POSITIVE", "2024-02-02")?, 0);

    let resolved = repo.find_by_id("r1")?.expect("kept after resolve");
    assert_eq!(resolved.status, ReviewItemStatus::Resolved);
    assert_eq!(resolved.resolved_label.as_deref(), Some("NEGATIVE"));
    assert_eq!(resolved.resolved_at.as_deref(), Some("2024-02-01"));
    assert_eq!(resolved.attempts.len(), 1);

    assert_eq!(repo.list_pending()?.len(), 2);
    assert_eq!(repo.list_all()?.len(), 3);

    let summary = repo.summary()?;
    assert_eq!(summary.pending, 2);
    assert_eq!(summary.resolved, 1);
    assert_eq!(summary.by_reason.get("RETRY_LIMIT"), Some(&1));
    assert_eq!(summary.by_reason.get("PARSING_ERROR"), Some(&1));
    Ok(())
}
