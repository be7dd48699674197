//! End-to-end runs of the labeling pipeline against a real review queue.

use async_trait::async_trait;
use papertrail::application::labeling::{PipelineController, PipelineModels, label_batch};
use papertrail::application::review_queue::ReviewQueue;
use papertrail::domain::{
    AttemptOutcome, FallbackReason, PipelineResult, ReviewItemStatus, TaskType, WorkItem,
};
use papertrail::infra::app_config::LabelingConfig;
use papertrail::infra::db::Database;
use papertrail::infra::llm::{LlmClient, LlmError, LlmRequest};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replies keyed by model; the labeler and critic use different model names.
struct Scripted {
    labeler: Mutex<VecDeque<String>>,
    critic: Mutex<VecDeque<String>>,
}

impl Scripted {
    fn new(labeler: &[&str], critic: &[&str]) -> Self {
        Self {
            labeler: Mutex::new(labeler.iter().map(|s| s.to_string()).collect()),
            critic: Mutex::new(critic.iter().map(|s| s.to_string()).collect()),
        }
    }
}

#[async_trait]
impl LlmClient for Scripted {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let queue = if request.model == "labeler" {
            &self.labeler
        } else {
            &self.critic
        };
        queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Transport("script exhausted".into()))
    }
}

fn models() -> PipelineModels {
    PipelineModels {
        labeler_model: "labeler".into(),
        critic_model: "critic".into(),
        ..PipelineModels::default()
    }
}

#[tokio::test]
async fn test_escalation_is_persisted_and_resolvable() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    let queue = Arc::new(ReviewQueue::new(db.review_item_repo()));
    let llm = Arc::new(Scripted::new(
        &[
            r#"{"label": "POSITIVE", "confidence": 80, "reasoning": "upbeat"}"#,
            r#"{"label": "NEUTRAL", "confidence": 75, "reasoning": "flat"}"#,
            r#"{"label": "MIXED", "confidence": 80, "reasoning": "both"}"#,
        ],
        &[
            r#"{"is_correct": false, "confidence_score": 70, "critique": "Too vague."}"#,
            r#"{"is_correct": false, "confidence_score": 75, "critique": "Ignores tone."}"#,
            r#"{"is_correct": false, "confidence_score": 80, "critique": "Still wrong."}"#,
        ],
    ));
    let controller =
        PipelineController::new(LabelingConfig::default(), llm, models(), queue.clone())?;

    let run = controller
        .run(WorkItem::new("row-7", "foo bar", TaskType::Sentiment))
        .await;

    let review_id = match &run.result {
        PipelineResult::Escalated {
            reason,
            review_item_id,
            ..
        } => {
            assert_eq!(*reason, FallbackReason::RetryLimit);
            review_item_id.clone().expect("queued")
        }
        other => panic!("expected escalation, got {other:?}"),
    };

    let stored = queue.find_by_id(&review_id)?;
    assert_eq!(stored.item_id, "row-7");
    assert_eq!(stored.content, "foo bar");
    assert_eq!(stored.attempts.len(), 3);
    assert!(
        stored
            .attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::Rejected)
    );
    assert_eq!(stored.attempts[1].feedback_in.as_deref(), Some("Too vague."));
    assert_eq!(queue.list_pending()?.len(), 1);

    let resolved = queue.resolve(&review_id, "NEGATIVE")?;
    assert_eq!(resolved.status, ReviewItemStatus::Resolved);
    assert!(queue.list_pending()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_batch_mixes_finalized_and_escalated_items() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    let queue = Arc::new(ReviewQueue::new(db.review_item_repo()));
    let config = LabelingConfig {
        max_retries: 1,
        ..LabelingConfig::default()
    };
    let llm = Arc::new(Scripted::new(
        &[
            r#"{"label": "negative", "confidence": 92, "reasoning": "angry"}"#,
            "I am not sure what to say.",
        ],
        &[r#"{"is_correct": true, "confidence_score": 90, "critique": "Correct."}"#],
    ));
    let controller = PipelineController::new(config, llm, models(), queue.clone())?;

    let report = label_batch(
        &controller,
        vec![
            WorkItem::new("a", "this is awful", TaskType::Sentiment),
            WorkItem::new("b", "???", TaskType::Sentiment),
        ],
    )
    .await;

    assert_eq!(report.total, 2);
    assert_eq!(report.finalized, 1);
    assert_eq!(report.escalated, 1);

    match &report.runs[0].result {
        PipelineResult::Finalized(label) => {
            assert_eq!(label.label, "NEGATIVE");
            assert_eq!(label.final_confidence, 91);
            assert_eq!(label.retry_count, 0);
        }
        other => panic!("expected finalized, got {other:?}"),
    }
    match &report.runs[1].result {
        PipelineResult::Escalated { reason, .. } => {
            assert_eq!(*reason, FallbackReason::ParsingError)
        }
        other => panic!("expected escalation, got {other:?}"),
    }

    let summary = queue.summary()?;
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.by_reason.get("PARSING_ERROR"), Some(&1));
    Ok(())
}
