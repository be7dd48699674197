use super::labeler::{LabelPrediction, clamp_confidence};
use crate::domain::{CriticVerdict, Decision, LabelingError, TaskType, WorkItem};
use crate::infra::llm::{LlmClient, LlmRequest, json::parse_llm_payload};
use crate::prompts;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SYSTEM_PROMPT: &str =
    "You review labels produced by another model. Reply with a single JSON object and nothing else.";
const MISSING_CRITIQUE: &str = "The critic rejected the label without giving a reason.";

/// Verdict plus the critic's free-text critique.
///
/// The critique is kept even for accepts so a below-threshold accept can pass
/// it on to the next attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticReview {
    pub verdict: CriticVerdict,
    pub critique: String,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    is_correct: bool,
    #[serde(default, alias = "confidence")]
    confidence_score: Option<f64>,
    #[serde(default)]
    critique: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Rubric {
    #[serde(default)]
    criteria: Vec<String>,
}

/// Evaluation criteria from `<dir>/<task_type>.json`. Missing or unreadable
/// rubrics yield no criteria.
pub fn load_rubric(dir: &Path, task_type: TaskType) -> Vec<String> {
    let path = dir.join(format!("{task_type}.json"));
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(_) => return Vec::new(),
    };
    match serde_json::from_str::<Rubric>(&contents) {
        Ok(rubric) => rubric.criteria,
        Err(err) => {
            log::warn!("Ignoring invalid rubric {}: {}", path.display(), err);
            Vec::new()
        }
    }
}

pub struct Critic {
    llm: Arc<dyn LlmClient>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    rubric_dir: Option<PathBuf>,
}

impl Critic {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
        rubric_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            temperature,
            max_tokens,
            rubric_dir,
        }
    }

    pub async fn review(
        &self,
        item: &WorkItem,
        prediction: &LabelPrediction,
        threshold: u8,
    ) -> Result<CriticReview, LabelingError> {
        let criteria = self
            .rubric_dir
            .as_deref()
            .map(|dir| load_rubric(dir, item.task_type))
            .unwrap_or_default();
        let prompt = prompts::render(
            "critic",
            &json!({
                "task_type": item.task_type.to_string(),
                "content": item.content,
                "label": prediction.label,
                "rationale": prediction.rationale,
                "criteria": criteria,
            }),
        )?;
        let request = LlmRequest::new(&self.model, SYSTEM_PROMPT, prompt)
            .with_sampling(self.temperature, self.max_tokens);

        let reply = self
            .llm
            .complete(&request)
            .await
            .map_err(|e| LabelingError::LlmCall(e.to_string()))?;
        log::debug!(target: "pipeline", "critic reply for {}: {}", item.id, reply);
        parse_review(&reply, threshold)
    }
}

pub(crate) fn parse_review(reply: &str, threshold: u8) -> Result<CriticReview, LabelingError> {
    let raw: RawReview = parse_llm_payload(reply).map_err(LabelingError::ResponseParse)?;
    let critique = raw.critique.map(|c| c.trim().to_string()).unwrap_or_default();
    let decision = if raw.is_correct {
        Decision::Accept
    } else {
        Decision::Reject
    };
    let feedback = match decision {
        Decision::Accept => None,
        Decision::Reject if critique.is_empty() => Some(MISSING_CRITIQUE.to_string()),
        Decision::Reject => Some(critique.clone()),
    };
    Ok(CriticReview {
        verdict: CriticVerdict {
            decision,
            confidence: clamp_confidence(raw.confidence_score.unwrap_or(0.0)),
            feedback,
            threshold,
        },
        critique,
    })
}
