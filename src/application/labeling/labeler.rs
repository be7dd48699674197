use crate::domain::{LabelingError, TaskType, WorkItem};
use crate::infra::llm::{LlmClient, LlmRequest, json::parse_llm_payload};
use crate::prompts;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const SYSTEM_PROMPT: &str =
    "You are a careful data labeler. Reply with a single JSON object and nothing else.";

/// Structured reply of the labeler.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelPrediction {
    pub label: String,
    pub confidence: u8,
    pub rationale: String,
}

#[derive(Debug, Deserialize)]
struct RawPrediction {
    label: serde_json::Value,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default, alias = "rationale")]
    reasoning: Option<String>,
}

struct TaskBrief {
    role: &'static str,
    instruction: &'static str,
    input_label: &'static str,
    placeholder: &'static str,
}

fn brief(task_type: TaskType) -> TaskBrief {
    let (role, instruction, input_label, placeholder) = match task_type {
        TaskType::Ner => (
            "a Named Entity Recognition (NER) expert",
            "Label the primary named entity type in the following text.",
            "Text",
            "ENTITY_TYPE",
        ),
        TaskType::Sentiment => (
            "a sentiment analysis expert",
            "Classify the sentiment of the following text.",
            "Text",
            "SENTIMENT",
        ),
        TaskType::Summarization => (
            "a text summarization expert",
            "Create a concise label/category for the following text based on its main topic.",
            "Text",
            "CATEGORY",
        ),
        TaskType::ObjectDetection => (
            "a computer vision expert describing image content",
            "Label the primary object or scene type described.",
            "Description/Text",
            "CATEGORY",
        ),
        TaskType::Ocr => (
            "an OCR classification expert",
            "Classify the type of document or text in the following content.",
            "Text",
            "DOCUMENT_TYPE",
        ),
        TaskType::VisualQa => (
            "a visual question answering expert",
            "Answer the question based on the provided context.",
            "Context",
            "YOUR_ANSWER",
        ),
        TaskType::Captioning => (
            "an image captioning expert",
            "Generate a concise label/category for the content described.",
            "Content",
            "CAPTION_TYPE",
        ),
        TaskType::GroundedDescription => (
            "a visual grounding expert",
            "Classify the description type and identify key regions.",
            "Content",
            "DESCRIPTION_TYPE",
        ),
    };
    TaskBrief {
        role,
        instruction,
        input_label,
        placeholder,
    }
}

/// Render the labeling prompt for an item, embedding critic feedback when present.
pub fn build_prompt(item: &WorkItem, feedback: Option<&str>) -> anyhow::Result<String> {
    let brief = brief(item.task_type);
    prompts::render(
        "label",
        &json!({
            "role": brief.role,
            "feedback": feedback.unwrap_or_default(),
            "instruction": brief.instruction,
            "choices": item.task_type.allowed_labels(),
            "input_label": brief.input_label,
            "content": item.content,
            "label_placeholder": brief.placeholder,
        }),
    )
}

pub struct Labeler {
    llm: Arc<dyn LlmClient>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl Labeler {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            temperature,
            max_tokens,
        }
    }

    pub async fn label(
        &self,
        item: &WorkItem,
        feedback: Option<&str>,
    ) -> Result<LabelPrediction, LabelingError> {
        let prompt = build_prompt(item, feedback)?;
        let request = LlmRequest::new(&self.model, SYSTEM_PROMPT, prompt)
            .with_sampling(self.temperature, self.max_tokens);

        let reply = self
            .llm
            .complete(&request)
            .await
            .map_err(|e| LabelingError::LlmCall(e.to_string()))?;
        log::debug!(target: "pipeline", "labeler reply for {}: {}", item.id, reply);
        parse_prediction(&reply)
    }
}

pub(crate) fn parse_prediction(reply: &str) -> Result<LabelPrediction, LabelingError> {
    let raw: RawPrediction = parse_llm_payload(reply).map_err(LabelingError::ResponseParse)?;
    let label = match raw.label {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };
    if label.is_empty() {
        return Err(LabelingError::ResponseParse(
            "labeler reply has an empty label".into(),
        ));
    }
    Ok(LabelPrediction {
        label,
        confidence: clamp_confidence(raw.confidence.unwrap_or(0.0)),
        rationale: raw.reasoning.unwrap_or_default(),
    })
}

/// Scores outside 0..=100 are clamped; fractional scores round to nearest.
pub(crate) fn clamp_confidence(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}
