//! Labeling domain model: work items, attempts, critic verdicts and the
//! terminal outcome of a pipeline run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a work item
pub type WorkItemId = String;

/// Kind of labeling task. Decides the prompt and the allowed label vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Ner,
    #[default]
    Sentiment,
    Summarization,
    ObjectDetection,
    Ocr,
    VisualQa,
    Captioning,
    GroundedDescription,
}

impl TaskType {
    pub const ALL: [TaskType; 8] = [
        TaskType::Ner,
        TaskType::Sentiment,
        TaskType::Summarization,
        TaskType::ObjectDetection,
        TaskType::Ocr,
        TaskType::VisualQa,
        TaskType::Captioning,
        TaskType::GroundedDescription,
    ];

    /// Closed label vocabulary, or `None` when the task accepts free-form labels.
    pub fn allowed_labels(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::Ner => Some(&[
                "PERSON",
                "ORGANIZATION",
                "LOCATION",
                "DATE",
                "PRODUCT",
                "EVENT",
                "OTHER",
            ]),
            Self::Sentiment => Some(&["POSITIVE", "NEGATIVE", "NEUTRAL", "MIXED"]),
            Self::Summarization => Some(&[
                "TECHNICAL",
                "SCIENTIFIC",
                "NEWS",
                "OPINION",
                "NARRATIVE",
                "INSTRUCTIONAL",
                "OTHER",
            ]),
            Self::ObjectDetection => Some(&[
                "PERSON", "VEHICLE", "ANIMAL", "BUILDING", "FOOD", "NATURE", "OBJECT", "SCENE",
            ]),
            Self::Ocr => Some(&[
                "HANDWRITTEN",
                "PRINTED",
                "MIXED",
                "FORM",
                "TABLE",
                "RECEIPT",
                "LABEL",
                "OTHER",
            ]),
            Self::Captioning => Some(&[
                "PORTRAIT",
                "LANDSCAPE",
                "ACTION",
                "GROUP",
                "PRODUCT",
                "ABSTRACT",
                "DOCUMENTARY",
            ]),
            Self::VisualQa | Self::GroundedDescription => None,
        }
    }

    /// Whether `label` is acceptable for this task type (case-insensitive).
    pub fn accepts_label(&self, label: &str) -> bool {
        let label = label.trim();
        if label.is_empty() {
            return false;
        }
        match self.allowed_labels() {
            Some(allowed) => allowed.iter().any(|l| l.eq_ignore_ascii_case(label)),
            None => true,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ner => write!(f, "ner"),
            Self::Sentiment => write!(f, "sentiment"),
            Self::Summarization => write!(f, "summarization"),
            Self::ObjectDetection => write!(f, "object_detection"),
            Self::Ocr => write!(f, "ocr"),
            Self::VisualQa => write!(f, "visual_qa"),
            Self::Captioning => write!(f, "captioning"),
            Self::GroundedDescription => write!(f, "grounded_description"),
        }
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "ner" => Ok(Self::Ner),
            "sentiment" => Ok(Self::Sentiment),
            "summarization" => Ok(Self::Summarization),
            "object_detection" => Ok(Self::ObjectDetection),
            "ocr" => Ok(Self::Ocr),
            "visual_qa" => Ok(Self::VisualQa),
            "captioning" => Ok(Self::Captioning),
            "grounded_description" => Ok(Self::GroundedDescription),
            _ => Ok(Self::Sentiment),
        }
    }
}

/// State of a work item inside the pipeline state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Labeling,
    Critiquing,
    Validating,
    Retrying,
    Done,
    Escalated,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Escalated)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Labeling => write!(f, "labeling"),
            Self::Critiquing => write!(f, "critiquing"),
            Self::Validating => write!(f, "validating"),
            Self::Retrying => write!(f, "retrying"),
            Self::Done => write!(f, "done"),
            Self::Escalated => write!(f, "escalated"),
        }
    }
}

/// Accept or reject decision of the critic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
}

/// Critic review of one label attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticVerdict {
    pub decision: Decision,
    /// Critic's confidence in its decision (0-100)
    pub confidence: u8,
    /// Present iff the decision is `Reject`
    #[serde(default)]
    pub feedback: Option<String>,
    /// Minimum confidence that was applied when judging this verdict
    pub threshold: u8,
}

impl CriticVerdict {
    /// True when the critic accepted with enough confidence to move on.
    pub fn passes(&self) -> bool {
        self.decision == Decision::Accept && self.confidence >= self.threshold
    }
}

/// How a single labeling attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Critic accepted at or above the threshold
    Accepted,
    /// Critic rejected the label
    Rejected,
    /// Critic accepted but below the confidence threshold
    LowConfidence,
    /// The LLM call itself failed (timeout, network, HTTP status)
    CallFailed { error: String },
    /// The LLM replied but the reply was not the expected JSON
    ParseFailed { error: String },
}

impl AttemptOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// One pass of the labeler (and critic, when it got that far).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelAttempt {
    /// 1-based attempt index
    pub attempt: u32,
    /// Produced label; empty when the labeler call failed
    pub label: String,
    /// Labeler confidence (0-100)
    pub confidence: u8,
    /// Free-text rationale from the labeler
    pub rationale: String,
    /// Feedback this attempt was given, verbatim from the previous rejection
    #[serde(default)]
    pub feedback_in: Option<String>,
    /// Critic verdict, when the critic ran
    #[serde(default)]
    pub verdict: Option<CriticVerdict>,
    pub outcome: AttemptOutcome,
    /// Feedback handed to the next attempt; set iff the attempt was not accepted
    #[serde(default)]
    pub feedback_out: Option<String>,
}

/// Input item to be labeled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub content: String,
    pub task_type: TaskType,
    #[serde(default)]
    pub state: PipelineState,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub attempts: Vec<LabelAttempt>,
}

impl WorkItem {
    pub fn new(id: impl Into<WorkItemId>, content: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            task_type,
            state: PipelineState::Labeling,
            retry_count: 0,
            attempts: Vec::new(),
        }
    }

    /// Feedback carried by the most recent rejected attempt, if any.
    pub fn pending_feedback(&self) -> Option<&str> {
        self.attempts
            .last()
            .filter(|a| !a.outcome.is_accepted())
            .and_then(|a| a.feedback_out.as_deref())
    }
}

/// Why an item was routed to the review queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackReason {
    RetryLimit,
    LowConfidence,
    ParsingError,
    ValidationError,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryLimit => write!(f, "RETRY_LIMIT"),
            Self::LowConfidence => write!(f, "LOW_CONFIDENCE"),
            Self::ParsingError => write!(f, "PARSING_ERROR"),
            Self::ValidationError => write!(f, "VALIDATION_ERROR"),
        }
    }
}

impl FromStr for FallbackReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RETRY_LIMIT" => Ok(Self::RetryLimit),
            "LOW_CONFIDENCE" => Ok(Self::LowConfidence),
            "PARSING_ERROR" => Ok(Self::ParsingError),
            "VALIDATION_ERROR" => Ok(Self::ValidationError),
            other => Err(format!("unknown fallback reason '{other}'")),
        }
    }
}

/// A label that made it through critic and validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedLabel {
    pub item_id: WorkItemId,
    pub label: String,
    pub confidence: u8,
    pub rationale: String,
    pub critic_confidence: u8,
    pub final_confidence: u8,
    pub retry_count: u32,
}

impl ValidatedLabel {
    /// Mean of labeler and critic confidence, rounded down.
    pub fn combined_confidence(labeler: u8, critic: u8) -> u8 {
        ((labeler as u16 + critic as u16) / 2) as u8
    }
}

/// Terminal outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineResult {
    Finalized(ValidatedLabel),
    Escalated {
        item_id: WorkItemId,
        reason: FallbackReason,
        /// Review queue record, `None` if the queue write failed
        review_item_id: Option<String>,
    },
}

impl PipelineResult {
    pub fn item_id(&self) -> &str {
        match self {
            Self::Finalized(label) => &label.item_id,
            Self::Escalated { item_id, .. } => item_id,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Finalized(_))
    }

    pub fn final_confidence(&self) -> u8 {
        match self {
            Self::Finalized(label) => label.final_confidence,
            Self::Escalated { .. } => 0,
        }
    }
}

/// One entry of the state trace recorded while a run progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub state: PipelineState,
    pub retry_count: u32,
}

/// Everything a caller needs to display a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub result: PipelineResult,
    pub attempts: Vec<LabelAttempt>,
    pub trace: Vec<StateTransition>,
    pub error_log: Vec<String>,
}
