//! Domain error types for PaperTrail.
//!
//! These errors represent domain-level failures. Infrastructure code works
//! with `anyhow` and is wrapped into these at the application boundary.

use thiserror::Error;

/// Errors raised while labeling a single work item.
///
/// `LlmCall`, `ResponseParse` and `Validation` are recovered by the pipeline
/// controller; callers of the controller only ever see a `PipelineResult`.
#[derive(Debug, Error)]
pub enum LabelingError {
    #[error("LLM call failed: {0}")]
    LlmCall(String),

    #[error("Malformed LLM response: {0}")]
    ResponseParse(String),

    #[error("Label failed validation: {0}")]
    Validation(String),

    #[error("Retries exhausted after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    #[error("Labeling operation failed: {0}")]
    OperationFailed(#[from] anyhow::Error),
}

impl LabelingError {
    /// Parse failures get their own escalation reason on the final attempt.
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Self::ResponseParse(_))
    }
}

/// Errors related to projects and artifacts.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Invalid project name: {0}")]
    InvalidName(String),

    #[error("Project operation failed: {0}")]
    OperationFailed(#[from] anyhow::Error),
}

/// Errors related to the manual review queue.
#[derive(Debug, Error)]
pub enum ReviewQueueError {
    #[error("Review item not found: {0}")]
    NotFound(String),

    #[error("Review item already resolved: {0}")]
    AlreadyResolved(String),

    #[error("Resolution label must not be empty")]
    EmptyLabel,

    #[error("Review queue operation failed: {0}")]
    OperationFailed(#[from] anyhow::Error),
}

/// Errors in configuration values or missing runtime capabilities.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Capability not available: {0}")]
    MissingCapability(String),
}
