//! Bounded-retry labeling pipeline: labeler, critic, validator and the
//! controller that drives them per work item.

pub mod batch;
pub mod controller;
pub mod critic;
pub mod evaluation;
pub mod export;
pub mod labeler;
pub mod validator;


pub use batch::{BatchReport, label_batch};
pub use controller::{PipelineController, PipelineModels};
pub use critic::{Critic, CriticReview, load_rubric};
pub use evaluation::{EvalSample, EvaluationReport, evaluate};
pub use export::{ExportFormat, ExportRecord, export_results};
pub use labeler::{LabelPrediction, Labeler};

use crate::domain::{FallbackReason, ReviewItemId, WorkItem};

/// Destination for items the pipeline gives up on.
pub trait EscalationSink: Send + Sync {
    /// Persist the escalated item and return the id of the stored record.
    fn escalate(
        &self,
        item: &WorkItem,
        reason: FallbackReason,
        error_log: &[String],
    ) -> anyhow::Result<ReviewItemId>;
}
