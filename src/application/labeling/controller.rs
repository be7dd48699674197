//! Per-item state machine: Labeling → Critiquing → Validating → Done, with
//! bounded retries and escalation to the review queue.

use super::EscalationSink;
use super::critic::{Critic, CriticReview};
use super::labeler::{LabelPrediction, Labeler};
use super::validator;
use crate::domain::{
    AttemptOutcome, ConfigError, FallbackReason, LabelAttempt, LabelingError, PipelineResult,
    PipelineRun, PipelineState, StateTransition, WorkItem,
};
use crate::infra::app_config::{LabelingConfig, LlmConfig};
use crate::infra::llm::LlmClient;
use std::sync::Arc;

/// Model names and sampling used for the labeler and critic calls.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineModels {
    pub labeler_model: String,
    pub critic_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl PipelineModels {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            labeler_model: config.labeler_model.clone(),
            critic_model: config.critic_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

impl Default for PipelineModels {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

pub struct PipelineController {
    config: LabelingConfig,
    labeler: Labeler,
    critic: Critic,
    sink: Arc<dyn EscalationSink>,
}

/// What the current attempt decided for the machine.
enum Step {
    Retry,
    Finish(PipelineResult),
}

struct Run {
    item: WorkItem,
    trace: Vec<StateTransition>,
    error_log: Vec<String>,
}

impl Run {
    fn enter(&mut self, state: PipelineState) {
        self.item.state = state;
        self.trace.push(StateTransition {
            state,
            retry_count: self.item.retry_count,
        });
        log::debug!(
            target: "pipeline",
            "{} -> {} (retries {})",
            self.item.id,
            state,
            self.item.retry_count
        );
    }
}

impl PipelineController {
    pub fn new(
        config: LabelingConfig,
        llm: Arc<dyn LlmClient>,
        models: PipelineModels,
        sink: Arc<dyn EscalationSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let labeler = Labeler::new(
            llm.clone(),
            models.labeler_model,
            models.temperature,
            models.max_tokens,
        );
        let critic = Critic::new(
            llm,
            models.critic_model,
            models.temperature,
            models.max_tokens,
            config.rubric_dir.clone(),
        );
        Ok(Self {
            config,
            labeler,
            critic,
            sink,
        })
    }

    pub fn config(&self) -> &LabelingConfig {
        &self.config
    }

    /// Run one item to a terminal state. Never fails: every error path ends in
    /// either a finalized label or an escalation.
    pub async fn run(&self, item: WorkItem) -> PipelineRun {
        let mut item = item;
        item.retry_count = 0;
        item.attempts.clear();
        let mut run = Run {
            item,
            trace: Vec::new(),
            error_log: Vec::new(),
        };
        run.enter(PipelineState::Labeling);
        log::info!(
            target: "pipeline",
            "labeling {} ({}, max {} attempts, min confidence {})",
            run.item.id,
            run.item.task_type,
            self.config.max_retries,
            self.config.min_confidence
        );

        let result = loop {
            match self.attempt(&mut run).await {
                Step::Retry => {
                    run.enter(PipelineState::Retrying);
                    run.enter(PipelineState::Labeling);
                }
                Step::Finish(result) => break result,
            }
        };

        PipelineRun {
            result,
            attempts: run.item.attempts,
            trace: run.trace,
            error_log: run.error_log,
        }
    }

    async fn attempt(&self, run: &mut Run) -> Step {
        let number = run.item.retry_count + 1;
        let feedback_in = run.item.pending_feedback().map(str::to_string);

        let prediction = match self.labeler.label(&run.item, feedback_in.as_deref()).await {
            Ok(prediction) => prediction,
            Err(err) => {
                run.error_log
                    .push(format!("attempt {number}: labeler failed: {err}"));
                let attempt = failed_attempt(number, feedback_in, None, &err);
                return self.reject(run, attempt);
            }
        };

        run.enter(PipelineState::Critiquing);
        let review = match self
            .critic
            .review(&run.item, &prediction, self.config.min_confidence)
            .await
        {
            Ok(review) => review,
            Err(err) => {
                run.error_log
                    .push(format!("attempt {number}: critic failed: {err}"));
                let attempt = failed_attempt(number, feedback_in, Some(&prediction), &err);
                return self.reject(run, attempt);
            }
        };

        // Both the critic's and the labeler's confidence must clear the threshold.
        if !review.verdict.passes() || prediction.confidence < self.config.min_confidence {
            let critic_confidence = review.verdict.confidence;
            let attempt = rejected_attempt(number, feedback_in, &prediction, review);
            run.error_log.push(format!(
                "attempt {number}: {} label '{}' (labeler {}, critic {})",
                match attempt.outcome {
                    AttemptOutcome::LowConfidence => "below threshold",
                    _ => "critic rejected",
                },
                prediction.label,
                prediction.confidence,
                critic_confidence
            ));
            return self.reject(run, attempt);
        }

        let verdict = review.verdict;
        run.item.attempts.push(LabelAttempt {
            attempt: number,
            label: prediction.label.clone(),
            confidence: prediction.confidence,
            rationale: prediction.rationale.clone(),
            feedback_in,
            verdict: Some(verdict.clone()),
            outcome: AttemptOutcome::Accepted,
            feedback_out: None,
        });

        run.enter(PipelineState::Validating);
        match validator::validate(&run.item, &prediction, &verdict) {
            Ok(label) => {
                run.enter(PipelineState::Done);
                log::info!(
                    target: "pipeline",
                    "{} finalized as '{}' (final confidence {}, {} retries)",
                    run.item.id,
                    label.label,
                    label.final_confidence,
                    label.retry_count
                );
                Step::Finish(PipelineResult::Finalized(label))
            }
            Err(err) => {
                run.error_log
                    .push(format!("attempt {number}: validation failed: {err}"));
                Step::Finish(self.escalate(run, FallbackReason::ValidationError))
            }
        }
    }

    /// Record a rejected or failed attempt and decide between retry and escalation.
    fn reject(&self, run: &mut Run, attempt: LabelAttempt) -> Step {
        let reason = match &attempt.outcome {
            AttemptOutcome::ParseFailed { .. } => FallbackReason::ParsingError,
            AttemptOutcome::LowConfidence => FallbackReason::LowConfidence,
            _ => FallbackReason::RetryLimit,
        };
        run.item.attempts.push(attempt);
        run.item.retry_count += 1;

        if run.item.retry_count < self.config.max_retries {
            return Step::Retry;
        }
        run.error_log.push(
            LabelingError::RetryExhausted {
                attempts: run.item.retry_count,
            }
            .to_string(),
        );
        Step::Finish(self.escalate(run, reason))
    }

    fn escalate(&self, run: &mut Run, reason: FallbackReason) -> PipelineResult {
        run.enter(PipelineState::Escalated);
        let review_item_id = match self.sink.escalate(&run.item, reason, &run.error_log) {
            Ok(id) => Some(id),
            Err(err) => {
                log::error!(
                    target: "pipeline",
                    "failed to queue {} for review: {:#}",
                    run.item.id,
                    err
                );
                None
            }
        };
        log::warn!(
            target: "pipeline",
            "{} escalated: {} after {} attempts",
            run.item.id,
            reason,
            run.item.attempts.len()
        );
        PipelineResult::Escalated {
            item_id: run.item.id.clone(),
            reason,
            review_item_id,
        }
    }
}

fn rejected_attempt(
    number: u32,
    feedback_in: Option<String>,
    prediction: &LabelPrediction,
    review: CriticReview,
) -> LabelAttempt {
    let verdict = review.verdict;
    let (outcome, feedback_out) = match &verdict.feedback {
        Some(feedback) => (AttemptOutcome::Rejected, feedback.clone()),
        None => {
            let mut notes = Vec::new();
            if verdict.confidence < verdict.threshold {
                notes.push(format!(
                    "The critic accepted this label with confidence {}, below the required {}.",
                    verdict.confidence, verdict.threshold
                ));
            }
            if prediction.confidence < verdict.threshold {
                notes.push(format!(
                    "Your own confidence in this label was {}, below the required {}.",
                    prediction.confidence, verdict.threshold
                ));
            }
            let mut note = notes.join(" ");
            if !review.critique.is_empty() {
                note.push(' ');
                note.push_str(&review.critique);
            }
            (AttemptOutcome::LowConfidence, note)
        }
    };
    LabelAttempt {
        attempt: number,
        label: prediction.label.clone(),
        confidence: prediction.confidence,
        rationale: prediction.rationale.clone(),
        feedback_in,
        verdict: Some(verdict),
        outcome,
        feedback_out: Some(feedback_out),
    }
}

fn failed_attempt(
    number: u32,
    feedback_in: Option<String>,
    prediction: Option<&LabelPrediction>,
    err: &LabelingError,
) -> LabelAttempt {
    let (outcome, note) = if err.is_parse_failure() {
        (
            AttemptOutcome::ParseFailed {
                error: err.to_string(),
            },
            format!(
                "The previous reply could not be parsed ({err}). Return only the JSON object requested."
            ),
        )
    } else {
        (
            AttemptOutcome::CallFailed {
                error: err.to_string(),
            },
            format!("The previous attempt failed ({err}). Please label the item again."),
        )
    };
    LabelAttempt {
        attempt: number,
        label: prediction.map(|p| p.label.clone()).unwrap_or_default(),
        confidence: prediction.map(|p| p.confidence).unwrap_or(0),
        rationale: prediction.map(|p| p.rationale.clone()).unwrap_or_default(),
        feedback_in,
        verdict: None,
        outcome,
        feedback_out: Some(note),
    }
}
