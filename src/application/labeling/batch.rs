use super::controller::PipelineController;
use super::evaluation::{EvalSample, EvaluationReport, evaluate};
use super::export::ExportRecord;
use crate::domain::{PipelineRun, WorkItem};
use serde::Serialize;
use std::collections::HashMap;

/// Outcome of labeling a list of items.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub runs: Vec<PipelineRun>,
    pub total: usize,
    pub finalized: usize,
    pub escalated: usize,
    /// Mean final confidence; escalated items count as 0
    pub avg_final_confidence: f64,
}

impl BatchReport {
    pub fn from_runs(runs: Vec<PipelineRun>) -> Self {
        let total = runs.len();
        let finalized = runs.iter().filter(|r| r.result.is_finalized()).count();
        let sum: u64 = runs
            .iter()
            .map(|r| r.result.final_confidence() as u64)
            .sum();
        let avg_final_confidence = if total == 0 {
            0.0
        } else {
            sum as f64 / total as f64
        };
        Self {
            runs,
            total,
            finalized,
            escalated: total - finalized,
            avg_final_confidence,
        }
    }

    /// Score the finalized labels against ground truth keyed by item id.
    pub fn evaluate(&self, truth: &HashMap<String, String>) -> EvaluationReport {
        let samples: Vec<EvalSample> = self
            .runs
            .iter()
            .map(|run| EvalSample::from(&ExportRecord::from(&run.result)))
            .collect();
        evaluate(&samples, truth)
    }
}

/// Label items one after another, in input order.
pub async fn label_batch(controller: &PipelineController, items: Vec<WorkItem>) -> BatchReport {
    let total = items.len();
    let mut runs = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        log::info!(target: "pipeline", "batch item {}/{}: {}", index + 1, total, item.id);
        runs.push(controller.run(item).await);
    }
    let report = BatchReport::from_runs(runs);
    log::info!(
        target: "pipeline",
        "batch done: {} finalized, {} escalated, avg confidence {:.1}",
        report.finalized,
        report.escalated,
        report.avg_final_confidence
    );
    report
}
