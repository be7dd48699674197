//! Classification metrics of labeled results against ground truth.

use super::export::ExportRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

const ECE_BINS: usize = 10;
/// Confidence assumed for a labeled sample that carries none.
const DEFAULT_CONFIDENCE: u8 = 50;

/// One labeled item as seen by the evaluator.
///
/// Deserializes straight from exported result rows (`label`,
/// `final_confidence`); other fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EvalSample {
    pub item_id: String,
    #[serde(default, rename = "label")]
    pub predicted: Option<String>,
    #[serde(default, rename = "final_confidence")]
    pub confidence: Option<u8>,
}

impl From<&ExportRecord> for EvalSample {
    fn from(record: &ExportRecord) -> Self {
        Self {
            item_id: record.item_id.clone(),
            predicted: record.label.clone(),
            confidence: record.label.as_ref().map(|_| record.final_confidence),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub macro_f1: f64,
    pub per_class: BTreeMap<String, ClassMetrics>,
    /// Samples that had both a predicted label and a ground-truth label
    pub total_samples: usize,
    /// Expected calibration error of the final confidences, when any are present
    pub ece: Option<f64>,
    /// Samples with ground truth but no machine label (escalated)
    pub unlabeled: usize,
    /// Samples with no ground-truth entry
    pub missing_ground_truth: usize,
}

/// Score predictions against `truth` (item id → label). Labels compare exactly
/// after trimming.
pub fn evaluate(samples: &[EvalSample], truth: &HashMap<String, String>) -> EvaluationReport {
    let mut pairs: Vec<(&str, &str, Option<u8>)> = Vec::new();
    let mut unlabeled = 0;
    let mut missing_ground_truth = 0;
    for sample in samples {
        let Some(expected) = truth.get(&sample.item_id) else {
            missing_ground_truth += 1;
            continue;
        };
        match sample.predicted.as_deref() {
            Some(predicted) => pairs.push((predicted.trim(), expected.trim(), sample.confidence)),
            None => unlabeled += 1,
        }
    }

    let mut tp: HashMap<&str, usize> = HashMap::new();
    let mut fp: HashMap<&str, usize> = HashMap::new();
    let mut fn_: HashMap<&str, usize> = HashMap::new();
    let mut classes = BTreeSet::new();
    for &(predicted, expected, _) in &pairs {
        classes.insert(predicted);
        classes.insert(expected);
        if predicted == expected {
            *tp.entry(expected).or_default() += 1;
        } else {
            *fp.entry(predicted).or_default() += 1;
            *fn_.entry(expected).or_default() += 1;
        }
    }

    let per_class: BTreeMap<String, ClassMetrics> = classes
        .iter()
        .map(|&class| {
            let tp = tp.get(class).copied().unwrap_or(0) as f64;
            let fp = fp.get(class).copied().unwrap_or(0) as f64;
            let fn_ = fn_.get(class).copied().unwrap_or(0) as f64;
            let precision = tp / (tp + fp).max(1.0);
            let recall = tp / (tp + fn_).max(1.0);
            let f1 = 2.0 * precision * recall / (precision + recall).max(1e-9);
            (
                class.to_string(),
                ClassMetrics {
                    precision: round4(precision),
                    recall: round4(recall),
                    f1: round4(f1),
                },
            )
        })
        .collect();

    let total = pairs.len();
    let correct: Vec<bool> = pairs.iter().map(|(p, e, _)| p == e).collect();
    let accuracy = correct.iter().filter(|c| **c).count() as f64 / total.max(1) as f64;
    let macro_f1 =
        per_class.values().map(|m| m.f1).sum::<f64>() / per_class.len().max(1) as f64;

    let ece = pairs.iter().any(|(_, _, c)| c.is_some()).then(|| {
        let confidences: Vec<f64> = pairs
            .iter()
            .map(|(_, _, c)| c.unwrap_or(DEFAULT_CONFIDENCE) as f64 / 100.0)
            .collect();
        round4(expected_calibration_error(&confidences, &correct, ECE_BINS))
    });

    let report = EvaluationReport {
        accuracy: round4(accuracy),
        macro_f1: round4(macro_f1),
        per_class,
        total_samples: total,
        ece,
        unlabeled,
        missing_ground_truth,
    };
    log::info!(
        "evaluated {} samples: accuracy {:.4}, macro F1 {:.4}",
        report.total_samples,
        report.accuracy,
        report.macro_f1
    );
    report
}

/// Weighted gap between mean confidence and accuracy over equal-width bins.
/// Confidences are in `0.0..=1.0`; `1.0` falls into the top bin.
pub fn expected_calibration_error(confidences: &[f64], correct: &[bool], bins: usize) -> f64 {
    let bins = bins.max(1);
    let mut buckets: Vec<Vec<(f64, bool)>> = vec![Vec::new(); bins];
    for (&confidence, &hit) in confidences.iter().zip(correct) {
        let index = ((confidence * bins as f64) as usize).min(bins - 1);
        buckets[index].push((confidence, hit));
    }

    let n = confidences.len().max(1) as f64;
    buckets
        .iter()
        .filter(|bucket| !bucket.is_empty())
        .map(|bucket| {
            let len = bucket.len() as f64;
            let avg_confidence = bucket.iter().map(|(c, _)| c).sum::<f64>() / len;
            let avg_accuracy = bucket.iter().filter(|(_, hit)| *hit).count() as f64 / len;
            (avg_confidence - avg_accuracy).abs() * len / n
        })
        .sum()
}

/// Ground truth as a JSON object (`{"item-1": "POSITIVE"}`) or a JSON array /
/// JSON lines of `{"item_id": .., "ground_truth": ..}` rows.
pub fn parse_ground_truth(text: &str) -> Result<HashMap<String, String>> {
    #[derive(Deserialize)]
    struct Row {
        item_id: String,
        #[serde(alias = "label")]
        ground_truth: String,
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text)
        && !map.contains_key("item_id")
    {
        return map
            .into_iter()
            .map(|(id, label)| match label {
                Value::String(label) => Ok((id, label)),
                other => anyhow::bail!("ground truth for '{id}' is not a string: {other}"),
            })
            .collect();
    }
    let rows: Vec<Row> = parse_rows(text).context("parsing ground truth")?;
    Ok(rows.into_iter().map(|r| (r.item_id, r.ground_truth)).collect())
}

/// Exported results, as written by `export_results` in either format.
pub fn parse_exported(text: &str) -> Result<Vec<EvalSample>> {
    parse_rows(text).context("parsing exported results")
}

fn parse_rows<T: serde::de::DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    if text.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(text)?);
    }
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", i + 1))
        })
        .collect()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
