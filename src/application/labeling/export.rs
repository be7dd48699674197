use crate::domain::PipelineResult;
use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Jsonl,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Jsonl => write!(f, "jsonl"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            other => Err(format!("unknown export format '{other}' (expected json or jsonl)")),
        }
    }
}

/// Flat row written for each labeled item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRecord {
    pub item_id: String,
    pub status: &'static str,
    pub label: Option<String>,
    pub confidence: Option<u8>,
    pub critic_confidence: Option<u8>,
    pub final_confidence: u8,
    pub retry_count: Option<u32>,
    pub fallback_reason: Option<String>,
    pub review_item_id: Option<String>,
}

impl From<&PipelineResult> for ExportRecord {
    fn from(result: &PipelineResult) -> Self {
        match result {
            PipelineResult::Finalized(label) => Self {
                item_id: label.item_id.clone(),
                status: "finalized",
                label: Some(label.label.clone()),
                confidence: Some(label.confidence),
                critic_confidence: Some(label.critic_confidence),
                final_confidence: label.final_confidence,
                retry_count: Some(label.retry_count),
                fallback_reason: None,
                review_item_id: None,
            },
            PipelineResult::Escalated {
                item_id,
                reason,
                review_item_id,
            } => Self {
                item_id: item_id.clone(),
                status: "escalated",
                label: None,
                confidence: None,
                critic_confidence: None,
                final_confidence: 0,
                retry_count: None,
                fallback_reason: Some(reason.to_string()),
                review_item_id: review_item_id.clone(),
            },
        }
    }
}

pub fn export_results<'a>(
    results: impl IntoIterator<Item = &'a PipelineResult>,
    format: ExportFormat,
) -> Result<String> {
    let records: Vec<ExportRecord> = results.into_iter().map(ExportRecord::from).collect();
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&records)?),
        ExportFormat::Jsonl => {
            let mut out = String::new();
            for record in &records {
                out.push_str(&serde_json::to_string(record)?);
                out.push('\n');
            }
            Ok(out)
        }
    }
}
