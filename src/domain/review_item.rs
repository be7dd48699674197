//! Items escalated to manual review.

use super::labeling::{FallbackReason, LabelAttempt, TaskType, WorkItemId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a review queue record
pub type ReviewItemId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewItemStatus {
    #[default]
    Pending,
    Resolved,
}

impl fmt::Display for ReviewItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

impl FromStr for ReviewItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "resolved" | "done" => Ok(Self::Resolved),
            other => Err(format!("unknown review item status '{other}'")),
        }
    }
}

/// A work item that the pipeline could not finalize on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: ReviewItemId,
    /// Id of the work item that was escalated
    pub item_id: WorkItemId,
    pub task_type: TaskType,
    /// Original input text
    pub content: String,
    pub reason: FallbackReason,
    /// Full attempt history at the time of escalation
    pub attempts: Vec<LabelAttempt>,
    pub error_log: Vec<String>,
    pub status: ReviewItemStatus,
    /// Human-supplied label, set on resolve
    #[serde(default)]
    pub resolved_label: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub resolved_at: Option<String>,
}

/// Counts of pending review items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewQueueSummary {
    pub pending: usize,
    pub resolved: usize,
    pub by_reason: BTreeMap<String, usize>,
}
