//! Projects and the artifacts research tools save into them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a project
pub type ProjectId = String;

/// Unique identifier for an artifact
pub type ArtifactId = String;

/// A research project grouping saved artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Creation timestamp in RFC3339 format.
    pub created_at: String,
    /// Update timestamp in RFC3339 format. Bumped whenever an artifact is saved.
    pub updated_at: String,
}

/// Closed set of artifact kinds produced by the research tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    TopicExploration,
    HypothesisValidation,
    Roadmap,
    LiteratureAnalysis,
    DesignCritique,
    CleanedData,
    LabeledData,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 7] = [
        ArtifactKind::TopicExploration,
        ArtifactKind::HypothesisValidation,
        ArtifactKind::Roadmap,
        ArtifactKind::LiteratureAnalysis,
        ArtifactKind::DesignCritique,
        ArtifactKind::CleanedData,
        ArtifactKind::LabeledData,
    ];

    /// Human readable title used in listings.
    pub fn title(&self) -> &'static str {
        match self {
            Self::TopicExploration => "Topic Exploration",
            Self::HypothesisValidation => "Hypothesis Validation",
            Self::Roadmap => "Research Roadmap",
            Self::LiteratureAnalysis => "Literature Analysis",
            Self::DesignCritique => "Design Critique",
            Self::CleanedData => "Cleaned Dataset",
            Self::LabeledData => "Labeled Dataset",
        }
    }

    pub fn is_tabular(&self) -> bool {
        matches!(self, Self::CleanedData | Self::LabeledData)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopicExploration => write!(f, "topic_exploration"),
            Self::HypothesisValidation => write!(f, "hypothesis_validation"),
            Self::Roadmap => write!(f, "roadmap"),
            Self::LiteratureAnalysis => write!(f, "literature_analysis"),
            Self::DesignCritique => write!(f, "design_critique"),
            Self::CleanedData => write!(f, "cleaned_data"),
            Self::LabeledData => write!(f, "labeled_data"),
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "topic_exploration" => Ok(Self::TopicExploration),
            "hypothesis_validation" => Ok(Self::HypothesisValidation),
            "roadmap" => Ok(Self::Roadmap),
            "literature_analysis" => Ok(Self::LiteratureAnalysis),
            "design_critique" => Ok(Self::DesignCritique),
            "cleaned_data" => Ok(Self::CleanedData),
            "labeled_data" => Ok(Self::LabeledData),
            other => Err(format!("unknown artifact kind '{other}'")),
        }
    }
}

/// A saved output of a research tool, attached to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub project_id: ProjectId,
    pub kind: ArtifactKind,
    pub name: String,
    /// Payload file name, relative to the project's payload directory
    pub filename: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: String,
}

/// Artifact counts for a single project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub artifact_count: usize,
    pub by_kind: BTreeMap<ArtifactKind, usize>,
}

/// Project row joined with its artifact count, for recent-project listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project: Project,
    pub artifact_count: usize,
}
