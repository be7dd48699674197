use serde::{Deserialize, Serialize};

/// A paper record, uniform across search providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    /// Provider-scoped identifier
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub pdf_url: Option<String>,
    /// Provider that returned this record, e.g. "semantic_scholar"
    pub source: String,
}
