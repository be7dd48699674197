//! Optional capabilities, resolved once at startup from the loaded config.

use super::app_config::AppConfig;
use crate::domain::ConfigError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Capability {
    Llm,
    PaperSearch,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Llm => write!(f, "llm"),
            Self::PaperSearch => write!(f, "paper_search"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// An API key is configured for the LLM endpoint
    pub llm: bool,
    /// Paper search is enabled and at least one known provider is listed
    pub paper_search: bool,
}

impl Capabilities {
    pub fn resolve(config: &AppConfig) -> Self {
        let llm = config
            .llm
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        let paper_search = config.paper_search.enabled
            && config
                .paper_search
                .providers
                .iter()
                .any(|p| super::paper_search::is_known_provider(p));

        let caps = Self { llm, paper_search };
        log::debug!("capabilities resolved: {:?}", caps);
        caps
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Llm => self.llm,
            Capability::PaperSearch => self.paper_search,
        }
    }

    pub fn require(&self, capability: Capability) -> Result<(), ConfigError> {
        if self.has(capability) {
            return Ok(());
        }
        let hint = match capability {
            Capability::Llm => "set OPENAI_API_KEY or llm.api_key in the config file",
            Capability::PaperSearch => {
                "enable paper_search and list at least one of semantic_scholar, openalex"
            }
        };
        Err(ConfigError::MissingCapability(format!("{capability} ({hint})")))
    }
}
