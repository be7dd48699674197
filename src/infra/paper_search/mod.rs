//! Academic paper search over public scholarly APIs.
//!
//! Providers are tried in the configured order and the first non-empty result
//! wins. Search never fails: provider errors are logged and skipped.

mod openalex;
mod semantic_scholar;

pub use openalex::OpenAlex;
pub use semantic_scholar::SemanticScholar;

use crate::domain::Paper;
use crate::infra::app_config::PaperSearchConfig;
use async_trait::async_trait;
use std::time::Duration;

pub const SEMANTIC_SCHOLAR: &str = "semantic_scholar";
pub const OPENALEX: &str = "openalex";

pub fn is_known_provider(name: &str) -> bool {
    matches!(name, SEMANTIC_SCHOLAR | OPENALEX)
}

#[async_trait]
pub trait PaperSearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Paper>>;
}

pub struct PaperSearch {
    providers: Vec<Box<dyn PaperSearchProvider>>,
    default_limit: usize,
}

impl PaperSearch {
    pub fn new(providers: Vec<Box<dyn PaperSearchProvider>>, default_limit: usize) -> Self {
        Self {
            providers,
            default_limit: default_limit.max(1),
        }
    }

    /// Build the provider chain from config. Unknown provider names are skipped.
    pub fn from_config(config: &PaperSearchConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let mut providers: Vec<Box<dyn PaperSearchProvider>> = Vec::new();
        if config.enabled {
            for name in &config.providers {
                match name.as_str() {
                    SEMANTIC_SCHOLAR => providers.push(Box::new(SemanticScholar::new(
                        config.semantic_scholar_api_key.clone(),
                        timeout,
                    ))),
                    OPENALEX => providers.push(Box::new(OpenAlex::new(
                        config.openalex_email.clone(),
                        timeout,
                    ))),
                    other => log::warn!("Ignoring unknown paper search provider '{}'", other),
                }
            }
        }
        Self::new(providers, config.limit)
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn search(&self, query: &str, limit: Option<usize>) -> Vec<Paper> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let limit = limit.unwrap_or(self.default_limit).max(1);

        for provider in &self.providers {
            match provider.search(query, limit).await {
                Ok(papers) if !papers.is_empty() => {
                    log::info!(
                        "{} returned {} papers for '{}'",
                        provider.name(),
                        papers.len(),
                        query
                    );
                    let mut papers = papers;
                    papers.truncate(limit);
                    return papers;
                }
                Ok(_) => log::debug!("{} returned no papers for '{}'", provider.name(), query),
                Err(err) => log::warn!("{} search failed: {:#}", provider.name(), err),
            }
        }
        Vec::new()
    }
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("papertrail/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|err| {
            log::warn!("falling back to default HTTP client: {}", err);
            reqwest::Client::new()
        })
}
