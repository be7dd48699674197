//! LLM boundary: request/response types, the client trait, and tolerant JSON
//! extraction for structured replies.

pub mod json;
mod openai;

pub use json::parse_llm_json;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use thiserror::Error;

/// One chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            user: user.into(),
            temperature: 0.1,
            max_tokens: 4096,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response shape: {0}")]
    InvalidResponse(String),
}

/// A chat-completion style LLM endpoint.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the request and return the raw text of the first choice.
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError>;
}
