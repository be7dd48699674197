//! OpenAI-compatible chat completions client.

use super::{LlmClient, LlmError, LlmRequest};
use crate::infra::app_config::LlmConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            timeout,
        }
    }

    /// Build a client from config. Returns `None` when no API key is set.
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        let key = config.api_key.as_deref().filter(|k| !k.trim().is_empty())?;
        Some(Self::new(
            key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Transport(format!("reading response body: {e}")))?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &text));
        }
        first_choice_text(&text)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        log::debug!(target: "llm", "POST {} model={}", self.endpoint, request.model);
        match tokio::time::timeout(self.timeout, self.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout.as_secs())),
        }
    }
}

fn api_error(status: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(500).collect());
    LlmError::Api { status, message }
}

fn first_choice_text(body: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::InvalidResponse("no choices with content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = OpenAiClient::new("k", "http://localhost:8080/v1/", Duration::from_secs(1));
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_from_config_requires_key() {
        let mut config = LlmConfig::default();
        assert!(OpenAiClient::from_config(&config).is_none());
        config.api_key = Some("sk-test".into());
        assert!(OpenAiClient::from_config(&config).is_some());
    }

    #[test]
    fn test_first_choice_text() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"label\":\"X\"}"}}]}"#;
        assert_eq!(first_choice_text(body).unwrap(), r#"{"label":"X"}"#);

        let empty = r#"{"choices":[]}"#;
        assert!(matches!(
            first_choice_text(empty),
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_api_error_prefers_structured_message() {
        let err = api_error(429, r#"{"error":{"message":"Rate limit reached","type":"x"}}"#);
        assert_eq!(err.to_string(), "API returned 429: Rate limit reached");

        let err = api_error(502, "Bad gateway");
        assert_eq!(err.to_string(), "API returned 502: Bad gateway");
    }

    #[test]
    fn test_request_serializes_json_mode() {
        let body = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.1,
            max_tokens: 4096,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["max_tokens"], 4096);
        assert_eq!(value["messages"][0]["role"], "user");
    }
}
