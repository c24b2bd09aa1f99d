use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::models::{Dialect, ModelCredential};

/// Why a completion call produced no query text
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("LLM endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("LLM request timed out after {0} seconds")]
    Timeout(u64),

    #[error("LLM endpoint rejected the API key ({status}): {body}")]
    Authentication { status: u16, body: String },

    #[error("LLM service returned error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Failed to parse LLM response: {0}")]
    InvalidResponse(String),

    #[error("LLM response did not contain a query")]
    EmptyCompletion,

    #[error("Failed to call LLM service: {0}")]
    Transport(String),
}

/// Turns a question into query text for one dialect
#[async_trait::async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate(
        &self,
        dialect: Dialect,
        schema: &str,
        question: &str,
        credential: &ModelCredential,
    ) -> Result<String, GenerationError>;
}

/// OpenAI-compatible chat completion client
pub struct LlmService {
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
    http_client: HttpClient,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl LlmService {
    pub fn new(config: &LlmConfig) -> Result<Self, GenerationError> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
            http_client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one prompt and return the completion text
    async fn call_llm_api(
        &self,
        prompt: &str,
        credential: &ModelCredential,
    ) -> Result<String, GenerationError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(credential.expose())
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "user", "content": prompt}
                ],
                "temperature": self.temperature,
                "max_tokens": self.max_tokens,
            }))
            .send()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationError::Authentication {
                    status: status.as_u16(),
                    body,
                },
                _ => GenerationError::Upstream {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }

        Ok(text)
    }

    fn classify_transport_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            GenerationError::Unreachable(e.to_string())
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}

#[async_trait::async_trait]
impl QueryGenerator for LlmService {
    async fn generate(
        &self,
        dialect: Dialect,
        schema: &str,
        question: &str,
        credential: &ModelCredential,
    ) -> Result<String, GenerationError> {
        let prompt = dialect.render_prompt(schema, question);
        tracing::debug!("Requesting {} generation from model {}", dialect, self.model);
        self.call_llm_api(&prompt, credential).await
    }
}
