//! LLM client: the single point of entry for chat-completion calls.
//!
//! Speaks the OpenAI-compatible chat-completions protocol (OpenRouter by
//! default). Bearer-token auth, `{model, messages, temperature, max_tokens}`
//! in, `choices[0].message.content` out. One request per call; fallback
//! across models happens in the analyzer.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::LlmConfig;

pub mod prompts;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("No API key configured")]
    MissingCredential,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Text of the first choice, if it carried any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// A chat-completion endpoint. [`LlmClient`] is the production implementation;
/// tests substitute scripted backends.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Whether a credential is available. Checked before any call is made.
    fn is_configured(&self) -> bool;

    /// One request to `model`; returns the raw assistant text.
    async fn complete(&self, model: &str, system: &str, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: Option<String>,
    api_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(config.timeout).build()?,
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Makes a single call and returns the full response object.
    /// Non-2xx statuses become [`LlmError::Api`]; nothing is retried.
    pub async fn call(&self, model: &str, system: &str, prompt: &str) -> Result<ChatResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingCredential)?;

        let request_body = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: api_error_message(body),
            });
        }

        let chat: ChatResponse = serde_json::from_str(&response.text().await?)?;

        if let Some(usage) = &chat.usage {
            debug!(
                "LLM call to {model} succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
        Ok(chat)
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    async fn complete(&self, model: &str, system: &str, prompt: &str) -> Result<String, LlmError> {
        let response = self.call(model, system, prompt).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }
}

/// Pulls `error.message` out of an OpenAI-style error body, falling back to the raw body.
fn api_error_message(body: String) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}
