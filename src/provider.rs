//! Translation provider: the LLM endpoint that turns a JSON payload into
//! translated JSON text.
//!
//! `OpenRouterProvider` talks to an OpenAI-compatible chat completions API.
//! The response is returned as raw text; parsing and repairing it is the job
//! of [`crate::repair`].

use crate::config::ProviderConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What the provider is asked to do in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRequest<'a> {
    /// Translate the values of a JSON object, keeping its keys
    Translate { payload: &'a str },
    /// Fix a malformed response from an earlier attempt
    Repair { malformed: &'a str },
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Failed to send request to translation provider: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Translation provider error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse translation provider response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("Translation provider response contained no content")]
    EmptyResponse,
}

/// A text-generation backend that can translate and repair JSON payloads.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Send one request and return the raw response text.
    ///
    /// `target_language` is the display name of the language (e.g., "Japanese").
    async fn complete(
        &self,
        target_language: &str,
        request: ProviderRequest<'_>,
    ) -> Result<String, ProviderError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Build the prompt asking for a translation of every JSON value
fn build_translation_prompt(target_language: &str, payload: &str) -> String {
    format!(
        r#"There is a JSON object below. Translate every JSON value into {} and keep every key exactly as it is. The result must contain the same keys as the input.
IMPORTANT: Only respond with the translated JSON object, nothing else (no explanation, no markdown, no backticks).
When translating, if you encounter C-style formatting tokens (such as %s, %d, %.2f, %1$s), do not alter them, and preserve any spaces or punctuation immediately before or after them. This ensures the placeholders work correctly at runtime.
Examples:
Original: Hello, %s! → Translation: 你好，%s！
Original: You have %d new messages. → Translation: 你有 %d 条新消息。
JSON: {}"#,
        target_language, payload
    )
}

/// Build the prompt asking to fix a malformed response
fn build_repair_prompt(target_language: &str, malformed: &str) -> String {
    format!(
        "Fix this JSON to make it a valid JSON object whose values are all strings. \
         The values are {} text; do not translate or change them. \
         Only return the fixed JSON with no explanation, no markdown formatting, no backticks: {}",
        target_language, malformed
    )
}

fn build_prompt(target_language: &str, request: ProviderRequest<'_>) -> String {
    match request {
        ProviderRequest::Translate { payload } => build_translation_prompt(target_language, payload),
        ProviderRequest::Repair { malformed } => build_repair_prompt(target_language, malformed),
    }
}

/// OpenRouter (or any OpenAI-compatible) chat completions client.
#[derive(Debug, Clone)]
pub struct OpenRouterProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
    access_token: String,
}

impl OpenRouterProvider {
    /// Create a provider with its own HTTP client.
    ///
    /// The configured timeout bounds each individual call; it is the only time
    /// limit in the pipeline.
    pub fn new(config: &ProviderConfig, access_token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            access_token: access_token.into(),
        })
    }
}

#[async_trait]
impl TranslationProvider for OpenRouterProvider {
    async fn complete(
        &self,
        target_language: &str,
        request: ProviderRequest<'_>,
    ) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: build_prompt(target_language, request),
            }],
        };

        debug!(
            "Sending {} request for {} to {}",
            request_kind(request),
            target_language,
            self.api_url
        );

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", "http://localhost")
            .header("X-Title", "Verilis I18N")
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::Transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(ProviderError::Status { status, body });
        }

        let chat_response: ChatResponse = response.json().await.map_err(ProviderError::Decode)?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(ProviderError::EmptyResponse)
    }
}

fn request_kind(request: ProviderRequest<'_>) -> &'static str {
    match request {
        ProviderRequest::Translate { .. } => "translate",
        ProviderRequest::Repair { .. } => "repair",
    }
}
