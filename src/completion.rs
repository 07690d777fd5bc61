//! Chat-completion client.
//!
//! [`CompletionService`] is the seam between the session and the remote
//! model; [`OpenAiCompletion`] implements it against any OpenAI-compatible
//! `POST {base_url}/chat/completions` endpoint. Requests are sent once with
//! no retry: a failure is reported to the caller as [`UpstreamError`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{CompletionConfig, Credentials};
use crate::error::UpstreamError;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation, in the wire shape the completion API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A remote model that turns a message list into a reply.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Model identifier reported in logs and status output.
    fn model(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, UpstreamError>;
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiCompletion {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl OpenAiCompletion {
    pub fn new(
        config: &CompletionConfig,
        credentials: &Credentials,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: credentials.api_key.clone(),
            model: credentials.model(config).to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, UpstreamError> {
        let started = Instant::now();
        tracing::info!(
            model = %self.model,
            messages = messages.len(),
            "sending completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(messages))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(model = %self.model, error = %e, "completion request failed");
                UpstreamError::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                model = %self.model,
                status = status.as_u16(),
                "completion service returned an error"
            );
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response.json().await?;
        let reply = parse_completion_response(&json)?;
        tracing::info!(
            model = %self.model,
            latency_ms = started.elapsed().as_millis() as u64,
            reply_chars = reply.chars().count(),
            "completion received"
        );
        Ok(reply)
    }
}

/// Extract `choices[0].message.content` from a chat-completions response.
pub fn parse_completion_response(json: &serde_json::Value) -> Result<String, UpstreamError> {
    let choice = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| UpstreamError::MalformedResponse("response has no choices".into()))?;

    choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| UpstreamError::MalformedResponse("choice has no message content".into()))
}
