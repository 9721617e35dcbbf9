//! Text-generation provider abstraction.
//!
//! Defines the [`TextGenerator`] trait used by the rewriter and composer,
//! and [`OpenAiChat`], which calls an OpenAI-compatible
//! `POST /chat/completions` endpoint.
//!
//! Generated text is read from `choices[0].message.content`. A response
//! without that path, or with only whitespace there, yields `Ok(None)` so
//! callers can substitute a placeholder instead of failing. The API key is
//! sent only in the `Authorization` header and never appears in errors.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::error::{error_for_status, TransportError};

/// JSON pointer to the generated text in a chat-completions response.
const CONTENT_POINTER: &str = "/choices/0/message/content";

/// A source of generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply to `prompt` under the given system instruction.
    ///
    /// Returns `Ok(None)` when the service answered but produced no usable
    /// text, and `Err` on transport failure.
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<Option<String>, TransportError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

/// [`TextGenerator`] backed by an OpenAI-compatible chat-completions API.
pub struct OpenAiChat {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiChat {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for OpenAiChat {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<Option<String>, TransportError> {
        let request = ChatRequest {
            model: &self.model,
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
            max_tokens,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, self.timeout))?;
        let response = error_for_status(response).await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.without_url().to_string()))?;

        Ok(extract_content(&json))
    }
}

/// Pull the generated text out of a chat-completions response.
pub fn extract_content(json: &serde_json::Value) -> Option<String> {
    json.pointer(CONTENT_POINTER)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
