//! LLM completion gateway.
//!
//! Defines the [`Gateway`] trait that all completion backends implement,
//! the [`AnthropicGateway`] messages-API implementation, and a
//! [`MockGateway`] that replays canned envelopes for tests.
//!
//! The gateway makes exactly one outbound call per invocation: no retry,
//! no backoff. A non-success status or an unreadable body surfaces as
//! [`Error::Gateway`] carrying the raw status and body for diagnostics.
//! The assistant text inside the returned envelope is *not* interpreted
//! here; callers parse it with [`assistant_text`] or their own logic.

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Message role on the completion wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One role-tagged message in an outgoing completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
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

/// A single completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

/// Trait for completion backends.
///
/// `complete` returns the raw response envelope exactly as the endpoint
/// produced it, prior to any interpretation.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value>;
}

/// Pull the assistant's reply text out of a raw envelope
/// (`content[0].text`). Missing or mistyped fields are an
/// [`Error::InvalidResponseShape`].
pub fn assistant_text(envelope: &Value) -> Result<&str> {
    envelope
        .get("content")
        .and_then(|c| c.get(0))
        .and_then(|block| block.get("text"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::InvalidResponseShape("envelope missing content[0].text".to_string())
        })
}

/// Gateway implementation for the Anthropic messages API.
///
/// Requires the `ANTHROPIC_API_KEY` environment variable. Endpoint, model,
/// API version, and timeout come from [`ApiConfig`].
pub struct AnthropicGateway {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    api_version: String,
}

impl AnthropicGateway {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| Error::Config("ANTHROPIC_API_KEY environment variable not set".into()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            api_version: config.api_version.clone(),
        })
    }
}

#[async_trait]
impl Gateway for AnthropicGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value> {
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "messages": request.messages,
        });
        if let Some(system) = &request.system {
            body["system"] = Value::String(system.clone());
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        // Transport failures (refused connection, timeout) are gateway
        // failures like any non-success status; callers match one variant.
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Gateway {
                status: 0,
                body: e.to_string(),
            })?;

        let status = response.status();
        let raw = response.text().await.map_err(|e| Error::Gateway {
            status: status.as_u16(),
            body: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(Error::Gateway {
                status: status.as_u16(),
                body: raw,
            });
        }

        serde_json::from_str(&raw).map_err(|_| Error::Gateway {
            status: status.as_u16(),
            body: raw,
        })
    }
}

/// Gateway that replays queued envelopes and records every request.
///
/// Used by unit and integration tests to exercise the orchestration
/// layers without network access.
#[derive(Default)]
pub struct MockGateway {
    replies: Mutex<VecDeque<Value>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw envelope to return from the next `complete` call.
    pub fn push_envelope(&self, envelope: Value) {
        self.replies.lock().unwrap().push_back(envelope);
    }

    /// Queue an assistant reply, wrapped in a well-formed envelope.
    pub fn push_text(&self, text: &str) {
        self.push_envelope(serde_json::json!({
            "content": [{ "type": "text", "text": text }]
        }));
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies.lock().unwrap().pop_front().ok_or(Error::Gateway {
            status: 0,
            body: "no mock reply queued".to_string(),
        })
    }
}
