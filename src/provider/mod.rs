pub mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenRouter,
    OpenAi,
    Anthropic,
}

impl Provider {
    /// Derives the provider from the key's prefix.
    pub fn detect(api_key: &str) -> Self {
        if api_key.starts_with("sk-ant-") {
            Self::Anthropic
        } else if api_key.starts_with("sk-") && !api_key.starts_with("sk-or-") {
            Self::OpenAi
        } else {
            Self::OpenRouter
        }
    }

    /// `"auto"` (or empty) defers to key detection; anything else must name a provider.
    pub fn resolve(explicit: &str, api_key: &str) -> anyhow::Result<Self> {
        match explicit.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::detect(api_key)),
            "openrouter" => Ok(Self::OpenRouter),
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => anyhow::bail!("unknown provider: {other}"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt's input. A fallback attempt is a new request, never a mutation.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub prompt: Arc<str>,
    pub content: Arc<str>,
    pub provider: Provider,
    pub model: String,
    pub max_tokens: u32,
}

impl ModelRequest {
    pub fn with_model(&self, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            prompt: Arc::clone(&self.prompt),
            content: Arc::clone(&self.content),
            provider: self.provider,
            model: model.into(),
            max_tokens,
        }
    }

    /// Prompt followed by the document content, or the prompt alone.
    pub fn user_message(&self) -> String {
        if self.content.is_empty() {
            self.prompt.to_string()
        } else {
            format!("{}\n\nDocument Content:\n{}", self.prompt, self.content)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Invalid, expired or unauthorised credential.
    AuthFailure,
    /// The requested model is not offered.
    Unavailable,
    /// Credit or token limit reached.
    QuotaExceeded,
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthFailure => "auth_failure",
            Self::Unavailable => "unavailable",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Other, message)
    }
}

/// Structured error fields as returned by the providers' error bodies.
#[derive(Debug, Clone, Default)]
pub struct ErrorDetail<'a> {
    pub status: Option<u16>,
    pub error_type: Option<&'a str>,
    pub code: Option<&'a str>,
    pub message: &'a str,
}

/// Maps a provider error to a failure class. Status and machine-readable
/// type/code decide first; the message is only consulted when they are silent.
pub fn classify(detail: &ErrorDetail<'_>) -> FailureKind {
    let tag = |s: Option<&str>| s.map(|v| v.to_ascii_lowercase()).unwrap_or_default();
    let error_type = tag(detail.error_type);
    let code = tag(detail.code);

    for t in [code.as_str(), error_type.as_str()] {
        match t {
            "insufficient_quota" | "billing_hard_limit_reached" | "insufficient_credits" => {
                return FailureKind::QuotaExceeded;
            }
            "model_not_found" | "not_found_error" | "model_not_available" => {
                return FailureKind::Unavailable;
            }
            "invalid_api_key" | "authentication_error" | "permission_error" | "unauthorized" => {
                return FailureKind::AuthFailure;
            }
            _ => {}
        }
    }

    match detail.status {
        Some(401) | Some(403) => return FailureKind::AuthFailure,
        Some(402) => return FailureKind::QuotaExceeded,
        Some(404) => return FailureKind::Unavailable,
        _ => {}
    }

    let msg = detail.message.to_ascii_lowercase();
    if msg.contains("user not found") || msg.contains("invalid api key") || msg.contains("unauthorized") {
        FailureKind::AuthFailure
    } else if msg.contains("no endpoints found")
        || msg.contains("model not found")
        || msg.contains("not available")
        || msg.contains("does not exist")
    {
        FailureKind::Unavailable
    } else if msg.contains("credits") || msg.contains("quota") || msg.contains("tokens") {
        FailureKind::QuotaExceeded
    } else {
        FailureKind::Other
    }
}

#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Sends one request; returns the model's text or a classified failure.
    async fn complete(&self, req: &ModelRequest) -> Result<String, ProviderFailure>;
}
