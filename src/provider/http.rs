use super::{classify, ErrorDetail, FailureKind, ModelRequest, ModelTransport, Provider, ProviderFailure};
use crate::config::Provider as ProviderConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const KEY_TEST_PROMPT: &str = "Say \"OK\" if you can read this.";
const KEY_TEST_MAX_TOKENS: u32 = 10;

/// reqwest transport for the chat-completions family (OpenAI, OpenRouter)
/// and the Anthropic messages API.
pub struct HttpTransport {
    client: reqwest::Client,
    api_key: String,
    cfg: ProviderConfig,
}

impl HttpTransport {
    pub fn new(cfg: &ProviderConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_seconds.max(1)))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            cfg: cfg.clone(),
        })
    }

    fn base_url(&self, provider: Provider) -> &str {
        let url = match provider {
            Provider::OpenRouter => &self.cfg.base_urls.openrouter,
            Provider::OpenAi => &self.cfg.base_urls.openai,
            Provider::Anthropic => &self.cfg.base_urls.anthropic,
        };
        url.trim_end_matches('/')
    }

    fn chat_request(&self, req: &ModelRequest) -> reqwest::RequestBuilder {
        let body = ChatRequest {
            model: &req.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: self.cfg.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: req.user_message(),
                },
            ],
            temperature: self.cfg.temperature,
            max_tokens: req.max_tokens,
        };
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url(req.provider)))
            .bearer_auth(&self.api_key)
            .json(&body);
        if req.provider == Provider::OpenRouter {
            builder = builder
                .header("HTTP-Referer", &self.cfg.referer)
                .header("X-Title", &self.cfg.app_title);
        }
        builder
    }

    fn anthropic_request(&self, req: &ModelRequest) -> reqwest::RequestBuilder {
        let body = AnthropicRequest {
            model: &req.model,
            max_tokens: req.max_tokens,
            temperature: self.cfg.temperature,
            system: &self.cfg.system_prompt,
            messages: vec![ChatMessage {
                role: "user",
                content: req.user_message(),
            }],
        };
        self.client
            .post(format!("{}/messages", self.base_url(Provider::Anthropic)))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
    }
}

#[async_trait]
impl ModelTransport for HttpTransport {
    async fn complete(&self, req: &ModelRequest) -> Result<String, ProviderFailure> {
        debug!(
            provider = req.provider.as_str(),
            model = %req.model,
            max_tokens = req.max_tokens,
            content_chars = req.content.len(),
            "sending model request"
        );
        match req.provider {
            Provider::Anthropic => anthropic_content(&send(self.anthropic_request(req)).await?),
            Provider::OpenAi | Provider::OpenRouter => {
                chat_content(&send(self.chat_request(req)).await?)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyCheck {
    pub valid: bool,
    pub provider: Provider,
    pub model: String,
    pub message: String,
}

/// Sends a minimal request to confirm the key is accepted.
pub async fn test_key(transport: &dyn ModelTransport, provider: Provider, model: &str) -> KeyCheck {
    let req = ModelRequest {
        prompt: Arc::from(KEY_TEST_PROMPT),
        content: Arc::from(""),
        provider,
        model: model.to_string(),
        max_tokens: KEY_TEST_MAX_TOKENS,
    };
    match transport.complete(&req).await {
        Ok(reply) => KeyCheck {
            valid: true,
            provider,
            model: model.to_string(),
            message: reply.trim().to_string(),
        },
        Err(failure) => KeyCheck {
            valid: false,
            provider,
            model: model.to_string(),
            message: format!("{} ({})", failure.message, failure.kind.as_str()),
        },
    }
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorBody>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<Value>,
}

async fn send(builder: reqwest::RequestBuilder) -> Result<Value, ProviderFailure> {
    let resp = builder
        .send()
        .await
        .map_err(|e| ProviderFailure::other(format!("request failed: {e}")))?;
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| ProviderFailure::other(format!("reading response body: {e}")))?;

    if !status.is_success() {
        return Err(failure_from_body(status.as_u16(), &text));
    }

    let json: Value = serde_json::from_str(&text)
        .map_err(|e| ProviderFailure::other(format!("response is not JSON: {e}")))?;
    // OpenRouter reports some upstream failures with a 200 and an error object.
    if json.get("error").is_some_and(|e| !e.is_null()) {
        return Err(failure_from_body(status.as_u16(), &text));
    }
    Ok(json)
}

pub(crate) fn failure_from_body(status: u16, body: &str) -> ProviderFailure {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let err = envelope.error.unwrap_or_default();
    let code = err.code.as_ref().map(|c| match c {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    let message = err
        .message
        .or(envelope.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {status}: {}", body.trim()));

    let kind = classify(&ErrorDetail {
        status: Some(status),
        error_type: err.error_type.as_deref(),
        code: code.as_deref(),
        message: &message,
    });
    ProviderFailure {
        kind,
        status: Some(status),
        message,
    }
}

pub(crate) fn chat_content(json: &Value) -> Result<String, ProviderFailure> {
    let choice = &json["choices"][0];
    let text = choice["message"]["content"]
        .as_str()
        .or_else(|| choice["text"].as_str())
        .unwrap_or_default();
    non_empty(text)
}

pub(crate) fn anthropic_content(json: &Value) -> Result<String, ProviderFailure> {
    non_empty(json["content"][0]["text"].as_str().unwrap_or_default())
}

fn non_empty(text: &str) -> Result<String, ProviderFailure> {
    if text.trim().is_empty() {
        Err(ProviderFailure::new(
            FailureKind::Other,
            "model returned an empty response",
        ))
    } else {
        Ok(text.to_string())
    }
}
