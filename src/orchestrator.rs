use crate::{
    config::Provider as ProviderConfig,
    provider::{FailureKind, ModelRequest, ModelTransport, Provider, ProviderFailure},
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed { kind: FailureKind, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub model: String,
    pub max_tokens: u32,
    pub fallback: bool,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub attempts: Vec<AttemptRecord>,
}

/// Terminal failure of a cascade: the last failure's message plus every attempt made.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CascadeError {
    pub message: String,
    pub kind: FailureKind,
    pub attempts: Vec<AttemptRecord>,
}

enum State {
    Attempting { req: ModelRequest, fallback: bool },
    Failed { failure: ProviderFailure, fallback: bool },
}

pub struct Orchestrator<'a, T: ModelTransport + ?Sized> {
    cfg: &'a ProviderConfig,
    transport: &'a T,
}

impl<'a, T: ModelTransport + ?Sized> Orchestrator<'a, T> {
    pub fn new(cfg: &'a ProviderConfig, transport: &'a T) -> Self {
        Self { cfg, transport }
    }

    fn should_cascade(&self, kind: FailureKind) -> bool {
        match kind {
            FailureKind::Unavailable | FailureKind::QuotaExceeded => true,
            FailureKind::AuthFailure => self.cfg.cascade_on_auth_failure,
            FailureKind::Other => false,
        }
    }

    /// Fallback models for the provider, minus the one that already failed.
    fn fallbacks(&self, provider: Provider, failed_model: &str) -> Vec<String> {
        self.cfg
            .fallback_models
            .get(provider.as_str())
            .map(|models| {
                models
                    .iter()
                    .filter(|m| m.as_str() != failed_model)
                    .take(self.cfg.max_fallbacks)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Primary attempt, then a bounded cascade through low-cost models when
    /// the primary's failure class allows it.
    pub async fn run(&self, primary: ModelRequest) -> Result<Completion, CascadeError> {
        let provider = primary.provider;
        let primary_model = primary.model.clone();
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let fallback_tokens = self.cfg.fallback_max_tokens.min(primary.max_tokens);
        let mut queue: Option<std::vec::IntoIter<String>> = None;
        let mut state = State::Attempting {
            req: primary.clone(),
            fallback: false,
        };

        let failure = loop {
            state = match state {
                State::Attempting { req, fallback } => {
                    info!(
                        provider = provider.as_str(),
                        model = %req.model,
                        max_tokens = req.max_tokens,
                        fallback,
                        "model attempt"
                    );
                    let started = Instant::now();
                    let result = self.transport.complete(&req).await;
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    match result {
                        Ok(text) => {
                            info!(model = %req.model, elapsed_ms, "model attempt succeeded");
                            attempts.push(AttemptRecord {
                                model: req.model.clone(),
                                max_tokens: req.max_tokens,
                                fallback,
                                outcome: AttemptOutcome::Succeeded,
                                elapsed_ms,
                            });
                            return Ok(Completion {
                                text,
                                model: req.model,
                                attempts,
                            });
                        }
                        Err(failure) => {
                            warn!(
                                model = %req.model,
                                kind = failure.kind.as_str(),
                                status = failure.status,
                                elapsed_ms,
                                "model attempt failed: {}",
                                failure.message
                            );
                            attempts.push(AttemptRecord {
                                model: req.model.clone(),
                                max_tokens: req.max_tokens,
                                fallback,
                                outcome: AttemptOutcome::Failed {
                                    kind: failure.kind,
                                    message: failure.message.clone(),
                                },
                                elapsed_ms,
                            });
                            State::Failed { failure, fallback }
                        }
                    }
                }
                // Only the primary's failure class decides whether to cascade;
                // once started, every remaining fallback is tried.
                State::Failed { failure, fallback } => {
                    if !fallback && !self.should_cascade(failure.kind) {
                        break failure;
                    }
                    let next = queue
                        .get_or_insert_with(|| self.fallbacks(provider, &primary_model).into_iter())
                        .next();
                    match next {
                        Some(model) => {
                            info!(model = %model, reason = failure.kind.as_str(), "trying fallback model");
                            State::Attempting {
                                req: primary.with_model(model, fallback_tokens),
                                fallback: true,
                            }
                        }
                        None => break failure,
                    }
                }
            };
        };

        warn!(attempts = attempts.len(), "model cascade ended without a response");
        Err(CascadeError {
            message: exhausted_message(&failure, attempts.len()),
            kind: failure.kind,
            attempts,
        })
    }
}

/// Explicit override wins; empty or "auto" picks the provider's default model.
pub fn resolve_model(cfg: &ProviderConfig, provider: Provider, requested: Option<&str>) -> String {
    match requested.map(str::trim).filter(|m| !m.is_empty() && *m != "auto") {
        Some(m) => m.to_string(),
        None => match provider {
            Provider::OpenRouter => cfg.default_models.openrouter.clone(),
            Provider::OpenAi => cfg.default_models.openai.clone(),
            Provider::Anthropic => cfg.default_models.anthropic.clone(),
        },
    }
}

fn exhausted_message(failure: &ProviderFailure, attempts: usize) -> String {
    match failure.kind {
        _ if attempts > 1 => format!(
            "{} (all {} attempted models failed; try a different model or API key)",
            failure.message, attempts
        ),
        FailureKind::Other => failure.message.clone(),
        _ => format!("{} (try a different model or API key)", failure.message),
    }
}
