//! The model invocation capability.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors from a model invocation.
///
/// Only `Transient` failures are retryable; everything else is terminal
/// for the round that issued the invocation.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invocation exceeded its deadline")]
    Timeout,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transient transport failure: {0}")]
    Transient(String),

    #[error("invocation cancelled")]
    Cancelled,

    #[error("provider returned an unusable reply: {0}")]
    Api(String),
}

impl ModelError {
    /// Whether a single retry is warranted.
    pub fn is_transient(&self) -> bool {
        matches!(self, ModelError::Transient(_))
    }

    /// Stable reason tag recorded on the decision record.
    pub fn reason(&self) -> &'static str {
        match self {
            ModelError::Timeout => "timeout",
            ModelError::Auth(_) => "auth",
            ModelError::Transient(_) => "transient",
            ModelError::Cancelled => "cancelled",
            ModelError::Api(_) => "api",
        }
    }
}

/// One invocation request.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Prompt text (single user turn).
    pub prompt: String,
    /// Opaque per-participant configuration (temperature, max_tokens, …).
    pub config: Value,
    /// Hard wall-clock deadline for the whole round trip.
    pub deadline: Duration,
}

impl InvokeRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, deadline: Duration) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            config: Value::Null,
            deadline,
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Read a numeric knob from the config blob with a fallback.
    pub fn config_f64(&self, key: &str, default: f64) -> f64 {
        self.config
            .get(key)
            .and_then(Value::as_f64)
            .unwrap_or(default)
    }

    /// Read an integer knob from the config blob with a fallback.
    pub fn config_u64(&self, key: &str, default: u64) -> u64 {
        self.config
            .get(key)
            .and_then(Value::as_u64)
            .unwrap_or(default)
    }

    /// Read a string knob from the config blob, falling back to the
    /// request model.
    pub fn effective_model(&self) -> &str {
        self.config
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(&self.model)
    }
}

/// Reply from a model invocation.
#[derive(Debug, Clone)]
pub struct ModelReply {
    /// Raw reply text.
    pub text: String,
    /// Prompt token count, when the provider reports it.
    pub prompt_tokens: Option<u32>,
    /// Completion token count, when the provider reports it.
    pub response_tokens: Option<u32>,
}

/// Model invocation capability.
///
/// Implementations must honor `request.deadline` as hard wall-clock
/// cancellation and map provider failures onto the [`ModelError`]
/// taxonomy.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Provider tag this client serves (for logs and the registry).
    fn provider(&self) -> &str;

    /// Invoke the model once.
    async fn invoke(&self, request: &InvokeRequest) -> Result<ModelReply, ModelError>;
}

/// Map a reqwest transport failure onto the error taxonomy.
pub(crate) fn classify_transport_error(err: reqwest::Error) -> ModelError {
    if err.is_timeout() {
        ModelError::Timeout
    } else if err.is_connect() || err.is_request() {
        ModelError::Transient(err.to_string())
    } else {
        ModelError::Api(err.to_string())
    }
}

/// Map an HTTP status onto the error taxonomy.
pub(crate) fn classify_status(status: reqwest::StatusCode, body: &str) -> ModelError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        ModelError::Auth(format!("{}: {}", status, truncate(body, 200)))
    } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ModelError::Transient(format!("{}: {}", status, truncate(body, 200)))
    } else {
        ModelError::Api(format!("{}: {}", status, truncate(body, 200)))
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_error_transient() {
        assert!(ModelError::Transient("reset".into()).is_transient());
        assert!(!ModelError::Timeout.is_transient());
        assert!(!ModelError::Auth("bad key".into()).is_transient());
        assert!(!ModelError::Cancelled.is_transient());
    }

    #[test]
    fn test_model_error_reason() {
        assert_eq!(ModelError::Timeout.reason(), "timeout");
        assert_eq!(ModelError::Cancelled.reason(), "cancelled");
        assert_eq!(ModelError::Auth(String::new()).reason(), "auth");
    }

    #[test]
    fn test_invoke_request_config_knobs() {
        let req = InvokeRequest::new("base-model", "hi", Duration::from_secs(30)).with_config(
            json!({"model": "override-model", "temperature": 0.2, "max_tokens": 1024}),
        );
        assert_eq!(req.effective_model(), "override-model");
        assert_eq!(req.config_f64("temperature", 0.7), 0.2);
        assert_eq!(req.config_u64("max_tokens", 4096), 1024);
        assert_eq!(req.config_u64("missing", 4096), 4096);
    }

    #[test]
    fn test_invoke_request_defaults() {
        let req = InvokeRequest::new("m", "p", Duration::from_secs(1));
        assert_eq!(req.effective_model(), "m");
        assert_eq!(req.config_f64("temperature", 0.7), 0.7);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
