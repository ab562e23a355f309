//! OpenAI-compatible chat-completions adapter.
//!
//! Serves OpenAI itself plus providers that expose the same wire shape
//! behind their own base URL (DeepSeek, Qwen/DashScope). DeepSeek's
//! reasoner models return a separate `reasoning_content` field which is
//! folded into the reply text so the audit record keeps the full output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{
    classify_status, classify_transport_error, InvokeRequest, ModelClient, ModelError, ModelReply,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
const QWEN_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
const DEFAULT_MAX_TOKENS: u64 = 4096;
const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Client for any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    provider: String,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u64,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

impl OpenAiCompatClient {
    /// Client for api.openai.com.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::custom("openai", api_key, OPENAI_BASE_URL)
    }

    /// Client for DeepSeek's OpenAI-compatible endpoint.
    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self::custom("deepseek", api_key, DEEPSEEK_BASE_URL)
    }

    /// Client for Qwen's (DashScope) OpenAI-compatible endpoint.
    pub fn qwen(api_key: impl Into<String>) -> Self {
        Self::custom("qwen", api_key, QWEN_BASE_URL)
    }

    /// Client for an arbitrary compatible endpoint.
    pub fn custom(
        provider: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            provider: provider.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

/// Fold optional reasoning output into the reply text so the full model
/// output lands on the audit record.
fn merge_reasoning(content: Option<String>, reasoning: Option<String>) -> Option<String> {
    match (content, reasoning) {
        (Some(c), Some(r)) if !c.is_empty() && !r.is_empty() => {
            Some(format!("[Reasoning]\n{}\n\n[Response]\n{}", r, c))
        }
        (Some(c), _) if !c.is_empty() => Some(c),
        (_, Some(r)) if !r.is_empty() => Some(r),
        _ => None,
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn invoke(&self, request: &InvokeRequest) -> Result<ModelReply, ModelError> {
        let body = ChatRequest {
            model: request.effective_model(),
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.config_u64("max_tokens", DEFAULT_MAX_TOKENS),
            temperature: request.config_f64("temperature", DEFAULT_TEMPERATURE),
        };

        debug!(provider = %self.provider, model = body.model, "invoking chat completions");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(request.deadline)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Api(format!("malformed chat response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::Api("no choices in reply".to_string()))?;

        let text = merge_reasoning(choice.message.content, choice.message.reasoning_content)
            .ok_or_else(|| ModelError::Api("empty reply content".to_string()))?;

        Ok(ModelReply {
            text,
            prompt_tokens: parsed.usage.as_ref().and_then(|u| u.prompt_tokens),
            response_tokens: parsed.usage.as_ref().and_then(|u| u.completion_tokens),
        })
    }
}

impl std::fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_reasoning_both() {
        let merged = merge_reasoning(Some("answer".into()), Some("chain".into())).unwrap();
        assert!(merged.starts_with("[Reasoning]\nchain"));
        assert!(merged.ends_with("[Response]\nanswer"));
    }

    #[test]
    fn test_merge_reasoning_only_content() {
        assert_eq!(merge_reasoning(Some("answer".into()), None).unwrap(), "answer");
    }

    #[test]
    fn test_merge_reasoning_only_reasoning() {
        assert_eq!(merge_reasoning(None, Some("chain".into())).unwrap(), "chain");
    }

    #[test]
    fn test_merge_reasoning_empty() {
        assert!(merge_reasoning(None, None).is_none());
        assert!(merge_reasoning(Some(String::new()), Some(String::new())).is_none());
    }

    #[test]
    fn test_response_parsing() {
        let raw = serde_json::json!({
            "choices": [{"message": {"content": "{\"decision\":\"hold\"}"}}],
            "usage": {"prompt_tokens": 900, "completion_tokens": 60}
        });
        let parsed: ChatResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.usage.unwrap().completion_tokens, Some(60));
    }
}
