//! Azure OpenAI adapter.
//!
//! Azure routes requests to a named deployment rather than a model
//! parameter, and authenticates with an `api-key` header instead of a
//! bearer token. The wire shape is otherwise the chat-completions API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{
    classify_status, classify_transport_error, InvokeRequest, ModelClient, ModelError, ModelReply,
};

const DEFAULT_API_VERSION: &str = "2024-12-01-preview";
const DEFAULT_MAX_TOKENS: u64 = 4096;
const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Client for an Azure OpenAI deployment.
pub struct AzureOpenAiClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    deployment: String,
    api_version: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
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
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

impl AzureOpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

#[async_trait]
impl ModelClient for AzureOpenAiClient {
    fn provider(&self) -> &str {
        "azure_openai"
    }

    async fn invoke(&self, request: &InvokeRequest) -> Result<ModelReply, ModelError> {
        let body = ChatRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.config_u64("max_tokens", DEFAULT_MAX_TOKENS),
            temperature: request.config_f64("temperature", DEFAULT_TEMPERATURE),
        };

        debug!(deployment = %self.deployment, "invoking azure openai");

        let response = self
            .http
            .post(self.url())
            .header("api-key", &self.api_key)
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

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ModelError::Api("empty reply content".to_string()))?;

        Ok(ModelReply {
            text,
            prompt_tokens: parsed.usage.as_ref().and_then(|u| u.prompt_tokens),
            response_tokens: parsed.usage.as_ref().and_then(|u| u.completion_tokens),
        })
    }
}

impl std::fmt::Debug for AzureOpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .finish_non_exhaustive()
    }
}
