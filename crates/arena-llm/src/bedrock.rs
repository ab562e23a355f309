//! AWS Bedrock adapter (Claude via Bedrock).
//!
//! Talks to the Bedrock runtime's `invoke` endpoint with the
//! anthropic-messages body shape. Authentication uses a Bedrock bearer
//! token (API key); standard Claude model names are mapped onto their
//! Bedrock model ids, and unknown names pass through untouched so
//! operators can pin a Bedrock id directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{
    classify_status, classify_transport_error, InvokeRequest, ModelClient, ModelError, ModelReply,
};

const DEFAULT_REGION: &str = "us-east-1";
const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const DEFAULT_MAX_TOKENS: u64 = 4096;
const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Bedrock model ids for the standard Claude model names.
fn bedrock_model_id(model: &str) -> &str {
    match model {
        "claude-sonnet-4-20250514" => "us.anthropic.claude-sonnet-4-20250514-v1:0",
        "claude-3-5-sonnet-20241022" => "us.anthropic.claude-3-5-sonnet-20241022-v2:0",
        "claude-3-5-sonnet-20240620" => "us.anthropic.claude-3-5-sonnet-20240620-v1:0",
        "claude-3-opus-20240229" => "anthropic.claude-3-opus-20240229-v1:0",
        "claude-3-sonnet-20240229" => "anthropic.claude-3-sonnet-20240229-v1:0",
        "claude-3-haiku-20240307" => "anthropic.claude-3-haiku-20240307-v1:0",
        other => other,
    }
}

/// Client for Claude models hosted on AWS Bedrock.
pub struct BedrockClient {
    http: reqwest::Client,
    bearer_token: String,
    region: String,
}

#[derive(Debug, Serialize)]
struct BedrockRequest<'a> {
    anthropic_version: &'static str,
    max_tokens: u64,
    temperature: f64,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct BedrockResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

impl BedrockClient {
    pub fn new(bearer_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            bearer_token: bearer_token.into(),
            region: DEFAULT_REGION.to_string(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    fn url(&self, model_id: &str) -> String {
        format!(
            "https://bedrock-runtime.{}.amazonaws.com/model/{}/invoke",
            self.region, model_id
        )
    }
}

#[async_trait]
impl ModelClient for BedrockClient {
    fn provider(&self) -> &str {
        "aws_bedrock"
    }

    async fn invoke(&self, request: &InvokeRequest) -> Result<ModelReply, ModelError> {
        let model_id = bedrock_model_id(request.effective_model());
        let body = BedrockRequest {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens: request.config_u64("max_tokens", DEFAULT_MAX_TOKENS),
            temperature: request.config_f64("temperature", DEFAULT_TEMPERATURE),
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        debug!(model = model_id, region = %self.region, "invoking bedrock");

        let response = self
            .http
            .post(self.url(model_id))
            .bearer_auth(&self.bearer_token)
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

        let parsed: BedrockResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Api(format!("malformed bedrock response: {}", e)))?;

        let text = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(ModelError::Api("empty reply content".to_string()));
        }

        Ok(ModelReply {
            text,
            prompt_tokens: parsed.usage.as_ref().and_then(|u| u.input_tokens),
            response_tokens: parsed.usage.as_ref().and_then(|u| u.output_tokens),
        })
    }
}

impl std::fmt::Debug for BedrockClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockClient")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_id_mapping() {
        assert_eq!(
            bedrock_model_id("claude-sonnet-4-20250514"),
            "us.anthropic.claude-sonnet-4-20250514-v1:0"
        );
        assert_eq!(
            bedrock_model_id("claude-3-haiku-20240307"),
            "anthropic.claude-3-haiku-20240307-v1:0"
        );
    }

    #[test]
    fn test_unknown_model_passes_through() {
        assert_eq!(
            bedrock_model_id("us.anthropic.claude-sonnet-4-20250514-v1:0"),
            "us.anthropic.claude-sonnet-4-20250514-v1:0"
        );
    }

    #[test]
    fn test_invoke_url() {
        let client = BedrockClient::new("token").with_region("eu-west-1");
        assert_eq!(
            client.url("anthropic.claude-3-opus-20240229-v1:0"),
            "https://bedrock-runtime.eu-west-1.amazonaws.com/model/anthropic.claude-3-opus-20240229-v1:0/invoke"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = BedrockRequest {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens: 4096,
            temperature: 0.7,
            messages: vec![Message {
                role: "user",
                content: "decide",
            }],
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["anthropic_version"], "bedrock-2023-05-31");
        assert_eq!(v["messages"][0]["content"], "decide");
        // the model id travels in the URL, never in the body
        assert!(v.get("model").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let raw = json!({
            "content": [{"type": "text", "text": "{\"decision\":\"hold\"}"}],
            "usage": {"input_tokens": 640, "output_tokens": 31}
        });
        let parsed: BedrockResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.content[0].text, "{\"decision\":\"hold\"}");
        assert_eq!(parsed.usage.unwrap().output_tokens, Some(31));
    }
}
