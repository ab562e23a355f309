//! Provider registry: maps a participant's provider tag onto a concrete
//! adapter built from the operator's credentials.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::anthropic::AnthropicClient;
use crate::azure::AzureOpenAiClient;
use crate::bedrock::BedrockClient;
use crate::client::ModelClient;
use crate::openai::OpenAiCompatClient;
use crate::static_client::StaticClient;

/// Errors from registry construction or lookup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unsupported model provider: {0}")]
    UnsupportedProvider(String),

    #[error("provider {0} is not configured (missing credentials)")]
    NotConfigured(String),
}

/// Credentials for every provider the operator enables. Empty keys mean
/// the provider stays unregistered; participants pointing at it fail
/// with an auth error at invocation time rather than at startup.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub anthropic_api_key: String,
    pub openai_api_key: String,
    pub deepseek_api_key: String,
    pub qwen_api_key: String,
    pub azure_api_key: String,
    pub azure_endpoint: String,
    pub azure_deployment: String,
    pub bedrock_bearer_token: String,
    /// AWS region for Bedrock; us-east-1 when empty.
    pub bedrock_region: String,
}

/// Registry of constructed adapters, one per enabled provider tag.
pub struct ProviderRegistry {
    clients: HashMap<String, Arc<dyn ModelClient>>,
}

impl ProviderRegistry {
    /// Build the registry from credentials, registering only providers
    /// that have the keys they need.
    pub fn from_credentials(creds: &ProviderCredentials) -> Self {
        let mut registry = Self {
            clients: HashMap::new(),
        };

        if !creds.anthropic_api_key.is_empty() {
            registry.register(Arc::new(AnthropicClient::new(&creds.anthropic_api_key)));
        }
        if !creds.openai_api_key.is_empty() {
            registry.register(Arc::new(OpenAiCompatClient::openai(&creds.openai_api_key)));
        }
        if !creds.deepseek_api_key.is_empty() {
            registry.register(Arc::new(OpenAiCompatClient::deepseek(
                &creds.deepseek_api_key,
            )));
        }
        if !creds.qwen_api_key.is_empty() {
            registry.register(Arc::new(OpenAiCompatClient::qwen(&creds.qwen_api_key)));
        }
        if !creds.azure_api_key.is_empty() && !creds.azure_endpoint.is_empty() {
            registry.register(Arc::new(AzureOpenAiClient::new(
                &creds.azure_api_key,
                &creds.azure_endpoint,
                &creds.azure_deployment,
            )));
        }
        if !creds.bedrock_bearer_token.is_empty() {
            let mut client = BedrockClient::new(&creds.bedrock_bearer_token);
            if !creds.bedrock_region.is_empty() {
                client = client.with_region(&creds.bedrock_region);
            }
            registry.register(Arc::new(client));
        }

        registry
    }

    /// Registry with a single canned-reply client under the `static`
    /// tag, for dry runs without any credentials.
    pub fn static_only(client: StaticClient) -> Self {
        let mut registry = Self {
            clients: HashMap::new(),
        };
        registry.register(Arc::new(client));
        registry
    }

    /// Register an adapter under its provider tag. Later registrations
    /// replace earlier ones.
    pub fn register(&mut self, client: Arc<dyn ModelClient>) {
        self.clients.insert(client.provider().to_string(), client);
    }

    /// Look up the adapter for a provider tag.
    pub fn get(&self, provider: &str) -> Result<Arc<dyn ModelClient>, RegistryError> {
        self.clients
            .get(provider)
            .cloned()
            .ok_or_else(|| RegistryError::NotConfigured(provider.to_string()))
    }

    /// Provider tags currently registered.
    pub fn providers(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.clients.keys().cloned().collect();
        tags.sort();
        tags
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}
