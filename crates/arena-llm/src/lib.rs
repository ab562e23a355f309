//! Model-provider adapters for agent-arena.
//!
//! Each provider is a capability with a single operation: `invoke` a
//! prompt under a hard wall-clock deadline and return the reply text
//! plus token usage. The engine depends only on the [`ModelClient`]
//! trait and is injected with a concrete adapter at startup; adding a
//! provider is one new adapter and one registry entry.
//!
//! ## Adapters
//!
//! - `AnthropicClient`: Anthropic messages API
//! - `BedrockClient`: Claude hosted on AWS Bedrock (bearer-token auth)
//! - `OpenAiCompatClient`: OpenAI chat-completions API, also serving
//!   DeepSeek and Qwen through their OpenAI-compatible endpoints
//! - `AzureOpenAiClient`: Azure-hosted OpenAI deployments
//! - `StaticClient`: canned replies for dry runs and tests

pub mod anthropic;
pub mod azure;
pub mod bedrock;
pub mod client;
pub mod openai;
pub mod registry;
pub mod static_client;

pub use anthropic::AnthropicClient;
pub use azure::AzureOpenAiClient;
pub use bedrock::BedrockClient;
pub use client::{InvokeRequest, ModelClient, ModelError, ModelReply};
pub use openai::OpenAiCompatClient;
pub use registry::{ProviderCredentials, ProviderRegistry};
pub use static_client::StaticClient;
