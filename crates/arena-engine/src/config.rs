//! Configuration for the arena engine.
//!
//! Loads from a TOML file, then applies environment-variable overrides
//! for credentials (never stored in the file) and CLI overrides for the
//! knobs an operator changes per run.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use arena_llm::ProviderCredentials;

use crate::scheduler::SchedulerConfig;

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Shared secret for mutating and admin routes.
    pub api_key: String,
    /// HTTP server binding.
    pub server: ServerConfig,
    /// Scheduler timing.
    pub scheduler: SchedulerSettings,
    /// Market-data venue.
    pub market: MarketSettings,
    /// Model-provider credentials (environment only).
    pub providers: ProviderCredentials,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub price_refresh_secs: u64,
    pub lifecycle_secs: u64,
    pub shutdown_timeout_secs: u64,
}

impl SchedulerSettings {
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            enabled: self.enabled,
            price_refresh_interval: Duration::from_secs(self.price_refresh_secs.max(1)),
            lifecycle_interval: Duration::from_secs(self.lifecycle_secs.max(1)),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketSettings {
    /// "binance" for the live venue, "scripted" for dry runs.
    pub venue: String,
    pub base_url: String,
    pub cache_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            api_key: "dev-api-key".to_string(),
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            scheduler: SchedulerSettings {
                enabled: true,
                price_refresh_secs: 15,
                lifecycle_secs: 5,
                shutdown_timeout_secs: 30,
            },
            market: MarketSettings {
                venue: "binance".to_string(),
                base_url: "https://api.binance.com".to_string(),
                cache_ttl_secs: 60,
            },
            providers: ProviderCredentials::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML content.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: TomlConfig = toml::from_str(content).context("Failed to parse TOML config")?;
        let defaults = EngineConfig::default();

        Ok(Self {
            log_level: file.general.log_level,
            api_key: file.general.api_key,
            server: ServerConfig {
                host: file.server.host,
                port: file.server.port,
            },
            scheduler: SchedulerSettings {
                enabled: file.scheduler.enabled,
                price_refresh_secs: file.scheduler.price_refresh_secs,
                lifecycle_secs: file.scheduler.lifecycle_secs,
                shutdown_timeout_secs: file.scheduler.shutdown_timeout_secs,
            },
            market: MarketSettings {
                venue: file.market.venue,
                base_url: file.market.base_url,
                cache_ttl_secs: file.market.cache_ttl_secs,
            },
            providers: defaults.providers,
        })
    }

    /// Apply environment-variable overrides. Credentials only live in
    /// the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("ARENA_API_KEY") {
            self.api_key = key;
        }
        if let Ok(level) = std::env::var("ARENA_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Ok(url) = std::env::var("BINANCE_BASE_URL") {
            self.market.base_url = url;
        }

        let creds = &mut self.providers;
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            creds.anthropic_api_key = key;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            creds.openai_api_key = key;
        }
        if let Ok(key) = std::env::var("DEEPSEEK_API_KEY") {
            creds.deepseek_api_key = key;
        }
        if let Ok(key) = std::env::var("QWEN_API_KEY") {
            creds.qwen_api_key = key;
        }
        if let Ok(key) = std::env::var("AZURE_OPENAI_API_KEY") {
            creds.azure_api_key = key;
        }
        if let Ok(endpoint) = std::env::var("AZURE_OPENAI_ENDPOINT") {
            creds.azure_endpoint = endpoint;
        }
        if let Ok(deployment) = std::env::var("AZURE_OPENAI_DEPLOYMENT") {
            creds.azure_deployment = deployment;
        }
        if let Ok(token) = std::env::var("AWS_BEARER_TOKEN_BEDROCK") {
            creds.bedrock_bearer_token = token;
        }
        if let Ok(region) = std::env::var("AWS_BEDROCK_REGION") {
            creds.bedrock_region = region;
        }
    }

    /// Apply CLI overrides.
    pub fn apply_cli_overrides(
        &mut self,
        host: Option<String>,
        port: Option<u16>,
        log_level: Option<String>,
    ) {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        if let Some(level) = log_level {
            self.log_level = level;
        }
    }

    /// Validate the assembled configuration.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            bail!("api_key must not be empty");
        }
        if self.server.port == 0 {
            bail!("server.port must not be 0");
        }
        match self.market.venue.as_str() {
            "binance" | "scripted" => {}
            other => bail!("unknown market venue: {}", other),
        }
        if self.market.cache_ttl_secs == 0 {
            bail!("market.cache_ttl_secs must be at least 1");
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------
// TOML deserialization structures
// ----------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    #[serde(default)]
    general: GeneralToml,
    #[serde(default)]
    server: ServerToml,
    #[serde(default)]
    scheduler: SchedulerToml,
    #[serde(default)]
    market: MarketToml,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GeneralToml {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_api_key")]
    api_key: String,
}

impl Default for GeneralToml {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_key: default_api_key(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerToml {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerToml {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchedulerToml {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_price_refresh_secs")]
    price_refresh_secs: u64,
    #[serde(default = "default_lifecycle_secs")]
    lifecycle_secs: u64,
    #[serde(default = "default_shutdown_timeout_secs")]
    shutdown_timeout_secs: u64,
}

impl Default for SchedulerToml {
    fn default() -> Self {
        Self {
            enabled: true,
            price_refresh_secs: default_price_refresh_secs(),
            lifecycle_secs: default_lifecycle_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MarketToml {
    #[serde(default = "default_venue")]
    venue: String,
    #[serde(default = "default_market_url")]
    base_url: String,
    #[serde(default = "default_cache_ttl")]
    cache_ttl_secs: u64,
}

impl Default for MarketToml {
    fn default() -> Self {
        Self {
            venue: default_venue(),
            base_url: default_market_url(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_api_key() -> String {
    "dev-api-key".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_true() -> bool {
    true
}
fn default_price_refresh_secs() -> u64 {
    15
}
fn default_lifecycle_secs() -> u64 {
    5
}
fn default_shutdown_timeout_secs() -> u64 {
    30
}
fn default_venue() -> String {
    "binance".to_string()
}
fn default_market_url() -> String {
    "https://api.binance.com".to_string()
}
fn default_cache_ttl() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.server.port, 8000);
        assert!(config.scheduler.enabled);
        assert_eq!(config.market.venue, "binance");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_str() {
        let config = EngineConfig::from_toml_str(
            r#"
            [general]
            log_level = "debug"
            api_key = "secret"

            [server]
            port = 9000

            [scheduler]
            price_refresh_secs = 5

            [market]
            venue = "scripted"
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.scheduler.price_refresh_secs, 5);
        assert_eq!(config.market.venue, "scripted");
        // unset sections keep defaults
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.market.cache_ttl_secs, 60);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(EngineConfig::from_toml_str("[general]\nnope = 1\n").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_venue() {
        let mut config = EngineConfig::default();
        config.market.venue = "nasdaq".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = EngineConfig::default();
        config.apply_cli_overrides(Some("127.0.0.1".into()), Some(8080), None);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_scheduler_config_conversion() {
        let settings = SchedulerSettings {
            enabled: true,
            price_refresh_secs: 0,
            lifecycle_secs: 5,
            shutdown_timeout_secs: 30,
        };
        let config = settings.to_scheduler_config();
        // zero intervals are clamped, never busy-loop
        assert_eq!(config.price_refresh_interval, Duration::from_secs(1));
    }
}
