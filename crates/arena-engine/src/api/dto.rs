//! Request payloads for the mutating routes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use arena_common::AssetClass;

use crate::domain::CompetitionRules;

fn default_interval() -> u32 {
    5
}

/// Body of `POST /competitions`.
#[derive(Debug, Deserialize)]
pub struct CreateCompetitionRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default = "default_interval")]
    pub invocation_interval_minutes: u32,
    #[serde(default)]
    pub initial_capital: Option<Decimal>,
    #[serde(default)]
    pub max_leverage: Option<Decimal>,
    #[serde(default)]
    pub max_position_size_pct: Option<Decimal>,
    #[serde(default)]
    pub margin_requirement_pct: Option<Decimal>,
    #[serde(default)]
    pub maintenance_margin_pct: Option<Decimal>,
    #[serde(default)]
    pub allowed_asset_classes: Option<Vec<AssetClass>>,
    #[serde(default)]
    pub allowed_symbols: Option<Vec<String>>,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub market_hours_only: Option<bool>,
}

impl CreateCompetitionRequest {
    /// Merge the optional rule overrides over the defaults.
    pub fn rules(&self) -> CompetitionRules {
        let defaults = CompetitionRules::default();
        CompetitionRules {
            initial_capital: self.initial_capital.unwrap_or(defaults.initial_capital),
            max_leverage: self.max_leverage.unwrap_or(defaults.max_leverage),
            max_position_size_pct: self
                .max_position_size_pct
                .unwrap_or(defaults.max_position_size_pct),
            margin_requirement_pct: self
                .margin_requirement_pct
                .unwrap_or(defaults.margin_requirement_pct),
            maintenance_margin_pct: self
                .maintenance_margin_pct
                .unwrap_or(defaults.maintenance_margin_pct),
            allowed_asset_classes: self
                .allowed_asset_classes
                .clone()
                .unwrap_or(defaults.allowed_asset_classes),
            allowed_symbols: self
                .allowed_symbols
                .clone()
                .unwrap_or(defaults.allowed_symbols),
            market_hours_only: self.market_hours_only.unwrap_or(defaults.market_hours_only),
        }
    }
}

/// Body of `POST /competitions/{id}/participants`.
#[derive(Debug, Deserialize)]
pub struct CreateParticipantRequest {
    pub name: String,
    /// Provider tag resolved through the model registry.
    pub provider: String,
    /// Model identifier passed to the provider.
    pub model: String,
    #[serde(default)]
    pub model_config: Option<Value>,
    #[serde(default)]
    pub invocation_timeout_secs: Option<u64>,
}

/// Query of `GET /market-data/{symbol}/ohlcv`.
#[derive(Debug, Deserialize)]
pub struct OhlcvQuery {
    #[serde(default = "default_ohlcv_interval")]
    pub interval: String,
    #[serde(default = "default_ohlcv_limit")]
    pub limit: u32,
}

fn default_ohlcv_interval() -> String {
    "1h".to_string()
}

fn default_ohlcv_limit() -> u32 {
    100
}
