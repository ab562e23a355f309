//! Competition: the rule-set and time window of a contest.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use arena_common::{AssetClass, CompetitionStatus};

/// Trading rules enforced for every participant of a competition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionRules {
    /// Starting cash for each participant.
    pub initial_capital: Decimal,
    /// Maximum leverage an order may request.
    pub max_leverage: Decimal,
    /// Maximum single-position notional as a percentage of current equity.
    pub max_position_size_pct: Decimal,
    /// Initial margin requirement percentage.
    pub margin_requirement_pct: Decimal,
    /// Maintenance margin percentage; margin level below this liquidates.
    pub maintenance_margin_pct: Decimal,
    /// Instrument classes agents may trade.
    pub allowed_asset_classes: Vec<AssetClass>,
    /// Symbols agents may trade.
    pub allowed_symbols: Vec<String>,
    /// Only run decision ticks while markets are open.
    pub market_hours_only: bool,
}

impl Default for CompetitionRules {
    fn default() -> Self {
        Self {
            initial_capital: dec!(10000),
            max_leverage: dec!(10),
            max_position_size_pct: dec!(20),
            margin_requirement_pct: dec!(10),
            maintenance_margin_pct: dec!(5),
            allowed_asset_classes: vec![AssetClass::Crypto],
            allowed_symbols: vec![
                "BTCUSDT".to_string(),
                "ETHUSDT".to_string(),
                "BNBUSDT".to_string(),
                "SOLUSDT".to_string(),
            ],
            market_hours_only: false,
        }
    }
}

impl CompetitionRules {
    /// Whether agents may trade the given symbol right now.
    pub fn instrument_allowed(&self, symbol: &str) -> bool {
        let class = AssetClass::of_symbol(symbol);
        self.allowed_symbols.iter().any(|s| s == symbol)
            && self.allowed_asset_classes.contains(&class)
    }
}

/// One trading competition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competition {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: CompetitionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Minutes between decision rounds for each participant.
    pub invocation_interval_minutes: u32,
    pub rules: CompetitionRules,
    pub max_participants: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Competition {
    pub fn new(
        name: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        invocation_interval_minutes: u32,
        rules: CompetitionRules,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            status: CompetitionStatus::Pending,
            start_time,
            end_time,
            invocation_interval_minutes,
            rules,
            max_participants: 10,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the window itself is valid (start strictly before end).
    pub fn has_valid_window(&self) -> bool {
        self.start_time < self.end_time
    }

    /// Active status and inside the window.
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.status == CompetitionStatus::Active && now >= self.start_time && now < self.end_time
    }

    /// Whether the start time has passed for a pending competition.
    pub fn due_to_start(&self, now: DateTime<Utc>) -> bool {
        self.status == CompetitionStatus::Pending && now >= self.start_time
    }

    /// Whether the end time has passed for an active competition.
    pub fn due_to_end(&self, now: DateTime<Utc>) -> bool {
        self.status == CompetitionStatus::Active && now >= self.end_time
    }

    /// Whether markets for the allowed classes are open at `now`.
    ///
    /// Only meaningful when `market_hours_only` is set; crypto trades
    /// around the clock so the flag is moot for 24/7 venues. Non-crypto
    /// classes use regular US cash-session hours in UTC.
    pub fn markets_open(&self, now: DateTime<Utc>) -> bool {
        if !self.rules.market_hours_only {
            return true;
        }
        self.rules
            .allowed_asset_classes
            .iter()
            .all(|class| class.trades_around_the_clock())
            || in_equity_session(now)
    }
}

/// Regular US cash session: Monday-Friday, 13:30-20:00 UTC.
fn in_equity_session(now: DateTime<Utc>) -> bool {
    use chrono::{Datelike, Timelike, Weekday};
    let weekday = now.weekday();
    if matches!(weekday, Weekday::Sat | Weekday::Sun) {
        return false;
    }
    let minutes = now.hour() * 60 + now.minute();
    (13 * 60 + 30..20 * 60).contains(&minutes)
}
