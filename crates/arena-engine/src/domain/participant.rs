//! Participant: one agent enrolled in one competition.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use arena_common::{calc, ParticipantStatus};

/// Default wall-clock budget for one model invocation.
pub const DEFAULT_INVOCATION_TIMEOUT_SECS: u64 = 120;

/// One agent enrolled in one competition. Owns exactly one portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub competition_id: Uuid,
    pub name: String,
    /// Provider tag resolved through the model registry.
    pub provider: String,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Opaque provider configuration (temperature, max_tokens, …).
    pub model_config: Value,
    /// Wall-clock budget for one model invocation, seconds.
    pub invocation_timeout_secs: u64,
    pub status: ParticipantStatus,
    /// Capital the participant started with.
    pub initial_capital: Decimal,
    /// Equity after the latest recomputation.
    pub current_equity: Decimal,
    /// Highest equity observed so far.
    pub peak_equity: Decimal,
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub created_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(
        competition_id: Uuid,
        name: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        initial_capital: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            competition_id,
            name: name.into(),
            provider: provider.into(),
            model: model.into(),
            model_config: Value::Null,
            invocation_timeout_secs: DEFAULT_INVOCATION_TIMEOUT_SECS,
            status: ParticipantStatus::Active,
            initial_capital,
            current_equity: initial_capital,
            peak_equity: initial_capital,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ParticipantStatus::Active
    }

    /// Record one closed trade against the win/loss counters.
    /// Breakeven closes count toward the total but neither bucket.
    pub fn record_closed_trade(&mut self, realized_pnl: Decimal) {
        self.total_trades += 1;
        if realized_pnl > Decimal::ZERO {
            self.winning_trades += 1;
        } else if realized_pnl < Decimal::ZERO {
            self.losing_trades += 1;
        }
    }

    /// Track running and peak equity after a portfolio recomputation.
    pub fn update_equity(&mut self, equity: Decimal) {
        self.current_equity = equity;
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
    }

    pub fn win_rate(&self) -> Decimal {
        calc::win_rate(self.winning_trades, self.total_trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn participant() -> Participant {
        Participant::new(Uuid::new_v4(), "claude", "anthropic", "claude-sonnet", dec!(10000))
    }

    #[test]
    fn test_new_participant_equity() {
        let p = participant();
        assert_eq!(p.current_equity, dec!(10000));
        assert_eq!(p.peak_equity, dec!(10000));
        assert!(p.is_active());
    }

    #[test]
    fn test_record_closed_trade_buckets() {
        let mut p = participant();
        p.record_closed_trade(dec!(50));
        p.record_closed_trade(dec!(-20));
        p.record_closed_trade(Decimal::ZERO);
        assert_eq!(p.total_trades, 3);
        assert_eq!(p.winning_trades, 1);
        assert_eq!(p.losing_trades, 1);
    }

    #[test]
    fn test_peak_equity_ratchets() {
        let mut p = participant();
        p.update_equity(dec!(10500));
        assert_eq!(p.peak_equity, dec!(10500));
        p.update_equity(dec!(9000));
        assert_eq!(p.current_equity, dec!(9000));
        assert_eq!(p.peak_equity, dec!(10500));
    }

    #[test]
    fn test_win_rate() {
        let mut p = participant();
        assert_eq!(p.win_rate(), Decimal::ZERO);
        p.record_closed_trade(dec!(10));
        p.record_closed_trade(dec!(-10));
        assert_eq!(p.win_rate(), dec!(50));
    }
}
