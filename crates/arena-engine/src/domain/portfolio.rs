//! Portfolio: financial state of one participant.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Financial state of one participant. Derived fields (`equity`,
/// `margin_available`, `unrealized_pnl`, `current_leverage`,
/// `margin_level`) are recomputed from the open-position set by the
/// portfolio manager after every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: Uuid,
    pub participant_id: Uuid,
    /// Cash at rest. Never driven negative by opening; realized losses
    /// on closes may push it to or below zero as a prelude to
    /// liquidation.
    pub cash_balance: Decimal,
    /// Sum of open-position reserved margin.
    pub reserved_margin: Decimal,
    /// Cumulative realized P&L.
    pub realized_pnl: Decimal,
    /// Sum of open-position unrealized P&L.
    pub unrealized_pnl: Decimal,
    /// cash + unrealized P&L.
    pub equity: Decimal,
    /// equity - reserved margin.
    pub margin_available: Decimal,
    /// realized + unrealized P&L.
    pub total_pnl: Decimal,
    /// Sum of open notionals / equity; zero when equity is not positive.
    pub current_leverage: Decimal,
    /// equity / reserved margin as a percentage; None with no margin
    /// in use.
    pub margin_level: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl Portfolio {
    /// Fresh portfolio funded with the competition's initial capital.
    pub fn new(participant_id: Uuid, initial_capital: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant_id,
            cash_balance: initial_capital,
            reserved_margin: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            equity: initial_capital,
            margin_available: initial_capital,
            total_pnl: Decimal::ZERO,
            current_leverage: Decimal::ZERO,
            margin_level: None,
            updated_at: Utc::now(),
        }
    }
}

/// Equity-curve sample appended after every portfolio recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioHistoryPoint {
    pub participant_id: Uuid,
    pub equity: Decimal,
    pub cash_balance: Decimal,
    pub reserved_margin: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_pnl: Decimal,
    pub recorded_at: DateTime<Utc>,
}

impl PortfolioHistoryPoint {
    pub fn of(portfolio: &Portfolio) -> Self {
        Self {
            participant_id: portfolio.participant_id,
            equity: portfolio.equity,
            cash_balance: portfolio.cash_balance,
            reserved_margin: portfolio.reserved_margin,
            realized_pnl: portfolio.realized_pnl,
            unrealized_pnl: portfolio.unrealized_pnl,
            total_pnl: portfolio.total_pnl,
            recorded_at: Utc::now(),
        }
    }
}

/// Audit record appended when the risk monitor force-flattens a
/// portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationRecord {
    pub participant_id: Uuid,
    /// Equity at the moment the trigger fired.
    pub equity: Decimal,
    /// Margin level that breached maintenance, percent.
    pub margin_level: Decimal,
    pub closed_position_ids: Vec<Uuid>,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_portfolio() {
        let p = Portfolio::new(Uuid::new_v4(), dec!(10000));
        assert_eq!(p.cash_balance, dec!(10000));
        assert_eq!(p.equity, dec!(10000));
        assert_eq!(p.margin_available, dec!(10000));
        assert_eq!(p.reserved_margin, Decimal::ZERO);
        assert!(p.margin_level.is_none());
    }

    #[test]
    fn test_history_point_mirrors_portfolio() {
        let mut p = Portfolio::new(Uuid::new_v4(), dec!(10000));
        p.unrealized_pnl = dec!(50);
        p.equity = dec!(10050);
        let point = PortfolioHistoryPoint::of(&p);
        assert_eq!(point.equity, dec!(10050));
        assert_eq!(point.unrealized_pnl, dec!(50));
        assert_eq!(point.participant_id, p.participant_id);
    }
}
