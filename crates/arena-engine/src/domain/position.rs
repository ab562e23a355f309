//! Position: one open CFD leg.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use arena_common::{calc, AssetClass, PositionSide};

/// One open CFD leg, exclusively owned by its portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub participant_id: Uuid,
    pub symbol: String,
    pub asset_class: AssetClass,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    /// Latest mark; updated on every price refresh.
    pub mark_price: Decimal,
    /// Leverage requested at open.
    pub leverage: Decimal,
    /// Cash reserved to back this leg: entry notional / leverage.
    pub reserved_margin: Decimal,
    /// Notional at the current mark.
    pub notional_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub unrealized_pnl_pct: Decimal,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Recompute mark-dependent metrics for a new mark price.
    pub fn reprice(&mut self, mark_price: Decimal) {
        self.mark_price = mark_price;
        self.notional_value = calc::notional(self.quantity, mark_price);
        self.unrealized_pnl =
            calc::unrealized_pnl(self.side, self.quantity, self.entry_price, mark_price);
        let entry_value = calc::notional(self.quantity, self.entry_price);
        self.unrealized_pnl_pct = calc::pnl_pct(self.unrealized_pnl, entry_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn long_btc() -> Position {
        Position {
            id: Uuid::new_v4(),
            portfolio_id: Uuid::new_v4(),
            participant_id: Uuid::new_v4(),
            symbol: "BTCUSDT".to_string(),
            asset_class: AssetClass::Crypto,
            side: PositionSide::Long,
            quantity: dec!(0.01),
            entry_price: dec!(50000),
            mark_price: dec!(50000),
            leverage: dec!(2),
            reserved_margin: dec!(250),
            notional_value: dec!(500),
            unrealized_pnl: Decimal::ZERO,
            unrealized_pnl_pct: Decimal::ZERO,
            opened_at: Utc::now(),
        }
    }

    #[test]
    fn test_reprice_long() {
        let mut pos = long_btc();
        pos.reprice(dec!(55000));
        assert_eq!(pos.mark_price, dec!(55000));
        assert_eq!(pos.notional_value, dec!(550.00));
        assert_eq!(pos.unrealized_pnl, dec!(50.00));
        assert_eq!(pos.unrealized_pnl_pct, dec!(10.0000));
    }

    #[test]
    fn test_reprice_is_idempotent() {
        let mut pos = long_btc();
        pos.reprice(dec!(55000));
        let snapshot = pos.clone();
        pos.reprice(dec!(55000));
        assert_eq!(pos.mark_price, snapshot.mark_price);
        assert_eq!(pos.unrealized_pnl, snapshot.unrealized_pnl);
        assert_eq!(pos.notional_value, snapshot.notional_value);
    }

    #[test]
    fn test_reprice_short() {
        let mut pos = long_btc();
        pos.side = PositionSide::Short;
        pos.quantity = dec!(1);
        pos.entry_price = dec!(100);
        pos.reprice(dec!(200));
        assert_eq!(pos.unrealized_pnl, dec!(-100));
    }
}
