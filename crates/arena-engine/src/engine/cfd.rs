//! CFD engine: opens, reprices and closes one position.
//!
//! Reserve-margin accounting: opening a position never moves cash, it
//! only reserves margin, so equity is untouched until the mark moves or
//! the position closes. Closing releases the reserved margin and
//! settles the realized P&L into cash.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use arena_common::{calc, AssetClass, CalcError, PositionSide};

use crate::domain::Position;

/// Cash/margin/realized movement produced by one CFD operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CfdDelta {
    pub cash: Decimal,
    pub reserved_margin: Decimal,
    pub realized_pnl: Decimal,
}

/// Result of opening a position.
#[derive(Debug, Clone)]
pub struct OpenOutcome {
    pub position: Position,
    pub delta: CfdDelta,
}

/// Result of closing a position.
#[derive(Debug, Clone)]
pub struct CloseOutcome {
    pub realized_pnl: Decimal,
    pub realized_pnl_pct: Decimal,
    pub margin_released: Decimal,
    pub executed_price: Decimal,
    pub delta: CfdDelta,
}

/// Stateless CFD position calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CfdEngine;

impl CfdEngine {
    /// Open a new leg at the given mark. Equity is unchanged: the only
    /// movement is reserved margin.
    ///
    /// Quantity/leverage/symbol preconditions are the trading engine's
    /// responsibility; this fails only on non-positive leverage.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        &self,
        portfolio_id: Uuid,
        participant_id: Uuid,
        symbol: &str,
        side: PositionSide,
        quantity: Decimal,
        leverage: Decimal,
        mark_price: Decimal,
    ) -> Result<OpenOutcome, CalcError> {
        let entry_notional = calc::notional(quantity, mark_price);
        let reserved_margin = calc::margin_required(entry_notional, leverage)?;

        let position = Position {
            id: Uuid::new_v4(),
            portfolio_id,
            participant_id,
            symbol: symbol.to_string(),
            asset_class: AssetClass::of_symbol(symbol),
            side,
            quantity,
            entry_price: mark_price,
            mark_price,
            leverage,
            reserved_margin,
            notional_value: entry_notional,
            unrealized_pnl: Decimal::ZERO,
            unrealized_pnl_pct: Decimal::ZERO,
            opened_at: Utc::now(),
        };

        Ok(OpenOutcome {
            position,
            delta: CfdDelta {
                cash: Decimal::ZERO,
                reserved_margin,
                realized_pnl: Decimal::ZERO,
            },
        })
    }

    /// Close a leg at the given mark. Realized P&L settles into cash
    /// and the leg's reserved margin is released.
    pub fn close(&self, position: &Position, mark_price: Decimal) -> CloseOutcome {
        let realized_pnl = calc::unrealized_pnl(
            position.side,
            position.quantity,
            position.entry_price,
            mark_price,
        );
        let entry_value = calc::notional(position.quantity, position.entry_price);
        let realized_pnl_pct = calc::pnl_pct(realized_pnl, entry_value);

        CloseOutcome {
            realized_pnl,
            realized_pnl_pct,
            margin_released: position.reserved_margin,
            executed_price: mark_price,
            delta: CfdDelta {
                cash: realized_pnl,
                reserved_margin: -position.reserved_margin,
                realized_pnl,
            },
        }
    }

    /// Update the mark and mark-derived metrics. No cash or margin
    /// movement.
    pub fn reprice(&self, position: &mut Position, mark_price: Decimal) {
        position.reprice(mark_price);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn engine() -> CfdEngine {
        CfdEngine
    }

    #[test]
    fn test_open_reserves_margin_without_cash() {
        let out = engine()
            .open(
                Uuid::new_v4(),
                Uuid::new_v4(),
                "BTCUSDT",
                PositionSide::Long,
                dec!(0.01),
                dec!(2),
                dec!(50000),
            )
            .unwrap();

        assert_eq!(out.position.reserved_margin, dec!(250));
        assert_eq!(out.position.entry_price, dec!(50000));
        assert_eq!(out.position.mark_price, dec!(50000));
        assert_eq!(out.position.unrealized_pnl, Decimal::ZERO);
        assert_eq!(out.delta.cash, Decimal::ZERO);
        assert_eq!(out.delta.reserved_margin, dec!(250));
        assert_eq!(out.delta.realized_pnl, Decimal::ZERO);
    }

    #[test]
    fn test_open_rejects_non_positive_leverage() {
        let result = engine().open(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "BTCUSDT",
            PositionSide::Long,
            dec!(1),
            Decimal::ZERO,
            dec!(100),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_close_settles_realized_pnl() {
        let mut out = engine()
            .open(
                Uuid::new_v4(),
                Uuid::new_v4(),
                "BTCUSDT",
                PositionSide::Long,
                dec!(0.01),
                dec!(2),
                dec!(50000),
            )
            .unwrap();
        out.position.reprice(dec!(55000));

        let close = engine().close(&out.position, dec!(55000));
        assert_eq!(close.realized_pnl, dec!(50.00));
        assert_eq!(close.realized_pnl_pct, dec!(10.0000));
        assert_eq!(close.margin_released, dec!(250));
        assert_eq!(close.executed_price, dec!(55000));
        assert_eq!(close.delta.cash, dec!(50.00));
        assert_eq!(close.delta.reserved_margin, dec!(-250));
        assert_eq!(close.delta.realized_pnl, dec!(50.00));
    }

    #[test]
    fn test_open_close_round_trip_nets_to_zero() {
        let out = engine()
            .open(
                Uuid::new_v4(),
                Uuid::new_v4(),
                "ETHUSDT",
                PositionSide::Short,
                dec!(2),
                dec!(5),
                dec!(3000),
            )
            .unwrap();
        let close = engine().close(&out.position, dec!(3000));

        let net_cash = out.delta.cash + close.delta.cash;
        let net_margin = out.delta.reserved_margin + close.delta.reserved_margin;
        let net_realized = out.delta.realized_pnl + close.delta.realized_pnl;
        assert_eq!(net_cash, Decimal::ZERO);
        assert_eq!(net_margin, Decimal::ZERO);
        assert_eq!(net_realized, Decimal::ZERO);
    }

    #[test]
    fn test_close_short_at_loss() {
        let out = engine()
            .open(
                Uuid::new_v4(),
                Uuid::new_v4(),
                "BTCUSDT",
                PositionSide::Short,
                dec!(1),
                dec!(10),
                dec!(100),
            )
            .unwrap();
        let close = engine().close(&out.position, dec!(200));
        assert_eq!(close.realized_pnl, dec!(-100));
        assert_eq!(close.delta.cash, dec!(-100));
        assert_eq!(close.delta.reserved_margin, dec!(-10));
    }
}
