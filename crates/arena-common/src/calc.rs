//! Financial calculation primitives.
//!
//! Pure, deterministic, side-effect-free. Every division rounds with
//! bankers' rounding (midpoint-nearest-even) to the scale of the
//! containing field; multiplications are exact in `Decimal` and are not
//! rounded here.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use thiserror::Error;

use crate::types::PositionSide;

/// Scale for money and quantity amounts (enough for fractional crypto).
pub const AMOUNT_SCALE: u32 = 8;

/// Scale for percentage values (P&L %, margin level, win rate).
pub const PCT_SCALE: u32 = 4;

/// Errors from calculation primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalcError {
    #[error("leverage must be positive, got {0}")]
    BadLeverage(Decimal),
}

fn round_amount(v: Decimal) -> Decimal {
    v.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointNearestEven)
}

fn round_pct(v: Decimal) -> Decimal {
    v.round_dp_with_strategy(PCT_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Notional value of a position: `quantity * price`.
pub fn notional(quantity: Decimal, price: Decimal) -> Decimal {
    quantity * price
}

/// Margin required to back a position: `notional / leverage`.
pub fn margin_required(notional: Decimal, leverage: Decimal) -> Result<Decimal, CalcError> {
    if leverage <= Decimal::ZERO {
        return Err(CalcError::BadLeverage(leverage));
    }
    Ok(round_amount(notional / leverage))
}

/// Unrealized P&L of an open leg at the given mark.
///
/// Long: `(mark - entry) * qty`. Short: `(entry - mark) * qty`.
pub fn unrealized_pnl(
    side: PositionSide,
    quantity: Decimal,
    entry_price: Decimal,
    mark_price: Decimal,
) -> Decimal {
    match side {
        PositionSide::Long => quantity * (mark_price - entry_price),
        PositionSide::Short => quantity * (entry_price - mark_price),
    }
}

/// P&L as a percentage of a basis value. Zero when the basis is not
/// positive.
pub fn pnl_pct(pnl: Decimal, basis: Decimal) -> Decimal {
    if basis <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_pct(pnl / basis * dec!(100))
}

/// Account equity: `cash + unrealized P&L`.
pub fn equity(cash_balance: Decimal, unrealized_pnl: Decimal) -> Decimal {
    cash_balance + unrealized_pnl
}

/// Effective leverage of the whole book. Zero when equity is not
/// positive.
pub fn current_leverage(total_notional: Decimal, equity: Decimal) -> Decimal {
    if equity <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_pct(total_notional / equity)
}

/// Margin level as a percentage: `equity / reserved_margin * 100`.
/// Undefined (`None`) when no margin is reserved.
pub fn margin_level(equity: Decimal, reserved_margin: Decimal) -> Option<Decimal> {
    if reserved_margin <= Decimal::ZERO {
        return None;
    }
    Some(round_pct(equity / reserved_margin * dec!(100)))
}

/// Liquidation trigger: margin is in use and the margin level has fallen
/// below the maintenance percentage.
pub fn liquidation_triggered(
    equity: Decimal,
    reserved_margin: Decimal,
    maintenance_pct: Decimal,
) -> bool {
    match margin_level(equity, reserved_margin) {
        Some(level) => level < maintenance_pct,
        None => false,
    }
}

/// Maximum allowed notional for a single position:
/// `equity * max_position_size_pct / 100`.
pub fn max_position_notional(equity: Decimal, max_position_size_pct: Decimal) -> Decimal {
    round_amount(equity * max_position_size_pct / dec!(100))
}

/// Win rate percentage over closed trades. Zero with no trades.
pub fn win_rate(winning_trades: u32, total_trades: u32) -> Decimal {
    if total_trades == 0 {
        return Decimal::ZERO;
    }
    round_pct(Decimal::from(winning_trades) / Decimal::from(total_trades) * dec!(100))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notional() {
        assert_eq!(notional(dec!(0.01), dec!(50000)), dec!(500.00));
    }

    #[test]
    fn test_margin_required() {
        assert_eq!(margin_required(dec!(500), dec!(2)).unwrap(), dec!(250));
        assert_eq!(margin_required(dec!(100), dec!(10)).unwrap(), dec!(10));
    }

    #[test]
    fn test_margin_required_bad_leverage() {
        assert_eq!(
            margin_required(dec!(500), Decimal::ZERO),
            Err(CalcError::BadLeverage(Decimal::ZERO))
        );
        assert!(margin_required(dec!(500), dec!(-1)).is_err());
    }

    #[test]
    fn test_margin_required_bankers_rounding() {
        // 1 / 3 rounds to 8 dp, midpoint-nearest-even
        assert_eq!(
            margin_required(dec!(1), dec!(3)).unwrap(),
            dec!(0.33333333)
        );
        // exact midpoints at scale 8 round to even, not away from zero
        assert_eq!(
            margin_required(dec!(0.00000003), dec!(2)).unwrap(),
            dec!(0.00000002)
        );
        assert_eq!(
            margin_required(dec!(0.00000005), dec!(2)).unwrap(),
            dec!(0.00000002)
        );
    }

    #[test]
    fn test_unrealized_pnl_long() {
        let pnl = unrealized_pnl(PositionSide::Long, dec!(0.01), dec!(50000), dec!(55000));
        assert_eq!(pnl, dec!(50.00));
    }

    #[test]
    fn test_unrealized_pnl_short() {
        let pnl = unrealized_pnl(PositionSide::Short, dec!(1), dec!(100), dec!(200));
        assert_eq!(pnl, dec!(-100));
        let pnl = unrealized_pnl(PositionSide::Short, dec!(1), dec!(100), dec!(80));
        assert_eq!(pnl, dec!(20));
    }

    #[test]
    fn test_pnl_pct() {
        assert_eq!(pnl_pct(dec!(50), dec!(500)), dec!(10.0000));
        assert_eq!(pnl_pct(dec!(50), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(pnl_pct(dec!(50), dec!(-1)), Decimal::ZERO);
    }

    #[test]
    fn test_equity() {
        assert_eq!(equity(dec!(10000), dec!(50)), dec!(10050));
        assert_eq!(equity(dec!(1000), dec!(-1100)), dec!(-100));
    }

    #[test]
    fn test_current_leverage() {
        assert_eq!(current_leverage(dec!(20000), dec!(10000)), dec!(2));
        assert_eq!(current_leverage(dec!(20000), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(current_leverage(dec!(20000), dec!(-5)), Decimal::ZERO);
    }

    #[test]
    fn test_margin_level() {
        assert_eq!(margin_level(dec!(10000), dec!(250)), Some(dec!(4000.0000)));
        assert_eq!(margin_level(dec!(10000), Decimal::ZERO), None);
    }

    #[test]
    fn test_liquidation_triggered() {
        // healthy book
        assert!(!liquidation_triggered(dec!(900), dec!(10), dec!(5)));
        // equity negative, margin in use
        assert!(liquidation_triggered(dec!(-100), dec!(10), dec!(5)));
        // no margin reserved, never triggers
        assert!(!liquidation_triggered(dec!(-100), Decimal::ZERO, dec!(5)));
    }

    #[test]
    fn test_max_position_notional() {
        assert_eq!(max_position_notional(dec!(10000), dec!(50)), dec!(5000));
        assert_eq!(max_position_notional(dec!(10000), dec!(20)), dec!(2000));
    }

    #[test]
    fn test_win_rate() {
        assert_eq!(win_rate(0, 0), Decimal::ZERO);
        assert_eq!(win_rate(1, 3), dec!(33.3333));
        assert_eq!(win_rate(2, 4), dec!(50));
    }
}
