//! Orders and trades.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use arena_common::{AssetClass, OrderAction, OrderSide, OrderStatus};

/// One intended action from an agent decision. Reaches either
/// `Executed` or `Rejected`, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub competition_id: Uuid,
    /// Decision round that emitted this order; None for risk-monitor
    /// synthesized closes.
    pub decision_id: Option<Uuid>,
    pub action: OrderAction,
    pub symbol: String,
    pub asset_class: AssetClass,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// Requested leverage; for closes this is the position's leverage.
    pub leverage: Decimal,
    /// Target position for close orders.
    pub position_id: Option<Uuid>,
    pub status: OrderStatus,
    /// Stable machine-readable reason code when rejected.
    pub rejection_reason: Option<String>,
    pub executed_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        participant_id: Uuid,
        competition_id: Uuid,
        action: OrderAction,
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        leverage: Decimal,
    ) -> Self {
        let symbol = symbol.into();
        Self {
            id: Uuid::new_v4(),
            participant_id,
            competition_id,
            decision_id: None,
            action,
            asset_class: AssetClass::of_symbol(&symbol),
            symbol,
            side,
            quantity,
            leverage,
            position_id: None,
            status: OrderStatus::Pending,
            rejection_reason: None,
            executed_price: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_decision(mut self, decision_id: Uuid) -> Self {
        self.decision_id = Some(decision_id);
        self
    }

    pub fn with_position(mut self, position_id: Uuid) -> Self {
        self.position_id = Some(position_id);
        self
    }
}

/// Historical record of a state-changing execution. One-to-one with
/// executed orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub order_id: Uuid,
    pub participant_id: Uuid,
    pub action: OrderAction,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub leverage: Decimal,
    pub notional_value: Decimal,
    /// Reserved-margin delta: positive for opens, negative for closes.
    pub margin_delta: Decimal,
    /// Non-null only for closes.
    pub realized_pnl: Option<Decimal>,
    pub realized_pnl_pct: Option<Decimal>,
    pub executed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_builder() {
        let participant = Uuid::new_v4();
        let competition = Uuid::new_v4();
        let decision = Uuid::new_v4();
        let order = Order::new(
            participant,
            competition,
            OrderAction::Open,
            "BTCUSDT",
            OrderSide::Buy,
            dec!(0.01),
            dec!(2),
        )
        .with_decision(decision);

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.asset_class, AssetClass::Crypto);
        assert_eq!(order.decision_id, Some(decision));
        assert!(order.position_id.is_none());
        assert!(order.rejection_reason.is_none());
    }
}
