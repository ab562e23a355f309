//! Decision records: the audit trail of agent rounds.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use arena_common::{DecisionStatus, OrderAction, OrderSide, OrderStatus};

/// Top-level verdict of a parsed agent reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Trade,
    Hold,
}

/// One order as the agent expressed it on the wire.
///
/// For `open`, `side`, `quantity` and `leverage` are required. For
/// `close`, `position_id` is preferred and `side`/`quantity` may be
/// omitted; they are derived from the referenced position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOrder {
    pub action: OrderAction,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<OrderSide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<Uuid>,
}

/// A parsed agent decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDecision {
    pub decision: DecisionKind,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub orders: Vec<AgentOrder>,
}

/// Per-order outcome recorded on the decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub order_id: Uuid,
    pub action: OrderAction,
    pub symbol: String,
    pub side: Option<OrderSide>,
    pub quantity: Option<Decimal>,
    pub leverage: Option<Decimal>,
    pub validation_passed: bool,
    pub rejection_reason: Option<String>,
    pub status: OrderStatus,
    pub executed_price: Option<Decimal>,
}

/// Audit of one agent round: the prompt, the raw reply, the parsed
/// decision and every per-order outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub competition_id: Uuid,
    pub prompt_text: String,
    pub response_text: Option<String>,
    pub prompt_tokens: Option<u32>,
    pub response_tokens: Option<u32>,
    /// Market snapshot the prompt was built from.
    pub market_snapshot: Value,
    /// Portfolio snapshot the prompt was built from.
    pub portfolio_snapshot: Value,
    pub parsed_decision: Option<AgentDecision>,
    pub execution_results: Vec<ExecutionOutcome>,
    pub status: DecisionStatus,
    pub error_message: Option<String>,
    pub latency_ms: u64,
    pub cost_estimate: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl DecisionRecord {
    /// Skeleton record created when the round starts; filled in as the
    /// round progresses and persisted once at the end.
    pub fn begin(
        participant_id: Uuid,
        competition_id: Uuid,
        prompt_text: String,
        market_snapshot: Value,
        portfolio_snapshot: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant_id,
            competition_id,
            prompt_text,
            response_text: None,
            prompt_tokens: None,
            response_tokens: None,
            market_snapshot,
            portfolio_snapshot,
            parsed_decision: None,
            execution_results: Vec::new(),
            status: DecisionStatus::Success,
            error_message: None,
            latency_ms: 0,
            cost_estimate: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_agent_decision_wire_shape() {
        let raw = serde_json::json!({
            "decision": "trade",
            "reasoning": "momentum",
            "orders": [
                {"action": "open", "symbol": "BTCUSDT", "side": "buy",
                 "quantity": "0.049", "leverage": "2"},
                {"action": "close", "symbol": "ETHUSDT",
                 "position_id": "9f8b7c3a-2e4d-4f6a-8b1c-0d2e4f6a8b1c"}
            ]
        });
        let decision: AgentDecision = serde_json::from_value(raw).unwrap();
        assert_eq!(decision.decision, DecisionKind::Trade);
        assert_eq!(decision.orders.len(), 2);
        assert_eq!(decision.orders[0].quantity, Some(dec!(0.049)));
        assert!(decision.orders[1].side.is_none());
        assert!(decision.orders[1].position_id.is_some());
    }

    #[test]
    fn test_hold_without_orders() {
        let raw = serde_json::json!({"decision": "hold", "reasoning": "waiting"});
        let decision: AgentDecision = serde_json::from_value(raw).unwrap();
        assert_eq!(decision.decision, DecisionKind::Hold);
        assert!(decision.orders.is_empty());
    }
}
