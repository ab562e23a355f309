//! Prompt builder: renders the decision prompt from one round's
//! snapshot.
//!
//! The prompt is a JSON document: competition context, portfolio with
//! open positions, market data, the trading rules (quoting the exact
//! per-order notional cap in dollars), the leaderboard and the response
//! instructions. Leverage affects margin, never the cap, and agents are
//! told to size below the cap by a safety buffer to absorb price drift
//! between snapshot and execution.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use arena_common::calc;

use crate::domain::{Competition, Participant, Trade};
use crate::engine::PortfolioView;
use crate::leaderboard::LeaderboardEntry;
use crate::market::PriceQuote;

/// Recommended sizing as a percentage of the cap.
pub const SAFETY_BUFFER_PCT: Decimal = dec!(98);

/// Everything one round shows its agent.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    pub competition: &'a Competition,
    pub participant: &'a Participant,
    pub view: &'a PortfolioView,
    pub prices: &'a HashMap<String, PriceQuote>,
    pub leaderboard: &'a [LeaderboardEntry],
    pub recent_trades: &'a [Trade],
}

/// Rendered prompt plus the snapshots kept on the decision record.
#[derive(Debug, Clone)]
pub struct BuiltPrompt {
    pub text: String,
    pub market_snapshot: Value,
    pub portfolio_snapshot: Value,
}

/// Renders decision prompts.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build(&self, inputs: &PromptInputs<'_>) -> BuiltPrompt {
        let market_snapshot = self.market_section(inputs);
        let portfolio_snapshot = self.portfolio_section(inputs);

        let document = json!({
            "competition_context": self.competition_section(inputs),
            "portfolio": portfolio_snapshot,
            "market_data": market_snapshot,
            "trading_rules": self.rules_section(inputs),
            "leaderboard": inputs.leaderboard,
            "recent_trades": self.trades_section(inputs),
            "instructions": instructions(),
        });

        BuiltPrompt {
            text: serde_json::to_string_pretty(&document)
                .unwrap_or_else(|_| document.to_string()),
            market_snapshot,
            portfolio_snapshot,
        }
    }

    fn competition_section(&self, inputs: &PromptInputs<'_>) -> Value {
        let now = Utc::now();
        let remaining = inputs.competition.end_time.signed_duration_since(now);
        json!({
            "competition_id": inputs.competition.id,
            "competition_name": inputs.competition.name,
            "participant_name": inputs.participant.name,
            "current_time": now.to_rfc3339(),
            "time_remaining_minutes": remaining.num_minutes().max(0),
        })
    }

    fn portfolio_section(&self, inputs: &PromptInputs<'_>) -> Value {
        let portfolio = &inputs.view.portfolio;
        let positions: Vec<Value> = inputs
            .view
            .positions
            .iter()
            .map(|p| {
                json!({
                    "position_id": p.id,
                    "symbol": p.symbol,
                    "side": p.side,
                    "quantity": p.quantity,
                    "entry_price": p.entry_price,
                    "current_price": p.mark_price,
                    "leverage": p.leverage,
                    "notional_value": p.notional_value,
                    "unrealized_pnl": p.unrealized_pnl,
                    "unrealized_pnl_pct": p.unrealized_pnl_pct,
                    "margin_reserved": p.reserved_margin,
                    "opened_at": p.opened_at.to_rfc3339(),
                })
            })
            .collect();

        json!({
            "cash_balance": portfolio.cash_balance,
            "equity": portfolio.equity,
            "margin_used": portfolio.reserved_margin,
            "margin_available": portfolio.margin_available,
            "realized_pnl": portfolio.realized_pnl,
            "unrealized_pnl": portfolio.unrealized_pnl,
            "total_pnl": portfolio.total_pnl,
            "current_leverage": portfolio.current_leverage,
            "positions": positions,
        })
    }

    fn market_section(&self, inputs: &PromptInputs<'_>) -> Value {
        let mut symbols: Vec<&String> = inputs.prices.keys().collect();
        symbols.sort();
        let prices: Vec<Value> = symbols
            .iter()
            .map(|symbol| {
                let quote = &inputs.prices[*symbol];
                json!({
                    "symbol": symbol,
                    "current_price": quote.price,
                    "as_of": quote.as_of.to_rfc3339(),
                })
            })
            .collect();
        json!({
            "available_symbols": inputs.competition.rules.allowed_symbols,
            "prices": prices,
        })
    }

    fn rules_section(&self, inputs: &PromptInputs<'_>) -> Value {
        let rules = &inputs.competition.rules;
        let cap = calc::max_position_notional(
            inputs.view.portfolio.equity,
            rules.max_position_size_pct,
        );
        json!({
            "max_leverage": rules.max_leverage,
            "max_position_size_pct": rules.max_position_size_pct,
            "max_position_size_dollars": cap,
            "recommended_safety_buffer_pct": SAFETY_BUFFER_PCT,
            "margin_requirement_pct": rules.margin_requirement_pct,
            "maintenance_margin_pct": rules.maintenance_margin_pct,
            "allowed_asset_classes": rules.allowed_asset_classes,
            "market_hours_only": rules.market_hours_only,
        })
    }

    fn trades_section(&self, inputs: &PromptInputs<'_>) -> Value {
        let trades: Vec<Value> = inputs
            .recent_trades
            .iter()
            .map(|t| {
                json!({
                    "action": t.action,
                    "symbol": t.symbol,
                    "side": t.side,
                    "quantity": t.quantity,
                    "price": t.price,
                    "realized_pnl": t.realized_pnl,
                    "executed_at": t.executed_at.to_rfc3339(),
                })
            })
            .collect();
        Value::Array(trades)
    }
}

fn instructions() -> &'static str {
    r#"Based on the current market conditions and your portfolio, decide on your next trading action.

You may:
- Open new positions (action: "open", side: "buy" or "sell")
- Close existing positions (action: "close", include position_id)
- Do nothing (decision: "hold")

CRITICAL - POSITION SIZING RULES:
The system validates that (quantity x current_price) <= max_position_size_dollars

1. NOTIONAL VALUE LIMIT (enforced by system):
   - max_position_size_dollars is the maximum NOTIONAL VALUE per position
   - Notional value = quantity x current_price
   - This limit applies REGARDLESS of leverage

2. LEVERAGE DOES NOT AFFECT POSITION SIZE LIMITS:
   - Leverage only affects margin required: margin = notional_value / leverage
   - Higher leverage = lower margin required, but the same notional limit

3. CALCULATION FORMULA (use this):
   - max_quantity = max_position_size_dollars / current_price
   - Verify: quantity x current_price <= max_position_size_dollars
   - Size to the recommended safety buffer (recommended_safety_buffer_pct
     of the cap) so price drift between now and execution cannot push you
     over the limit

4. WORKED EXAMPLE:
   - Given: max_position_size_dollars = $5000, BTC price = $100,000
   - Max quantity = 5000 / 100000 = 0.05 BTC
   - Safe quantity (98%) = 0.05 x 0.98 = 0.049 BTC
   - At 2x leverage: margin required = 4900 / 2 = $2450

COMMON MISTAKES TO AVOID:
- DO NOT calculate quantity as (max_position_size x leverage) / price
- DO calculate quantity as max_position_size / price
- DO NOT assume leverage increases the position size limit

Respond with valid JSON following this format:
{
  "decision": "trade" or "hold",
  "reasoning": "Brief explanation (max 500 chars)",
  "orders": [
    {
      "action": "open" or "close",
      "symbol": "BTCUSDT",
      "side": "buy" or "sell",
      "quantity": 0.049,
      "leverage": 2.0,
      "position_id": "uuid, only for close"
    }
  ]
}"#
}
