//! Trading engine: validates and executes one order under the rules of
//! its competition.
//!
//! Validation is a totally ordered pipeline; the first failing rule
//! yields a rejection with a stable machine-readable reason code.
//! Rejections are expected outcomes carried on the execution result,
//! never errors. Callers hold the participant's lane; validation always
//! runs against CURRENT state, not against any earlier snapshot.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use arena_common::{
    calc, CalcError, OrderAction, OrderSide, OrderStatus, ParticipantStatus,
};

use crate::domain::{
    Competition, ExecutionOutcome, Order, Participant, Portfolio, Position, Trade,
};
use crate::market::PriceCache;
use crate::store::{MemoryStore, StoreError};

use super::cfd::CfdEngine;
use super::portfolio::{PortfolioApply, PortfolioError, PortfolioManager};

/// Stable reason codes for order rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    ParticipantInactive,
    CompetitionInactive,
    InstrumentDisallowed,
    LeverageOutOfBounds,
    QuantityNonPositive,
    PriceUnavailable,
    SizeCapExceeded,
    InsufficientMargin,
    PositionNotOwned,
}

impl RejectReason {
    /// Machine-readable code recorded on orders and decision records.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::ParticipantInactive => "participant_inactive",
            RejectReason::CompetitionInactive => "competition_inactive",
            RejectReason::InstrumentDisallowed => "instrument_disallowed",
            RejectReason::LeverageOutOfBounds => "leverage_out_of_bounds",
            RejectReason::QuantityNonPositive => "quantity_non_positive",
            RejectReason::PriceUnavailable => "price_unavailable",
            RejectReason::SizeCapExceeded => "size_cap_exceeded",
            RejectReason::InsufficientMargin => "insufficient_margin",
            RejectReason::PositionNotOwned => "position_not_owned",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Internal failures; distinct from rejections, which are modeled
/// outcomes.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Calc(#[from] CalcError),

    /// Accounting invariants broke mid-execution. The participant has
    /// been disqualified.
    #[error("consistency violation for participant {participant_id}: {detail}")]
    Consistency { participant_id: Uuid, detail: String },
}

/// One intended action submitted for validation and execution.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub participant_id: Uuid,
    pub action: OrderAction,
    pub symbol: String,
    pub side: Option<OrderSide>,
    pub quantity: Option<Decimal>,
    pub leverage: Option<Decimal>,
    pub position_id: Option<Uuid>,
    pub decision_id: Option<Uuid>,
    /// Risk-monitor closes bypass the participant/competition status
    /// rules but reuse all accounting.
    pub forced: bool,
}

impl OrderRequest {
    pub fn open(
        participant_id: Uuid,
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        leverage: Decimal,
    ) -> Self {
        Self {
            participant_id,
            action: OrderAction::Open,
            symbol: symbol.into(),
            side: Some(side),
            quantity: Some(quantity),
            leverage: Some(leverage),
            position_id: None,
            decision_id: None,
            forced: false,
        }
    }

    pub fn close(participant_id: Uuid, symbol: impl Into<String>, position_id: Option<Uuid>) -> Self {
        Self {
            participant_id,
            action: OrderAction::Close,
            symbol: symbol.into(),
            side: None,
            quantity: None,
            leverage: None,
            position_id,
            decision_id: None,
            forced: false,
        }
    }

    pub fn with_decision(mut self, decision_id: Uuid) -> Self {
        self.decision_id = Some(decision_id);
        self
    }

    pub fn forced(mut self) -> Self {
        self.forced = true;
        self
    }
}

/// Outcome of one submission: the final order, the trade when executed,
/// and the per-order record for the originating decision.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub order: Order,
    pub trade: Option<Trade>,
    pub outcome: ExecutionOutcome,
}

impl ExecutionResult {
    pub fn executed(&self) -> bool {
        self.order.status == OrderStatus::Executed
    }
}

/// What validation admitted, with the inputs execution needs.
enum Admitted {
    Open {
        side: OrderSide,
        quantity: Decimal,
        leverage: Decimal,
        price: Decimal,
    },
    Close {
        position: Position,
        price: Decimal,
    },
}

/// Validates one order against the competition rules and executes it
/// through the CFD engine and portfolio manager.
pub struct TradingEngine {
    store: Arc<MemoryStore>,
    portfolios: PortfolioManager,
    prices: Arc<PriceCache>,
    cfd: CfdEngine,
}

impl TradingEngine {
    pub fn new(store: Arc<MemoryStore>, portfolios: PortfolioManager, prices: Arc<PriceCache>) -> Self {
        Self {
            store,
            portfolios,
            prices,
            cfd: CfdEngine,
        }
    }

    pub fn portfolios(&self) -> &PortfolioManager {
        &self.portfolios
    }

    /// Validate and execute one order. Caller holds the participant's
    /// lane.
    pub async fn execute(&self, request: &OrderRequest) -> Result<ExecutionResult, TradingError> {
        let participant = self.store.participant(request.participant_id)?;
        let competition = self.store.competition(participant.competition_id)?;
        let portfolio = self.store.portfolio_of(request.participant_id)?;

        match self
            .validate(request, &participant, &competition, &portfolio)
            .await
        {
            Ok(Admitted::Open {
                side,
                quantity,
                leverage,
                price,
            }) => {
                self.execute_open(request, &participant, side, quantity, leverage, price)
                    .await
            }
            Ok(Admitted::Close { position, price }) => {
                self.execute_close(request, &participant, position, price).await
            }
            Err(reason) => Ok(self.reject(request, &participant, reason)),
        }
    }

    /// The ordered validation pipeline. First failing rule wins. The
    /// portfolio passed in is the CURRENT one: derived fields are
    /// recomputed after every apply and every reprice, so snapshots
    /// taken before the model invocation never leak in here.
    async fn validate(
        &self,
        request: &OrderRequest,
        participant: &Participant,
        competition: &Competition,
        portfolio: &Portfolio,
    ) -> Result<Admitted, RejectReason> {
        let now = Utc::now();

        // 1. participant_active / 2. competition_active. Forced closes
        // from the risk monitor skip both.
        if !request.forced {
            if !participant.is_active() {
                return Err(RejectReason::ParticipantInactive);
            }
            if !competition.is_running(now) || !competition.markets_open(now) {
                return Err(RejectReason::CompetitionInactive);
            }
        }

        // 3. instrument_allowed
        if !request.forced && !competition.rules.instrument_allowed(&request.symbol) {
            return Err(RejectReason::InstrumentDisallowed);
        }

        match request.action {
            OrderAction::Open => {
                // 4. leverage_positive_in_bounds
                let leverage = request.leverage.unwrap_or(Decimal::ZERO);
                if leverage <= Decimal::ZERO || leverage > competition.rules.max_leverage {
                    return Err(RejectReason::LeverageOutOfBounds);
                }

                // 5. quantity_positive
                let quantity = request.quantity.unwrap_or(Decimal::ZERO);
                if quantity <= Decimal::ZERO {
                    return Err(RejectReason::QuantityNonPositive);
                }

                let side = request.side.unwrap_or(OrderSide::Buy);

                // 6. price_available
                let quote = self
                    .prices
                    .fresh_price(&request.symbol)
                    .await
                    .map_err(|_| RejectReason::PriceUnavailable)?;
                if quote.price <= Decimal::ZERO {
                    return Err(RejectReason::PriceUnavailable);
                }

                // 7. notional_within_size_cap. Leverage does NOT
                // inflate this cap.
                let order_notional = calc::notional(quantity, quote.price);
                let cap = calc::max_position_notional(
                    portfolio.equity,
                    competition.rules.max_position_size_pct,
                );
                if order_notional > cap {
                    return Err(RejectReason::SizeCapExceeded);
                }

                // 8. margin_available
                let margin_required = calc::margin_required(order_notional, leverage)
                    .map_err(|_| RejectReason::LeverageOutOfBounds)?;
                if margin_required > portfolio.margin_available {
                    return Err(RejectReason::InsufficientMargin);
                }

                Ok(Admitted::Open {
                    side,
                    quantity,
                    leverage,
                    price: quote.price,
                })
            }
            OrderAction::Close => {
                // 4. position_exists_and_owned
                let position = self.resolve_position(request)?;

                // 5. price_available
                let quote = self
                    .prices
                    .fresh_price(&position.symbol)
                    .await
                    .map_err(|_| RejectReason::PriceUnavailable)?;
                if quote.price <= Decimal::ZERO {
                    return Err(RejectReason::PriceUnavailable);
                }

                Ok(Admitted::Close {
                    position,
                    price: quote.price,
                })
            }
        }
    }

    /// Resolve the close target: the referenced position when it
    /// belongs to this participant, else the symbol's sole open
    /// position.
    fn resolve_position(&self, request: &OrderRequest) -> Result<Position, RejectReason> {
        if let Some(position_id) = request.position_id {
            let position = self
                .store
                .position(position_id)
                .map_err(|_| RejectReason::PositionNotOwned)?;
            if position.participant_id != request.participant_id {
                return Err(RejectReason::PositionNotOwned);
            }
            return Ok(position);
        }

        let mut candidates = self
            .store
            .positions_of_symbol(request.participant_id, &request.symbol);
        if candidates.len() == 1 {
            Ok(candidates.remove(0))
        } else {
            Err(RejectReason::PositionNotOwned)
        }
    }

    async fn execute_open(
        &self,
        request: &OrderRequest,
        participant: &Participant,
        side: OrderSide,
        quantity: Decimal,
        leverage: Decimal,
        price: Decimal,
    ) -> Result<ExecutionResult, TradingError> {
        let portfolio = self.store.portfolio_of(request.participant_id)?;

        let open = self.cfd.open(
            portfolio.id,
            request.participant_id,
            &request.symbol,
            side.position_side(),
            quantity,
            leverage,
            price,
        )?;

        let mut order = Order::new(
            request.participant_id,
            participant.competition_id,
            OrderAction::Open,
            request.symbol.clone(),
            side,
            quantity,
            leverage,
        );
        order.decision_id = request.decision_id;

        let trade = Trade {
            id: Uuid::new_v4(),
            order_id: order.id,
            participant_id: request.participant_id,
            action: OrderAction::Open,
            symbol: request.symbol.clone(),
            side,
            quantity,
            price,
            leverage,
            notional_value: open.position.notional_value,
            margin_delta: open.position.reserved_margin,
            realized_pnl: None,
            realized_pnl_pct: None,
            executed_at: Utc::now(),
        };

        self.apply_or_disqualify(
            request.participant_id,
            PortfolioApply {
                delta: open.delta,
                create_position: Some(open.position),
                trade: Some(trade.clone()),
                ..Default::default()
            },
        )?;

        order.status = OrderStatus::Executed;
        order.executed_price = Some(price);
        self.store.insert_order(order.clone());

        info!(
            participant = %participant.name,
            symbol = %order.symbol,
            side = %side,
            quantity = %quantity,
            price = %price,
            "position opened"
        );

        let outcome = outcome_of(&order, true, None);
        Ok(ExecutionResult {
            order,
            trade: Some(trade),
            outcome,
        })
    }

    async fn execute_close(
        &self,
        request: &OrderRequest,
        participant: &Participant,
        position: Position,
        price: Decimal,
    ) -> Result<ExecutionResult, TradingError> {
        let close = self.cfd.close(&position, price);
        let side = position.side.closing_order_side();

        let mut order = Order::new(
            request.participant_id,
            participant.competition_id,
            OrderAction::Close,
            position.symbol.clone(),
            side,
            position.quantity,
            position.leverage,
        );
        order.decision_id = request.decision_id;
        order.position_id = Some(position.id);

        let trade = Trade {
            id: Uuid::new_v4(),
            order_id: order.id,
            participant_id: request.participant_id,
            action: OrderAction::Close,
            symbol: position.symbol.clone(),
            side,
            quantity: position.quantity,
            price,
            leverage: position.leverage,
            notional_value: calc::notional(position.quantity, price),
            margin_delta: -close.margin_released,
            realized_pnl: Some(close.realized_pnl),
            realized_pnl_pct: Some(close.realized_pnl_pct),
            executed_at: Utc::now(),
        };

        self.apply_or_disqualify(
            request.participant_id,
            PortfolioApply {
                delta: close.delta,
                remove_position: Some(position.id),
                trade: Some(trade.clone()),
                ..Default::default()
            },
        )?;

        self.store
            .update_participant(request.participant_id, |p| {
                p.record_closed_trade(close.realized_pnl);
            })?;

        order.status = OrderStatus::Executed;
        order.executed_price = Some(price);
        self.store.insert_order(order.clone());

        info!(
            participant = %participant.name,
            symbol = %order.symbol,
            realized_pnl = %close.realized_pnl,
            "position closed"
        );

        let outcome = outcome_of(&order, true, None);
        Ok(ExecutionResult {
            order,
            trade: Some(trade),
            outcome,
        })
    }

    /// Record a rejection. No state mutation beyond the order row.
    fn reject(
        &self,
        request: &OrderRequest,
        participant: &Participant,
        reason: RejectReason,
    ) -> ExecutionResult {
        let mut order = Order::new(
            request.participant_id,
            participant.competition_id,
            request.action,
            request.symbol.clone(),
            request.side.unwrap_or(OrderSide::Buy),
            request.quantity.unwrap_or(Decimal::ZERO),
            request.leverage.unwrap_or(Decimal::ONE),
        );
        order.decision_id = request.decision_id;
        order.position_id = request.position_id;
        order.status = OrderStatus::Rejected;
        order.rejection_reason = Some(reason.code().to_string());
        self.store.insert_order(order.clone());

        warn!(
            participant = %participant.name,
            symbol = %order.symbol,
            action = %order.action,
            reason = reason.code(),
            "order rejected"
        );

        let outcome = outcome_of(&order, false, Some(reason));
        ExecutionResult {
            order,
            trade: None,
            outcome,
        }
    }

    fn apply_or_disqualify(
        &self,
        participant_id: Uuid,
        apply: PortfolioApply,
    ) -> Result<(), TradingError> {
        match self.portfolios.apply(participant_id, apply) {
            Ok(_) => Ok(()),
            Err(e) => Err(self.consistency(participant_id, e)),
        }
    }

    /// Invariant violations abort the execution and disqualify the
    /// participant; other participants continue unaffected.
    fn consistency(&self, participant_id: Uuid, err: PortfolioError) -> TradingError {
        error!(participant = %participant_id, error = %err, "accounting invariant violation");
        if let Err(e) = self.store.update_participant(participant_id, |p| {
            p.status = ParticipantStatus::Disqualified;
        }) {
            error!(participant = %participant_id, error = %e, "disqualification failed");
        }
        TradingError::Consistency {
            participant_id,
            detail: err.to_string(),
        }
    }
}

fn outcome_of(order: &Order, validation_passed: bool, reason: Option<RejectReason>) -> ExecutionOutcome {
    ExecutionOutcome {
        order_id: order.id,
        action: order.action,
        symbol: order.symbol.clone(),
        side: Some(order.side),
        quantity: Some(order.quantity),
        leverage: Some(order.leverage),
        validation_passed,
        rejection_reason: reason.map(|r| r.code().to_string()),
        status: order.status,
        executed_price: order.executed_price,
    }
}

impl std::fmt::Debug for TradingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingEngine").finish_non_exhaustive()
    }
}
