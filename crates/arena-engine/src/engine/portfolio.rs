//! Portfolio manager: the writable view of a portfolio and its
//! open-position set.
//!
//! Every mutation funnels through `apply` or `reprice_all`, both of
//! which recompute the derived fields from the open-position set and
//! append an equity-curve sample. Callers hold the participant's lane.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use arena_common::calc;

use crate::domain::{Portfolio, PortfolioHistoryPoint, Position, Trade};
use crate::market::PriceQuote;
use crate::store::{MemoryStore, StoreError};

use super::cfd::CfdDelta;

/// Errors from portfolio mutations.
#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Accounting invariants no longer hold; the participant must be
    /// disqualified by the caller.
    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),
}

/// Consistent read of one portfolio and its open positions.
#[derive(Debug, Clone)]
pub struct PortfolioView {
    pub portfolio: Portfolio,
    pub positions: Vec<Position>,
}

/// One atomic application of a CFD delta plus the entity changes that
/// accompany it.
#[derive(Debug, Clone, Default)]
pub struct PortfolioApply {
    pub delta: CfdDelta,
    pub create_position: Option<Position>,
    pub remove_position: Option<Uuid>,
    pub trade: Option<Trade>,
}

/// Aggregates positions into portfolio totals and enforces
/// reserve-margin accounting.
#[derive(Debug, Clone)]
pub struct PortfolioManager {
    store: Arc<MemoryStore>,
}

impl PortfolioManager {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Create and store the initial portfolio for a participant.
    pub fn create_portfolio(&self, participant_id: Uuid, initial_capital: Decimal) -> Portfolio {
        let portfolio = Portfolio::new(participant_id, initial_capital);
        self.store.insert_portfolio(portfolio.clone());
        self.store
            .append_history(PortfolioHistoryPoint::of(&portfolio));
        portfolio
    }

    /// Consistent snapshot with all derived fields recomputed.
    pub fn snapshot(&self, participant_id: Uuid) -> Result<PortfolioView, PortfolioError> {
        let portfolio = self.recompute(participant_id)?;
        let positions = self.store.positions_of(participant_id);
        Ok(PortfolioView {
            portfolio,
            positions,
        })
    }

    /// Atomically apply a CFD delta with its position create/remove and
    /// trade append. Caller holds the participant's lane.
    pub fn apply(
        &self,
        participant_id: Uuid,
        apply: PortfolioApply,
    ) -> Result<Portfolio, PortfolioError> {
        if let Some(position) = &apply.create_position {
            if position.quantity <= Decimal::ZERO || position.reserved_margin < Decimal::ZERO {
                return Err(PortfolioError::InternalConsistency(format!(
                    "position {} has quantity {} and margin {}",
                    position.id, position.quantity, position.reserved_margin
                )));
            }
            self.store.insert_position(position.clone());
        }
        if let Some(position_id) = apply.remove_position {
            if self.store.remove_position(position_id).is_none() {
                return Err(PortfolioError::InternalConsistency(format!(
                    "close removed unknown position {}",
                    position_id
                )));
            }
        }
        if let Some(trade) = apply.trade {
            self.store.insert_trade(trade);
        }

        self.store.update_portfolio(participant_id, |p| {
            p.cash_balance += apply.delta.cash;
            p.realized_pnl += apply.delta.realized_pnl;
        })?;

        let portfolio = self.recompute(participant_id)?;

        // Reserve-margin accounting: the delta's margin movement must
        // agree with the recomputed position sum.
        if portfolio.reserved_margin < Decimal::ZERO {
            return Err(PortfolioError::InternalConsistency(format!(
                "reserved margin went negative: {}",
                portfolio.reserved_margin
            )));
        }

        if portfolio.equity <= Decimal::ZERO && portfolio.reserved_margin > Decimal::ZERO {
            debug!(
                participant = %participant_id,
                equity = %portfolio.equity,
                "equity exhausted, liquidation required"
            );
        }

        Ok(portfolio)
    }

    /// Reprice every position whose symbol appears in `prices`, then
    /// recompute the aggregates. One complete price map per call; the
    /// scheduler passes the snapshot published for the current tick.
    pub fn reprice_all(
        &self,
        participant_id: Uuid,
        prices: &HashMap<String, PriceQuote>,
    ) -> Result<Portfolio, PortfolioError> {
        for position in self.store.positions_of(participant_id) {
            if let Some(quote) = prices.get(&position.symbol) {
                self.store
                    .update_position(position.id, |p| p.reprice(quote.price))?;
            }
        }
        self.recompute(participant_id)
    }

    /// Recompute all derived fields from the open-position set, persist
    /// the portfolio, mirror equity onto the participant and append an
    /// equity-curve sample.
    pub fn recompute(&self, participant_id: Uuid) -> Result<Portfolio, PortfolioError> {
        let positions = self.store.positions_of(participant_id);

        let reserved_margin: Decimal = positions.iter().map(|p| p.reserved_margin).sum();
        let unrealized_pnl: Decimal = positions.iter().map(|p| p.unrealized_pnl).sum();
        let total_notional: Decimal = positions.iter().map(|p| p.notional_value).sum();

        let portfolio = self.store.update_portfolio(participant_id, |p| {
            p.reserved_margin = reserved_margin;
            p.unrealized_pnl = unrealized_pnl;
            p.equity = calc::equity(p.cash_balance, unrealized_pnl);
            p.margin_available = p.equity - reserved_margin;
            p.total_pnl = p.realized_pnl + unrealized_pnl;
            p.current_leverage = calc::current_leverage(total_notional, p.equity);
            p.margin_level = calc::margin_level(p.equity, reserved_margin);
        })?;

        if let Err(e) = self.store.update_participant(participant_id, |p| {
            p.update_equity(portfolio.equity);
        }) {
            warn!(participant = %participant_id, error = %e, "equity mirror failed");
        }

        self.store
            .append_history(PortfolioHistoryPoint::of(&portfolio));

        Ok(portfolio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Competition, CompetitionRules, Participant};
    use crate::engine::cfd::CfdEngine;
    use arena_common::PositionSide;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn setup() -> (Arc<MemoryStore>, PortfolioManager, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let competition = Competition::new(
            "t",
            Utc::now(),
            Utc::now() + Duration::hours(1),
            5,
            CompetitionRules::default(),
        );
        let participant =
            Participant::new(competition.id, "a", "static", "static", dec!(10000));
        let participant_id = participant.id;
        store.insert_competition(competition);
        store.insert_participant(participant);
        let manager = PortfolioManager::new(Arc::clone(&store));
        manager.create_portfolio(participant_id, dec!(10000));
        (store, manager, participant_id)
    }

    fn open_btc(
        store: &Arc<MemoryStore>,
        manager: &PortfolioManager,
        participant_id: Uuid,
        quantity: Decimal,
        leverage: Decimal,
        price: Decimal,
    ) -> Position {
        let portfolio = store.portfolio_of(participant_id).unwrap();
        let out = CfdEngine
            .open(
                portfolio.id,
                participant_id,
                "BTCUSDT",
                PositionSide::Long,
                quantity,
                leverage,
                price,
            )
            .unwrap();
        let position = out.position.clone();
        manager
            .apply(
                participant_id,
                PortfolioApply {
                    delta: out.delta,
                    create_position: Some(out.position),
                    ..Default::default()
                },
            )
            .unwrap();
        position
    }

    #[test]
    fn test_open_leaves_equity_unchanged() {
        let (store, manager, participant_id) = setup();
        open_btc(&store, &manager, participant_id, dec!(0.01), dec!(2), dec!(50000));

        let portfolio = store.portfolio_of(participant_id).unwrap();
        assert_eq!(portfolio.cash_balance, dec!(10000));
        assert_eq!(portfolio.equity, dec!(10000));
        assert_eq!(portfolio.reserved_margin, dec!(250));
        assert_eq!(portfolio.margin_available, dec!(9750));
    }

    #[test]
    fn test_reserved_margin_matches_position_sum() {
        let (store, manager, participant_id) = setup();
        open_btc(&store, &manager, participant_id, dec!(0.01), dec!(2), dec!(50000));
        open_btc(&store, &manager, participant_id, dec!(0.02), dec!(4), dec!(50000));

        let portfolio = store.portfolio_of(participant_id).unwrap();
        let sum: Decimal = store
            .positions_of(participant_id)
            .iter()
            .map(|p| p.reserved_margin)
            .sum();
        assert_eq!(portfolio.reserved_margin, sum);
        assert_eq!(portfolio.reserved_margin, dec!(500));
    }

    #[test]
    fn test_reprice_all_updates_unrealized() {
        let (store, manager, participant_id) = setup();
        open_btc(&store, &manager, participant_id, dec!(0.01), dec!(2), dec!(50000));

        let mut prices = HashMap::new();
        prices.insert(
            "BTCUSDT".to_string(),
            PriceQuote::new(dec!(55000), Utc::now()),
        );
        let portfolio = manager.reprice_all(participant_id, &prices).unwrap();

        assert_eq!(portfolio.unrealized_pnl, dec!(50.00));
        assert_eq!(portfolio.equity, dec!(10050.00));
        // cash untouched by marks
        assert_eq!(portfolio.cash_balance, dec!(10000));
    }

    #[test]
    fn test_reprice_all_is_idempotent() {
        let (store, manager, participant_id) = setup();
        open_btc(&store, &manager, participant_id, dec!(0.01), dec!(2), dec!(50000));

        let mut prices = HashMap::new();
        prices.insert(
            "BTCUSDT".to_string(),
            PriceQuote::new(dec!(55000), Utc::now()),
        );
        let first = manager.reprice_all(participant_id, &prices).unwrap();
        let second = manager.reprice_all(participant_id, &prices).unwrap();

        assert_eq!(first.equity, second.equity);
        assert_eq!(first.unrealized_pnl, second.unrealized_pnl);
        assert_eq!(first.reserved_margin, second.reserved_margin);
    }

    #[test]
    fn test_close_moves_cash_by_realized_pnl() {
        let (store, manager, participant_id) = setup();
        let position =
            open_btc(&store, &manager, participant_id, dec!(0.01), dec!(2), dec!(50000));

        let mut prices = HashMap::new();
        prices.insert(
            "BTCUSDT".to_string(),
            PriceQuote::new(dec!(55000), Utc::now()),
        );
        manager.reprice_all(participant_id, &prices).unwrap();

        let refreshed = store.position(position.id).unwrap();
        let close = CfdEngine.close(&refreshed, dec!(55000));
        let portfolio = manager
            .apply(
                participant_id,
                PortfolioApply {
                    delta: close.delta,
                    remove_position: Some(position.id),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(portfolio.cash_balance, dec!(10050.00));
        assert_eq!(portfolio.realized_pnl, dec!(50.00));
        assert_eq!(portfolio.reserved_margin, Decimal::ZERO);
        assert_eq!(portfolio.equity, dec!(10050.00));
        assert!(portfolio.margin_level.is_none());
    }

    #[test]
    fn test_equity_mirrors_to_participant_with_peak() {
        let (store, manager, participant_id) = setup();
        open_btc(&store, &manager, participant_id, dec!(0.01), dec!(2), dec!(50000));

        let mut prices = HashMap::new();
        prices.insert(
            "BTCUSDT".to_string(),
            PriceQuote::new(dec!(60000), Utc::now()),
        );
        manager.reprice_all(participant_id, &prices).unwrap();
        let participant = store.participant(participant_id).unwrap();
        assert_eq!(participant.current_equity, dec!(10100.00));
        assert_eq!(participant.peak_equity, dec!(10100.00));

        prices.insert(
            "BTCUSDT".to_string(),
            PriceQuote::new(dec!(45000), Utc::now()),
        );
        manager.reprice_all(participant_id, &prices).unwrap();
        let participant = store.participant(participant_id).unwrap();
        assert_eq!(participant.current_equity, dec!(9950.00));
        assert_eq!(participant.peak_equity, dec!(10100.00));
    }

    #[test]
    fn test_apply_rejects_unknown_position_removal() {
        let (_, manager, participant_id) = setup();
        let result = manager.apply(
            participant_id,
            PortfolioApply {
                remove_position: Some(Uuid::new_v4()),
                ..Default::default()
            },
        );
        assert!(matches!(
            result,
            Err(PortfolioError::InternalConsistency(_))
        ));
    }

    #[test]
    fn test_history_appended_on_recompute() {
        let (store, manager, participant_id) = setup();
        let before = store.history_of(participant_id).len();
        manager.recompute(participant_id).unwrap();
        assert_eq!(store.history_of(participant_id).len(), before + 1);
    }
}
