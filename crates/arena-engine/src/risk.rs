//! Risk monitor: per-tick liquidation check and forced flatten.
//!
//! Runs after every reprice. When the margin level breaches the
//! competition's maintenance percentage, every open position of the
//! portfolio is force-closed in descending notional order through the
//! trading engine (which keeps all accounting), and the participant is
//! marked liquidated.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use arena_common::{calc, ParticipantStatus};

use crate::domain::LiquidationRecord;
use crate::engine::{OrderRequest, TradingEngine, TradingError};
use crate::lanes::ParticipantLanes;
use crate::store::MemoryStore;

/// Watches margin levels and force-flattens breached portfolios.
pub struct RiskMonitor {
    store: Arc<MemoryStore>,
    lanes: Arc<ParticipantLanes>,
    trading: Arc<TradingEngine>,
}

impl RiskMonitor {
    pub fn new(
        store: Arc<MemoryStore>,
        lanes: Arc<ParticipantLanes>,
        trading: Arc<TradingEngine>,
    ) -> Self {
        Self {
            store,
            lanes,
            trading,
        }
    }

    /// Evaluate one participant after a reprice; liquidate when the
    /// margin level has fallen below `maintenance_pct`. Returns whether
    /// a liquidation happened.
    pub async fn check_participant(
        &self,
        participant_id: Uuid,
        maintenance_pct: Decimal,
    ) -> Result<bool, TradingError> {
        let participant = self.store.participant(participant_id)?;
        if !participant.is_active() {
            return Ok(false);
        }

        let _lane = self.lanes.acquire(participant_id).await;

        let portfolio = self.store.portfolio_of(participant_id)?;
        if !calc::liquidation_triggered(
            portfolio.equity,
            portfolio.reserved_margin,
            maintenance_pct,
        ) {
            return Ok(false);
        }

        let margin_level = portfolio
            .margin_level
            .unwrap_or(Decimal::ZERO);
        warn!(
            participant = %participant.name,
            equity = %portfolio.equity,
            margin_level = %margin_level,
            maintenance_pct = %maintenance_pct,
            "maintenance margin breached, liquidating"
        );

        // Flatten in descending notional order.
        let mut positions = self.store.positions_of(participant_id);
        positions.sort_by(|a, b| b.notional_value.cmp(&a.notional_value));

        let mut closed = Vec::with_capacity(positions.len());
        for position in positions {
            let request = OrderRequest::close(
                participant_id,
                position.symbol.clone(),
                Some(position.id),
            )
            .forced();
            match self.trading.execute(&request).await {
                Ok(result) if result.executed() => closed.push(position.id),
                Ok(result) => {
                    // Typically price_unavailable; the next refresh tick
                    // retries the remaining legs.
                    warn!(
                        participant = %participant.name,
                        position = %position.id,
                        reason = ?result.order.rejection_reason,
                        "liquidation close rejected"
                    );
                }
                Err(e) => {
                    error!(
                        participant = %participant.name,
                        position = %position.id,
                        error = %e,
                        "liquidation close failed"
                    );
                    return Err(e);
                }
            }
        }

        let fully_flat = self.store.positions_of(participant_id).is_empty();
        if fully_flat {
            self.store.update_participant(participant_id, |p| {
                p.status = ParticipantStatus::Liquidated;
            })?;
            info!(participant = %participant.name, "participant liquidated");
        }

        self.store.append_liquidation(LiquidationRecord {
            participant_id,
            equity: portfolio.equity,
            margin_level,
            closed_position_ids: closed,
            recorded_at: Utc::now(),
        });

        Ok(fully_flat)
    }
}

impl std::fmt::Debug for RiskMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskMonitor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Competition, CompetitionRules, Participant, Portfolio};
    use crate::engine::PortfolioManager;
    use crate::market::{PriceCache, ScriptedMarketData};
    use arena_common::{CompetitionStatus, OrderSide};
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        venue: Arc<ScriptedMarketData>,
        prices: Arc<PriceCache>,
        portfolios: PortfolioManager,
        trading: Arc<TradingEngine>,
        monitor: RiskMonitor,
        participant_id: Uuid,
        maintenance_pct: Decimal,
    }

    async fn fixture(initial_cash: Decimal) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mut competition = Competition::new(
            "t",
            Utc::now() - ChronoDuration::minutes(5),
            Utc::now() + ChronoDuration::hours(1),
            5,
            CompetitionRules {
                initial_capital: initial_cash,
                allowed_symbols: vec!["XUSDT".to_string()],
                ..CompetitionRules::default()
            },
        );
        competition.status = CompetitionStatus::Active;
        let maintenance_pct = competition.rules.maintenance_margin_pct;
        let participant =
            Participant::new(competition.id, "claude", "static", "static", initial_cash);
        let participant_id = participant.id;
        store.insert_competition(competition);
        store.insert_participant(participant);
        store.insert_portfolio(Portfolio::new(participant_id, initial_cash));

        let venue = Arc::new(ScriptedMarketData::new());
        venue.set_price("XUSDT", dec!(100));
        let prices = Arc::new(PriceCache::new(venue.clone(), Duration::from_secs(60)));
        prices.refresh(&["XUSDT".to_string()]).await.unwrap();

        let lanes = Arc::new(ParticipantLanes::new());
        let portfolios = PortfolioManager::new(Arc::clone(&store));
        let trading = Arc::new(TradingEngine::new(
            Arc::clone(&store),
            portfolios.clone(),
            Arc::clone(&prices),
        ));
        let monitor = RiskMonitor::new(Arc::clone(&store), lanes, Arc::clone(&trading));

        Fixture {
            store,
            venue,
            prices,
            portfolios,
            trading,
            monitor,
            participant_id,
            maintenance_pct,
        }
    }

    async fn reprice(f: &Fixture, price: Decimal) {
        f.venue.set_price("XUSDT", price);
        f.prices.refresh(&["XUSDT".to_string()]).await.unwrap();
        f.portfolios
            .reprice_all(f.participant_id, &f.prices.snapshot())
            .unwrap();
    }

    #[tokio::test]
    async fn test_healthy_portfolio_untouched() {
        let f = fixture(dec!(1000)).await;
        f.trading
            .execute(&OrderRequest::open(
                f.participant_id,
                "XUSDT",
                OrderSide::Sell,
                dec!(1),
                dec!(10),
            ))
            .await
            .unwrap();

        reprice(&f, dec!(200)).await;
        // equity 900, margin 10, level 9000% >= 5%
        let liquidated = f
            .monitor
            .check_participant(f.participant_id, f.maintenance_pct)
            .await
            .unwrap();
        assert!(!liquidated);
        assert_eq!(f.store.positions_of(f.participant_id).len(), 1);
    }

    #[tokio::test]
    async fn test_forced_liquidation_flattens_and_marks() {
        let f = fixture(dec!(1000)).await;
        // short 1 @ 100 with 10x: margin 10
        f.trading
            .execute(&OrderRequest::open(
                f.participant_id,
                "XUSDT",
                OrderSide::Sell,
                dec!(1),
                dec!(10),
            ))
            .await
            .unwrap();

        reprice(&f, dec!(1200)).await;
        // unrealized -1100, equity -100, margin level -1000% < 5%
        let portfolio = f.store.portfolio_of(f.participant_id).unwrap();
        assert_eq!(portfolio.equity, dec!(-100));

        let liquidated = f
            .monitor
            .check_participant(f.participant_id, f.maintenance_pct)
            .await
            .unwrap();
        assert!(liquidated);

        let participant = f.store.participant(f.participant_id).unwrap();
        assert_eq!(participant.status, ParticipantStatus::Liquidated);
        assert!(f.store.positions_of(f.participant_id).is_empty());

        // realized loss settled into cash
        let portfolio = f.store.portfolio_of(f.participant_id).unwrap();
        assert_eq!(portfolio.cash_balance, dec!(-100));
        assert_eq!(portfolio.reserved_margin, Decimal::ZERO);

        // audit record appended
        let audits = f.store.liquidations_of(f.participant_id);
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].closed_position_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_no_orders_accepted_after_liquidation() {
        let f = fixture(dec!(1000)).await;
        f.trading
            .execute(&OrderRequest::open(
                f.participant_id,
                "XUSDT",
                OrderSide::Sell,
                dec!(1),
                dec!(10),
            ))
            .await
            .unwrap();
        reprice(&f, dec!(1200)).await;
        f.monitor
            .check_participant(f.participant_id, f.maintenance_pct)
            .await
            .unwrap();

        let result = f
            .trading
            .execute(&OrderRequest::open(
                f.participant_id,
                "XUSDT",
                OrderSide::Buy,
                dec!(0.01),
                dec!(2),
            ))
            .await
            .unwrap();
        assert_eq!(
            result.order.rejection_reason.as_deref(),
            Some("participant_inactive")
        );
    }

    #[tokio::test]
    async fn test_closes_descending_notional() {
        let f = fixture(dec!(1000)).await;
        // two shorts of different size
        f.trading
            .execute(&OrderRequest::open(
                f.participant_id,
                "XUSDT",
                OrderSide::Sell,
                dec!(1),
                dec!(10),
            ))
            .await
            .unwrap();
        f.trading
            .execute(&OrderRequest::open(
                f.participant_id,
                "XUSDT",
                OrderSide::Sell,
                dec!(0.5),
                dec!(10),
            ))
            .await
            .unwrap();
        let mut by_quantity: Vec<_> = f
            .store
            .positions_of(f.participant_id)
            .into_iter()
            .map(|p| (p.id, p.quantity))
            .collect();
        by_quantity.sort_by(|a, b| b.1.cmp(&a.1));

        reprice(&f, dec!(900)).await;
        f.monitor
            .check_participant(f.participant_id, f.maintenance_pct)
            .await
            .unwrap();

        let audits = f.store.liquidations_of(f.participant_id);
        assert_eq!(audits[0].closed_position_ids[0], by_quantity[0].0);
        assert_eq!(audits[0].closed_position_ids[1], by_quantity[1].0);
    }

    #[tokio::test]
    async fn test_inactive_participant_skipped() {
        let f = fixture(dec!(1000)).await;
        f.store
            .update_participant(f.participant_id, |p| {
                p.status = ParticipantStatus::Withdrawn;
            })
            .unwrap();
        let liquidated = f
            .monitor
            .check_participant(f.participant_id, f.maintenance_pct)
            .await
            .unwrap();
        assert!(!liquidated);
    }
}
