//! DashMap-backed entity store.
//!
//! Cross-entity writes for one participant are serialized by that
//! participant's lane (see `lanes`), which is what gives multi-entity
//! mutations their transactional character here.

use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use arena_common::{CompetitionStatus, ParticipantStatus};

use crate::domain::{
    Competition, DecisionRecord, LiquidationRecord, Order, Participant, Portfolio,
    PortfolioHistoryPoint, Position, Trade,
};

/// Errors from store lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("competition {0} not found")]
    CompetitionNotFound(Uuid),

    #[error("participant {0} not found")]
    ParticipantNotFound(Uuid),

    #[error("portfolio for participant {0} not found")]
    PortfolioNotFound(Uuid),

    #[error("position {0} not found")]
    PositionNotFound(Uuid),
}

/// In-memory entity store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    competitions: DashMap<Uuid, Competition>,
    participants: DashMap<Uuid, Participant>,
    /// Portfolios keyed by PARTICIPANT id (1-1 ownership).
    portfolios: DashMap<Uuid, Portfolio>,
    positions: DashMap<Uuid, Position>,
    orders: DashMap<Uuid, Order>,
    trades: DashMap<Uuid, Trade>,
    decisions: DashMap<Uuid, DecisionRecord>,
    history: DashMap<Uuid, Vec<PortfolioHistoryPoint>>,
    liquidations: DashMap<Uuid, Vec<LiquidationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Competitions
    // ------------------------------------------------------------------

    pub fn insert_competition(&self, competition: Competition) {
        self.competitions.insert(competition.id, competition);
    }

    pub fn competition(&self, id: Uuid) -> Result<Competition, StoreError> {
        self.competitions
            .get(&id)
            .map(|c| c.clone())
            .ok_or(StoreError::CompetitionNotFound(id))
    }

    pub fn competitions(&self) -> Vec<Competition> {
        let mut all: Vec<Competition> = self.competitions.iter().map(|c| c.clone()).collect();
        all.sort_by_key(|c| c.created_at);
        all
    }

    pub fn active_competitions(&self) -> Vec<Competition> {
        self.competitions
            .iter()
            .filter(|c| c.status == CompetitionStatus::Active)
            .map(|c| c.clone())
            .collect()
    }

    pub fn update_competition<F>(&self, id: Uuid, mutate: F) -> Result<Competition, StoreError>
    where
        F: FnOnce(&mut Competition),
    {
        let mut entry = self
            .competitions
            .get_mut(&id)
            .ok_or(StoreError::CompetitionNotFound(id))?;
        mutate(&mut entry);
        entry.updated_at = chrono::Utc::now();
        Ok(entry.clone())
    }

    // ------------------------------------------------------------------
    // Participants
    // ------------------------------------------------------------------

    pub fn insert_participant(&self, participant: Participant) {
        self.participants.insert(participant.id, participant);
    }

    pub fn participant(&self, id: Uuid) -> Result<Participant, StoreError> {
        self.participants
            .get(&id)
            .map(|p| p.clone())
            .ok_or(StoreError::ParticipantNotFound(id))
    }

    pub fn participants_in(&self, competition_id: Uuid) -> Vec<Participant> {
        let mut all: Vec<Participant> = self
            .participants
            .iter()
            .filter(|p| p.competition_id == competition_id)
            .map(|p| p.clone())
            .collect();
        all.sort_by_key(|p| p.created_at);
        all
    }

    pub fn active_participants_in(&self, competition_id: Uuid) -> Vec<Participant> {
        self.participants_in(competition_id)
            .into_iter()
            .filter(|p| p.status == ParticipantStatus::Active)
            .collect()
    }

    pub fn update_participant<F>(&self, id: Uuid, mutate: F) -> Result<Participant, StoreError>
    where
        F: FnOnce(&mut Participant),
    {
        let mut entry = self
            .participants
            .get_mut(&id)
            .ok_or(StoreError::ParticipantNotFound(id))?;
        mutate(&mut entry);
        Ok(entry.clone())
    }

    // ------------------------------------------------------------------
    // Portfolios
    // ------------------------------------------------------------------

    pub fn insert_portfolio(&self, portfolio: Portfolio) {
        self.portfolios.insert(portfolio.participant_id, portfolio);
    }

    pub fn portfolio_of(&self, participant_id: Uuid) -> Result<Portfolio, StoreError> {
        self.portfolios
            .get(&participant_id)
            .map(|p| p.clone())
            .ok_or(StoreError::PortfolioNotFound(participant_id))
    }

    pub fn update_portfolio<F>(&self, participant_id: Uuid, mutate: F) -> Result<Portfolio, StoreError>
    where
        F: FnOnce(&mut Portfolio),
    {
        let mut entry = self
            .portfolios
            .get_mut(&participant_id)
            .ok_or(StoreError::PortfolioNotFound(participant_id))?;
        mutate(&mut entry);
        entry.updated_at = chrono::Utc::now();
        Ok(entry.clone())
    }

    // ------------------------------------------------------------------
    // Positions
    // ------------------------------------------------------------------

    pub fn insert_position(&self, position: Position) {
        self.positions.insert(position.id, position);
    }

    pub fn position(&self, id: Uuid) -> Result<Position, StoreError> {
        self.positions
            .get(&id)
            .map(|p| p.clone())
            .ok_or(StoreError::PositionNotFound(id))
    }

    pub fn remove_position(&self, id: Uuid) -> Option<Position> {
        self.positions.remove(&id).map(|(_, p)| p)
    }

    pub fn positions_of(&self, participant_id: Uuid) -> Vec<Position> {
        let mut all: Vec<Position> = self
            .positions
            .iter()
            .filter(|p| p.participant_id == participant_id)
            .map(|p| p.clone())
            .collect();
        all.sort_by_key(|p| p.opened_at);
        all
    }

    pub fn positions_of_symbol(&self, participant_id: Uuid, symbol: &str) -> Vec<Position> {
        self.positions_of(participant_id)
            .into_iter()
            .filter(|p| p.symbol == symbol)
            .collect()
    }

    /// All open positions across every portfolio (price-refresh path).
    pub fn all_positions(&self) -> Vec<Position> {
        self.positions.iter().map(|p| p.clone()).collect()
    }

    pub fn update_position<F>(&self, id: Uuid, mutate: F) -> Result<Position, StoreError>
    where
        F: FnOnce(&mut Position),
    {
        let mut entry = self
            .positions
            .get_mut(&id)
            .ok_or(StoreError::PositionNotFound(id))?;
        mutate(&mut entry);
        Ok(entry.clone())
    }

    // ------------------------------------------------------------------
    // Orders / trades
    // ------------------------------------------------------------------

    pub fn insert_order(&self, order: Order) {
        self.orders.insert(order.id, order);
    }

    pub fn order(&self, id: Uuid) -> Option<Order> {
        self.orders.get(&id).map(|o| o.clone())
    }

    pub fn orders_of(&self, participant_id: Uuid) -> Vec<Order> {
        let mut all: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.participant_id == participant_id)
            .map(|o| o.clone())
            .collect();
        all.sort_by_key(|o| o.created_at);
        all
    }

    pub fn insert_trade(&self, trade: Trade) {
        self.trades.insert(trade.id, trade);
    }

    pub fn trades_of(&self, participant_id: Uuid) -> Vec<Trade> {
        let mut all: Vec<Trade> = self
            .trades
            .iter()
            .filter(|t| t.participant_id == participant_id)
            .map(|t| t.clone())
            .collect();
        all.sort_by_key(|t| t.executed_at);
        all
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    // ------------------------------------------------------------------
    // Decision records
    // ------------------------------------------------------------------

    pub fn insert_decision(&self, record: DecisionRecord) {
        self.decisions.insert(record.id, record);
    }

    pub fn decision(&self, id: Uuid) -> Option<DecisionRecord> {
        self.decisions.get(&id).map(|d| d.clone())
    }

    pub fn decisions_of(&self, participant_id: Uuid) -> Vec<DecisionRecord> {
        let mut all: Vec<DecisionRecord> = self
            .decisions
            .iter()
            .filter(|d| d.participant_id == participant_id)
            .map(|d| d.clone())
            .collect();
        all.sort_by_key(|d| d.created_at);
        all
    }

    // ------------------------------------------------------------------
    // History / liquidation audit
    // ------------------------------------------------------------------

    pub fn append_history(&self, point: PortfolioHistoryPoint) {
        self.history
            .entry(point.participant_id)
            .or_default()
            .push(point);
    }

    pub fn history_of(&self, participant_id: Uuid) -> Vec<PortfolioHistoryPoint> {
        self.history
            .get(&participant_id)
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    pub fn append_liquidation(&self, record: LiquidationRecord) {
        self.liquidations
            .entry(record.participant_id)
            .or_default()
            .push(record);
    }

    pub fn liquidations_of(&self, participant_id: Uuid) -> Vec<LiquidationRecord> {
        self.liquidations
            .get(&participant_id)
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    /// Wipe every entity belonging to a competition and re-fund its
    /// participants (admin reset).
    pub fn reset_competition(&self, competition_id: Uuid) -> Result<(), StoreError> {
        let competition = self.competition(competition_id)?;
        for participant in self.participants_in(competition_id) {
            let pid = participant.id;
            self.positions.retain(|_, p| p.participant_id != pid);
            self.orders.retain(|_, o| o.participant_id != pid);
            self.trades.retain(|_, t| t.participant_id != pid);
            self.decisions.retain(|_, d| d.participant_id != pid);
            self.history.remove(&pid);
            self.liquidations.remove(&pid);
            self.update_participant(pid, |p| {
                p.status = ParticipantStatus::Active;
                p.current_equity = competition.rules.initial_capital;
                p.peak_equity = competition.rules.initial_capital;
                p.total_trades = 0;
                p.winning_trades = 0;
                p.losing_trades = 0;
            })?;
            self.insert_portfolio(Portfolio::new(pid, competition.rules.initial_capital));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CompetitionRules;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn seed(store: &MemoryStore) -> (Competition, Participant) {
        let competition = Competition::new(
            "test",
            Utc::now(),
            Utc::now() + Duration::hours(1),
            5,
            CompetitionRules::default(),
        );
        let participant = Participant::new(
            competition.id,
            "claude",
            "anthropic",
            "claude-sonnet",
            dec!(10000),
        );
        store.insert_competition(competition.clone());
        store.insert_participant(participant.clone());
        store.insert_portfolio(Portfolio::new(participant.id, dec!(10000)));
        (competition, participant)
    }

    #[test]
    fn test_portfolio_keyed_by_participant() {
        let store = MemoryStore::new();
        let (_, participant) = seed(&store);
        let portfolio = store.portfolio_of(participant.id).unwrap();
        assert_eq!(portfolio.participant_id, participant.id);
        assert!(store.portfolio_of(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_active_participants_filter() {
        let store = MemoryStore::new();
        let (competition, participant) = seed(&store);
        assert_eq!(store.active_participants_in(competition.id).len(), 1);
        store
            .update_participant(participant.id, |p| {
                p.status = ParticipantStatus::Liquidated;
            })
            .unwrap();
        assert!(store.active_participants_in(competition.id).is_empty());
    }

    #[test]
    fn test_reset_competition_clears_state() {
        let store = MemoryStore::new();
        let (competition, participant) = seed(&store);
        store
            .update_participant(participant.id, |p| {
                p.status = ParticipantStatus::Liquidated;
                p.total_trades = 7;
            })
            .unwrap();
        store
            .update_portfolio(participant.id, |p| p.cash_balance = dec!(1))
            .unwrap();

        store.reset_competition(competition.id).unwrap();

        let participant = store.participant(participant.id).unwrap();
        assert_eq!(participant.status, ParticipantStatus::Active);
        assert_eq!(participant.total_trades, 0);
        let portfolio = store.portfolio_of(participant.id).unwrap();
        assert_eq!(portfolio.cash_balance, dec!(10000));
    }
}
