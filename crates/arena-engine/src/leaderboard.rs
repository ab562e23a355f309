//! Leaderboard: participants of one competition ranked by equity.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use arena_common::{calc, ParticipantStatus};

use crate::store::MemoryStore;

/// One leaderboard row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub participant_id: Uuid,
    pub name: String,
    pub model: String,
    pub status: ParticipantStatus,
    pub equity: Decimal,
    pub pnl_pct: Decimal,
    pub total_trades: u32,
    pub win_rate: Decimal,
}

/// Rank every participant of a competition by current equity.
pub fn leaderboard(store: &Arc<MemoryStore>, competition_id: Uuid) -> Vec<LeaderboardEntry> {
    let mut participants = store.participants_in(competition_id);
    participants.sort_by(|a, b| b.current_equity.cmp(&a.current_equity));

    participants
        .into_iter()
        .enumerate()
        .map(|(idx, p)| LeaderboardEntry {
            rank: idx as u32 + 1,
            participant_id: p.id,
            name: p.name.clone(),
            model: p.model.clone(),
            status: p.status,
            equity: p.current_equity,
            pnl_pct: calc::pnl_pct(p.current_equity - p.initial_capital, p.initial_capital),
            total_trades: p.total_trades,
            win_rate: p.win_rate(),
        })
        .collect()
}
