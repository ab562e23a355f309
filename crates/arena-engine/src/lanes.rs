//! Per-participant serial lanes.
//!
//! Every write to a participant's portfolio, positions, orders, trades
//! and decision records happens inside that participant's lane. The
//! lane is NOT held across the model invocation; a separate in-flight
//! marker enforces at most one outstanding decision round per
//! participant so overlapping ticks can be dropped.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Keyed mutex map giving each participant a serial lane plus an
/// at-most-one-round in-flight marker.
#[derive(Debug, Default)]
pub struct ParticipantLanes {
    lanes: DashMap<Uuid, Arc<Mutex<()>>>,
    in_flight: DashMap<Uuid, ()>,
}

/// Marks a decision round as in flight; dropped when the round ends.
pub struct RoundGuard<'a> {
    lanes: &'a ParticipantLanes,
    participant_id: Uuid,
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        self.lanes.in_flight.remove(&self.participant_id);
    }
}

impl ParticipantLanes {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane(&self, participant_id: Uuid) -> Arc<Mutex<()>> {
        self.lanes
            .entry(participant_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the participant's serial lane. Writes to the
    /// participant's entities must happen under the returned guard.
    pub async fn acquire(&self, participant_id: Uuid) -> OwnedMutexGuard<()> {
        self.lane(participant_id).lock_owned().await
    }

    /// Try to mark a decision round as in flight. Returns `None` when a
    /// round is already running, in which case the caller drops the
    /// tick.
    pub fn begin_round(&self, participant_id: Uuid) -> Option<RoundGuard<'_>> {
        use dashmap::mapref::entry::Entry;
        match self.in_flight.entry(participant_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(RoundGuard {
                    lanes: self,
                    participant_id,
                })
            }
        }
    }

    /// Whether a decision round is currently in flight.
    pub fn round_in_flight(&self, participant_id: Uuid) -> bool {
        self.in_flight.contains_key(&participant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_guard_excludes_overlap() {
        let lanes = Arc::new(ParticipantLanes::new());
        let id = Uuid::new_v4();

        let guard = lanes.begin_round(id).expect("first round starts");
        assert!(lanes.round_in_flight(id));
        assert!(lanes.begin_round(id).is_none(), "overlapping tick dropped");

        drop(guard);
        assert!(!lanes.round_in_flight(id));
        assert!(lanes.begin_round(id).is_some(), "next round starts");
    }

    #[tokio::test]
    async fn test_rounds_independent_across_participants() {
        let lanes = Arc::new(ParticipantLanes::new());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let _guard_a = lanes.begin_round(a).unwrap();
        assert!(lanes.begin_round(b).is_some());
    }

    #[tokio::test]
    async fn test_lane_serializes_writers() {
        let lanes = Arc::new(ParticipantLanes::new());
        let id = Uuid::new_v4();

        let guard = lanes.acquire(id).await;
        let second = {
            let lanes = Arc::clone(&lanes);
            tokio::spawn(async move { lanes.acquire(id).await })
        };
        // The second acquire cannot complete while the first guard lives.
        tokio::task::yield_now().await;
        assert!(!second.is_finished());
        drop(guard);
        second.await.unwrap();
    }
}
