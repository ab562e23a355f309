//! Scheduler: the periodic heartbeat of the arena.
//!
//! Three kinds of loops, all exiting on the broadcast shutdown signal:
//!
//! - a price-refresh loop pulling marks for every allowed symbol of
//!   every active competition, publishing them atomically and running
//!   the risk monitor over each repriced portfolio;
//! - a lifecycle loop activating pending competitions whose start time
//!   has passed, completing expired ones, and reconciling one decision
//!   ticker per active competition;
//! - per-competition decision tickers fanning participants out
//!   concurrently, one round per participant per tick.
//!
//! Overlap policy: at most one outstanding round per participant; a
//! tick that fires while the previous round is still running is dropped
//! by the orchestrator's in-flight guard and logged. On shutdown, new
//! ticks stop, in-flight invocations are cancelled through the
//! broadcast channel, and in-flight rounds are drained so their records
//! reach the store.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use uuid::Uuid;

use arena_common::{CompetitionStatus, ParticipantStatus};

use crate::engine::{PortfolioError, PortfolioManager};
use crate::lanes::ParticipantLanes;
use crate::market::PriceCache;
use crate::orchestrator::DecisionOrchestrator;
use crate::risk::RiskMonitor;
use crate::store::MemoryStore;

/// Scheduler timing knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Period of the price refresh tick.
    pub price_refresh_interval: Duration,
    /// Period of the competition lifecycle sweep.
    pub lifecycle_interval: Duration,
    /// Grace period for draining in-flight rounds at shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            price_refresh_interval: Duration::from_secs(15),
            lifecycle_interval: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Process-wide scheduler owning the timers and the round fan-out.
pub struct Scheduler {
    store: Arc<MemoryStore>,
    lanes: Arc<ParticipantLanes>,
    portfolios: PortfolioManager,
    orchestrator: Arc<DecisionOrchestrator>,
    prices: Arc<PriceCache>,
    risk: Arc<RiskMonitor>,
    config: SchedulerConfig,
    shutdown: broadcast::Sender<()>,
    /// Long-lived loops (price refresh, lifecycle).
    loops: Mutex<Vec<JoinHandle<()>>>,
    /// One decision ticker per active competition.
    tickers: DashMap<Uuid, JoinHandle<()>>,
    /// In-flight decision rounds, drained at shutdown.
    rounds: Arc<Mutex<JoinSet<()>>>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<MemoryStore>,
        lanes: Arc<ParticipantLanes>,
        portfolios: PortfolioManager,
        orchestrator: Arc<DecisionOrchestrator>,
        prices: Arc<PriceCache>,
        risk: Arc<RiskMonitor>,
        config: SchedulerConfig,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(8);
        Self {
            store,
            lanes,
            portfolios,
            orchestrator,
            prices,
            risk,
            config,
            shutdown,
            loops: Mutex::new(Vec::new()),
            tickers: DashMap::new(),
            rounds: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Receiver for the process shutdown signal (given to every
    /// in-flight invocation so it can be cancelled).
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Spawn the periodic loops.
    pub async fn start(self: Arc<Self>) {
        if !self.config.enabled {
            info!("scheduler disabled by configuration");
            return;
        }

        let mut loops = self.loops.lock().await;
        let price = Arc::clone(&self);
        loops.push(tokio::spawn(async move { price.price_loop().await }));
        let lifecycle = Arc::clone(&self);
        loops.push(tokio::spawn(async move { lifecycle.lifecycle_loop().await }));
        info!(
            price_refresh_secs = self.config.price_refresh_interval.as_secs(),
            "scheduler started"
        );
    }

    /// Stop accepting ticks, cancel in-flight invocations and drain
    /// in-flight rounds.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(());

        let mut handles: Vec<JoinHandle<()>> = self.loops.lock().await.drain(..).collect();
        let ticker_ids: Vec<Uuid> = self.tickers.iter().map(|t| *t.key()).collect();
        for id in ticker_ids {
            if let Some((_, handle)) = self.tickers.remove(&id) {
                handles.push(handle);
            }
        }
        for handle in handles {
            let _ = handle.await;
        }

        let drain = async {
            let mut rounds = self.rounds.lock().await;
            while rounds.join_next().await.is_some() {}
        };
        if tokio::time::timeout(self.config.shutdown_timeout, drain)
            .await
            .is_err()
        {
            warn!("shutdown drain timed out with rounds still in flight");
        }
        info!("scheduler stopped");
    }

    /// Schedule one decision round for every active participant of
    /// every running competition (also used by the admin trigger).
    pub async fn trigger_all_rounds(&self) {
        for competition in self.store.active_competitions() {
            self.tick_competition(competition.id).await;
        }
    }

    // ------------------------------------------------------------------
    // Price refresh
    // ------------------------------------------------------------------

    async fn price_loop(self: Arc<Self>) {
        let mut ticker = interval(self.config.price_refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => self.refresh_prices().await,
            }
        }
    }

    async fn refresh_prices(&self) {
        let competitions = self.store.active_competitions();
        if competitions.is_empty() {
            return;
        }

        let symbols: BTreeSet<String> = competitions
            .iter()
            .flat_map(|c| c.rules.allowed_symbols.iter().cloned())
            .collect();
        let symbols: Vec<String> = symbols.into_iter().collect();

        if let Err(e) = self.prices.refresh(&symbols).await {
            warn!(error = %e, "price refresh failed, keeping previous marks");
            return;
        }
        let snapshot = self.prices.snapshot();

        for competition in competitions {
            let maintenance_pct = competition.rules.maintenance_margin_pct;
            for participant in self.store.participants_in(competition.id) {
                if participant.status == ParticipantStatus::Disqualified {
                    continue;
                }
                {
                    let _lane = self.lanes.acquire(participant.id).await;
                    match self.portfolios.reprice_all(participant.id, &snapshot) {
                        Ok(_) => {}
                        Err(PortfolioError::InternalConsistency(detail)) => {
                            error!(
                                participant = %participant.name,
                                detail = %detail,
                                "reprice broke invariants, disqualifying"
                            );
                            let _ = self.store.update_participant(participant.id, |p| {
                                p.status = ParticipantStatus::Disqualified;
                            });
                            continue;
                        }
                        Err(e) => {
                            warn!(participant = %participant.name, error = %e, "reprice failed");
                            continue;
                        }
                    }
                }
                if let Err(e) = self
                    .risk
                    .check_participant(participant.id, maintenance_pct)
                    .await
                {
                    error!(participant = %participant.name, error = %e, "risk check failed");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Competition lifecycle + decision tickers
    // ------------------------------------------------------------------

    async fn lifecycle_loop(self: Arc<Self>) {
        let mut ticker = interval(self.config.lifecycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => Arc::clone(&self).reconcile_competitions().await,
            }
        }
    }

    async fn reconcile_competitions(self: Arc<Self>) {
        let now = Utc::now();
        for competition in self.store.competitions() {
            if competition.due_to_start(now) {
                let _ = self.store.update_competition(competition.id, |c| {
                    c.status = CompetitionStatus::Active;
                });
                info!(competition = %competition.name, "competition started");
            } else if competition.due_to_end(now) {
                let _ = self.store.update_competition(competition.id, |c| {
                    c.status = CompetitionStatus::Completed;
                });
                info!(competition = %competition.name, "competition completed");
            }
        }

        // Reconcile tickers with the (possibly just-updated) statuses.
        for competition in self.store.competitions() {
            let running = competition.is_running(Utc::now());
            let has_ticker = self.tickers.contains_key(&competition.id);
            if running && !has_ticker {
                let handle = Self::spawn_ticker(
                    Arc::clone(&self),
                    competition.id,
                    competition.invocation_interval_minutes,
                );
                self.tickers.insert(competition.id, handle);
            } else if !running && has_ticker {
                // Pending ticks for a stopped competition are dropped;
                // in-flight rounds finish through the rounds set.
                if let Some((_, handle)) = self.tickers.remove(&competition.id) {
                    handle.abort();
                }
                info!(competition = %competition.name, "decision ticker stopped");
            }
        }
    }

    fn spawn_ticker(
        scheduler: Arc<Scheduler>,
        competition_id: Uuid,
        interval_minutes: u32,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = Duration::from_secs(u64::from(interval_minutes.max(1)) * 60);
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut shutdown = scheduler.shutdown.subscribe();
            info!(competition = %competition_id, minutes = interval_minutes, "decision ticker started");
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => scheduler.tick_competition(competition_id).await,
                }
            }
        })
    }

    /// One decision tick: fan active participants out concurrently.
    /// Ordering between participants is not promised; each
    /// participant's successive rounds are serialized by the in-flight
    /// guard and lane.
    async fn tick_competition(&self, competition_id: Uuid) {
        let Ok(competition) = self.store.competition(competition_id) else {
            return;
        };
        let now = Utc::now();
        if !competition.is_running(now) {
            return;
        }
        if !competition.markets_open(now) {
            info!(competition = %competition.name, "decision tick skipped: markets closed");
            return;
        }

        let participants = self.store.active_participants_in(competition_id);
        if participants.is_empty() {
            return;
        }
        info!(
            competition = %competition.name,
            participants = participants.len(),
            "decision tick"
        );

        let mut rounds = self.rounds.lock().await;
        // Reap rounds that already finished so the set stays small.
        while rounds.try_join_next().is_some() {}

        for participant in participants {
            let orchestrator = Arc::clone(&self.orchestrator);
            let shutdown = self.shutdown.subscribe();
            let participant_id = participant.id;
            let name = participant.name.clone();
            rounds.spawn(async move {
                match orchestrator.run_round(participant_id, shutdown).await {
                    Ok(Some(record)) => {
                        info!(participant = %name, status = %record.status, "round finished");
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!(participant = %name, error = %e, "round failed");
                    }
                }
            });
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("tickers", &self.tickers.len())
            .finish_non_exhaustive()
    }
}
