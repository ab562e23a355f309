//! The per-participant decision round.
//!
//! One round: take a consistent snapshot under the lane, build the
//! prompt, release the lane, invoke the model under its deadline,
//! parse, re-acquire the lane, execute each order against CURRENT
//! state, and persist the decision record. Recoverable failures
//! (timeout, transport, parse) never escape the round; they land on
//! the record.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use arena_common::{DecisionStatus, OrderAction};
use arena_llm::{InvokeRequest, ModelError, ModelReply, ProviderRegistry};

use crate::domain::{AgentOrder, Competition, DecisionKind, DecisionRecord, Participant};
use crate::engine::{OrderRequest, TradingEngine, TradingError};
use crate::lanes::ParticipantLanes;
use crate::leaderboard::leaderboard;
use crate::market::{PriceCache, PriceQuote};
use crate::store::{MemoryStore, StoreError};

use super::parser::parse_decision;
use super::prompt::{PromptBuilder, PromptInputs};

/// Number of recent trades shown to the agent.
const RECENT_TRADES: usize = 10;

/// Internal failures that abort a round before it can be recorded.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Trading(#[from] TradingError),
}

/// Drives decision rounds for participants.
pub struct DecisionOrchestrator {
    store: Arc<MemoryStore>,
    lanes: Arc<ParticipantLanes>,
    trading: Arc<TradingEngine>,
    prices: Arc<PriceCache>,
    models: Arc<ProviderRegistry>,
    prompt: PromptBuilder,
}

impl DecisionOrchestrator {
    pub fn new(
        store: Arc<MemoryStore>,
        lanes: Arc<ParticipantLanes>,
        trading: Arc<TradingEngine>,
        prices: Arc<PriceCache>,
        models: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            store,
            lanes,
            trading,
            prices,
            models,
            prompt: PromptBuilder,
        }
    }

    /// Run one decision round. Returns `None` when the tick is dropped:
    /// a round is already in flight, or the participant/competition is
    /// no longer eligible.
    pub async fn run_round(
        &self,
        participant_id: Uuid,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<Option<DecisionRecord>, OrchestratorError> {
        let Some(_round_guard) = self.lanes.begin_round(participant_id) else {
            warn!(
                participant = %participant_id,
                "decision tick dropped: previous round still running"
            );
            return Ok(None);
        };

        let participant = self.store.participant(participant_id)?;
        if !participant.is_active() {
            debug!(participant = %participant.name, status = %participant.status, "round skipped");
            return Ok(None);
        }
        let competition = self.store.competition(participant.competition_id)?;
        let now = chrono::Utc::now();
        if !competition.is_running(now) || !competition.markets_open(now) {
            debug!(competition = %competition.name, "round skipped: competition not running");
            return Ok(None);
        }

        // Snapshot + build under the lane.
        let mut record = {
            let _lane = self.lanes.acquire(participant_id).await;
            self.build(&participant, &competition)?
        };

        // Invoke with the lane released; invocation latency must not
        // serialize other work for this participant.
        let started = Instant::now();
        let invocation = self.invoke(&participant, &record.prompt_text, &mut shutdown).await;
        record.latency_ms = started.elapsed().as_millis() as u64;

        let reply = match invocation {
            Ok(reply) => reply,
            Err(err) => {
                record.status = match err {
                    ModelError::Timeout => DecisionStatus::Timeout,
                    _ => DecisionStatus::TransportError,
                };
                record.error_message = Some(format!("{}: {}", err.reason(), err));
                return Ok(Some(self.persist(record, &participant)));
            }
        };

        record.response_text = Some(reply.text.clone());
        record.prompt_tokens = reply.prompt_tokens;
        record.response_tokens = reply.response_tokens;

        let decision = match parse_decision(&reply.text) {
            Ok(decision) => decision,
            Err(err) => {
                record.status = DecisionStatus::InvalidResponse;
                record.error_message = Some(err.to_string());
                return Ok(Some(self.persist(record, &participant)));
            }
        };
        record.parsed_decision = Some(decision.clone());

        // Execute + record under the lane. Orders run in list order;
        // earlier orders consume budget first and later orders see the
        // already-applied state. Validation is against current state,
        // never the snapshot the prompt was built from.
        if decision.decision == DecisionKind::Trade {
            let _lane = self.lanes.acquire(participant_id).await;
            for order in &decision.orders {
                let request = self.to_request(participant_id, record.id, order);
                match self.trading.execute(&request).await {
                    Ok(result) => record.execution_results.push(result.outcome),
                    Err(e) => {
                        error!(participant = %participant.name, error = %e, "round aborted");
                        record.error_message = Some(e.to_string());
                        break;
                    }
                }
            }
        }

        record.status = DecisionStatus::Success;
        Ok(Some(self.persist(record, &participant)))
    }

    /// Snapshot the round's inputs and render the prompt.
    fn build(
        &self,
        participant: &Participant,
        competition: &Competition,
    ) -> Result<DecisionRecord, OrchestratorError> {
        let view = self
            .trading
            .portfolios()
            .snapshot(participant.id)
            .map_err(|e| TradingError::Consistency {
                participant_id: participant.id,
                detail: e.to_string(),
            })?;

        let snapshot = self.prices.snapshot();
        let prices: HashMap<String, PriceQuote> = competition
            .rules
            .allowed_symbols
            .iter()
            .filter_map(|s| snapshot.get(s).map(|q| (s.clone(), *q)))
            .collect();

        let board = leaderboard(&self.store, competition.id);
        let trades = self.store.trades_of(participant.id);
        let skip = trades.len().saturating_sub(RECENT_TRADES);
        let recent = &trades[skip..];

        let built = self.prompt.build(&PromptInputs {
            competition,
            participant,
            view: &view,
            prices: &prices,
            leaderboard: &board,
            recent_trades: recent,
        });

        Ok(DecisionRecord::begin(
            participant.id,
            competition.id,
            built.text,
            built.market_snapshot,
            built.portfolio_snapshot,
        ))
    }

    /// Invoke the model under the participant's deadline. Transient
    /// transport failures are retried exactly once; timeouts, auth
    /// failures and cancellation are terminal.
    async fn invoke(
        &self,
        participant: &Participant,
        prompt: &str,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<ModelReply, ModelError> {
        let client = self
            .models
            .get(&participant.provider)
            .map_err(|e| ModelError::Auth(e.to_string()))?;

        let deadline = Duration::from_secs(participant.invocation_timeout_secs);
        let request = InvokeRequest::new(&participant.model, prompt, deadline)
            .with_config(participant.model_config.clone());

        let mut attempts = 0u8;
        loop {
            attempts += 1;
            let outcome = tokio::select! {
                _ = shutdown.recv() => Err(ModelError::Cancelled),
                invoked = tokio::time::timeout(deadline, client.invoke(&request)) => {
                    match invoked {
                        Ok(result) => result,
                        Err(_) => Err(ModelError::Timeout),
                    }
                }
            };

            match outcome {
                Err(ref err) if err.is_transient() && attempts == 1 => {
                    warn!(
                        participant = %participant.name,
                        error = %err,
                        "transient transport failure, retrying once"
                    );
                    continue;
                }
                other => return other,
            }
        }
    }

    fn to_request(&self, participant_id: Uuid, decision_id: Uuid, order: &AgentOrder) -> OrderRequest {
        match order.action {
            OrderAction::Open => OrderRequest {
                participant_id,
                action: OrderAction::Open,
                symbol: order.symbol.clone(),
                side: order.side,
                quantity: order.quantity,
                leverage: order.leverage,
                position_id: None,
                decision_id: Some(decision_id),
                forced: false,
            },
            OrderAction::Close => {
                OrderRequest::close(participant_id, order.symbol.clone(), order.position_id)
                    .with_decision(decision_id)
            }
        }
    }

    fn persist(&self, record: DecisionRecord, participant: &Participant) -> DecisionRecord {
        info!(
            participant = %participant.name,
            status = %record.status,
            orders = record.execution_results.len(),
            latency_ms = record.latency_ms,
            "decision round recorded"
        );
        self.store.insert_decision(record.clone());
        record
    }
}

impl std::fmt::Debug for DecisionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionOrchestrator").finish_non_exhaustive()
    }
}
