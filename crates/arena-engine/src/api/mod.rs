//! REST surface.
//!
//! Thin view over the engine: CRUD on competitions and participants,
//! portfolio/leaderboard reads, and the auth-gated admin operations.
//! Mutating and admin routes require the shared secret in an
//! `X-API-Key` header; reads are open.

mod auth;
mod dto;
mod error;
mod handlers;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::engine::PortfolioManager;
use crate::market::MarketData;
use crate::orchestrator::DecisionOrchestrator;
use crate::scheduler::Scheduler;
use crate::store::MemoryStore;

pub use dto::{CreateCompetitionRequest, CreateParticipantRequest};
pub use error::ApiError;

/// Shared state injected into every handler.
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub portfolios: PortfolioManager,
    pub scheduler: Arc<Scheduler>,
    pub orchestrator: Arc<DecisionOrchestrator>,
    pub market: Arc<dyn MarketData>,
    pub api_key: String,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let open = Router::new()
        .route("/health", get(handlers::health))
        .route("/competitions", get(handlers::list_competitions))
        .route("/competitions/{id}", get(handlers::get_competition))
        .route(
            "/competitions/{id}/leaderboard",
            get(handlers::get_leaderboard),
        )
        .route("/participants/{id}", get(handlers::get_participant))
        .route(
            "/participants/{id}/portfolio",
            get(handlers::get_portfolio),
        )
        .route(
            "/participants/{id}/positions",
            get(handlers::get_positions),
        )
        .route("/participants/{id}/trades", get(handlers::get_trades))
        .route(
            "/participants/{id}/invocations",
            get(handlers::get_invocations),
        )
        .route(
            "/participants/{id}/performance",
            get(handlers::get_performance),
        )
        .route(
            "/market-data/{symbol}/ohlcv",
            get(handlers::get_ohlcv),
        );

    let gated = Router::new()
        .route("/competitions", post(handlers::create_competition))
        .route("/competitions/{id}/start", post(handlers::start_competition))
        .route("/competitions/{id}/stop", post(handlers::stop_competition))
        .route(
            "/competitions/{id}/participants",
            post(handlers::create_participant),
        )
        .route(
            "/internal/invoke-participants",
            post(handlers::invoke_participants),
        )
        .route(
            "/internal/trigger-invocation/{id}",
            post(handlers::trigger_invocation),
        )
        .route(
            "/internal/reset-competition/{id}",
            post(handlers::reset_competition),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_api_key,
        ));

    open.merge(gated).with_state(state)
}
