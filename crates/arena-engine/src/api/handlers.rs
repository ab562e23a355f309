//! Route handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use arena_common::CompetitionStatus;

use crate::domain::{
    Competition, DecisionRecord, Participant, Portfolio, PortfolioHistoryPoint, Position, Trade,
};
use crate::leaderboard::{leaderboard, LeaderboardEntry};
use crate::market::Candle;

use super::dto::{CreateCompetitionRequest, CreateParticipantRequest, OhlcvQuery};
use super::error::ApiError;
use super::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ----------------------------------------------------------------------
// Competitions
// ----------------------------------------------------------------------

pub async fn create_competition(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCompetitionRequest>,
) -> Result<(StatusCode, Json<Competition>), ApiError> {
    if request.start_time >= request.end_time {
        return Err(ApiError::BadRequest(
            "start_time must be before end_time".to_string(),
        ));
    }
    if request.invocation_interval_minutes == 0 {
        return Err(ApiError::BadRequest(
            "invocation_interval_minutes must be at least 1".to_string(),
        ));
    }

    let mut competition = Competition::new(
        request.name.clone(),
        request.start_time,
        request.end_time,
        request.invocation_interval_minutes,
        request.rules(),
    );
    competition.description = request.description.clone();
    if let Some(max) = request.max_participants {
        competition.max_participants = max;
    }

    info!(competition = %competition.name, "competition created");
    state.store.insert_competition(competition.clone());
    Ok((StatusCode::CREATED, Json(competition)))
}

pub async fn list_competitions(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<Competition>> {
    Json(state.store.competitions())
}

pub async fn get_competition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Competition>, ApiError> {
    Ok(Json(state.store.competition(id)?))
}

pub async fn start_competition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Competition>, ApiError> {
    let competition = state.store.competition(id)?;
    if competition.status != CompetitionStatus::Pending {
        return Err(ApiError::BadRequest(format!(
            "competition is {}, only pending competitions can start",
            competition.status
        )));
    }
    let now = chrono::Utc::now();
    let updated = state.store.update_competition(id, |c| {
        c.status = CompetitionStatus::Active;
        // manual start before the scheduled window pulls the window in
        if c.start_time > now {
            c.start_time = now;
        }
    })?;
    info!(competition = %updated.name, "competition started manually");
    Ok(Json(updated))
}

pub async fn stop_competition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Competition>, ApiError> {
    let competition = state.store.competition(id)?;
    if competition.status != CompetitionStatus::Active {
        return Err(ApiError::BadRequest(format!(
            "competition is {}, only active competitions can stop",
            competition.status
        )));
    }
    let updated = state.store.update_competition(id, |c| {
        c.status = CompetitionStatus::Completed;
    })?;
    info!(competition = %updated.name, "competition stopped manually");
    Ok(Json(updated))
}

pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    state.store.competition(id)?;
    Ok(Json(leaderboard(&state.store, id)))
}

// ----------------------------------------------------------------------
// Participants
// ----------------------------------------------------------------------

pub async fn create_participant(
    State(state): State<Arc<AppState>>,
    Path(competition_id): Path<Uuid>,
    Json(request): Json<CreateParticipantRequest>,
) -> Result<(StatusCode, Json<Participant>), ApiError> {
    let competition = state.store.competition(competition_id)?;
    if !matches!(
        competition.status,
        CompetitionStatus::Pending | CompetitionStatus::Active
    ) {
        return Err(ApiError::BadRequest(format!(
            "cannot enroll into a {} competition",
            competition.status
        )));
    }
    let enrolled = state.store.participants_in(competition_id).len() as u32;
    if enrolled >= competition.max_participants {
        return Err(ApiError::BadRequest(format!(
            "competition is full ({} participants)",
            competition.max_participants
        )));
    }
    if request.provider.trim().is_empty() || request.model.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "provider and model are required".to_string(),
        ));
    }

    let mut participant = Participant::new(
        competition_id,
        request.name.clone(),
        request.provider.clone(),
        request.model.clone(),
        competition.rules.initial_capital,
    );
    if let Some(config) = request.model_config.clone() {
        participant.model_config = config;
    }
    if let Some(timeout) = request.invocation_timeout_secs {
        participant.invocation_timeout_secs = timeout;
    }

    state.store.insert_participant(participant.clone());
    state
        .portfolios
        .create_portfolio(participant.id, competition.rules.initial_capital);

    info!(
        participant = %participant.name,
        provider = %participant.provider,
        "participant enrolled"
    );
    Ok((StatusCode::CREATED, Json(participant)))
}

pub async fn get_participant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Participant>, ApiError> {
    Ok(Json(state.store.participant(id)?))
}

pub async fn get_portfolio(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Portfolio>, ApiError> {
    Ok(Json(state.store.portfolio_of(id)?))
}

pub async fn get_positions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Position>>, ApiError> {
    state.store.participant(id)?;
    Ok(Json(state.store.positions_of(id)))
}

pub async fn get_trades(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Trade>>, ApiError> {
    state.store.participant(id)?;
    Ok(Json(state.store.trades_of(id)))
}

pub async fn get_invocations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DecisionRecord>>, ApiError> {
    state.store.participant(id)?;
    Ok(Json(state.store.decisions_of(id)))
}

pub async fn get_performance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PortfolioHistoryPoint>>, ApiError> {
    state.store.participant(id)?;
    Ok(Json(state.store.history_of(id)))
}

// ----------------------------------------------------------------------
// Market data
// ----------------------------------------------------------------------

pub async fn get_ohlcv(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<OhlcvQuery>,
) -> Result<Json<Vec<Candle>>, ApiError> {
    let limit = query.limit.min(500);
    state
        .market
        .ohlcv(&symbol, &query.interval, limit)
        .await
        .map(Json)
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

// ----------------------------------------------------------------------
// Internal / admin
// ----------------------------------------------------------------------

pub async fn invoke_participants(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<Value>) {
    state.scheduler.trigger_all_rounds().await;
    (StatusCode::ACCEPTED, Json(json!({ "scheduled": true })))
}

pub async fn trigger_invocation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state.store.participant(id)?;
    let orchestrator = Arc::clone(&state.orchestrator);
    let shutdown = state.scheduler.subscribe_shutdown();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.run_round(id, shutdown).await {
            tracing::error!(participant = %id, error = %e, "manual round failed");
        }
    });
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "participant_id": id, "scheduled": true })),
    ))
}

pub async fn reset_competition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    state.store.reset_competition(id)?;
    info!(competition = %id, "competition reset");
    Ok(Json(json!({ "competition_id": id, "reset": true })))
}
