//! REST surface tests: the shared-secret gate and the main CRUD flows.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use arena_engine::api::{self, AppState};
use arena_engine::engine::{PortfolioManager, TradingEngine};
use arena_engine::lanes::ParticipantLanes;
use arena_engine::market::{MarketData, PriceCache, ScriptedMarketData};
use arena_engine::orchestrator::DecisionOrchestrator;
use arena_engine::risk::RiskMonitor;
use arena_engine::scheduler::{Scheduler, SchedulerConfig};
use arena_engine::store::MemoryStore;
use arena_llm::{ProviderRegistry, StaticClient};

const API_KEY: &str = "test-secret";

fn app() -> (Router, Arc<AppState>) {
    let store = Arc::new(MemoryStore::new());
    let lanes = Arc::new(ParticipantLanes::new());
    let venue = Arc::new(ScriptedMarketData::new());
    let market: Arc<dyn MarketData> = venue;
    let prices = Arc::new(PriceCache::new(Arc::clone(&market), Duration::from_secs(60)));
    let portfolios = PortfolioManager::new(Arc::clone(&store));
    let trading = Arc::new(TradingEngine::new(
        Arc::clone(&store),
        portfolios.clone(),
        Arc::clone(&prices),
    ));
    let models = Arc::new(ProviderRegistry::static_only(StaticClient::always(
        r#"{"decision": "hold", "reasoning": ""}"#,
    )));
    let orchestrator = Arc::new(DecisionOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&lanes),
        Arc::clone(&trading),
        Arc::clone(&prices),
        models,
    ));
    let risk = Arc::new(RiskMonitor::new(
        Arc::clone(&store),
        Arc::clone(&lanes),
        trading,
    ));
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&store),
        lanes,
        portfolios.clone(),
        Arc::clone(&orchestrator),
        prices,
        risk,
        SchedulerConfig {
            enabled: false,
            ..SchedulerConfig::default()
        },
    ));

    let state = Arc::new(AppState {
        store,
        portfolios,
        scheduler,
        orchestrator,
        market,
        api_key: API_KEY.to_string(),
    });
    (api::router(Arc::clone(&state)), state)
}

fn post_json(uri: &str, body: Value, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn competition_body() -> Value {
    json!({
        "name": "summer-arena",
        "start_time": "2030-01-01T00:00:00Z",
        "end_time": "2030-01-08T00:00:00Z",
        "invocation_interval_minutes": 5,
        "initial_capital": 10000,
    })
}

#[tokio::test]
async fn health_is_open() {
    let (app, _) = app();
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn mutating_route_without_key_is_422() {
    let (app, _) = app();
    let response = app
        .oneshot(post_json("/competitions", competition_body(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn mutating_route_with_wrong_key_is_401() {
    let (app, _) = app();
    let response = app
        .oneshot(post_json(
            "/competitions",
            competition_body(),
            Some("wrong"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reads_are_open() {
    let (app, _) = app();
    let response = app.oneshot(get("/competitions")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_competition_round_trip() {
    let (app, state) = app();
    let response = app
        .clone()
        .oneshot(post_json(
            "/competitions",
            competition_body(),
            Some(API_KEY),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["name"], "summer-arena");
    assert_eq!(created["status"], "pending");

    let id = created["id"].as_str().unwrap();
    let response = app
        .oneshot(get(&format!("/competitions/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.store.competitions().len(), 1);
}

#[tokio::test]
async fn create_competition_rejects_inverted_window() {
    let (app, _) = app();
    let body = json!({
        "name": "bad",
        "start_time": "2030-01-08T00:00:00Z",
        "end_time": "2030-01-01T00:00:00Z",
    });
    let response = app
        .oneshot(post_json("/competitions", body, Some(API_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn enroll_participant_and_read_portfolio() {
    let (app, _) = app();
    let created = body_json(
        app.clone()
            .oneshot(post_json(
                "/competitions",
                competition_body(),
                Some(API_KEY),
            ))
            .await
            .unwrap(),
    )
    .await;
    let competition_id = created["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/competitions/{}/participants", competition_id),
            json!({
                "name": "claude",
                "provider": "static",
                "model": "static-model",
                "invocation_timeout_secs": 60,
            }),
            Some(API_KEY),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let participant = body_json(response).await;
    assert_eq!(participant["status"], "active");
    let participant_id = participant["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/participants/{}/portfolio", participant_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let portfolio = body_json(response).await;
    let cash: rust_decimal::Decimal =
        portfolio["cash_balance"].as_str().unwrap().parse().unwrap();
    assert_eq!(cash, rust_decimal_macros::dec!(10000));

    let response = app
        .oneshot(get(&format!(
            "/competitions/{}/leaderboard",
            competition_id
        )))
        .await
        .unwrap();
    let board = body_json(response).await;
    assert_eq!(board.as_array().unwrap().len(), 1);
    assert_eq!(board[0]["rank"], 1);
}

#[tokio::test]
async fn unknown_participant_is_404() {
    let (app, _) = app();
    let response = app
        .oneshot(get(
            "/participants/9f8b7c3a-2e4d-4f6a-8b1c-0d2e4f6a8b1c/portfolio",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reset_competition_requires_key_and_resets() {
    let (app, state) = app();
    let created = body_json(
        app.clone()
            .oneshot(post_json(
                "/competitions",
                competition_body(),
                Some(API_KEY),
            ))
            .await
            .unwrap(),
    )
    .await;
    let competition_id = created["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/internal/reset-competition/{}", competition_id),
            json!({}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .oneshot(post_json(
            &format!("/internal/reset-competition/{}", competition_id),
            json!({}),
            Some(API_KEY),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.store.competitions().len(), 1);
}
