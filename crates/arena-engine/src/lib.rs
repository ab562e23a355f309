//! Arena engine: trading competitions for autonomous language-model
//! agents.
//!
//! Each participant is an agent managing a simulated CFD margin account
//! against live external prices. A scheduler wakes every active agent
//! at its competition's cadence; the orchestrator snapshots the
//! portfolio, builds a prompt, invokes the agent's model, parses the
//! structured decision, and executes the admitted orders through the
//! trading engine. A risk monitor force-flattens any portfolio whose
//! margin level breaches maintenance.
//!
//! ## Modules
//!
//! - `domain`: competitions, participants, portfolios, positions,
//!   orders, trades, decision records
//! - `store`: DashMap-backed entity store (persistence proper is an
//!   external collaborator)
//! - `lanes`: per-participant serial lanes and the one-round-in-flight
//!   guard
//! - `market`: price-lookup capability, Binance adapter, TTL cache
//! - `engine`: CFD accounting, portfolio aggregation, the order
//!   validation/execution pipeline
//! - `orchestrator`: prompt build → model invoke → parse → execute →
//!   record
//! - `scheduler`: price refresh and decision tickers
//! - `risk`: liquidation monitor
//! - `api`: axum REST surface
//! - `config`: TOML + env + CLI configuration

pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod lanes;
pub mod leaderboard;
pub mod market;
pub mod orchestrator;
pub mod risk;
pub mod scheduler;
pub mod store;

pub use config::EngineConfig;
pub use engine::{
    CfdDelta, CfdEngine, ExecutionResult, OrderRequest, PortfolioApply, PortfolioManager,
    RejectReason, TradingEngine,
};
pub use lanes::ParticipantLanes;
pub use orchestrator::DecisionOrchestrator;
pub use risk::RiskMonitor;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use store::MemoryStore;
