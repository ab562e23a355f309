//! Shared types and calculation primitives for the agent-arena trading
//! competition engine.
//!
//! CRITICAL: All prices, quantities and money amounts use
//! `rust_decimal::Decimal`. NEVER use f64 for financial math.

pub mod calc;
pub mod types;

pub use calc::{CalcError, AMOUNT_SCALE, PCT_SCALE};
pub use types::{
    AssetClass, CompetitionStatus, DecisionStatus, OrderAction, OrderSide, OrderStatus,
    ParticipantStatus, PositionSide,
};
