//! The trading core: CFD accounting, portfolio aggregation and the
//! order validation/execution pipeline.

pub mod cfd;
pub mod portfolio;
pub mod trading;

pub use cfd::{CfdDelta, CfdEngine, CloseOutcome, OpenOutcome};
pub use portfolio::{PortfolioApply, PortfolioError, PortfolioManager, PortfolioView};
pub use trading::{ExecutionResult, OrderRequest, RejectReason, TradingEngine, TradingError};
