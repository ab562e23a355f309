//! Decision orchestrator: one end-to-end agent round.
//!
//! `Idle → Building → Invoking → Parsing → Executing → Recording`,
//! short-circuiting to Recording on any terminal failure. The
//! participant's lane is held for snapshot+build and for
//! execute+record; it is NOT held during the model invocation.

mod parser;
mod prompt;
mod round;

pub use parser::{parse_decision, ParseError};
pub use prompt::{BuiltPrompt, PromptBuilder, PromptInputs, SAFETY_BUFFER_PCT};
pub use round::{DecisionOrchestrator, OrchestratorError};
