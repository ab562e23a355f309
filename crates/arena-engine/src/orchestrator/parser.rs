//! Robust extraction of the decision JSON from a model reply.
//!
//! Agents are asked for bare JSON but routinely wrap it in markdown
//! fences or prose. Extraction tries, in order: fenced code blocks,
//! the first-`{`-to-last-`}` span, then the whole reply. The first
//! candidate that parses AND validates wins.

use rust_decimal::Decimal;
use thiserror::Error;

use arena_common::OrderAction;

use crate::domain::{AgentDecision, AgentOrder};

/// Why a reply failed to parse into a decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no JSON object found in reply: {preview}")]
    NoJson { preview: String },

    #[error("order {index}: {detail}")]
    BadOrder { index: usize, detail: String },
}

/// Parse and validate a model reply into a decision.
pub fn parse_decision(reply: &str) -> Result<AgentDecision, ParseError> {
    let reply = reply.trim();

    for candidate in candidates(reply) {
        if let Ok(decision) = serde_json::from_str::<AgentDecision>(&candidate) {
            validate(&decision)?;
            return Ok(decision);
        }
    }

    Err(ParseError::NoJson {
        preview: preview(reply),
    })
}

/// Candidate JSON spans in extraction order.
fn candidates(reply: &str) -> Vec<String> {
    let mut out = Vec::new();

    // Fenced code blocks: every odd chunk between ``` markers, with an
    // optional `json` language tag stripped.
    if reply.contains("```") {
        for (idx, chunk) in reply.split("```").enumerate() {
            if idx % 2 == 1 {
                let block = chunk.strip_prefix("json").unwrap_or(chunk).trim();
                if !block.is_empty() {
                    out.push(block.to_string());
                }
            }
        }
    }

    // First `{` to last `}`.
    if let (Some(first), Some(last)) = (reply.find('{'), reply.rfind('}')) {
        if last > first {
            out.push(reply[first..=last].to_string());
        }
    }

    // The whole reply, in case it is already clean JSON.
    out.push(reply.to_string());
    out
}

/// Shape validation beyond what serde enforces: open orders must carry
/// side, quantity and leverage; close orders need a target (an explicit
/// position id, or the symbol for the sole-position fallback).
fn validate(decision: &AgentDecision) -> Result<(), ParseError> {
    for (index, order) in decision.orders.iter().enumerate() {
        if order.symbol.trim().is_empty() {
            return Err(ParseError::BadOrder {
                index,
                detail: "symbol is empty".to_string(),
            });
        }
        if order.action == OrderAction::Open {
            validate_open(index, order)?;
        }
    }
    Ok(())
}

fn validate_open(index: usize, order: &AgentOrder) -> Result<(), ParseError> {
    if order.side.is_none() {
        return Err(ParseError::BadOrder {
            index,
            detail: "open order missing side".to_string(),
        });
    }
    match order.quantity {
        None => {
            return Err(ParseError::BadOrder {
                index,
                detail: "open order missing quantity".to_string(),
            })
        }
        Some(q) if q <= Decimal::ZERO => {
            // carried into validation so the rejection is recorded as
            // quantity_non_positive rather than a dead round
        }
        Some(_) => {}
    }
    if order.leverage.is_none() {
        return Err(ParseError::BadOrder {
            index,
            detail: "open order missing leverage".to_string(),
        });
    }
    Ok(())
}

fn preview(reply: &str) -> String {
    const MAX: usize = 200;
    if reply.chars().count() <= MAX {
        reply.to_string()
    } else {
        let cut: String = reply.chars().take(MAX).collect();
        format!("{}…", cut)
    }
}
