//! Shared enums for the competition engine.

use serde::{Deserialize, Serialize};

/// Instrument class an order or position belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Crypto,
    Stocks,
    Indices,
    Commodities,
}

impl AssetClass {
    /// Classify a trading symbol. Everything quoted in USDT is crypto;
    /// the remaining classes are reserved for future venue adapters.
    pub fn of_symbol(symbol: &str) -> Self {
        if symbol.to_uppercase().ends_with("USDT") {
            AssetClass::Crypto
        } else {
            AssetClass::Stocks
        }
    }

    /// Whether the venue for this class trades around the clock.
    pub fn trades_around_the_clock(&self) -> bool {
        matches!(self, AssetClass::Crypto)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Crypto => "crypto",
            AssetClass::Stocks => "stocks",
            AssetClass::Indices => "indices",
            AssetClass::Commodities => "commodities",
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crypto" => Ok(AssetClass::Crypto),
            "stocks" | "equities" => Ok(AssetClass::Stocks),
            "indices" => Ok(AssetClass::Indices),
            "commodities" => Ok(AssetClass::Commodities),
            _ => Err(format!("Unknown asset class: {}", s)),
        }
    }
}

/// Order side as the agent expresses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// Position direction a new order of this side opens.
    pub fn position_side(&self) -> PositionSide {
        match self {
            OrderSide::Buy => PositionSide::Long,
            OrderSide::Sell => PositionSide::Short,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Direction of an open CFD leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Order side that closes a position of this direction.
    pub fn closing_order_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

/// Action an agent order requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderAction {
    Open,
    Close,
}

impl std::fmt::Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderAction::Open => write!(f, "open"),
            OrderAction::Close => write!(f, "close"),
        }
    }
}

/// Lifecycle of a competition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl std::fmt::Display for CompetitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompetitionStatus::Pending => "pending",
            CompetitionStatus::Active => "active",
            CompetitionStatus::Completed => "completed",
            CompetitionStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Active,
    Liquidated,
    Disqualified,
    Withdrawn,
}

impl ParticipantStatus {
    /// Terminal states accept no further orders or decision rounds.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ParticipantStatus::Active)
    }
}

impl std::fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParticipantStatus::Active => "active",
            ParticipantStatus::Liquidated => "liquidated",
            ParticipantStatus::Disqualified => "disqualified",
            ParticipantStatus::Withdrawn => "withdrawn",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle of an order. An order reaches either `Executed` or
/// `Rejected`, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Rejected,
    Executed,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Executed => "executed",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one decision round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Success,
    Timeout,
    TransportError,
    InvalidResponse,
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DecisionStatus::Success => "success",
            DecisionStatus::Timeout => "timeout",
            DecisionStatus::TransportError => "transport_error",
            DecisionStatus::InvalidResponse => "invalid_response",
        };
        write!(f, "{}", s)
    }
}
