//! Common types used across Bookd
//!
//! This module provides the fundamental domain types shared by the
//! matching engine, the wire codec, and the server.

use serde::{Deserialize, Serialize};

/// Limit price in integer ticks. Signed so spreads and deltas stay in-domain.
pub type Price = i32;

/// Order quantity in whole units
pub type Quantity = u32;

/// Unique identifier for orders, assigned sequentially by the book
pub type OrderId = u64;

/// Unique identifier for client connections
pub type ConnectionId = u64;

/// Microseconds relative to book construction
pub type Micros = u64;

/// Sentinel price carried by market orders; never consulted during matching
pub const MARKET_PRICE: Price = 0;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl Side {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Returns true if this is a buy order
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    /// Returns true if this is a sell order
    pub fn is_sell(&self) -> bool {
        matches!(self, Side::Sell)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Order type, determining admission policy and whether a remainder rests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Market order - execute immediately against the opposite side, no limit
    Market,
    /// Limit order that rests until filled or cancelled
    GoodTillCancel,
    /// Limit order that rests until filled, cancelled, or end of day.
    /// The book treats this as a label; expiry is driven externally.
    GoodTillEod,
    /// Limit order that must fill completely and immediately or not at all
    FillOrKill,
    /// Limit order that fills what it can immediately; the remainder is
    /// discarded rather than rested
    FillAndKill,
}

impl OrderType {
    /// Whether a partially filled remainder of this type rests on the book
    pub fn can_rest(&self) -> bool {
        matches!(self, OrderType::GoodTillCancel | OrderType::GoodTillEod)
    }

    /// Whether this type carries a meaningful limit price
    pub fn has_limit(&self) -> bool {
        !matches!(self, OrderType::Market)
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::GoodTillCancel => write!(f, "good_till_cancel"),
            OrderType::GoodTillEod => write!(f, "good_till_eod"),
            OrderType::FillOrKill => write!(f, "fill_or_kill"),
            OrderType::FillAndKill => write!(f, "fill_and_kill"),
        }
    }
}
