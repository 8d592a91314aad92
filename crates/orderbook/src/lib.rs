//! Order matching engine for Bookd
//!
//! This crate implements a single-instrument limit order book with strict
//! price-time priority.
//!
//! # Features
//!
//! - Two price-ordered ladders (bids descending, asks ascending) with a FIFO
//!   queue per price level
//! - Market, good-till-cancel, good-till-end-of-day, fill-or-kill and
//!   fill-and-kill order types
//! - O(1) cancel via an order index that remembers each order's position in
//!   its level queue
//! - Per-level aggregate bookkeeping (volume and order count) maintained
//!   incrementally, never recomputed
//!
//! # Architecture
//!
//! The book is strictly single-threaded: all operations must be invoked from
//! one owner thread, and none of them blocks or suspends. Concurrency is the
//! caller's problem (in Bookd, per-client SPSC rings feed one matching
//! thread).
//!
//! ## Core components
//!
//! - [`order`] - Order identity and fill progress
//! - [`trade`] - Executed match records
//! - [`level`] - Per-price aggregate bookkeeping
//! - [`book`] - The ladders, the order index, and the matching algorithm

pub mod book;
pub mod error;
pub mod level;
pub mod order;
pub mod result;
pub mod trade;

mod arena;

pub use book::{ModifyRequest, OrderBook};
pub use error::BookError;
pub use level::{LevelData, LevelView};
pub use order::Order;
pub use result::AddResult;
pub use trade::Trade;
