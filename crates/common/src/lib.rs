//! Common types and utilities for Bookd
//!
//! This crate provides the shared domain vocabulary used across all
//! Bookd crates.
//!
//! # Modules
//!
//! - [`types`] - Shared domain types (Price, Quantity, Side, OrderType, ...)

pub mod types;

pub use types::*;
