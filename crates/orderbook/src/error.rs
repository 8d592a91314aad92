//! Matching engine error types

use common::{OrderId, Quantity};
use thiserror::Error;

/// Errors returned by book operations.
///
/// All of these are client-attributable: the operation is rejected and the
/// book is left untouched. Internal invariant breaches are not represented
/// here; they are debug assertions.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookError {
    /// Order quantity was zero
    #[error("invalid quantity: quantity must be greater than zero")]
    InvalidQuantity,

    /// Order id is not resting on the book (already filled, already
    /// cancelled, or never admitted)
    #[error("unknown order: {0}")]
    UnknownOrder(OrderId),

    /// A fill was requested for more than the order has remaining
    #[error("invalid fill: requested {requested} exceeds remaining {remaining}")]
    InvalidFill {
        /// Quantity the caller asked to fill
        requested: Quantity,
        /// Quantity the order actually has left
        remaining: Quantity,
    },
}
