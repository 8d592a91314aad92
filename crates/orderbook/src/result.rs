//! Result types for book operations

use common::OrderId;

use crate::trade::Trade;

/// Result of submitting an order to the book.
///
/// An order that fails its admission pre-check (market order against an
/// empty opposite side, fill-and-kill that does not cross, fill-or-kill
/// without enough acceptable volume) is never allocated an id: `order_id`
/// is `None` and `trades` is empty.
#[derive(Debug, Clone)]
pub struct AddResult {
    /// Id assigned to the order, absent when admission failed
    pub order_id: Option<OrderId>,
    /// Trades executed by this order, in execution order
    pub trades: Vec<Trade>,
}

impl AddResult {
    /// The order failed its admission pre-check
    pub fn rejected() -> Self {
        Self {
            order_id: None,
            trades: Vec::new(),
        }
    }

    /// The order was admitted and processed
    pub fn executed(order_id: OrderId, trades: Vec<Trade>) -> Self {
        Self {
            order_id: Some(order_id),
            trades,
        }
    }

    /// Whether the order passed admission
    pub fn is_admitted(&self) -> bool {
        self.order_id.is_some()
    }

    /// Whether any trades were executed
    pub fn has_trades(&self) -> bool {
        !self.trades.is_empty()
    }

    /// Total quantity executed by this order
    pub fn filled_quantity(&self) -> u64 {
        self.trades.iter().map(|t| u64::from(t.quantity)).sum()
    }
}
