//! Executed match records

use common::{OrderId, Price, Quantity};
use serde::{Deserialize, Serialize};

/// One match between a resting (maker) order and an arriving (taker) order.
///
/// Produced only inside matching, in execution order. The price is always
/// the maker's resting price, never the taker's limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Order that was resting on the book
    pub maker_order_id: OrderId,
    /// Order that initiated the match
    pub taker_order_id: OrderId,
    /// Quantity exchanged
    pub quantity: Quantity,
    /// Execution price (the maker's resting price)
    pub price: Price,
}

impl Trade {
    /// Record a new trade
    pub fn new(
        maker_order_id: OrderId,
        taker_order_id: OrderId,
        quantity: Quantity,
        price: Price,
    ) -> Self {
        Self {
            maker_order_id,
            taker_order_id,
            quantity,
            price,
        }
    }
}
