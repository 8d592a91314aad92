//! Order identity and fill progress

use common::{Micros, OrderId, OrderType, Price, Quantity, Side};

use crate::error::BookError;

/// A single client order.
///
/// Identity (id, price, type, side, open time) is immutable after
/// construction; only the remaining quantity changes, and only through
/// [`Order::fill`]. The book assigns `order_id` and `open_time` at admission;
/// callers never pick either.
#[derive(Debug, Clone)]
pub struct Order {
    order_id: OrderId,
    initial_quantity: Quantity,
    remaining_quantity: Quantity,
    price: Price,
    order_type: OrderType,
    side: Side,
    open_time: Micros,
}

impl Order {
    /// Create a new order. Rejects zero quantity.
    pub(crate) fn new(
        order_id: OrderId,
        quantity: Quantity,
        price: Price,
        order_type: OrderType,
        side: Side,
        open_time: Micros,
    ) -> Result<Self, BookError> {
        if quantity == 0 {
            return Err(BookError::InvalidQuantity);
        }

        Ok(Self {
            order_id,
            initial_quantity: quantity,
            remaining_quantity: quantity,
            price,
            order_type,
            side,
            open_time,
        })
    }

    /// Order id assigned by the book
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// Quantity the order was admitted with
    pub fn initial_quantity(&self) -> Quantity {
        self.initial_quantity
    }

    /// Quantity still open
    pub fn remaining_quantity(&self) -> Quantity {
        self.remaining_quantity
    }

    /// Limit price (sentinel for market orders)
    pub fn price(&self) -> Price {
        self.price
    }

    /// Order type
    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    /// Order side
    pub fn side(&self) -> Side {
        self.side
    }

    /// Admission time in microseconds since book construction
    pub fn open_time(&self) -> Micros {
        self.open_time
    }

    /// Quantity executed so far
    pub fn filled(&self) -> Quantity {
        self.initial_quantity - self.remaining_quantity
    }

    /// True once nothing is left to execute
    pub fn is_fully_filled(&self) -> bool {
        self.remaining_quantity == 0
    }

    /// Execute `quantity` against this order.
    ///
    /// Fails with [`BookError::InvalidFill`] if `quantity` exceeds the
    /// remaining quantity; the order is unchanged in that case.
    pub(crate) fn fill(&mut self, quantity: Quantity) -> Result<(), BookError> {
        if quantity > self.remaining_quantity {
            return Err(BookError::InvalidFill {
                requested: quantity,
                remaining: self.remaining_quantity,
            });
        }

        self.remaining_quantity -= quantity;
        Ok(())
    }
}
