//! The order book and matching algorithm
//!
//! Two price-ordered ladders (bids descending, asks ascending) hold a FIFO
//! queue per price level. Matching is taker-initiated and single-pass: the
//! arriving order walks the opposite ladder from the best price outward,
//! executing against the oldest resting order at each level. Trades execute
//! at the resting (maker) price, never the taker's limit.
//!
//! The book is not thread-safe. All operations must be invoked from one
//! owner thread; in Bookd that is the matching thread draining the
//! per-client rings.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use common::{Micros, OrderId, OrderType, Price, Quantity, Side, MARKET_PRICE};
use tracing::{debug, info};

use crate::arena::{FifoQueue, NodeIndex, OrderArena};
use crate::error::BookError;
use crate::level::{LevelBook, LevelView};
use crate::order::Order;
use crate::result::AddResult;
use crate::trade::Trade;

/// Field changes for [`OrderBook::modify`].
///
/// Unspecified fields keep the resting order's current values; quantity
/// defaults to the *remaining* quantity, not the initial one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifyRequest {
    /// New limit price
    pub price: Option<Price>,
    /// New quantity
    pub quantity: Option<Quantity>,
    /// New order type
    pub order_type: Option<OrderType>,
    /// New side
    pub side: Option<Side>,
}

/// Monotonic microsecond clock for admission timestamps.
///
/// Strictly increasing across calls: a burst of admissions inside one
/// microsecond is disambiguated by bumping, so no two orders ever share an
/// open time.
#[derive(Debug)]
struct BookClock {
    base: Instant,
    last: Micros,
}

impl BookClock {
    fn new() -> Self {
        Self {
            base: Instant::now(),
            last: 0,
        }
    }

    fn next(&mut self) -> Micros {
        let elapsed = self.base.elapsed().as_micros() as Micros;
        self.last = elapsed.max(self.last + 1);
        self.last
    }
}

/// Single-instrument limit order book with price-time priority.
///
/// # Example
///
/// ```
/// use common::{OrderType, Side};
/// use orderbook::OrderBook;
///
/// let mut book = OrderBook::new();
/// let resting = book.add(5, 100, OrderType::GoodTillCancel, Side::Buy).unwrap();
/// let taker = book.add(2, 100, OrderType::GoodTillCancel, Side::Sell).unwrap();
///
/// assert_eq!(taker.trades.len(), 1);
/// assert_eq!(taker.trades[0].maker_order_id, resting.order_id.unwrap());
/// assert_eq!(book.best_bid(), Some(100));
/// ```
#[derive(Debug)]
pub struct OrderBook {
    /// Sell ladder, best (lowest) price first
    asks: BTreeMap<Price, FifoQueue>,
    /// Buy ladder, best (highest) price first
    bids: BTreeMap<Reverse<Price>, FifoQueue>,
    /// Per-price aggregates, shared by both sides
    levels: LevelBook,
    /// Resting order id -> arena position
    orders: HashMap<OrderId, NodeIndex>,
    arena: OrderArena,
    last_order_id: OrderId,
    clock: BookClock,
}

impl OrderBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self {
            asks: BTreeMap::new(),
            bids: BTreeMap::new(),
            levels: LevelBook::new(),
            orders: HashMap::new(),
            arena: OrderArena::new(),
            last_order_id: 0,
            clock: BookClock::new(),
        }
    }

    /// Submit a new order.
    ///
    /// The order is processed under its type's admission policy and the
    /// executed trades are returned in execution order. Orders that fail
    /// their admission pre-check are never allocated an id.
    ///
    /// # Errors
    ///
    /// [`BookError::InvalidQuantity`] if `quantity` is zero; the book is
    /// unchanged.
    pub fn add(
        &mut self,
        quantity: Quantity,
        price: Price,
        order_type: OrderType,
        side: Side,
    ) -> Result<AddResult, BookError> {
        if quantity == 0 {
            return Err(BookError::InvalidQuantity);
        }

        // Market orders have no limit; whatever price the caller sent is
        // replaced by the sentinel.
        let price = if order_type.has_limit() {
            price
        } else {
            MARKET_PRICE
        };

        let admitted = match order_type {
            OrderType::Market => !self.side_is_empty(side.opposite()),
            OrderType::FillAndKill => self.crosses_spread(price, side),
            OrderType::FillOrKill => self.can_fill_fully(price, quantity, side),
            OrderType::GoodTillCancel | OrderType::GoodTillEod => true,
        };

        if !admitted {
            debug!(
                side = %side,
                order_type = %order_type,
                price,
                quantity,
                "Order failed admission pre-check"
            );
            return Ok(AddResult::rejected());
        }

        self.last_order_id += 1;
        let order_id = self.last_order_id;
        let open_time = self.clock.next();
        let order = Order::new(order_id, quantity, price, order_type, side, open_time)?;

        let trades = self.match_order(order);

        info!(
            order_id,
            side = %side,
            order_type = %order_type,
            price,
            quantity,
            trades = trades.len(),
            "Order processed"
        );

        Ok(AddResult::executed(order_id, trades))
    }

    /// Remove a resting order from the book.
    ///
    /// # Errors
    ///
    /// [`BookError::UnknownOrder`] if the id is not resting (already filled,
    /// already cancelled, or never admitted); the book is unchanged.
    pub fn cancel(&mut self, order_id: OrderId) -> Result<(), BookError> {
        let index = self
            .orders
            .remove(&order_id)
            .ok_or(BookError::UnknownOrder(order_id))?;

        self.remove_resting(index);

        info!(order_id, "Order cancelled");
        Ok(())
    }

    /// Replace a resting order: cancel it, then add a new order with the
    /// merged fields. The new order receives a fresh id and open time, so
    /// time priority is lost even when nothing changes.
    ///
    /// # Errors
    ///
    /// [`BookError::UnknownOrder`] if the id is not resting;
    /// [`BookError::InvalidQuantity`] if the merged quantity is zero. Either
    /// way the book is unchanged.
    pub fn modify(
        &mut self,
        order_id: OrderId,
        changes: ModifyRequest,
    ) -> Result<AddResult, BookError> {
        let index = *self
            .orders
            .get(&order_id)
            .ok_or(BookError::UnknownOrder(order_id))?;

        let (quantity, price, order_type, side) = {
            let existing = self.arena.get(index);
            (
                changes.quantity.unwrap_or(existing.remaining_quantity()),
                changes.price.unwrap_or(existing.price()),
                changes.order_type.unwrap_or(existing.order_type()),
                changes.side.unwrap_or(existing.side()),
            )
        };

        // Validated before the cancel so a bad quantity leaves the book
        // untouched.
        if quantity == 0 {
            return Err(BookError::InvalidQuantity);
        }

        self.orders.remove(&order_id);
        self.remove_resting(index);

        debug!(order_id, "Order replaced");
        self.add(quantity, price, order_type, side)
    }

    /// Highest resting buy price
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.keys().next().map(|key| key.0)
    }

    /// Lowest resting sell price
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.keys().next().copied()
    }

    /// Bid depth in matching-priority order (prices descending)
    pub fn full_depth_bid(&self) -> Vec<LevelView> {
        self.bids
            .keys()
            .map(|&Reverse(price)| {
                self.levels
                    .view(price)
                    .expect("level data exists for every ladder level")
            })
            .collect()
    }

    /// Ask depth in matching-priority order (prices ascending)
    pub fn full_depth_ask(&self) -> Vec<LevelView> {
        self.asks
            .keys()
            .map(|&price| {
                self.levels
                    .view(price)
                    .expect("level data exists for every ladder level")
            })
            .collect()
    }

    /// Number of resting orders across both sides
    pub fn resting_orders(&self) -> usize {
        self.orders.len()
    }

    /// True when nothing rests on either side
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Match `order` against the opposite ladder, then rest any remainder if
    /// its type allows. Fill-and-kill and market remainders are discarded;
    /// fill-or-kill cannot have one by construction.
    fn match_order(&mut self, mut order: Order) -> Vec<Trade> {
        let trades = match order.side() {
            Side::Buy => self.match_against_asks(&mut order),
            Side::Sell => self.match_against_bids(&mut order),
        };

        if !order.is_fully_filled() && order.order_type().can_rest() {
            self.rest(order);
        }

        trades
    }

    fn match_against_asks(&mut self, taker: &mut Order) -> Vec<Trade> {
        let mut trades = Vec::new();
        let limit = taker.order_type().has_limit().then(|| taker.price());

        while !taker.is_fully_filled() {
            let Some((&level_price, _)) = self.asks.iter().next() else {
                break;
            };
            if limit.is_some_and(|limit| level_price > limit) {
                break;
            }

            let queue = self
                .asks
                .get_mut(&level_price)
                .expect("best ask level exists");

            while !taker.is_fully_filled() {
                let Some(maker_index) = queue.front() else {
                    break;
                };

                let maker = self.arena.get_mut(maker_index);
                let maker_id = maker.order_id();
                let quantity = taker.remaining_quantity().min(maker.remaining_quantity());

                maker.fill(quantity).expect("fill clamped to maker remaining");
                let maker_done = maker.is_fully_filled();
                taker.fill(quantity).expect("fill clamped to taker remaining");

                trades.push(Trade::new(maker_id, taker.order_id(), quantity, level_price));
                self.levels.apply_fill(level_price, quantity, maker_done);

                if maker_done {
                    queue.pop_front(&mut self.arena);
                    self.arena.remove(maker_index);
                    self.orders.remove(&maker_id);
                }
            }

            let exhausted = queue.is_empty();
            if exhausted {
                self.asks.remove(&level_price);
            }
        }

        trades
    }

    fn match_against_bids(&mut self, taker: &mut Order) -> Vec<Trade> {
        let mut trades = Vec::new();
        let limit = taker.order_type().has_limit().then(|| taker.price());

        while !taker.is_fully_filled() {
            let Some((&Reverse(level_price), _)) = self.bids.iter().next() else {
                break;
            };
            if limit.is_some_and(|limit| level_price < limit) {
                break;
            }

            let queue = self
                .bids
                .get_mut(&Reverse(level_price))
                .expect("best bid level exists");

            while !taker.is_fully_filled() {
                let Some(maker_index) = queue.front() else {
                    break;
                };

                let maker = self.arena.get_mut(maker_index);
                let maker_id = maker.order_id();
                let quantity = taker.remaining_quantity().min(maker.remaining_quantity());

                maker.fill(quantity).expect("fill clamped to maker remaining");
                let maker_done = maker.is_fully_filled();
                taker.fill(quantity).expect("fill clamped to taker remaining");

                trades.push(Trade::new(maker_id, taker.order_id(), quantity, level_price));
                self.levels.apply_fill(level_price, quantity, maker_done);

                if maker_done {
                    queue.pop_front(&mut self.arena);
                    self.arena.remove(maker_index);
                    self.orders.remove(&maker_id);
                }
            }

            let exhausted = queue.is_empty();
            if exhausted {
                self.bids.remove(&Reverse(level_price));
            }
        }

        trades
    }

    /// Rest a partially filled or untouched order at its own price
    fn rest(&mut self, order: Order) {
        let order_id = order.order_id();
        let price = order.price();
        let initial = order.initial_quantity();
        let remaining = order.remaining_quantity();
        let side = order.side();

        let index = self.arena.insert(order);
        match side {
            Side::Buy => self
                .bids
                .entry(Reverse(price))
                .or_default()
                .push_back(&mut self.arena, index),
            Side::Sell => self
                .asks
                .entry(price)
                .or_default()
                .push_back(&mut self.arena, index),
        }

        self.orders.insert(order_id, index);
        self.levels.add_at(price, remaining);

        debug!(order_id, price, initial, remaining, side = %side, "Order resting");
    }

    /// Unlink a resting order from its queue, drop its level contribution,
    /// and return it. The caller has already removed it from the index.
    fn remove_resting(&mut self, index: NodeIndex) -> Order {
        let (price, side) = {
            let order = self.arena.get(index);
            (order.price(), order.side())
        };

        match side {
            Side::Buy => {
                let queue = self
                    .bids
                    .get_mut(&Reverse(price))
                    .expect("resting order has a level queue");
                queue.unlink(&mut self.arena, index);
                let exhausted = queue.is_empty();
                if exhausted {
                    self.bids.remove(&Reverse(price));
                }
            }
            Side::Sell => {
                let queue = self
                    .asks
                    .get_mut(&price)
                    .expect("resting order has a level queue");
                queue.unlink(&mut self.arena, index);
                let exhausted = queue.is_empty();
                if exhausted {
                    self.asks.remove(&price);
                }
            }
        }

        let order = self.arena.remove(index);
        self.levels.remove_at(price, order.remaining_quantity());
        order
    }

    /// Whether a side's ladder has no resting orders
    fn side_is_empty(&self, side: Side) -> bool {
        match side {
            Side::Buy => self.bids.is_empty(),
            Side::Sell => self.asks.is_empty(),
        }
    }

    /// Whether a limit order at `price` is immediately executable
    fn crosses_spread(&self, price: Price, side: Side) -> bool {
        match side {
            Side::Buy => self.best_ask().is_some_and(|ask| ask <= price),
            Side::Sell => self.best_bid().is_some_and(|bid| price <= bid),
        }
    }

    /// Fill-or-kill pre-check: accumulate opposite-side volume from the best
    /// level outward while the price is acceptable, O(levels walked).
    fn can_fill_fully(&self, price: Price, quantity: Quantity, side: Side) -> bool {
        if !self.crosses_spread(price, side) {
            return false;
        }

        let mut needed = u64::from(quantity);
        match side {
            Side::Buy => {
                for &level_price in self.asks.keys() {
                    if level_price > price {
                        break;
                    }
                    let level = self
                        .levels
                        .get(level_price)
                        .expect("level data exists for every ladder level");
                    if needed <= level.volume {
                        return true;
                    }
                    needed -= level.volume;
                }
            }
            Side::Sell => {
                for &Reverse(level_price) in self.bids.keys() {
                    if level_price < price {
                        break;
                    }
                    let level = self
                        .levels
                        .get(level_price)
                        .expect("level data exists for every ladder level");
                    if needed <= level.volume {
                        return true;
                    }
                    needed -= level.volume;
                }
            }
        }

        false
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    /// Add an order that must be admitted, returning its id
    fn add(
        book: &mut OrderBook,
        quantity: Quantity,
        price: Price,
        order_type: OrderType,
        side: Side,
    ) -> (OrderId, Vec<Trade>) {
        let result = book.add(quantity, price, order_type, side).unwrap();
        (result.order_id.expect("order admitted"), result.trades)
    }

    fn gtc(book: &mut OrderBook, quantity: Quantity, price: Price, side: Side) -> OrderId {
        add(book, quantity, price, OrderType::GoodTillCancel, side).0
    }

    fn level(price: Price, volume: u64, order_count: u32) -> LevelView {
        LevelView {
            price,
            volume,
            order_count,
        }
    }

    /// Check every cross-structure invariant the book promises between
    /// operations.
    fn assert_invariants(book: &OrderBook) {
        if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
            assert!(bid < ask, "book rests crossing orders: {bid} >= {ask}");
        }

        let mut resting = 0usize;
        for (&price, queue) in &book.asks {
            let volume: u64 = queue
                .iter(&book.arena)
                .map(|o| u64::from(o.remaining_quantity()))
                .sum();
            let count = queue.iter(&book.arena).count() as u32;
            assert!(count > 0, "empty ask queue left at {price}");
            assert_eq!(queue.len(), count);

            let data = book.levels.get(price).expect("level data for ask level");
            assert_eq!(data.volume, volume, "ask volume mismatch at {price}");
            assert_eq!(data.order_count, count, "ask count mismatch at {price}");

            let mut last_time = 0;
            for order in queue.iter(&book.arena) {
                assert_eq!(order.side(), Side::Sell);
                assert_eq!(order.price(), price);
                assert!(order.remaining_quantity() > 0);
                assert!(order.open_time() > last_time, "FIFO order broken");
                last_time = order.open_time();
                assert!(book.orders.contains_key(&order.order_id()));
                resting += 1;
            }
        }
        for (&Reverse(price), queue) in &book.bids {
            let volume: u64 = queue
                .iter(&book.arena)
                .map(|o| u64::from(o.remaining_quantity()))
                .sum();
            let count = queue.iter(&book.arena).count() as u32;
            assert!(count > 0, "empty bid queue left at {price}");
            assert_eq!(queue.len(), count);

            let data = book.levels.get(price).expect("level data for bid level");
            assert_eq!(data.volume, volume, "bid volume mismatch at {price}");
            assert_eq!(data.order_count, count, "bid count mismatch at {price}");

            let mut last_time = 0;
            for order in queue.iter(&book.arena) {
                assert_eq!(order.side(), Side::Buy);
                assert_eq!(order.price(), price);
                assert!(order.remaining_quantity() > 0);
                assert!(order.open_time() > last_time, "FIFO order broken");
                last_time = order.open_time();
                assert!(book.orders.contains_key(&order.order_id()));
                resting += 1;
            }
        }

        assert_eq!(book.orders.len(), resting, "order index out of sync");
        assert_eq!(book.arena.len(), resting, "arena out of sync");
    }

    #[test]
    fn test_empty_book() {
        let book = OrderBook::new();
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
        assert!(book.full_depth_bid().is_empty());
        assert!(book.full_depth_ask().is_empty());
        assert!(book.is_empty());
    }

    #[test]
    fn test_single_bid() {
        let mut book = OrderBook::new();
        gtc(&mut book, 1, 100, Side::Buy);

        assert_eq!(book.best_bid(), Some(100));
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.full_depth_bid(), vec![level(100, 1, 1)]);
        assert_invariants(&book);
    }

    #[test]
    fn test_fifo_priority_within_level() {
        let mut book = OrderBook::new();
        let first = gtc(&mut book, 1, 100, Side::Buy);
        let second = gtc(&mut book, 1, 100, Side::Buy);

        let (taker, trades) = add(&mut book, 1, MARKET_PRICE, OrderType::Market, Side::Sell);

        assert_eq!(
            trades,
            vec![Trade::new(first, taker, 1, 100)],
            "oldest resting order matches first"
        );
        assert!(book.cancel(first).is_err(), "first order fully filled");
        assert!(book.orders.contains_key(&second));
        assert_eq!(book.full_depth_bid(), vec![level(100, 1, 1)]);
        assert_invariants(&book);
    }

    #[test]
    fn test_multi_level_depth_layout() {
        let mut book = OrderBook::new();
        gtc(&mut book, 1, 100, Side::Buy);
        gtc(&mut book, 2, 101, Side::Buy);
        gtc(&mut book, 3, 102, Side::Sell);
        gtc(&mut book, 4, 103, Side::Sell);

        assert_eq!(book.best_bid(), Some(101));
        assert_eq!(book.best_ask(), Some(102));
        assert_eq!(
            book.full_depth_bid(),
            vec![level(101, 2, 1), level(100, 1, 1)]
        );
        assert_eq!(
            book.full_depth_ask(),
            vec![level(102, 3, 1), level(103, 4, 1)]
        );
        assert_invariants(&book);
    }

    #[test]
    fn test_marketable_limit_sweeps_level() {
        let mut book = OrderBook::new();
        gtc(&mut book, 1, 100, Side::Buy);
        gtc(&mut book, 2, 101, Side::Buy);
        let ask = gtc(&mut book, 3, 102, Side::Sell);
        gtc(&mut book, 4, 103, Side::Sell);

        let (taker, trades) = add(&mut book, 3, 102, OrderType::GoodTillCancel, Side::Buy);

        assert_eq!(trades, vec![Trade::new(ask, taker, 3, 102)]);
        assert_eq!(book.best_ask(), Some(103), "level 102 erased");
        assert_eq!(
            book.full_depth_bid(),
            vec![level(101, 2, 1), level(100, 1, 1)],
            "bid side untouched"
        );
        assert!(
            !book.orders.contains_key(&taker),
            "fully filled taker does not rest"
        );
        assert_invariants(&book);
    }

    #[test]
    fn test_cancel_of_filled_order_is_unknown() {
        let mut book = OrderBook::new();
        let ask = gtc(&mut book, 3, 102, Side::Sell);
        add(&mut book, 3, 102, OrderType::GoodTillCancel, Side::Buy);

        assert_eq!(book.cancel(ask), Err(BookError::UnknownOrder(ask)));
        assert_invariants(&book);
    }

    #[test]
    fn test_modify_relocates_level() {
        let mut book = OrderBook::new();
        let original = gtc(&mut book, 5, 100, Side::Buy);

        let result = book
            .modify(
                original,
                ModifyRequest {
                    price: Some(200),
                    ..Default::default()
                },
            )
            .unwrap();
        let replacement = result.order_id.unwrap();

        assert_ne!(replacement, original);
        assert_eq!(book.full_depth_bid(), vec![level(200, 5, 1)]);
        assert_eq!(
            book.cancel(original),
            Err(BookError::UnknownOrder(original)),
            "old id no longer recognized"
        );
        assert_invariants(&book);
    }

    #[test]
    fn test_market_order_with_empty_opposite_side_not_admitted() {
        let mut book = OrderBook::new();
        gtc(&mut book, 1, 100, Side::Buy);

        let result = book.add(1, MARKET_PRICE, OrderType::Market, Side::Buy).unwrap();
        assert!(!result.is_admitted());
        assert!(!result.has_trades());
        assert_invariants(&book);
    }

    #[test]
    fn test_market_order_walks_levels_and_discards_remainder() {
        let mut book = OrderBook::new();
        let a = gtc(&mut book, 2, 102, Side::Sell);
        let b = gtc(&mut book, 3, 103, Side::Sell);

        let (taker, trades) = add(&mut book, 10, MARKET_PRICE, OrderType::Market, Side::Buy);

        assert_eq!(
            trades,
            vec![Trade::new(a, taker, 2, 102), Trade::new(b, taker, 3, 103)]
        );
        assert_eq!(book.best_ask(), None, "ask side exhausted");
        assert!(
            !book.orders.contains_key(&taker),
            "market remainder discarded"
        );
        assert_invariants(&book);
    }

    #[test]
    fn test_fill_and_kill_requires_cross() {
        let mut book = OrderBook::new();
        gtc(&mut book, 5, 102, Side::Sell);

        let result = book.add(5, 101, OrderType::FillAndKill, Side::Buy).unwrap();
        assert!(!result.is_admitted());
        assert_eq!(book.full_depth_ask(), vec![level(102, 5, 1)]);
        assert_invariants(&book);
    }

    #[test]
    fn test_fill_and_kill_discards_remainder() {
        let mut book = OrderBook::new();
        let ask = gtc(&mut book, 2, 102, Side::Sell);

        let (taker, trades) = add(&mut book, 5, 102, OrderType::FillAndKill, Side::Buy);

        assert_eq!(trades, vec![Trade::new(ask, taker, 2, 102)]);
        assert!(book.is_empty(), "remainder does not rest");
        assert_invariants(&book);
    }

    #[test]
    fn test_fill_or_kill_exact_volume_succeeds() {
        let mut book = OrderBook::new();
        let a = gtc(&mut book, 2, 102, Side::Sell);
        let b = gtc(&mut book, 3, 103, Side::Sell);

        let (taker, trades) = add(&mut book, 5, 103, OrderType::FillOrKill, Side::Buy);

        assert_eq!(
            trades,
            vec![Trade::new(a, taker, 2, 102), Trade::new(b, taker, 3, 103)]
        );
        assert!(book.is_empty(), "exact volume fully consumed");
        assert_invariants(&book);
    }

    #[test]
    fn test_fill_or_kill_insufficient_volume_rejected() {
        let mut book = OrderBook::new();
        gtc(&mut book, 2, 102, Side::Sell);
        gtc(&mut book, 3, 104, Side::Sell);

        // Only 2 available within the limit of 103
        let result = book.add(5, 103, OrderType::FillOrKill, Side::Buy).unwrap();

        assert!(!result.is_admitted());
        assert_eq!(
            book.full_depth_ask(),
            vec![level(102, 2, 1), level(104, 3, 1)],
            "book untouched"
        );
        assert_invariants(&book);
    }

    #[test]
    fn test_trades_execute_at_maker_price() {
        let mut book = OrderBook::new();
        let ask = gtc(&mut book, 4, 102, Side::Sell);

        let (taker, trades) = add(&mut book, 4, 110, OrderType::GoodTillCancel, Side::Buy);

        assert_eq!(trades, vec![Trade::new(ask, taker, 4, 102)]);
        assert_invariants(&book);
    }

    #[test]
    fn test_partial_maker_fill_keeps_front_priority() {
        let mut book = OrderBook::new();
        let front = gtc(&mut book, 10, 100, Side::Buy);
        gtc(&mut book, 10, 100, Side::Buy);

        let (taker, trades) = add(&mut book, 4, 100, OrderType::GoodTillCancel, Side::Sell);
        assert_eq!(trades, vec![Trade::new(front, taker, 4, 100)]);
        assert_eq!(book.full_depth_bid(), vec![level(100, 16, 2)]);

        // The partially filled maker is still first in line
        let (next_taker, trades) = add(&mut book, 6, 100, OrderType::GoodTillCancel, Side::Sell);
        assert_eq!(trades, vec![Trade::new(front, next_taker, 6, 100)]);
        assert_eq!(book.full_depth_bid(), vec![level(100, 10, 1)]);
        assert_invariants(&book);
    }

    #[test]
    fn test_resting_remainder_uses_remaining_quantity() {
        let mut book = OrderBook::new();
        gtc(&mut book, 2, 100, Side::Sell);

        // Buys 2 at 100, rests 3 at 101
        let (taker, trades) = add(&mut book, 5, 101, OrderType::GoodTillCancel, Side::Buy);

        assert_eq!(trades.len(), 1);
        assert_eq!(book.best_bid(), Some(101));
        assert_eq!(book.full_depth_bid(), vec![level(101, 3, 1)]);
        assert!(book.orders.contains_key(&taker));
        assert_invariants(&book);
    }

    #[test]
    fn test_add_then_cancel_restores_prior_state() {
        let mut book = OrderBook::new();
        gtc(&mut book, 1, 100, Side::Buy);
        gtc(&mut book, 2, 101, Side::Buy);
        gtc(&mut book, 3, 103, Side::Sell);

        let bids_before = book.full_depth_bid();
        let asks_before = book.full_depth_ask();
        let resting_before = book.resting_orders();

        let id = gtc(&mut book, 7, 99, Side::Buy);
        book.cancel(id).unwrap();

        assert_eq!(book.full_depth_bid(), bids_before);
        assert_eq!(book.full_depth_ask(), asks_before);
        assert_eq!(book.resting_orders(), resting_before);
        assert_eq!(book.cancel(id), Err(BookError::UnknownOrder(id)));
        assert_invariants(&book);
    }

    #[test]
    fn test_cancel_middle_of_queue() {
        let mut book = OrderBook::new();
        let first = gtc(&mut book, 1, 100, Side::Sell);
        let middle = gtc(&mut book, 2, 100, Side::Sell);
        let last = gtc(&mut book, 3, 100, Side::Sell);

        book.cancel(middle).unwrap();
        assert_eq!(book.full_depth_ask(), vec![level(100, 4, 2)]);

        let (taker, trades) = add(&mut book, 4, 100, OrderType::GoodTillCancel, Side::Buy);
        assert_eq!(
            trades,
            vec![Trade::new(first, taker, 1, 100), Trade::new(last, taker, 3, 100)]
        );
        assert_invariants(&book);
    }

    #[test]
    fn test_cancel_unknown_order_no_state_change() {
        let mut book = OrderBook::new();
        gtc(&mut book, 1, 100, Side::Buy);
        let depth = book.full_depth_bid();

        assert_eq!(book.cancel(999), Err(BookError::UnknownOrder(999)));
        assert_eq!(book.full_depth_bid(), depth);
        assert_invariants(&book);
    }

    #[test]
    fn test_noop_modify_loses_priority_and_reassigns_id() {
        let mut book = OrderBook::new();
        let first = gtc(&mut book, 5, 100, Side::Buy);
        let second = gtc(&mut book, 5, 100, Side::Buy);

        let result = book.modify(first, ModifyRequest::default()).unwrap();
        let replacement = result.order_id.unwrap();

        assert_ne!(replacement, first);
        assert_eq!(book.full_depth_bid(), vec![level(100, 10, 2)], "depth unchanged");

        // The untouched order now has time priority
        let (taker, trades) = add(&mut book, 5, 100, OrderType::GoodTillCancel, Side::Sell);
        assert_eq!(trades, vec![Trade::new(second, taker, 5, 100)]);
        assert_invariants(&book);
    }

    #[test]
    fn test_modify_quantity_defaults_to_remaining() {
        let mut book = OrderBook::new();
        let bid = gtc(&mut book, 10, 100, Side::Buy);
        add(&mut book, 4, 100, OrderType::GoodTillCancel, Side::Sell);

        let result = book
            .modify(
                bid,
                ModifyRequest {
                    price: Some(101),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(result.is_admitted());
        assert_eq!(
            book.full_depth_bid(),
            vec![level(101, 6, 1)],
            "remaining, not initial, quantity carries over"
        );
        assert_invariants(&book);
    }

    #[test]
    fn test_modify_can_cross_and_execute() {
        let mut book = OrderBook::new();
        let bid = gtc(&mut book, 5, 100, Side::Buy);
        let ask = gtc(&mut book, 5, 105, Side::Sell);

        let result = book
            .modify(
                bid,
                ModifyRequest {
                    price: Some(105),
                    ..Default::default()
                },
            )
            .unwrap();

        let replacement = result.order_id.unwrap();
        assert_eq!(result.trades, vec![Trade::new(ask, replacement, 5, 105)]);
        assert!(book.is_empty());
        assert_invariants(&book);
    }

    #[test]
    fn test_modify_zero_quantity_rejected_without_state_change() {
        let mut book = OrderBook::new();
        let bid = gtc(&mut book, 5, 100, Side::Buy);

        assert_matches!(
            book.modify(
                bid,
                ModifyRequest {
                    quantity: Some(0),
                    ..Default::default()
                },
            ),
            Err(BookError::InvalidQuantity)
        );
        assert_eq!(book.full_depth_bid(), vec![level(100, 5, 1)]);
        assert!(book.orders.contains_key(&bid), "order still resting");
        assert_invariants(&book);
    }

    #[test]
    fn test_modify_unknown_order() {
        let mut book = OrderBook::new();
        assert_matches!(
            book.modify(42, ModifyRequest::default()),
            Err(BookError::UnknownOrder(42))
        );
    }

    #[test]
    fn test_add_zero_quantity_rejected() {
        let mut book = OrderBook::new();
        assert_matches!(
            book.add(0, 100, OrderType::GoodTillCancel, Side::Buy),
            Err(BookError::InvalidQuantity)
        );
        assert!(book.is_empty());
    }

    #[test]
    fn test_order_ids_strictly_increase() {
        let mut book = OrderBook::new();
        let a = gtc(&mut book, 1, 100, Side::Buy);
        let b = gtc(&mut book, 1, 101, Side::Buy);
        let c = gtc(&mut book, 1, 102, Side::Sell);

        assert!(a < b && b < c);
    }

    #[test]
    fn test_rejected_admission_allocates_no_id() {
        let mut book = OrderBook::new();
        gtc(&mut book, 1, 100, Side::Buy);

        // FillAndKill that does not cross: no id burned
        let rejected = book.add(1, 101, OrderType::FillAndKill, Side::Sell).unwrap();
        assert!(!rejected.is_admitted());

        let next = gtc(&mut book, 1, 101, Side::Buy);
        assert_eq!(next, 2, "id sequence has no gap after a rejection");
    }

    #[test]
    fn test_good_till_eod_rests_like_gtc() {
        let mut book = OrderBook::new();
        let (id, trades) = add(&mut book, 5, 100, OrderType::GoodTillEod, Side::Buy);

        assert!(trades.is_empty());
        assert!(book.orders.contains_key(&id));
        assert_eq!(book.full_depth_bid(), vec![level(100, 5, 1)]);
        assert_invariants(&book);
    }

    #[test]
    fn test_quantity_conservation() {
        let mut book = OrderBook::new();
        let mut admitted_quantity = 0u64;
        let mut executed = 0u64;
        let mut discarded = 0u64;

        for (quantity, price, order_type, side) in [
            (10, 100, OrderType::GoodTillCancel, Side::Buy),
            (5, 101, OrderType::GoodTillCancel, Side::Buy),
            (8, 103, OrderType::GoodTillCancel, Side::Sell),
            (12, 100, OrderType::GoodTillCancel, Side::Sell),
            (7, MARKET_PRICE, OrderType::Market, Side::Buy),
            (9, 101, OrderType::FillAndKill, Side::Sell),
            (3, 104, OrderType::GoodTillCancel, Side::Sell),
        ] {
            let result = book.add(quantity, price, order_type, side).unwrap();
            if !result.is_admitted() {
                continue;
            }
            admitted_quantity += u64::from(quantity);
            executed += result.filled_quantity();
            if !order_type.can_rest() {
                discarded += u64::from(quantity) - result.filled_quantity();
            }
            assert_invariants(&book);
        }

        let resting: u64 = book
            .full_depth_bid()
            .iter()
            .chain(book.full_depth_ask().iter())
            .map(|l| l.volume)
            .sum();

        // Each execution consumes quantity from both a maker and a taker
        assert_eq!(admitted_quantity, 2 * executed + resting + discarded);
    }
}
