//! Per-price aggregate bookkeeping
//!
//! One map serves both sides of the book: bid and ask prices never overlap
//! while the book never rests crossing orders.

use std::collections::BTreeMap;

use common::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// Aggregate state of one price level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelData {
    /// Sum of remaining quantity over resting orders at this price
    pub volume: u64,
    /// Number of resting orders at this price
    pub order_count: u32,
}

/// Read-only view of one price level for depth queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelView {
    /// Level price
    pub price: Price,
    /// Sum of remaining quantity at this price
    pub volume: u64,
    /// Number of resting orders at this price
    pub order_count: u32,
}

/// Level bookkeeping for the whole book.
///
/// Entries are created lazily when the first order rests at a price and
/// erased when the last one leaves; `volume == 0 ⇔ order_count == 0 ⇔ entry
/// absent` between operations.
#[derive(Debug, Default)]
pub(crate) struct LevelBook {
    levels: BTreeMap<Price, LevelData>,
}

impl LevelBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, price: Price) -> Option<LevelData> {
        self.levels.get(&price).copied()
    }

    /// Depth view of one level
    pub fn view(&self, price: Price) -> Option<LevelView> {
        self.levels.get(&price).map(|data| LevelView {
            price,
            volume: data.volume,
            order_count: data.order_count,
        })
    }

    /// Account for an order resting at `price` with `quantity` open
    pub fn add_at(&mut self, price: Price, quantity: Quantity) {
        let level = self.levels.entry(price).or_default();
        level.volume += u64::from(quantity);
        level.order_count += 1;
    }

    /// Account for an order leaving `price` with `quantity` still open
    pub fn remove_at(&mut self, price: Price, quantity: Quantity) {
        let level = self
            .levels
            .get_mut(&price)
            .expect("level exists while orders rest at it");
        debug_assert!(level.volume >= u64::from(quantity) && level.order_count > 0);

        level.volume -= u64::from(quantity);
        level.order_count -= 1;
        if level.order_count == 0 {
            debug_assert_eq!(level.volume, 0);
            self.levels.remove(&price);
        }
    }

    /// Account for `quantity` executing against a maker at `price`.
    ///
    /// `maker_done` marks the maker leaving the queue with this fill.
    pub fn apply_fill(&mut self, price: Price, quantity: Quantity, maker_done: bool) {
        let level = self
            .levels
            .get_mut(&price)
            .expect("level exists while orders rest at it");
        debug_assert!(level.volume >= u64::from(quantity));

        level.volume -= u64::from(quantity);
        if maker_done {
            debug_assert!(level.order_count > 0);
            level.order_count -= 1;
            if level.order_count == 0 {
                debug_assert_eq!(level.volume, 0);
                self.levels.remove(&price);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_created_lazily_and_erased_at_zero() {
        let mut levels = LevelBook::new();
        assert_eq!(levels.get(100), None);

        levels.add_at(100, 5);
        levels.add_at(100, 3);
        assert_eq!(
            levels.get(100),
            Some(LevelData {
                volume: 8,
                order_count: 2
            })
        );

        levels.remove_at(100, 5);
        assert_eq!(
            levels.get(100),
            Some(LevelData {
                volume: 3,
                order_count: 1
            })
        );

        levels.remove_at(100, 3);
        assert_eq!(levels.get(100), None);
    }

    #[test]
    fn test_partial_fill_keeps_order_count() {
        let mut levels = LevelBook::new();
        levels.add_at(100, 10);

        levels.apply_fill(100, 4, false);
        assert_eq!(
            levels.get(100),
            Some(LevelData {
                volume: 6,
                order_count: 1
            })
        );

        levels.apply_fill(100, 6, true);
        assert_eq!(levels.get(100), None);
    }

    #[test]
    fn test_view_carries_price() {
        let mut levels = LevelBook::new();
        levels.add_at(101, 2);

        let view = levels.view(101).unwrap();
        assert_eq!(view.price, 101);
        assert_eq!(view.volume, 2);
        assert_eq!(view.order_count, 1);
        assert_eq!(levels.view(999), None);
    }
}
