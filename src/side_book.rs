//! Side book - all resting orders on one side of an instrument.
//!
//! A `BTreeMap` keyed by price serves as both the ordered price index
//! and the price-to-level lookup; the best price is cached for O(1)
//! reads and recomputed from the map extremum only when the best level
//! is erased. The book also owns per-level depth accounting (open
//! quantity, order count); the level itself is pure queue linkage.

use std::collections::BTreeMap;

use crate::arena::{Arena, ArenaIndex};
use crate::order::{OrderKind, Side};
use crate::price_level::PriceLevel;

/// One rung of the book ladder (diagnostics, depth queries).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LadderLevel {
    pub price: u64,
    pub total_qty: u64,
    pub count: u32,
}

/// A price level's queue plus the depth the book tracks for it.
struct LevelEntry {
    queue: PriceLevel,
    open_qty: u64,
    count: u32,
}

impl LevelEntry {
    fn new() -> Self {
        Self {
            queue: PriceLevel::new(),
            open_qty: 0,
            count: 0,
        }
    }
}

/// Price levels for a single side of the book.
///
/// "Best" follows the side: highest price for buys, lowest for sells.
/// Invariants: no stored level is empty; the cached best equals the map
/// extremum, or is `None` iff the side is empty.
pub struct SideBook {
    side: Side,
    levels: BTreeMap<u64, LevelEntry>,
    /// Cached best price for this side
    best: Option<u64>,
    /// Resting orders across all levels
    order_count: usize,
}

impl SideBook {
    /// Create an empty book for one side.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            best: None,
            order_count: 0,
        }
    }

    /// The side this book holds.
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Number of resting orders.
    #[inline]
    pub fn order_count(&self) -> usize {
        self.order_count
    }

    /// Number of non-empty price levels.
    #[inline]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// True when no orders rest on this side.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    /// Cached best price (max for buys, min for sells).
    #[inline]
    pub fn best_price(&self) -> Option<u64> {
        self.best
    }

    /// Head order of the best level, or `None` when empty.
    #[inline]
    pub fn best(&self) -> Option<ArenaIndex> {
        self.levels.get(&self.best?)?.queue.front()
    }

    /// Insert a resting order.
    ///
    /// Preconditions: the order's side matches this book, it is a limit
    /// order, and `remaining > 0`. A level is created on first use and
    /// the cached best is maintained incrementally.
    pub fn insert(&mut self, arena: &mut Arena, index: ArenaIndex) {
        let (price, side, kind, remaining) = {
            let node = arena.get(index);
            (node.price, node.side, node.kind, node.remaining)
        };
        debug_assert_eq!(side, self.side);
        debug_assert_eq!(kind, OrderKind::Limit);
        debug_assert!(remaining > 0);

        let entry = self.levels.entry(price).or_insert_with(LevelEntry::new);
        entry.queue.enqueue(arena, index);
        entry.open_qty += remaining;
        entry.count += 1;
        self.order_count += 1;

        let better = match self.side {
            Side::Buy => self.best.map_or(true, |b| price > b),
            Side::Sell => self.best.map_or(true, |b| price < b),
        };
        if better {
            self.best = Some(price);
        }
    }

    /// Remove a resting order given its handle.
    ///
    /// Drops the level when it empties and recomputes the cached best
    /// iff the removed price was the extremum.
    ///
    /// # Returns
    /// `false` if the order's price has no level here (not resting).
    pub fn remove(&mut self, arena: &mut Arena, index: ArenaIndex) -> bool {
        let (price, remaining) = {
            let node = arena.get(index);
            (node.price, node.remaining)
        };
        let Some(entry) = self.levels.get_mut(&price) else {
            return false;
        };

        entry.queue.unlink(arena, index);
        entry.open_qty -= remaining;
        entry.count -= 1;
        self.order_count -= 1;

        if entry.queue.is_empty() {
            self.levels.remove(&price);
            if self.best == Some(price) {
                self.recompute_best();
            }
        }
        true
    }

    /// Apply a fill to a resting order: reduce its open quantity and the
    /// level depth, removing the order from the book when fully filled.
    ///
    /// # Returns
    /// `true` when the order was fully filled and unlinked (the caller
    /// still owns the arena slot and must free it).
    pub fn apply_fill(&mut self, arena: &mut Arena, index: ArenaIndex, qty: u64) -> bool {
        let price = arena.get(index).price;
        debug_assert!(qty > 0 && qty <= arena.get(index).remaining);

        // Depth first: removal below subtracts the (then zero)
        // remaining quantity again.
        if let Some(entry) = self.levels.get_mut(&price) {
            entry.open_qty -= qty;
        }

        let fully_filled = {
            let node = arena.get_mut(index);
            node.filled += qty;
            node.remaining -= qty;
            node.remaining == 0
        };

        if fully_filled {
            self.remove(arena, index);
        }
        fully_filled
    }

    /// Up to `n` head orders, one per level, walking best-first.
    ///
    /// Partial results are returned when fewer than `n` levels exist.
    pub fn top(&self, n: usize) -> Vec<ArenaIndex> {
        self.levels_by_priority()
            .take(n)
            .filter_map(|entry| entry.queue.front())
            .collect()
    }

    /// Every resting order, best level first, FIFO within a level.
    pub fn orders(&self, arena: &Arena) -> Vec<ArenaIndex> {
        self.levels_by_priority()
            .flat_map(|entry| entry.queue.iter(arena))
            .collect()
    }

    /// Up to `limit` ladder rungs in ascending price order.
    pub fn ladder(&self, limit: usize) -> Vec<LadderLevel> {
        self.levels
            .iter()
            .take(limit)
            .map(|(&price, entry)| LadderLevel {
                price,
                total_qty: entry.open_qty,
                count: entry.count,
            })
            .collect()
    }

    /// Open quantity and order count at a price level.
    pub fn depth_at(&self, price: u64) -> (u64, u32) {
        self.levels
            .get(&price)
            .map(|entry| (entry.open_qty, entry.count))
            .unwrap_or((0, 0))
    }

    /// Levels in side-appropriate priority order (best first).
    fn levels_by_priority(&self) -> Box<dyn Iterator<Item = &LevelEntry> + '_> {
        match self.side {
            Side::Buy => Box::new(self.levels.values().rev()),
            Side::Sell => Box::new(self.levels.values()),
        }
    }

    fn recompute_best(&mut self) {
        self.best = match self.side {
            Side::Buy => self.levels.keys().next_back().copied(),
            Side::Sell => self.levels.keys().next().copied(),
        };
    }
}

impl std::fmt::Debug for SideBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SideBook")
            .field("side", &self.side)
            .field("best", &self.best)
            .field("levels", &self.levels.len())
            .field("order_count", &self.order_count)
            .finish()
    }
}
