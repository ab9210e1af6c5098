//! Instrument - two side books plus market statistics.
//!
//! Implements the cross/rest matching algorithm under strict price-time
//! priority: a limit order rests on its own side first, then the loop
//! trades the best buy against the best sell until the books uncross.

use rustc_hash::FxHashMap;

use chrono::{DateTime, Utc};

use crate::arena::{Arena, ArenaIndex};
use crate::order::{OrderKind, OrderRequest, Side};
use crate::side_book::{LadderLevel, SideBook};

/// Location of a resting order, for O(1) cancellation.
#[derive(Clone, Copy, Debug)]
struct OrderHandle {
    index: ArenaIndex,
    side: Side,
}

/// Top-of-book market statistics after a trade.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct L1Snapshot {
    pub last_trade_price: u64,
    pub last_trade_size: u64,
    pub high: u64,
    pub low: u64,
    pub open: u64,
    pub close: u64,
}

/// Session statistics for one instrument.
///
/// Zero-valued `open`/`low`/`high` mean "no trade yet this session";
/// the first trade seeds all of them.
#[derive(Clone, Debug, Default)]
pub struct MarketStats {
    pub last_trade_price: u64,
    pub last_trade_size: u64,
    pub last_trade_at: Option<DateTime<Utc>>,
    pub open: u64,
    pub high: u64,
    pub low: u64,
    pub close: u64,
    pub volume_today: u64,
    pub vwap_numerator: u128,
}

impl MarketStats {
    /// Fold one execution into the session statistics.
    pub fn record(&mut self, price: u64, qty: u64) {
        self.last_trade_price = price;
        self.last_trade_size = qty;
        self.last_trade_at = Some(Utc::now());

        if self.open == 0 {
            self.open = price;
        }
        if self.low == 0 || price < self.low {
            self.low = price;
        }
        if price > self.high {
            self.high = price;
        }
        self.close = price;

        self.volume_today += qty;
        self.vwap_numerator += (price as u128) * (qty as u128);
    }

    /// Volume-weighted average price over the session, if any volume.
    pub fn vwap(&self) -> Option<f64> {
        if self.volume_today == 0 {
            return None;
        }
        Some(self.vwap_numerator as f64 / self.volume_today as f64)
    }

    /// Copy of the L1 tuple.
    pub fn l1(&self) -> L1Snapshot {
        L1Snapshot {
            last_trade_price: self.last_trade_price,
            last_trade_size: self.last_trade_size,
            high: self.high,
            low: self.low,
            open: self.open,
            close: self.close,
        }
    }
}

/// A single execution between a resting (maker) and incoming (taker) order.
#[derive(Clone, Debug)]
pub struct Fill {
    /// Execution price: the resting counterparty's level price
    pub price: u64,
    /// Executed quantity
    pub qty: u64,
    pub maker_order_id: String,
    pub maker_client: String,
    pub taker_order_id: String,
    pub taker_client: String,
    /// Market statistics immediately after this fill
    pub l1: L1Snapshot,
}

/// Outcome of a placement.
#[derive(Clone, Debug, Default)]
pub struct PlaceReport {
    /// Executions in match order
    pub fills: Vec<Fill>,
    /// Whether any quantity rests in the book afterwards
    pub resting: bool,
    /// Open quantity left resting (0 unless `resting`)
    pub resting_qty: u64,
}

/// Read-only view of a resting order (diagnostics, tests).
#[derive(Clone, Debug)]
pub struct RestingOrder {
    pub order_id: String,
    pub client_order_id: String,
    pub client_id: String,
    pub side: Side,
    pub price: u64,
    pub initial_qty: u64,
    pub filled: u64,
    pub remaining: u64,
    pub arrival_ns: u64,
}

/// One tradable symbol: buy book, sell book, order lookup, statistics.
pub struct Instrument {
    symbol: String,
    arena: Arena,
    buys: SideBook,
    sells: SideBook,
    /// order_id -> handle, for O(1) cancel lookup
    orders: FxHashMap<String, OrderHandle>,
    stats: MarketStats,
}

impl Instrument {
    /// Default initial arena capacity per instrument.
    const INITIAL_CAPACITY: u32 = 1024;

    /// Create an empty instrument for the given symbol.
    pub fn new(symbol: &str) -> Self {
        Self::with_capacity(symbol, Self::INITIAL_CAPACITY)
    }

    /// Create an instrument with a pre-sized arena.
    pub fn with_capacity(symbol: &str, capacity: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            arena: Arena::new(capacity),
            buys: SideBook::new(Side::Buy),
            sells: SideBook::new(Side::Sell),
            orders: FxHashMap::default(),
            stats: MarketStats::default(),
        }
    }

    /// The symbol this instrument trades under.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Session statistics.
    pub fn stats(&self) -> &MarketStats {
        &self.stats
    }

    /// The buy-side book.
    pub fn buy_side(&self) -> &SideBook {
        &self.buys
    }

    /// The sell-side book.
    pub fn sell_side(&self) -> &SideBook {
        &self.sells
    }

    /// Highest resting buy price.
    #[inline]
    pub fn best_bid(&self) -> Option<u64> {
        self.buys.best_price()
    }

    /// Lowest resting sell price.
    #[inline]
    pub fn best_ask(&self) -> Option<u64> {
        self.sells.best_price()
    }

    /// Total resting orders across both sides.
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Place an order and run the matching loop.
    ///
    /// Limit orders rest on their own side first; the loop then fills
    /// the best buy against the best sell while they cross, at the
    /// resting counterparty's price. Market orders walk the opposite
    /// side and drop any residual.
    pub fn place(&mut self, req: OrderRequest) -> PlaceReport {
        debug_assert!(req.qty > 0);
        match req.kind {
            OrderKind::Limit => self.place_limit(req),
            OrderKind::Market => self.place_market(req),
        }
    }

    fn place_limit(&mut self, req: OrderRequest) -> PlaceReport {
        debug_assert!(req.price > 0);
        debug_assert!(
            !self.orders.contains_key(&req.order_id),
            "order ids are server-assigned and unique"
        );

        let index = self.arena.alloc();
        {
            let node = self.arena.get_mut(index);
            node.order_id = req.order_id.clone();
            node.client_order_id = req.client_order_id.clone();
            node.client_id = req.client_id.clone();
            node.price = req.price;
            node.initial_qty = req.qty;
            node.filled = 0;
            node.remaining = req.qty;
            node.side = req.side;
            node.kind = OrderKind::Limit;
            node.arrival_ns = req.arrival_ns;
        }

        match req.side {
            Side::Buy => self.buys.insert(&mut self.arena, index),
            Side::Sell => self.sells.insert(&mut self.arena, index),
        }
        self.orders.insert(
            req.order_id.clone(),
            OrderHandle {
                index,
                side: req.side,
            },
        );

        let fills = self.uncross(req.side);

        let (resting, resting_qty) = match self.orders.get(&req.order_id) {
            Some(handle) => (true, self.arena.get(handle.index).remaining),
            None => (false, 0),
        };

        PlaceReport {
            fills,
            resting,
            resting_qty,
        }
    }

    /// Matching loop: trade best buy against best sell until uncrossed.
    ///
    /// `incoming` is the side of the order that triggered the loop; the
    /// level on the opposite side was resting first and sets the price.
    fn uncross(&mut self, incoming: Side) -> Vec<Fill> {
        let mut fills = Vec::new();

        loop {
            let Some(buy) = self.buys.best() else { break };
            let Some(sell) = self.sells.best() else { break };

            let (buy_price, buy_remaining) = {
                let node = self.arena.get(buy);
                (node.price, node.remaining)
            };
            let (sell_price, sell_remaining) = {
                let node = self.arena.get(sell);
                (node.price, node.remaining)
            };

            if buy_price < sell_price {
                break; // uncrossed
            }

            let qty = buy_remaining.min(sell_remaining);
            let price = match incoming {
                Side::Buy => sell_price,
                Side::Sell => buy_price,
            };

            let (maker, taker) = match incoming {
                Side::Buy => (sell, buy),
                Side::Sell => (buy, sell),
            };
            let maker_order_id = self.arena.get(maker).order_id.clone();
            let maker_client = self.arena.get(maker).client_id.clone();
            let taker_order_id = self.arena.get(taker).order_id.clone();
            let taker_client = self.arena.get(taker).client_id.clone();

            self.fill_resting(buy, Side::Buy, qty);
            self.fill_resting(sell, Side::Sell, qty);

            self.stats.record(price, qty);
            fills.push(Fill {
                price,
                qty,
                maker_order_id,
                maker_client,
                taker_order_id,
                taker_client,
                l1: self.stats.l1(),
            });
        }

        fills
    }

    /// Apply a fill to a resting order; release it entirely when done.
    fn fill_resting(&mut self, index: ArenaIndex, side: Side, qty: u64) {
        let fully_filled = match side {
            Side::Buy => self.buys.apply_fill(&mut self.arena, index, qty),
            Side::Sell => self.sells.apply_fill(&mut self.arena, index, qty),
        };
        if fully_filled {
            let order_id = self.arena.get(index).order_id.clone();
            self.orders.remove(&order_id);
            self.arena.free(index);
        }
    }

    /// Market order: consume opposite liquidity; the residual is dropped.
    fn place_market(&mut self, req: OrderRequest) -> PlaceReport {
        let mut remaining = req.qty;
        let mut fills = Vec::new();

        while remaining > 0 {
            let maker = match req.side {
                Side::Buy => self.sells.best(),
                Side::Sell => self.buys.best(),
            };
            let Some(maker) = maker else { break };

            let (price, maker_remaining, maker_order_id, maker_client) = {
                let node = self.arena.get(maker);
                (
                    node.price,
                    node.remaining,
                    node.order_id.clone(),
                    node.client_id.clone(),
                )
            };

            let qty = remaining.min(maker_remaining);
            remaining -= qty;

            self.fill_resting(maker, req.side.opposite(), qty);

            self.stats.record(price, qty);
            fills.push(Fill {
                price,
                qty,
                maker_order_id,
                maker_client,
                taker_order_id: req.order_id.clone(),
                taker_client: req.client_id.clone(),
                l1: self.stats.l1(),
            });
        }

        PlaceReport {
            fills,
            resting: false,
            resting_qty: 0,
        }
    }

    /// Cancel a resting order by identity.
    ///
    /// An empty `client_order_id` matches on `order_id` alone; otherwise
    /// both must match. Cancelling an order that is not resting returns
    /// `false` and mutates nothing.
    pub fn cancel(&mut self, order_id: &str, client_order_id: &str) -> bool {
        let Some(handle) = self.orders.get(order_id).copied() else {
            return false;
        };
        if !client_order_id.is_empty()
            && self.arena.get(handle.index).client_order_id != client_order_id
        {
            return false;
        }

        self.orders.remove(order_id);
        match handle.side {
            Side::Buy => self.buys.remove(&mut self.arena, handle.index),
            Side::Sell => self.sells.remove(&mut self.arena, handle.index),
        };
        self.arena.free(handle.index);
        true
    }

    /// Read-only view of a resting order, or `None` if not resting.
    pub fn resting(&self, order_id: &str) -> Option<RestingOrder> {
        let handle = self.orders.get(order_id)?;
        Some(self.view(handle.index))
    }

    /// All resting orders in match priority: buys best-first, then
    /// sells best-first, FIFO within each level.
    pub fn resting_orders(&self) -> Vec<RestingOrder> {
        let mut out = Vec::with_capacity(self.orders.len());
        for book in [&self.buys, &self.sells] {
            for index in book.orders(&self.arena) {
                out.push(self.view(index));
            }
        }
        out
    }

    fn view(&self, index: ArenaIndex) -> RestingOrder {
        let node = self.arena.get(index);
        RestingOrder {
            order_id: node.order_id.clone(),
            client_order_id: node.client_order_id.clone(),
            client_id: node.client_id.clone(),
            side: node.side,
            price: node.price,
            initial_qty: node.initial_qty,
            filled: node.filled,
            remaining: node.remaining,
            arrival_ns: node.arrival_ns,
        }
    }

    /// Ascending price ladder for one side, at most `limit` rungs.
    pub fn ladder(&self, side: Side, limit: usize) -> Vec<LadderLevel> {
        match side {
            Side::Buy => self.buys.ladder(limit),
            Side::Sell => self.sells.ladder(limit),
        }
    }

    /// Hash of observable book state (determinism testing).
    pub fn state_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.best_bid().hash(&mut hasher);
        self.best_ask().hash(&mut hasher);
        self.orders.len().hash(&mut hasher);
        self.stats.volume_today.hash(&mut hasher);
        self.stats.last_trade_price.hash(&mut hasher);
        for order in self.resting_orders() {
            order.order_id.hash(&mut hasher);
            order.price.hash(&mut hasher);
            order.remaining.hash(&mut hasher);
        }
        hasher.finish()
    }
}
