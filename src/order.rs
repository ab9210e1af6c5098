//! Order types shared across the engine.
//!
//! Requests are inputs from the command layer; an order's mutable
//! execution state lives in the arena (see [`crate::arena::OrderNode`]).

use std::fmt;

/// Order side (buy = bid, sell = ask)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    #[default]
    Buy = 0,
    /// Sell side (asks)
    Sell = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        })
    }
}

/// Order kind determines matching behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OrderKind {
    /// Limit order - rests in the book if not fully matched (default)
    #[default]
    Limit = 0,
    /// Market order - consumes opposite liquidity; any residual is dropped
    Market = 1,
}

/// A fully-specified order entering an instrument.
///
/// `order_id` is server-assigned before placement; `client_order_id` is
/// free-form and may be empty when the wire did not supply one.
#[derive(Clone, Debug)]
pub struct OrderRequest {
    /// Server-assigned opaque identifier
    pub order_id: String,
    /// Owner-supplied identifier (may be empty)
    pub client_order_id: String,
    /// Authenticated principal that owns the order
    pub client_id: String,
    /// Order side
    pub side: Side,
    /// Limit or market
    pub kind: OrderKind,
    /// Price in unsigned integer ticks (ignored for market orders)
    pub price: u64,
    /// Total quantity; must be positive
    pub qty: u64,
    /// Monotonic arrival timestamp in nanoseconds (tie-breaking, audit)
    pub arrival_ns: u64,
}

impl OrderRequest {
    /// Convenience constructor for a limit order.
    pub fn limit(
        order_id: impl Into<String>,
        client_id: impl Into<String>,
        side: Side,
        price: u64,
        qty: u64,
        arrival_ns: u64,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            client_order_id: String::new(),
            client_id: client_id.into(),
            side,
            kind: OrderKind::Limit,
            price,
            qty,
            arrival_ns,
        }
    }

    /// Convenience constructor for a market order.
    pub fn market(
        order_id: impl Into<String>,
        client_id: impl Into<String>,
        side: Side,
        qty: u64,
        arrival_ns: u64,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            client_order_id: String::new(),
            client_id: client_id.into(),
            side,
            kind: OrderKind::Market,
            price: 0,
            qty,
            arrival_ns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_side_display() {
        assert_eq!(Side::Buy.to_string(), "BUY");
        assert_eq!(Side::Sell.to_string(), "SELL");
    }

    #[test]
    fn test_kind_default() {
        assert_eq!(OrderKind::default(), OrderKind::Limit);
    }

    #[test]
    fn test_limit_constructor() {
        let req = OrderRequest::limit("abc", "C1", Side::Buy, 100, 10, 7);
        assert_eq!(req.kind, OrderKind::Limit);
        assert_eq!(req.price, 100);
        assert_eq!(req.qty, 10);
        assert_eq!(req.arrival_ns, 7);
        assert!(req.client_order_id.is_empty());
    }

    #[test]
    fn test_market_constructor() {
        let req = OrderRequest::market("abc", "C1", Side::Sell, 10, 7);
        assert_eq!(req.kind, OrderKind::Market);
        assert_eq!(req.price, 0);
    }
}
