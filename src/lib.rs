//! # Matchline
//!
//! A single-process, multi-instrument limit order book matching engine
//! driven by a line-oriented TCP control surface.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: one reactor task owns every mutable structure
//!   (books, sessions, subscriptions); connection tasks do byte I/O only
//! - **Price-Time Priority**: strict FIFO within a level, best price first
//! - **O(1) Cancellation**: orders carry arena handles into their level's
//!   intrusive list; no scanning on removal
//!
//! ## Architecture
//!
//! ```text
//! [Reader Tasks] --> [Event Channel] --> [Reactor Task]
//!                                             |
//!                                     [Writer Task per Session]
//! ```

pub mod arena;
pub mod clock;
pub mod command;
pub mod error;
pub mod ids;
pub mod instrument;
pub mod notifier;
pub mod order;
pub mod price_level;
pub mod reactor;
pub mod registry;
pub mod session;
pub mod side_book;

// Re-exports for convenience
pub use arena::{Arena, ArenaIndex, OrderNode, NULL_INDEX};
pub use error::{CommandError, RegistryError};
pub use ids::IdGenerator;
pub use instrument::{Fill, Instrument, L1Snapshot, MarketStats, PlaceReport, RestingOrder};
pub use notifier::Notifier;
pub use order::{OrderKind, OrderRequest, Side};
pub use price_level::PriceLevel;
pub use reactor::{Config, Server};
pub use registry::Registry;
pub use session::{ConnId, Session, SessionStore};
pub use side_book::{LadderLevel, SideBook};
