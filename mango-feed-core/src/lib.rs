//! Mango Feed Core - market data client for Mango v3 perp markets on Solana
//!
//! Subscribes to on-chain accounts over a Solana JSON-RPC WebSocket, decodes
//! the raw account bytes and derives order book and trade views from them.
//!
//! ## Architecture
//! - **Two threads per connection**: a reader that routes every inbound
//!   frame and a writer that keeps exactly one request in flight
//! - **Snapshots, not diffs**: each book side and event queue notification
//!   is a full account image; nothing is patched incrementally
//! - **Exact arithmetic**: on-chain `I80F48` values stay fixed-point until
//!   a caller asks for a float
//!
//! ## Core Modules
//! - `core`: value types (PublicKey, I80F48, Side), errors, subscription lifecycle
//! - `codec`: base58 / base64
//! - `data`: account layouts (BookSide, EventQueue, PerpMarket)
//! - `orderbook`: slab traversal, level-1, aggregator
//! - `events`: event queue replay by sequence number
//! - `session`: JSON-RPC subscription session over a frame transport
//! - `subscriptions`: listeners wiring notifications into the aggregator
//! - `resilience`: backoff, reconnect, panic reporting

pub mod codec;
pub mod config;
pub mod core;
pub mod data;
pub mod events;
pub mod orderbook;
pub mod resilience;
pub mod session;
pub mod subscriptions;
pub mod testing;
pub mod utils;

// Re-export core types
pub use core::{
    CloseReason, FeedError, PublicKey, Side, SubscriptionError, SubscriptionState,
    SubscriptionStatus, I80F48,
};

pub use config::{Cluster, Commitment, FeedConfig, DEVNET, MAINNET};
pub use data::{AccountLayout, BookSide, Event, EventQueue, FillEvent, PerpMarket};
pub use events::EventQueueReplayer;
pub use orderbook::{Level1Snapshot, MarketAggregator, MarketState, MarketUpdate};
pub use session::{AccountNotification, SubscriptionListener, SubscriptionSession};

// Re-export error types
pub use anyhow::{Error, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{Commitment, FeedConfig};
    pub use crate::core::{I80F48, PublicKey, Side, SubscriptionStatus};
    pub use crate::data::{AccountLayout, BookSide, EventQueue, PerpMarket};
    pub use crate::events::EventQueueReplayer;
    pub use crate::orderbook::{AggregatorHandle, MarketAggregator, MarketUpdate, UpdateSink};
    pub use crate::session::{AccountNotification, SubscriptionListener, SubscriptionSession};
    pub use crate::subscriptions::{BookSideListener, EventQueueListener, RawAccountListener};

    pub use crate::{Error, Result};
}
