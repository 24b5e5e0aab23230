//! Order book derivation from decoded slabs
//!
//! - `slab`: best-first traversal, best order, volume and level listing
//! - `level1`: best bid/ask with midpoint and spread
//! - `aggregator`: applies book and fill updates, publishes `MarketState`
//! - `scale`: native lot units to UI decimals

pub mod aggregator;
pub mod level1;
pub mod scale;
pub mod slab;

pub use aggregator::{
    AggregatorHandle, LastTrade, MarketAggregator, MarketObserver, MarketState, MarketUpdate,
    UpdateSender, UpdateSink,
};
pub use level1::Level1Snapshot;
pub use scale::MarketScale;
pub use slab::{BestOrder, BookLevel, SlabIter};
