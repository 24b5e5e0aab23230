//! Listeners that turn account notifications into market updates
//!
//! Each listener owns the decoding for one account kind and forwards the
//! result to an `UpdateSink` (the aggregator directly, or its channel).
//! Undecodable payloads are logged and dropped; they never end the
//! subscription.

pub mod book;
pub mod fills;
pub mod raw;

pub use book::BookSideListener;
pub use fills::EventQueueListener;
pub use raw::RawAccountListener;
