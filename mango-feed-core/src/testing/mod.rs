//! Test support shared by unit tests, integration tests and benches
//!
//! - `fixtures`: byte-exact builders for book sides and event queues
//! - `mock_transport`: in-memory duplex with a scripted server

pub mod fixtures;
pub mod mock_transport;

pub use fixtures::{BookSideBuilder, EventQueueBuilder, LeafSpec};
pub use mock_transport::{mock_transport, MockServer, MockSink, MockSource};
