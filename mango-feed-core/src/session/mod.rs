//! Account subscriptions over a JSON-RPC pubsub connection
//!
//! - `protocol`: request builders and inbound frame classification
//! - `transport`: duplex frame traits and the blocking WebSocket implementation
//! - `subscriber`: the two-thread `SubscriptionSession`

pub mod protocol;
pub mod subscriber;
pub mod transport;

pub use protocol::{AccountNotification, Inbound, RpcResponse};
pub use subscriber::{SubscriptionListener, SubscriptionSession};
pub use transport::{FrameSink, FrameSource, TransportOptions, WebSocketTransport};
