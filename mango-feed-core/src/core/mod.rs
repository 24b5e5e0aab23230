//! Core value types for the market-data feed
//!
//! - `Side`: bid/ask discriminant as encoded on chain
//! - `PublicKey`: 32-byte account identifier with base58 text form
//! - `I80F48`: exact fixed-point for on-chain fractional values
//! - Error enums for each layer
//! - Subscription lifecycle state machine

pub mod errors;
pub mod fixed;
mod fixed_proptest;
pub mod pubkey;
pub mod subscription_fsm;
pub mod types;

// Re-export commonly used types
pub use errors::{
    CodecError, ConfigError, DecodeError, FeedError, FixedPointError, ProtocolError,
    SubscriptionError, TransportError,
};
pub use fixed::I80F48;
pub use pubkey::PublicKey;
pub use subscription_fsm::{CloseReason, SubscriptionState, SubscriptionStatus};
pub use types::{unix_now_millis, unix_now_secs, Side};
