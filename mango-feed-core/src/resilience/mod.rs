//! Recovery helpers for callers of the feed core
//!
//! - Exponential backoff with jitter
//! - Reconnect loop driven by that backoff
//! - Panic logging

pub mod backoff;
pub mod panic;
pub mod reconnect;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use panic::{install_panic_handler, panic_message};
pub use reconnect::{connect_with_backoff, sleep_unless, ReconnectError};
