//! Caller-side reconnect loop
//!
//! The session never retries on its own. Binaries that want to survive a
//! dropped node wrap their connect step in `connect_with_backoff`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use super::backoff::ExponentialBackoff;
use crate::core::errors::TransportError;

/// Longest single sleep between shutdown checks
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Outcome of `connect_with_backoff` when no connection was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectError {
    /// Retries exhausted; carries the last failure
    GaveUp {
        attempts: u32,
        last_error: TransportError,
    },
    /// Shutdown was requested while waiting
    Cancelled,
}

impl std::fmt::Display for ReconnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconnectError::GaveUp {
                attempts,
                last_error,
            } => write!(f, "gave up after {} attempts: {}", attempts, last_error),
            ReconnectError::Cancelled => write!(f, "reconnect cancelled"),
        }
    }
}

impl std::error::Error for ReconnectError {}

/// Run `connect` until it succeeds, sleeping per `backoff` between failures
///
/// The backoff is reset on success. `shutdown` is polled while sleeping.
pub fn connect_with_backoff<T, F>(
    backoff: &mut ExponentialBackoff,
    shutdown: &AtomicBool,
    mut connect: F,
) -> Result<T, ReconnectError>
where
    F: FnMut() -> Result<T, TransportError>,
{
    loop {
        if shutdown.load(Ordering::Acquire) {
            return Err(ReconnectError::Cancelled);
        }

        match connect() {
            Ok(value) => {
                if backoff.attempts() > 0 {
                    info!(attempts = backoff.attempts(), "reconnected");
                }
                backoff.reset();
                return Ok(value);
            }
            Err(e) => {
                let Some(delay) = backoff.next_delay() else {
                    return Err(ReconnectError::GaveUp {
                        attempts: backoff.attempts(),
                        last_error: e,
                    });
                };
                warn!(
                    error = %e,
                    attempt = backoff.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "connect failed, retrying"
                );
                if !sleep_unless(shutdown, delay) {
                    return Err(ReconnectError::Cancelled);
                }
            }
        }
    }
}

/// Sleep for `total`, returning false early if `shutdown` is set
pub fn sleep_unless(shutdown: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while !remaining.is_zero() {
        if shutdown.load(Ordering::Acquire) {
            return false;
        }
        let slice = remaining.min(SLEEP_SLICE);
        thread::sleep(slice);
        remaining -= slice;
    }
    !shutdown.load(Ordering::Acquire)
}
