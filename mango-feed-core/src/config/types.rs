use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::constants::{DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS, MAINNET};
use crate::core::errors::SubscriptionError;

/// Finality level requested for account notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    #[default]
    Finalized,
}

impl Commitment {
    pub const ALL: [Commitment; 3] = [
        Commitment::Processed,
        Commitment::Confirmed,
        Commitment::Finalized,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Commitment::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| SubscriptionError::InvalidCommitment(s.to_string()))
    }
}

/// Runtime configuration for a feed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Pubsub WebSocket URL (`ws://` or `wss://`)
    pub endpoint: String,

    pub commitment: Commitment,

    /// TCP connect + WebSocket handshake timeout
    pub connect_timeout_ms: u64,

    /// Receive-thread socket timeout; bounds shutdown latency
    pub poll_interval_ms: u64,

    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,

    pub json_logs: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: MAINNET.ws_endpoint.to_string(),
            commitment: Commitment::default(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl FeedConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
