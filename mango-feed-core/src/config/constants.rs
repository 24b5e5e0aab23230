//! Cluster constants for Mango v3
//!
//! Endpoints, group and program ids, and the token table of each cluster.
//! Token slots follow the on-chain group layout: index 15 is always the
//! quote currency (USDC); empty strings are unused slots.

/// Number of token slots in a Mango group
pub const MAX_TOKENS: usize = 16;

/// Slot of the quote token in every group
pub const QUOTE_INDEX: usize = 15;

/// Program that owns DEX order-book accounts referenced by spot markets
pub const SERUM_PROGRAM_ID: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

/// Mint of the MNGO governance token
pub const MNGO_MINT: &str = "MangoCzJ36AjZyKwVj3VnYU4GTonjfVEnJmvvWaxLac";

/// Static description of one Solana cluster running Mango v3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cluster {
    pub name: &'static str,
    /// JSON-RPC HTTP endpoint
    pub rpc_endpoint: &'static str,
    /// Pubsub WebSocket endpoint
    pub ws_endpoint: &'static str,
    pub group: &'static str,
    pub program_id: &'static str,
    pub token_decimals: [u8; MAX_TOKENS],
    pub token_symbols: [&'static str; MAX_TOKENS],
}

impl Cluster {
    /// Slot of a token symbol (case-sensitive), ignoring unused slots
    pub fn token_index(&self, symbol: &str) -> Option<usize> {
        if symbol.is_empty() {
            return None;
        }
        self.token_symbols.iter().position(|s| *s == symbol)
    }

    pub fn decimals(&self, index: usize) -> Option<u8> {
        self.token_decimals.get(index).copied()
    }

    pub fn quote_decimals(&self) -> u8 {
        self.token_decimals[QUOTE_INDEX]
    }

    /// Look up a cluster by name ("mainnet" / "devnet")
    pub fn by_name(name: &str) -> Option<&'static Cluster> {
        match name {
            "mainnet" | "mainnet-beta" => Some(&MAINNET),
            "devnet" => Some(&DEVNET),
            _ => None,
        }
    }
}

pub const MAINNET: Cluster = Cluster {
    name: "mainnet",
    rpc_endpoint: "https://mango.rpcpool.com/946ef7337da3f5b8d3e4a34e7f88",
    ws_endpoint: "wss://mango.rpcpool.com/946ef7337da3f5b8d3e4a34e7f88",
    group: "98pjRuQjK3qA6gXts96PqZT4Ze5QmnCmt3QYjhbUSPue",
    program_id: "mv3ekLzLbnVPNxjSKvqBpU3ZeZXPQdEC3bp5MDEBG68",
    token_decimals: [6, 6, 6, 9, 6, 6, 6, 6, 6, 9, 8, 8, 6, 0, 0, 6],
    token_symbols: [
        "MNGO", "BTC", "ETH", "SOL", "USDT", "SRM", "RAY", "COPE", "FTT", "MSOL", "BNB", "AVAX",
        "LUNA", "", "", "USDC",
    ],
};

pub const DEVNET: Cluster = Cluster {
    name: "devnet",
    rpc_endpoint: "https://mango.devnet.rpcpool.com",
    ws_endpoint: "wss://mango.devnet.rpcpool.com",
    group: "Ec2enZyoC4nGpEfu2sUNAa2nUGJHWxoUWYSEJ2hNTWTA",
    program_id: "4skJ85cdxQAFVKbcGgfun8iZPL7BadVYXG3kGEGkufqA",
    token_decimals: [6, 6, 6, 9, 6, 6, 6, 6, 6, 9, 8, 8, 8, 0, 0, 6],
    token_symbols: [
        "MNGO", "BTC", "ETH", "SOL", "SRM", "RAY", "USDT", "ADA", "FTT", "AVAX", "LUNA", "BNB",
        "MATIC", "", "", "USDC",
    ],
};

// ===== SESSION DEFAULTS =====

/// Default connect + handshake timeout
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// How long the receive thread blocks on the socket before checking for shutdown
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Queue between subscription listeners and the aggregator thread
pub const AGGREGATOR_QUEUE_CAPACITY: usize = 1024;
