//! Domain-specific error types for the feed core
//!
//! Each layer reports its own failure enum so callers can tell a dropped
//! message (decode) from a dead connection (transport) from a rejected
//! request (subscription). `FeedError` aggregates them for callers that
//! only want one type.

use thiserror::Error;

/// Errors from the base58 / base64 wire codecs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Input contained a character outside the base58 alphabet
    #[error("invalid base58 input: {reason}")]
    InvalidBase58 {
        /// Decoder message
        reason: String,
    },

    /// Input was not valid padded standard base64
    #[error("invalid base64 input: {reason}")]
    InvalidBase64 {
        /// Decoder message
        reason: String,
    },

    /// Decoded key did not have the expected 32 bytes
    #[error("public key must decode to 32 bytes, got {actual}")]
    InvalidKeyLength {
        /// Number of bytes actually decoded
        actual: usize,
    },
}

/// Errors from I80F48 arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FixedPointError {
    /// Result does not fit in 80 integer + 48 fractional bits
    #[error("fixed-point {op} overflow: {lhs} {op} {rhs} (raw bits)")]
    Overflow {
        /// Operation name ("add", "sub", "mul", "div")
        op: &'static str,
        /// Left operand raw bits
        lhs: i128,
        /// Right operand raw bits
        rhs: i128,
    },

    /// Division by zero
    #[error("fixed-point division by zero")]
    DivisionByZero,
}

/// Errors from fixed-layout account decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Payload length differs from the record's exact size
    #[error("{kind}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Record kind being decoded
        kind: &'static str,
        /// Exact size of the layout
        expected: usize,
        /// Size of the payload received
        actual: usize,
    },

    /// A field read ran past the end of the buffer
    #[error("read of {wanted} bytes at offset {offset} exceeds buffer of {len} bytes")]
    Truncated {
        /// Offset the read started at
        offset: usize,
        /// Bytes requested
        wanted: usize,
        /// Total buffer size
        len: usize,
    },
}

/// Errors from the duplex connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// TCP connect or WebSocket handshake failed
    #[error("connect to {url} failed: {reason}")]
    Connect {
        /// Endpoint URL
        url: String,
        /// Underlying error message
        reason: String,
    },

    /// Reading a frame failed
    #[error("read failed: {0}")]
    Read(String),

    /// Writing a frame failed
    #[error("write failed: {0}")]
    Write(String),

    /// Peer closed the connection
    #[error("connection closed by peer")]
    Closed,

    /// Local I/O setup failed (socket options, thread spawn)
    #[error("I/O error: {0}")]
    Io(String),
}

/// Errors from classifying an inbound JSON-RPC frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Frame was not JSON or lacked a required field
    #[error("malformed frame: {reason}")]
    Malformed {
        /// What was wrong
        reason: String,
    },

    /// Notification payload used an encoding other than base64
    #[error("unsupported account encoding '{0}'")]
    UnsupportedEncoding(String),

    /// Notification payload failed to decode
    #[error(transparent)]
    Payload(#[from] CodecError),
}

/// Errors surfaced for a single subscription request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// Subscribe response carried no numeric `result`
    #[error("subscribe rejected: {response}")]
    Rejected {
        /// Raw response frame
        response: String,
    },

    /// Commitment string outside processed/confirmed/finalized
    #[error("invalid commitment level '{0}'")]
    InvalidCommitment(String),

    /// Connection went away before the subscription resolved
    #[error("connection lost before subscription resolved")]
    Disconnected,

    /// Session has already shut down
    #[error("session is closed")]
    SessionClosed,
}

/// Errors from runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {reason}")]
    Io {
        /// File path
        path: String,
        /// Underlying error message
        reason: String,
    },

    /// Config file was not valid JSON for `FeedConfig`
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A field failed validation
    #[error("invalid config field '{field}': {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Crate-level error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    FixedPoint(#[from] FixedPointError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_display() {
        let err = DecodeError::LengthMismatch {
            kind: "BookSide",
            expected: 90152,
            actual: 12,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("BookSide"));
        assert!(msg.contains("90152"));
        assert!(msg.contains("12"));
    }

    #[test]
    fn test_overflow_error_display() {
        let err = FixedPointError::Overflow {
            op: "mul",
            lhs: i128::MAX,
            rhs: 2,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("mul"));
        assert!(msg.contains("overflow"));
    }

    #[test]
    fn test_feed_error_from_decode() {
        let decode = DecodeError::Truncated {
            offset: 8,
            wanted: 16,
            len: 10,
        };
        let feed: FeedError = decode.clone().into();

        match feed {
            FeedError::Decode(inner) => assert_eq!(inner, decode),
            _ => panic!("Expected Decode variant"),
        }
    }
}
