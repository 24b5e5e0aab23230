//! Account snapshot decoding
//!
//! Each account the feed subscribes to is a fixed-size, versionless byte
//! blob. Decoding is strict about size: a payload whose length differs from
//! the layout is rejected with `DecodeError::LengthMismatch` before a single
//! field is read. Fields are then read one by one at their declared offsets
//! with padding skipped. Unrecognised tags become explicit `Unknown` variants.

pub mod book_side;
pub mod event_queue;
pub mod layout;
pub mod perp_market;
pub mod reader;

pub use book_side::{BookSide, InnerNode, LeafNode, SlabNode};
pub use event_queue::{Event, EventQueue, FillEvent, LiquidateEvent, OutEvent};
pub use perp_market::{LiquidityMiningInfo, PerpMarket};
pub use reader::ByteReader;

use crate::codec::base64_decode;
use crate::core::errors::{DecodeError, FeedError};

/// 8-byte prefix carried by every account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetaData {
    pub data_type: u8,
    pub version: u8,
    pub is_initialized: bool,
    pub extra_info: [u8; 5],
}

impl MetaData {
    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            data_type: r.read_u8()?,
            version: r.read_u8()?,
            is_initialized: r.read_bool()?,
            extra_info: r.read_array()?,
        })
    }
}

/// A record with an exact on-chain byte size
pub trait AccountLayout: Sized {
    /// Name used in errors and logs
    const KIND: &'static str;

    /// Exact payload length
    const SIZE: usize;

    /// Read fields from a buffer already known to be `SIZE` bytes
    fn read_fields(r: &mut ByteReader<'_>) -> Result<Self, DecodeError>;

    /// Length-check then decode
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != Self::SIZE {
            return Err(DecodeError::LengthMismatch {
                kind: Self::KIND,
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        Self::read_fields(&mut ByteReader::new(bytes))
    }
}

/// Decode a base64 account payload as it appears in notifications
pub fn decode_base64_account<T: AccountLayout>(data: &str) -> Result<T, FeedError> {
    let bytes = base64_decode(data)?;
    Ok(T::decode(&bytes)?)
}
