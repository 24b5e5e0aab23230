//! Fixed byte layouts of the on-chain accounts
//!
//! Every offset and size here mirrors the producer's packed little-endian
//! encoding. Decoders index with these constants, never literals.
//!
//! ```text
//! BookSide (90152 bytes)
//!   0   meta            8
//!   8   bump_index      u64
//!   16  free_list_len   u64
//!   24  free_list_head  u32
//!   28  root_node       u32
//!   32  leaf_count      u64
//!   40  nodes           1024 x 88
//!
//! EventQueue (51232 bytes)
//!   0   meta            8
//!   8   head            u64
//!   16  count           u64
//!   24  seq_num         u64
//!   32  events          256 x 200
//! ```

/// Account metadata prefix (data type, version, initialized, padding)
pub const META_DATA_SIZE: usize = 8;

// ===== Slab =====

/// Node slots in one book side
pub const MAX_BOOK_NODES: usize = 1024;

/// Size of every slab node slot regardless of tag
pub const NODE_SIZE: usize = 88;

/// Offset of the first node slot inside a BookSide
pub const BOOK_SIDE_NODES_OFFSET: usize = META_DATA_SIZE + 8 + 8 + 4 + 4 + 8;

pub const BOOK_SIDE_SIZE: usize = BOOK_SIDE_NODES_OFFSET + MAX_BOOK_NODES * NODE_SIZE;

/// Slab node tags
pub mod node_tag {
    pub const UNINITIALIZED: u32 = 0;
    pub const INNER: u32 = 1;
    pub const LEAF: u32 = 2;
    pub const FREE: u32 = 3;
    pub const LAST_FREE: u32 = 4;
}

// ===== Event queue =====

/// Ring capacity of a perp event queue
pub const MAX_EVENTS: usize = 256;

/// Size of every event slot regardless of type
pub const EVENT_SIZE: usize = 200;

pub const EVENT_QUEUE_HEADER_SIZE: usize = META_DATA_SIZE + 8 + 8 + 8;

pub const EVENT_QUEUE_SIZE: usize = EVENT_QUEUE_HEADER_SIZE + MAX_EVENTS * EVENT_SIZE;

/// Event type bytes
pub mod event_type {
    pub const FILL: u8 = 0;
    pub const OUT: u8 = 1;
    pub const LIQUIDATE: u8 = 2;
}

// ===== Perp market =====

pub const PERP_MARKET_SIZE: usize = 320;

// Compile-time assertions: sizes must match what the producer writes
const _: () = {
    if BOOK_SIDE_SIZE != 90152 {
        panic!("BookSide layout must be 90152 bytes");
    }
    if EVENT_QUEUE_SIZE != 51232 {
        panic!("EventQueue layout must be 51232 bytes");
    }
};
