//! Byte-level builders for account fixtures
//!
//! These write the same packed layouts the producer writes, so tests can
//! exercise the decoders, the slab traversal and the replayer without a node.

use crate::core::fixed::I80F48;
use crate::core::pubkey::PublicKey;
use crate::core::types::Side;
use crate::data::event_queue::{Event, FillEvent, LiquidateEvent, OutEvent};
use crate::data::layout::{
    event_type, node_tag, BOOK_SIDE_NODES_OFFSET, BOOK_SIDE_SIZE, EVENT_QUEUE_HEADER_SIZE,
    EVENT_QUEUE_SIZE, EVENT_SIZE, MAX_BOOK_NODES, MAX_EVENTS, NODE_SIZE,
};
use crate::data::{AccountLayout, BookSide, EventQueue};

/// A single Fill event as captured from mainnet (seq_num 208787, price 415858)
pub const FIXTURE_FILL_EVENT_BASE64: &str = "AAEMAAEAAAB6PABiAAAAAJMvAwAAAAAAEp7AH3xFwgByZdzdjJaK2f9K+nwfGkKL3EBs6qBSkbT0Wsj+/////3JYBgAAAAAAPNHr0H4BAADkFB3J5f//////////////AAAAAAAAAABfPABiAAAAABh0e79OvRxWYgRL9dtu02f5VK/SK/CK1oU+Tgm1NbL9IaU3AQAAAADOMAYAAAAAAAAAAAAAAAAA46WbxCAAAAAAAAAAAAAAAHJYBgAAAAAAAQAAAAAAAAA=";

pub const FIXTURE_MAKER: &str = "2Fgjpc7bp9jpiTRKSVSsiAcexw8Cawbz7GLJu8MamS9q";
pub const FIXTURE_TAKER: &str = "2eTob7jrhKeHNhkK1jTfS3kZYdtNQS1VF7LETom6YHjJ";

// ============================================================================
// BookSide
// ============================================================================

/// Leaf order description for `BookSideBuilder`
#[derive(Debug, Clone, Copy)]
pub struct LeafSpec {
    pub price: u64,
    pub quantity: i64,
    pub sequence: u64,
    pub owner: PublicKey,
    pub client_order_id: u64,
    pub timestamp: u64,
    pub time_in_force: u8,
}

impl LeafSpec {
    pub fn new(price: u64, quantity: i64) -> Self {
        Self {
            price,
            quantity,
            sequence: 0,
            owner: PublicKey::new([7; 32]),
            client_order_id: 0,
            timestamp: 0,
            time_in_force: 0,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Order placed at `timestamp` valid for `time_in_force` seconds
    pub fn expiring(mut self, timestamp: u64, time_in_force: u8) -> Self {
        self.timestamp = timestamp;
        self.time_in_force = time_in_force;
        self
    }

    pub fn key(&self) -> i128 {
        (((self.price as u128) << 64) | self.sequence as u128) as i128
    }
}

/// Writes a BookSide byte image node by node
pub struct BookSideBuilder {
    bytes: Vec<u8>,
    next_free: u32,
}

impl Default for BookSideBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BookSideBuilder {
    /// All-zero image: every slot Uninitialized, root 0, no leaves
    pub fn new() -> Self {
        let mut bytes = vec![0u8; BOOK_SIDE_SIZE];
        bytes[0] = 2; // data type: bids/asks
        bytes[2] = 1; // initialized
        Self {
            bytes,
            next_free: 0,
        }
    }

    /// Build a valid tree from `leaves`, keys sorted ascending left to right
    pub fn with_leaves(leaves: &[LeafSpec]) -> Self {
        let mut builder = Self::new();
        if leaves.is_empty() {
            return builder;
        }
        let mut sorted = leaves.to_vec();
        sorted.sort_by_key(|l| l.key());

        let root = builder.place(&sorted);
        let used = builder.next_free as u64;
        builder.set_header(used, root, sorted.len() as u64);
        builder
    }

    fn place(&mut self, leaves: &[LeafSpec]) -> u32 {
        let index = self.next_free;
        self.next_free += 1;
        if leaves.len() == 1 {
            self.put_leaf(index, &leaves[0]);
            return index;
        }
        let (low, high) = leaves.split_at(leaves.len() / 2);
        let left = self.place(low);
        let right = self.place(high);
        self.put_inner(index, 0, high[0].key(), [left, right]);
        index
    }

    pub fn set_header(&mut self, bump_index: u64, root: u32, leaf_count: u64) -> &mut Self {
        self.bytes[8..16].copy_from_slice(&bump_index.to_le_bytes());
        self.bytes[28..32].copy_from_slice(&root.to_le_bytes());
        self.bytes[32..40].copy_from_slice(&leaf_count.to_le_bytes());
        self
    }

    fn slot(&mut self, index: u32) -> &mut [u8] {
        assert!((index as usize) < MAX_BOOK_NODES, "slot {index} out of range");
        let start = BOOK_SIDE_NODES_OFFSET + index as usize * NODE_SIZE;
        &mut self.bytes[start..start + NODE_SIZE]
    }

    pub fn put_inner(&mut self, index: u32, prefix_len: u32, key: i128, children: [u32; 2]) -> &mut Self {
        let s = self.slot(index);
        s.fill(0);
        s[0..4].copy_from_slice(&node_tag::INNER.to_le_bytes());
        s[4..8].copy_from_slice(&prefix_len.to_le_bytes());
        s[8..24].copy_from_slice(&key.to_le_bytes());
        s[24..28].copy_from_slice(&children[0].to_le_bytes());
        s[28..32].copy_from_slice(&children[1].to_le_bytes());
        self
    }

    pub fn put_leaf(&mut self, index: u32, leaf: &LeafSpec) -> &mut Self {
        let s = self.slot(index);
        s.fill(0);
        s[0..4].copy_from_slice(&node_tag::LEAF.to_le_bytes());
        s[4] = 0; // owner slot
        s[5] = 0; // order type
        s[6] = 1; // version
        s[7] = leaf.time_in_force;
        s[8..24].copy_from_slice(&leaf.key().to_le_bytes());
        s[24..56].copy_from_slice(leaf.owner.as_bytes());
        s[56..64].copy_from_slice(&leaf.quantity.to_le_bytes());
        s[64..72].copy_from_slice(&leaf.client_order_id.to_le_bytes());
        s[72..80].copy_from_slice(&leaf.quantity.to_le_bytes());
        s[80..88].copy_from_slice(&leaf.timestamp.to_le_bytes());
        self
    }

    /// Write an arbitrary tag with zeroed body
    pub fn put_tag(&mut self, index: u32, tag: u32) -> &mut Self {
        let s = self.slot(index);
        s.fill(0);
        s[0..4].copy_from_slice(&tag.to_le_bytes());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn decode(&self) -> BookSide {
        match BookSide::decode(&self.bytes) {
            Ok(side) => side,
            Err(e) => panic!("fixture BookSide failed to decode: {e}"),
        }
    }
}

// ============================================================================
// EventQueue
// ============================================================================

/// Fill with sensible defaults for tests
pub fn fill_event(seq_num: u64, price: i64, quantity: i64) -> FillEvent {
    FillEvent {
        taker_side: Side::Buy,
        maker_slot: 0,
        maker_out: false,
        version: 1,
        timestamp: 1_644_182_650 + seq_num,
        seq_num,
        maker: PublicKey::new([1; 32]),
        maker_order_id: 0,
        maker_client_order_id: 0,
        maker_fee: I80F48::ZERO,
        best_initial: 0,
        maker_timestamp: 1_644_182_600,
        taker: PublicKey::new([2; 32]),
        taker_order_id: 0,
        taker_client_order_id: 0,
        taker_fee: I80F48::ZERO,
        price,
        quantity,
    }
}

/// Encode an event into its 200-byte slot image
pub fn encode_event(event: &Event) -> [u8; EVENT_SIZE] {
    let mut s = [0u8; EVENT_SIZE];
    match event {
        Event::Fill(f) => encode_fill(&mut s, f),
        Event::Out(o) => encode_out(&mut s, o),
        Event::Liquidate(l) => encode_liquidate(&mut s, l),
        Event::Unknown(tag) => s[0] = *tag,
    }
    s
}

fn encode_fill(s: &mut [u8; EVENT_SIZE], f: &FillEvent) {
    s[0] = event_type::FILL;
    s[1] = f.taker_side as u8;
    s[2] = f.maker_slot;
    s[3] = f.maker_out as u8;
    s[4] = f.version;
    s[8..16].copy_from_slice(&f.timestamp.to_le_bytes());
    s[16..24].copy_from_slice(&f.seq_num.to_le_bytes());
    s[24..56].copy_from_slice(f.maker.as_bytes());
    s[56..72].copy_from_slice(&f.maker_order_id.to_le_bytes());
    s[72..80].copy_from_slice(&f.maker_client_order_id.to_le_bytes());
    s[80..96].copy_from_slice(&f.maker_fee.to_bits().to_le_bytes());
    s[96..104].copy_from_slice(&f.best_initial.to_le_bytes());
    s[104..112].copy_from_slice(&f.maker_timestamp.to_le_bytes());
    s[112..144].copy_from_slice(f.taker.as_bytes());
    s[144..160].copy_from_slice(&f.taker_order_id.to_le_bytes());
    s[160..168].copy_from_slice(&f.taker_client_order_id.to_le_bytes());
    s[168..184].copy_from_slice(&f.taker_fee.to_bits().to_le_bytes());
    s[184..192].copy_from_slice(&f.price.to_le_bytes());
    s[192..200].copy_from_slice(&f.quantity.to_le_bytes());
}

fn encode_out(s: &mut [u8; EVENT_SIZE], o: &OutEvent) {
    s[0] = event_type::OUT;
    s[1] = o.side as u8;
    s[2] = o.owner_slot;
    s[8..16].copy_from_slice(&o.timestamp.to_le_bytes());
    s[16..24].copy_from_slice(&o.seq_num.to_le_bytes());
    s[24..56].copy_from_slice(o.owner.as_bytes());
    s[56..64].copy_from_slice(&o.quantity.to_le_bytes());
}

fn encode_liquidate(s: &mut [u8; EVENT_SIZE], l: &LiquidateEvent) {
    s[0] = event_type::LIQUIDATE;
    s[8..16].copy_from_slice(&l.timestamp.to_le_bytes());
    s[16..24].copy_from_slice(&l.seq_num.to_le_bytes());
    s[24..56].copy_from_slice(l.liqee.as_bytes());
    s[56..88].copy_from_slice(l.liqor.as_bytes());
    s[88..104].copy_from_slice(&l.price.to_bits().to_le_bytes());
    s[104..112].copy_from_slice(&l.quantity.to_le_bytes());
    s[112..128].copy_from_slice(&l.liquidation_fee.to_bits().to_le_bytes());
}

/// Simulates the on-chain queue: pushes append, consumes advance head
#[derive(Clone)]
pub struct EventQueueBuilder {
    head: u64,
    count: u64,
    seq_num: u64,
    slots: Vec<[u8; EVENT_SIZE]>,
}

impl Default for EventQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueueBuilder {
    pub fn new() -> Self {
        Self {
            head: 0,
            count: 0,
            seq_num: 0,
            slots: vec![[0u8; EVENT_SIZE]; MAX_EVENTS],
        }
    }

    /// Append an event; once full the oldest unconsumed slot is overwritten
    pub fn push(&mut self, event: Event) -> &mut Self {
        self.push_raw(encode_event(&event))
    }

    pub fn push_raw(&mut self, slot: [u8; EVENT_SIZE]) -> &mut Self {
        let capacity = MAX_EVENTS as u64;
        let index = ((self.head + self.count) % capacity) as usize;
        self.slots[index] = slot;
        if self.count == capacity {
            self.head = (self.head + 1) % capacity;
        } else {
            self.count += 1;
        }
        self.seq_num = self.seq_num.wrapping_add(1);
        self
    }

    /// Push `n` fills numbered from the current sequence
    pub fn push_fills(&mut self, n: usize, price: i64) -> &mut Self {
        for _ in 0..n {
            let seq = self.seq_num;
            self.push(Event::Fill(fill_event(seq, price, 1)));
        }
        self
    }

    /// Consume the `n` oldest events like the crank does
    pub fn consume(&mut self, n: u64) -> &mut Self {
        let n = n.min(self.count);
        self.head = (self.head + n) % MAX_EVENTS as u64;
        self.count -= n;
        self
    }

    pub fn set_seq_num(&mut self, seq_num: u64) -> &mut Self {
        self.seq_num = seq_num;
        self
    }

    pub fn seq_num(&self) -> u64 {
        self.seq_num
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; EVENT_QUEUE_SIZE];
        bytes[0] = 6; // data type: event queue
        bytes[2] = 1;
        bytes[8..16].copy_from_slice(&self.head.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.count.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.seq_num.to_le_bytes());
        for (i, slot) in self.slots.iter().enumerate() {
            let start = EVENT_QUEUE_HEADER_SIZE + i * EVENT_SIZE;
            bytes[start..start + EVENT_SIZE].copy_from_slice(slot);
        }
        bytes
    }

    pub fn decode(&self) -> EventQueue {
        match EventQueue::decode(&self.build()) {
            Ok(queue) => queue,
            Err(e) => panic!("fixture EventQueue failed to decode: {e}"),
        }
    }
}

/// The captured fill placed as the single event of a queue at seq_num 208787
pub fn fixture_event_queue() -> EventQueue {
    let raw = match crate::codec::base64_decode(FIXTURE_FILL_EVENT_BASE64) {
        Ok(raw) => raw,
        Err(e) => panic!("fixture fill is not base64: {e}"),
    };
    let mut slot = [0u8; EVENT_SIZE];
    slot.copy_from_slice(&raw);

    let mut builder = EventQueueBuilder::new();
    builder.set_seq_num(208_786);
    builder.push_raw(slot);
    builder.decode()
}
