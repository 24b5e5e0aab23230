//! BookSide slab decoding
//!
//! One side of a perp order book is a crit-bit tree stored in a flat array of
//! 1024 equally sized node slots. Children are slot indices. Leaf keys pack
//! the price into the high 64 bits and an insertion sequence into the low 64.

use crate::core::errors::DecodeError;
use crate::core::pubkey::PublicKey;
use crate::data::layout::{node_tag, BOOK_SIDE_NODES_OFFSET, BOOK_SIDE_SIZE, MAX_BOOK_NODES, NODE_SIZE};
use crate::data::reader::ByteReader;
use crate::data::{AccountLayout, MetaData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerNode {
    pub prefix_len: u32,
    pub key: i128,
    /// `children[0]` holds the lower keys, `children[1]` the higher
    pub children: [u32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafNode {
    pub owner_slot: u8,
    pub order_type: u8,
    pub version: u8,
    /// Seconds the order stays valid after `timestamp`, 0 = good till cancelled
    pub time_in_force: u8,
    pub key: i128,
    pub owner: PublicKey,
    pub quantity: i64,
    pub client_order_id: u64,
    pub best_initial: i64,
    pub timestamp: u64,
}

impl LeafNode {
    /// Price in native lots: the high 64 bits of the key
    #[inline]
    pub fn price(&self) -> u64 {
        ((self.key as u128) >> 64) as u64
    }

    /// Insertion sequence: the low 64 bits of the key
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.key as u64
    }

    /// A leaf expires once `timestamp + time_in_force` is in the past
    #[inline]
    pub fn is_expired(&self, now: u64) -> bool {
        self.time_in_force != 0
            && self.timestamp.saturating_add(self.time_in_force as u64) < now
    }
}

/// One slab slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlabNode {
    Uninitialized,
    Inner(InnerNode),
    Leaf(LeafNode),
    Free { next: u32 },
    LastFree,
    /// Tag outside the known set; never interpreted further
    Unknown(u32),
}

impl SlabNode {
    fn read(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let tag = r.read_u32()?;
        let node = match tag {
            node_tag::UNINITIALIZED => SlabNode::Uninitialized,
            node_tag::INNER => SlabNode::Inner(InnerNode {
                prefix_len: r.read_u32()?,
                key: r.read_i128()?,
                children: [r.read_u32()?, r.read_u32()?],
            }),
            node_tag::LEAF => SlabNode::Leaf(LeafNode {
                owner_slot: r.read_u8()?,
                order_type: r.read_u8()?,
                version: r.read_u8()?,
                time_in_force: r.read_u8()?,
                key: r.read_i128()?,
                owner: r.read_pubkey()?,
                quantity: r.read_i64()?,
                client_order_id: r.read_u64()?,
                best_initial: r.read_i64()?,
                timestamp: r.read_u64()?,
            }),
            node_tag::FREE => SlabNode::Free { next: r.read_u32()? },
            node_tag::LAST_FREE => SlabNode::LastFree,
            other => SlabNode::Unknown(other),
        };
        Ok(node)
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            SlabNode::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }
}

/// Decoded order-book side; each update replaces the whole structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSide {
    pub meta: MetaData,
    pub bump_index: u64,
    pub free_list_len: u64,
    pub free_list_head: u32,
    pub root_node: u32,
    pub leaf_count: u64,
    pub nodes: Box<[SlabNode]>,
}

impl BookSide {
    /// Node at `index`, `None` when out of range
    #[inline]
    pub fn node(&self, index: u32) -> Option<&SlabNode> {
        self.nodes.get(index as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }
}

impl AccountLayout for BookSide {
    const KIND: &'static str = "BookSide";
    const SIZE: usize = BOOK_SIDE_SIZE;

    fn read_fields(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let meta = MetaData::read(r)?;
        let bump_index = r.read_u64()?;
        let free_list_len = r.read_u64()?;
        let free_list_head = r.read_u32()?;
        let root_node = r.read_u32()?;
        let leaf_count = r.read_u64()?;

        let mut nodes = Vec::with_capacity(MAX_BOOK_NODES);
        for i in 0..MAX_BOOK_NODES {
            let start = BOOK_SIDE_NODES_OFFSET + i * NODE_SIZE;
            let mut slot = r.window(start, NODE_SIZE)?;
            nodes.push(SlabNode::read(&mut slot)?);
        }

        Ok(Self {
            meta,
            bump_index,
            free_list_len,
            free_list_head,
            root_node,
            leaf_count,
            nodes: nodes.into_boxed_slice(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{BookSideBuilder, LeafSpec};

    #[test]
    fn test_empty_image_decodes_uninitialized() {
        let side = BookSideBuilder::new().decode();
        assert!(side.is_empty());
        assert_eq!(side.nodes.len(), MAX_BOOK_NODES);
        assert!(side.nodes.iter().all(|n| *n == SlabNode::Uninitialized));
    }

    #[test]
    fn test_leaf_fields_decoded_at_offsets() {
        let leaf = LeafSpec::new(415_858, 12).with_sequence(99).expiring(1_000, 30);
        let mut builder = BookSideBuilder::new();
        builder.put_leaf(5, &leaf).set_header(6, 5, 1);
        let side = builder.decode();

        assert_eq!(side.root_node, 5);
        assert_eq!(side.leaf_count, 1);
        assert_eq!(side.bump_index, 6);

        let decoded = side.node(5).and_then(SlabNode::as_leaf).unwrap();
        assert_eq!(decoded.price(), 415_858);
        assert_eq!(decoded.sequence(), 99);
        assert_eq!(decoded.quantity, 12);
        assert_eq!(decoded.timestamp, 1_000);
        assert_eq!(decoded.time_in_force, 30);
        assert_eq!(decoded.owner, leaf.owner);
    }

    #[test]
    fn test_inner_node_children() {
        let mut builder = BookSideBuilder::new();
        builder.put_inner(0, 63, 1 << 70, [1, 2]);
        let side = builder.decode();
        match side.node(0) {
            Some(SlabNode::Inner(inner)) => {
                assert_eq!(inner.prefix_len, 63);
                assert_eq!(inner.key, 1 << 70);
                assert_eq!(inner.children, [1, 2]);
            }
            other => panic!("Expected Inner, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_and_free_tags() {
        let mut builder = BookSideBuilder::new();
        builder.put_tag(3, 42).put_tag(4, node_tag::LAST_FREE);
        let side = builder.decode();
        assert_eq!(side.node(3), Some(&SlabNode::Unknown(42)));
        assert_eq!(side.node(4), Some(&SlabNode::LastFree));
        assert_eq!(side.node(MAX_BOOK_NODES as u32), None);
    }

    #[test]
    fn test_leaf_expiry_boundary() {
        let leaf = BookSideBuilder::with_leaves(&[LeafSpec::new(10, 1).expiring(100, 10)])
            .decode()
            .nodes[0]
            .as_leaf()
            .copied()
            .unwrap();

        // Valid through timestamp + tif inclusive
        assert!(!leaf.is_expired(110));
        assert!(leaf.is_expired(111));
    }

    #[test]
    fn test_zero_time_in_force_never_expires() {
        let leaf = LeafNode {
            owner_slot: 0,
            order_type: 0,
            version: 1,
            time_in_force: 0,
            key: 0,
            owner: PublicKey::default(),
            quantity: 1,
            client_order_id: 0,
            best_initial: 0,
            timestamp: 0,
        };
        assert!(!leaf.is_expired(u64::MAX));
    }
}
