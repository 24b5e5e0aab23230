//! Best-first traversal of a BookSide slab
//!
//! The slab is a crit-bit tree: at every inner node `children[0]` holds the
//! lower keys and `children[1]` the higher ones. A depth-first walk with an
//! explicit stack that pops the higher child first yields bids best-first;
//! popping the lower child first yields asks best-first.
//!
//! The walk never trusts the bytes: child indices outside the slab are
//! skipped, non-tree tags end that branch, and the number of pops is bounded
//! by the slab capacity so a corrupted (cyclic) tree terminates.

use tracing::warn;

use crate::core::types::Side;
use crate::data::book_side::{BookSide, LeafNode, SlabNode};
use crate::data::layout::MAX_BOOK_NODES;

/// Best price and its quantity; `(0, 0)` when the side has no live order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BestOrder {
    pub price: u64,
    pub quantity: u64,
}

impl BestOrder {
    pub const NONE: Self = Self {
        price: 0,
        quantity: 0,
    };

    #[inline]
    pub fn is_none(&self) -> bool {
        self.price == 0 && self.quantity == 0
    }
}

/// One resting order as shown in a book listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookLevel {
    pub price: u64,
    pub quantity: u64,
}

/// Leaves of one side in best-first order, expired ones included
pub struct SlabIter<'a> {
    book: &'a BookSide,
    side: Side,
    stack: Vec<u32>,
    budget: usize,
}

impl<'a> SlabIter<'a> {
    fn new(book: &'a BookSide, side: Side) -> Self {
        let mut stack = Vec::with_capacity(32);
        if book.leaf_count > 0 {
            stack.push(book.root_node);
        }
        Self {
            book,
            side,
            stack,
            budget: MAX_BOOK_NODES,
        }
    }

    fn push_children(&mut self, children: [u32; 2]) {
        // The child pushed last is visited first
        let (first, last) = match self.side {
            Side::Buy => (children[0], children[1]),
            Side::Sell => (children[1], children[0]),
        };
        self.stack.push(first);
        self.stack.push(last);
    }
}

impl<'a> Iterator for SlabIter<'a> {
    type Item = &'a LeafNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(index) = self.stack.pop() {
            if self.budget == 0 {
                warn!(
                    side = %self.side,
                    root = self.book.root_node,
                    "slab walk exceeded node budget, tree is malformed"
                );
                self.stack.clear();
                return None;
            }
            self.budget -= 1;

            match self.book.node(index) {
                Some(SlabNode::Inner(inner)) => self.push_children(inner.children),
                Some(SlabNode::Leaf(leaf)) => return Some(leaf),
                // Out of range or not a tree node: nothing below it
                _ => continue,
            }
        }
        None
    }
}

impl BookSide {
    /// Every leaf in best-first order for `side`
    pub fn leaves(&self, side: Side) -> SlabIter<'_> {
        SlabIter::new(self, side)
    }

    /// Unexpired leaves in best-first order
    pub fn live_leaves(&self, side: Side, now: u64) -> impl Iterator<Item = &LeafNode> + '_ {
        self.leaves(side).filter(move |leaf| !leaf.is_expired(now))
    }

    /// First unexpired leaf, or [`BestOrder::NONE`]
    pub fn best_order(&self, side: Side, now: u64) -> BestOrder {
        self.live_leaves(side, now)
            .next()
            .map(|leaf| BestOrder {
                price: leaf.price(),
                quantity: leaf.quantity.max(0) as u64,
            })
            .unwrap_or(BestOrder::NONE)
    }

    /// Total quantity of unexpired orders at or better than `threshold`
    ///
    /// Bids count at `price >= threshold`, asks at `price <= threshold`.
    /// The whole tree is scanned since walk order is only best-first at the
    /// top, not globally sorted.
    pub fn volume(&self, side: Side, threshold: u64, now: u64) -> u64 {
        self.live_leaves(side, now)
            .filter(|leaf| match side {
                Side::Buy => leaf.price() >= threshold,
                Side::Sell => leaf.price() <= threshold,
            })
            .map(|leaf| leaf.quantity.max(0) as u64)
            .sum()
    }

    /// Unexpired orders sorted best-first (bids descending, asks ascending)
    pub fn levels(&self, side: Side, now: u64) -> Vec<BookLevel> {
        let mut levels: Vec<BookLevel> = self
            .live_leaves(side, now)
            .map(|leaf| BookLevel {
                price: leaf.price(),
                quantity: leaf.quantity.max(0) as u64,
            })
            .collect();

        // Stable: equal prices keep time priority from the walk
        match side {
            Side::Buy => levels.sort_by(|a, b| b.price.cmp(&a.price)),
            Side::Sell => levels.sort_by(|a, b| a.price.cmp(&b.price)),
        }
        levels
    }

    /// Best-first levels with equal prices merged, at most `max_levels`
    pub fn aggregated_levels(&self, side: Side, now: u64, max_levels: usize) -> Vec<BookLevel> {
        let mut out: Vec<BookLevel> = Vec::with_capacity(max_levels.min(64));
        for level in self.levels(side, now) {
            if let Some(last) = out.last_mut() {
                if last.price == level.price {
                    last.quantity += level.quantity;
                    continue;
                }
            }
            if out.len() == max_levels {
                break;
            }
            out.push(level);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::layout::node_tag;
    use crate::testing::fixtures::{BookSideBuilder, LeafSpec};

    const NOW: u64 = 1_000_000;

    fn book(leaves: &[LeafSpec]) -> BookSide {
        BookSideBuilder::with_leaves(leaves).decode()
    }

    // ===== best_order =====

    #[test]
    fn test_empty_side_returns_sentinel() {
        let side = book(&[]);
        assert_eq!(side.best_order(Side::Buy, NOW), BestOrder::NONE);
        assert_eq!(side.best_order(Side::Sell, NOW), BestOrder::NONE);
        assert!(side.best_order(Side::Buy, NOW).is_none());
    }

    #[test]
    fn test_single_leaf() {
        let side = book(&[LeafSpec::new(415_858, 3)]);
        let best = side.best_order(Side::Buy, NOW);
        assert_eq!(best, BestOrder { price: 415_858, quantity: 3 });
        assert_eq!(side.best_order(Side::Sell, NOW), best);
    }

    #[test]
    fn test_bid_best_is_highest() {
        let side = book(&[
            LeafSpec::new(100, 1),
            LeafSpec::new(105, 2),
            LeafSpec::new(99, 3),
            LeafSpec::new(103, 4),
        ]);
        assert_eq!(side.best_order(Side::Buy, NOW), BestOrder { price: 105, quantity: 2 });
    }

    #[test]
    fn test_ask_best_is_lowest() {
        let side = book(&[
            LeafSpec::new(100, 1),
            LeafSpec::new(105, 2),
            LeafSpec::new(99, 3),
            LeafSpec::new(103, 4),
        ]);
        assert_eq!(side.best_order(Side::Sell, NOW), BestOrder { price: 99, quantity: 3 });
    }

    #[test]
    fn test_expired_best_is_skipped() {
        let side = book(&[
            LeafSpec::new(105, 2).expiring(NOW - 100, 10),
            LeafSpec::new(104, 5),
        ]);
        assert_eq!(side.best_order(Side::Buy, NOW), BestOrder { price: 104, quantity: 5 });
        // Expired leaf is still in the structure
        assert_eq!(side.leaves(Side::Buy).count(), 2);
    }

    #[test]
    fn test_fully_expired_returns_sentinel() {
        let side = book(&[
            LeafSpec::new(105, 2).expiring(10, 1),
            LeafSpec::new(104, 5).expiring(10, 1),
        ]);
        assert_eq!(side.best_order(Side::Buy, NOW), BestOrder::NONE);
    }

    #[test]
    fn test_unexpired_tif_is_kept() {
        let side = book(&[LeafSpec::new(105, 2).expiring(NOW - 5, 10)]);
        assert_eq!(side.best_order(Side::Buy, NOW).price, 105);
    }

    // ===== volume =====

    #[test]
    fn test_bid_volume_at_or_above() {
        let side = book(&[
            LeafSpec::new(100, 1),
            LeafSpec::new(101, 2),
            LeafSpec::new(102, 4),
            LeafSpec::new(103, 8),
        ]);
        assert_eq!(side.volume(Side::Buy, 102, NOW), 12);
        assert_eq!(side.volume(Side::Buy, 0, NOW), 15);
        assert_eq!(side.volume(Side::Buy, 200, NOW), 0);
    }

    #[test]
    fn test_ask_volume_at_or_below() {
        let side = book(&[
            LeafSpec::new(100, 1),
            LeafSpec::new(101, 2),
            LeafSpec::new(102, 4),
            LeafSpec::new(103, 8),
        ]);
        assert_eq!(side.volume(Side::Sell, 101, NOW), 3);
        assert_eq!(side.volume(Side::Sell, u64::MAX, NOW), 15);
    }

    #[test]
    fn test_volume_scans_whole_tree() {
        // Hand-built tree whose walk order is not sorted below the top:
        //      0
        //    /   \
        //   1     2
        //  (90)  / \
        //      (95) (80)
        let mut builder = BookSideBuilder::new();
        builder
            .put_inner(0, 0, 0, [1, 2])
            .put_leaf(1, &LeafSpec::new(90, 1))
            .put_inner(2, 0, 0, [3, 4])
            .put_leaf(3, &LeafSpec::new(95, 2))
            .put_leaf(4, &LeafSpec::new(80, 4))
            .set_header(5, 0, 3);
        let side = builder.decode();

        // Bid walk: 80, 95, 90 - a scan that stopped at the first miss would see only 0
        assert_eq!(side.volume(Side::Buy, 90, NOW), 3);
    }

    #[test]
    fn test_volume_excludes_expired() {
        let side = book(&[
            LeafSpec::new(100, 1).expiring(1, 1),
            LeafSpec::new(101, 2),
        ]);
        assert_eq!(side.volume(Side::Buy, 0, NOW), 2);
    }

    // ===== levels =====

    #[test]
    fn test_levels_sorted_best_first() {
        let leaves = [
            LeafSpec::new(100, 1),
            LeafSpec::new(105, 2),
            LeafSpec::new(99, 3),
            LeafSpec::new(103, 4),
        ];
        let side = book(&leaves);

        let bids: Vec<u64> = side.levels(Side::Buy, NOW).iter().map(|l| l.price).collect();
        assert_eq!(bids, vec![105, 103, 100, 99]);

        let asks: Vec<u64> = side.levels(Side::Sell, NOW).iter().map(|l| l.price).collect();
        assert_eq!(asks, vec![99, 100, 103, 105]);
    }

    #[test]
    fn test_aggregated_levels_merge_equal_prices() {
        let side = book(&[
            LeafSpec::new(100, 1).with_sequence(1),
            LeafSpec::new(100, 2).with_sequence(2),
            LeafSpec::new(101, 4),
            LeafSpec::new(102, 8),
        ]);
        let levels = side.aggregated_levels(Side::Sell, NOW, 2);
        assert_eq!(
            levels,
            vec![
                BookLevel { price: 100, quantity: 3 },
                BookLevel { price: 101, quantity: 4 },
            ]
        );
    }

    // ===== malformed trees =====

    #[test]
    fn test_zero_leaf_count_is_empty_even_with_nodes() {
        let mut builder = BookSideBuilder::with_leaves(&[LeafSpec::new(100, 1)]);
        builder.set_header(1, 0, 0);
        assert_eq!(builder.decode().best_order(Side::Buy, NOW), BestOrder::NONE);
    }

    #[test]
    fn test_out_of_range_child_is_skipped() {
        let mut builder = BookSideBuilder::new();
        builder
            .put_inner(0, 0, 0, [1, 5000])
            .put_leaf(1, &LeafSpec::new(50, 7))
            .set_header(2, 0, 1);
        let side = builder.decode();
        assert_eq!(side.best_order(Side::Buy, NOW), BestOrder { price: 50, quantity: 7 });
    }

    #[test]
    fn test_unknown_tag_is_skipped() {
        let mut builder = BookSideBuilder::new();
        builder
            .put_inner(0, 0, 0, [1, 2])
            .put_leaf(1, &LeafSpec::new(50, 7))
            .put_tag(2, 77)
            .set_header(3, 0, 1);
        let side = builder.decode();
        assert_eq!(side.best_order(Side::Buy, NOW).price, 50);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut builder = BookSideBuilder::new();
        builder.put_inner(0, 0, 0, [0, 0]).set_header(1, 0, 1);
        let side = builder.decode();
        assert_eq!(side.leaves(Side::Buy).count(), 0);
        assert_eq!(side.volume(Side::Sell, u64::MAX, NOW), 0);
    }

    #[test]
    fn test_free_root_is_empty() {
        let mut builder = BookSideBuilder::new();
        builder.put_tag(0, node_tag::FREE).set_header(1, 0, 1);
        assert_eq!(builder.decode().best_order(Side::Sell, NOW), BestOrder::NONE);
    }
}
