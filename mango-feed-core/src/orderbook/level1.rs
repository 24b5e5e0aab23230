//! Level-1 view: best bid, best ask, mid and spread

use crate::orderbook::slab::BestOrder;

/// Best bid/ask with derived midpoint and spread
///
/// Midpoint and spread are only computed when both sides are present and the
/// book is not crossed; otherwise they stay 0.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Level1Snapshot {
    pub highest_bid: u64,
    pub highest_bid_size: u64,
    pub lowest_ask: u64,
    pub lowest_ask_size: u64,
    pub midpoint: u64,
    pub spread_bps: f64,
}

impl Level1Snapshot {
    pub fn from_best(bid: BestOrder, ask: BestOrder) -> Self {
        let mut l1 = Self {
            highest_bid: bid.price,
            highest_bid_size: bid.quantity,
            lowest_ask: ask.price,
            lowest_ask_size: ask.quantity,
            midpoint: 0,
            spread_bps: 0.0,
        };

        if l1.valid() {
            let (b, a) = (l1.highest_bid, l1.lowest_ask);
            // Overflow-safe (a + b) / 2
            l1.midpoint = b / 2 + a / 2 + (b % 2 + a % 2) / 2;
            l1.spread_bps = (a - b) as f64 * 10_000.0 / l1.midpoint as f64;
        }
        l1
    }

    /// Both sides present and ask strictly above bid
    #[inline]
    pub fn valid(&self) -> bool {
        self.highest_bid != 0 && self.lowest_ask != 0 && self.lowest_ask > self.highest_bid
    }

    /// Absolute price `percent` away from the midpoint, floored at 0
    pub fn price_at_offset(&self, percent: i8) -> u64 {
        let factor = (100 + percent as i64).max(0) as u128;
        u64::try_from(self.midpoint as u128 * factor / 100).unwrap_or(u64::MAX)
    }

    /// Best prices and sizes equal, derived fields ignored
    pub fn same_top(&self, other: &Self) -> bool {
        self.highest_bid == other.highest_bid
            && self.highest_bid_size == other.highest_bid_size
            && self.lowest_ask == other.lowest_ask
            && self.lowest_ask_size == other.lowest_ask_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn best(price: u64, quantity: u64) -> BestOrder {
        BestOrder { price, quantity }
    }

    #[test]
    fn test_valid_book() {
        let l1 = Level1Snapshot::from_best(best(99, 5), best(101, 7));
        assert!(l1.valid());
        assert_eq!(l1.midpoint, 100);
        assert_relative_eq!(l1.spread_bps, 200.0);
        assert_eq!(l1.highest_bid_size, 5);
        assert_eq!(l1.lowest_ask_size, 7);
    }

    #[test]
    fn test_missing_side_is_invalid() {
        let l1 = Level1Snapshot::from_best(BestOrder::NONE, best(101, 7));
        assert!(!l1.valid());
        assert_eq!(l1.midpoint, 0);
        assert_eq!(l1.spread_bps, 0.0);

        let l1 = Level1Snapshot::from_best(best(99, 5), BestOrder::NONE);
        assert!(!l1.valid());
    }

    #[test]
    fn test_crossed_and_locked_are_invalid() {
        assert!(!Level1Snapshot::from_best(best(101, 1), best(100, 1)).valid());
        assert!(!Level1Snapshot::from_best(best(100, 1), best(100, 1)).valid());
    }

    #[test]
    fn test_midpoint_no_overflow() {
        let l1 = Level1Snapshot::from_best(best(u64::MAX - 2, 1), best(u64::MAX, 1));
        assert!(l1.valid());
        assert_eq!(l1.midpoint, u64::MAX - 1);
    }

    #[test]
    fn test_midpoint_odd_sum_truncates() {
        let l1 = Level1Snapshot::from_best(best(100, 1), best(103, 1));
        assert_eq!(l1.midpoint, 101);
    }

    #[test]
    fn test_price_at_offset() {
        let l1 = Level1Snapshot::from_best(best(990, 1), best(1010, 1));
        assert_eq!(l1.price_at_offset(2), 1020);
        assert_eq!(l1.price_at_offset(-2), 980);
        assert_eq!(l1.price_at_offset(0), 1000);
        assert_eq!(l1.price_at_offset(-128), 0);
    }

    #[test]
    fn test_price_at_offset_saturates() {
        let l1 = Level1Snapshot::from_best(best(u64::MAX - 2, 1), best(u64::MAX, 1));
        assert_eq!(l1.price_at_offset(127), u64::MAX);
        assert_eq!(l1.price_at_offset(0), u64::MAX - 1);
        assert!(l1.price_at_offset(-1) < u64::MAX - 1);
    }
}
