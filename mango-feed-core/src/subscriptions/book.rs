use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::errors::SubscriptionError;
use crate::core::{CloseReason, Side};
use crate::data::{AccountLayout, BookSide};
use crate::orderbook::aggregator::{MarketUpdate, UpdateSink};
use crate::session::{AccountNotification, SubscriptionListener};

/// Decodes bids or asks snapshots and publishes them whole
pub struct BookSideListener<S> {
    side: Side,
    sink: S,
    decoded: u64,
    rejected: u64,
}

impl<S: UpdateSink> BookSideListener<S> {
    pub fn new(side: Side, sink: S) -> Self {
        Self {
            side,
            sink,
            decoded: 0,
            rejected: 0,
        }
    }

    pub fn bids(sink: S) -> Self {
        Self::new(Side::Buy, sink)
    }

    pub fn asks(sink: S) -> Self {
        Self::new(Side::Sell, sink)
    }

    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl<S: UpdateSink> SubscriptionListener for BookSideListener<S> {
    fn on_active(&mut self, server_id: u64) {
        info!(side = %self.side, sub_id = server_id, "book side subscription active");
    }

    fn on_notification(&mut self, notification: AccountNotification) {
        let book = match BookSide::decode(&notification.data) {
            Ok(book) => book,
            Err(e) => {
                self.rejected += 1;
                warn!(side = %self.side, slot = notification.slot, error = %e, "dropping book side update");
                return;
            }
        };

        self.decoded += 1;
        debug!(
            side = %self.side,
            slot = notification.slot,
            leaf_count = book.leaf_count,
            "book side decoded"
        );

        let book = Arc::new(book);
        let update = match self.side {
            Side::Buy => MarketUpdate::Bids(book),
            Side::Sell => MarketUpdate::Asks(book),
        };
        self.sink.publish(update);
    }

    fn on_failed(&mut self, error: &SubscriptionError) {
        warn!(side = %self.side, error = %error, "book side subscription failed");
    }

    fn on_closed(&mut self, reason: CloseReason) {
        info!(side = %self.side, %reason, decoded = self.decoded, "book side subscription closed");
    }
}
