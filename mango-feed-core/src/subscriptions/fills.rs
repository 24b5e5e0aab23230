use tracing::{debug, info, trace, warn};

use crate::core::errors::SubscriptionError;
use crate::core::{unix_now_secs, CloseReason};
use crate::data::{AccountLayout, Event, EventQueue};
use crate::events::{EventQueueReplayer, ReplayStats};
use crate::orderbook::aggregator::{MarketUpdate, UpdateSink};
use crate::session::{AccountNotification, SubscriptionListener};

/// Replays event queue snapshots and publishes each new fill
pub struct EventQueueListener<S> {
    replayer: EventQueueReplayer,
    sink: S,
    rejected: u64,
}

impl<S: UpdateSink> EventQueueListener<S> {
    /// First snapshot is a baseline; only later fills are published
    pub fn new(sink: S) -> Self {
        Self::with_replayer(EventQueueReplayer::new(), sink)
    }

    pub fn with_replayer(replayer: EventQueueReplayer, sink: S) -> Self {
        Self {
            replayer,
            sink,
            rejected: 0,
        }
    }

    pub fn stats(&self) -> ReplayStats {
        self.replayer.stats()
    }

    pub fn last_seq_num(&self) -> Option<u64> {
        self.replayer.last_seq_num()
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    fn process(&mut self, queue: &EventQueue, slot: u64) {
        let now = unix_now_secs();
        let sink = &self.sink;
        let skipped = self.replayer.replay_with(queue, |event| match event {
            Event::Fill(fill) => {
                debug!(
                    seq_num = fill.seq_num,
                    price = fill.price,
                    quantity = fill.quantity,
                    taker_side = %fill.taker_side,
                    lag_secs = now.saturating_sub(fill.timestamp),
                    "fill"
                );
                sink.publish(MarketUpdate::Fill(*fill));
            }
            Event::Out(out) => trace!(seq_num = out.seq_num, side = %out.side, "out"),
            Event::Liquidate(liq) => {
                trace!(seq_num = liq.seq_num, price = liq.price.to_f64(), "liquidate")
            }
            Event::Unknown(tag) => debug!(tag, "skipping unknown event type"),
        });
        if skipped > 0 {
            warn!(skipped, slot, "fills lost to ring overwrite");
        }
    }
}

impl<S: UpdateSink> SubscriptionListener for EventQueueListener<S> {
    fn on_active(&mut self, server_id: u64) {
        info!(sub_id = server_id, "event queue subscription active");
    }

    fn on_notification(&mut self, notification: AccountNotification) {
        match EventQueue::decode(&notification.data) {
            Ok(queue) => self.process(&queue, notification.slot),
            Err(e) => {
                self.rejected += 1;
                warn!(slot = notification.slot, error = %e, "dropping event queue update");
            }
        }
    }

    fn on_failed(&mut self, error: &SubscriptionError) {
        warn!(error = %error, "event queue subscription failed");
    }

    fn on_closed(&mut self, reason: CloseReason) {
        let stats = self.replayer.stats();
        info!(
            %reason,
            snapshots = stats.snapshots,
            replayed = stats.events_replayed,
            skipped = stats.events_skipped,
            "event queue subscription closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Side;
    use crate::orderbook::aggregator::MarketAggregator;
    use crate::testing::fixtures::{fill_event, EventQueueBuilder};
    use std::sync::Arc;

    fn notification(data: Vec<u8>) -> AccountNotification {
        AccountNotification {
            subscription: 2,
            slot: 77,
            data,
        }
    }

    #[test]
    fn test_baseline_then_new_fills() {
        let aggregator = Arc::new(MarketAggregator::new());
        let mut listener = EventQueueListener::new(Arc::clone(&aggregator));

        let mut queue = EventQueueBuilder::new();
        queue.push_fills(3, 500);
        listener.on_notification(notification(queue.build()));
        assert!(aggregator.last_trade().is_none());
        assert_eq!(listener.last_seq_num(), Some(3));

        queue.push(Event::Fill(fill_event(3, 510, 4)));
        listener.on_notification(notification(queue.build()));

        let trade = aggregator.last_trade().unwrap();
        assert_eq!(trade.price, 510);
        assert_eq!(trade.quantity, 4);
        assert_eq!(trade.seq_num, 3);
        assert_eq!(trade.taker_side, Side::Buy);
        assert_eq!(listener.stats().events_replayed, 1);
    }

    #[test]
    fn test_resend_publishes_nothing() {
        let aggregator = Arc::new(MarketAggregator::new());
        let mut listener =
            EventQueueListener::with_replayer(EventQueueReplayer::resume_from(0), Arc::clone(&aggregator));

        let mut queue = EventQueueBuilder::new();
        queue.push_fills(2, 700);
        let bytes = queue.build();

        listener.on_notification(notification(bytes.clone()));
        let version = aggregator.snapshot().version;
        assert_eq!(version, 2);

        listener.on_notification(notification(bytes));
        assert_eq!(aggregator.snapshot().version, version);
        assert_eq!(listener.stats().stale_snapshots, 1);
    }

    #[test]
    fn test_garbage_payload_rejected() {
        let aggregator = Arc::new(MarketAggregator::new());
        let mut listener = EventQueueListener::new(Arc::clone(&aggregator));
        listener.on_notification(notification(vec![1, 2, 3]));
        assert_eq!(listener.rejected(), 1);
        assert_eq!(listener.last_seq_num(), None);
    }
}
