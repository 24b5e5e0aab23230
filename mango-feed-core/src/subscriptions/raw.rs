use tracing::{info, warn};

use crate::core::errors::SubscriptionError;
use crate::core::CloseReason;
use crate::session::{AccountNotification, SubscriptionListener};

/// Logs every notification for an account without decoding it
pub struct RawAccountListener {
    label: String,
    expected_len: Option<usize>,
    received: u64,
    last_slot: Option<u64>,
}

impl RawAccountListener {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            expected_len: None,
            received: 0,
            last_slot: None,
        }
    }

    /// Warn when a payload is not exactly `len` bytes
    pub fn expect_len(mut self, len: usize) -> Self {
        self.expected_len = Some(len);
        self
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn last_slot(&self) -> Option<u64> {
        self.last_slot
    }
}

impl SubscriptionListener for RawAccountListener {
    fn on_active(&mut self, server_id: u64) {
        info!(account = %self.label, sub_id = server_id, "watching account");
    }

    fn on_notification(&mut self, notification: AccountNotification) {
        self.received += 1;
        if let Some(expected) = self.expected_len {
            if notification.data.len() != expected {
                warn!(
                    account = %self.label,
                    expected,
                    actual = notification.data.len(),
                    "unexpected account size"
                );
            }
        }
        if let Some(last) = self.last_slot {
            if notification.slot < last {
                warn!(account = %self.label, slot = notification.slot, last_slot = last, "slot went backwards");
            }
        }
        self.last_slot = Some(notification.slot);

        info!(
            account = %self.label,
            slot = notification.slot,
            len = notification.data.len(),
            count = self.received,
            "account changed"
        );
    }

    fn on_failed(&mut self, error: &SubscriptionError) {
        warn!(account = %self.label, error = %error, "account subscription failed");
    }

    fn on_unsubscribe_rejected(&mut self, server_id: u64) {
        warn!(account = %self.label, sub_id = server_id, "unsubscribe rejected");
    }

    fn on_closed(&mut self, reason: CloseReason) {
        info!(account = %self.label, %reason, received = self.received, "account subscription closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_tracks_slot() {
        let mut listener = RawAccountListener::new("test").expect_len(4);
        listener.on_notification(AccountNotification {
            subscription: 1,
            slot: 5,
            data: vec![0; 4],
        });
        listener.on_notification(AccountNotification {
            subscription: 1,
            slot: 9,
            data: vec![0; 3],
        });
        assert_eq!(listener.received(), 2);
        assert_eq!(listener.last_slot(), Some(9));
    }
}
