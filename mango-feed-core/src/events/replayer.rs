//! Replays the events appended to an EventQueue since the last snapshot
//!
//! Every snapshot carries the queue's total push count (`seq_num`). The
//! difference to the previously seen value is the number of new events,
//! which sit immediately before the queue's write position in the ring:
//!
//! ```text
//! last_slot = (head + count) % 256
//! slot(k)   = (last_slot - k + 256) % 256     k = new_count ..= 1
//! ```
//!
//! Only the newest 256 can be recovered. A larger jump is logged and the
//! older events are dropped; this is expected when the consumer falls behind
//! and is not an error.

use tracing::{debug, warn};

use crate::data::event_queue::{Event, EventQueue};
use crate::data::layout::MAX_EVENTS;

/// Result of replaying one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayOutcome {
    /// New events, oldest first
    pub events: Vec<Event>,
    /// New events that had already been overwritten in the ring
    pub skipped: u64,
    /// This snapshot only established the starting position
    pub baseline: bool,
}

/// Running totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub snapshots: u64,
    pub events_replayed: u64,
    pub events_skipped: u64,
    /// Snapshots whose seq_num was not ahead of the last one
    pub stale_snapshots: u64,
}

/// Tracks `last_seq_num` across snapshots of one queue
#[derive(Debug, Clone, Default)]
pub struct EventQueueReplayer {
    last_seq_num: Option<u64>,
    stats: ReplayStats,
}

impl EventQueueReplayer {
    /// Replayer that treats the first snapshot as a baseline
    pub fn new() -> Self {
        Self::default()
    }

    /// Replayer that emits everything after `seq_num` on the first snapshot
    pub fn resume_from(seq_num: u64) -> Self {
        Self {
            last_seq_num: Some(seq_num),
            stats: ReplayStats::default(),
        }
    }

    pub fn last_seq_num(&self) -> Option<u64> {
        self.last_seq_num
    }

    pub fn stats(&self) -> ReplayStats {
        self.stats
    }

    /// Collect the new events of `queue`, oldest first
    pub fn replay(&mut self, queue: &EventQueue) -> ReplayOutcome {
        let mut events = Vec::new();
        let (skipped, baseline) = self.replay_inner(queue, |e| events.push(*e));
        ReplayOutcome {
            events,
            skipped,
            baseline,
        }
    }

    /// Visit the new events of `queue` in place, oldest first
    ///
    /// Returns the number of new events that could not be recovered.
    pub fn replay_with<F: FnMut(&Event)>(&mut self, queue: &EventQueue, visit: F) -> u64 {
        self.replay_inner(queue, visit).0
    }

    fn replay_inner<F: FnMut(&Event)>(&mut self, queue: &EventQueue, mut visit: F) -> (u64, bool) {
        self.stats.snapshots += 1;
        let seq_num = queue.seq_num;

        let Some(last) = self.last_seq_num else {
            debug!(seq_num, "event queue baseline established");
            self.last_seq_num = Some(seq_num);
            return (0, true);
        };

        if seq_num <= last {
            self.stats.stale_snapshots += 1;
            return (0, false);
        }

        let new_count = seq_num - last;
        let replay_count = new_count.min(MAX_EVENTS as u64) as usize;
        let skipped = new_count - replay_count as u64;
        if skipped > 0 {
            warn!(
                last_seq_num = last,
                seq_num,
                skipped,
                "event queue advanced past ring capacity, oldest events lost"
            );
        }

        let last_slot = queue.next_slot();
        for offset in (1..=replay_count).rev() {
            let slot = (last_slot + MAX_EVENTS - offset) % MAX_EVENTS;
            if let Some(event) = queue.event(slot) {
                visit(event);
            }
        }

        self.last_seq_num = Some(seq_num);
        self.stats.events_replayed += replay_count as u64;
        self.stats.events_skipped += skipped;
        (skipped, false)
    }
}
