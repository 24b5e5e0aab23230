//! Market aggregation: book sides and fills in, level-1 state out
//!
//! Decoded updates are applied one at a time. After each update the new
//! state is published as an immutable `Arc<MarketState>` behind a
//! `parking_lot::RwLock`, so readers on any thread always see a consistent
//! pair of sides, level-1 and last trade.
//!
//! Observers are notified on the applying thread, after the new state has
//! been published and only when something they care about changed.

use std::sync::Arc;
use std::thread;

use crossbeam::channel::{bounded, select, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::core::types::{unix_now_secs, Side};
use crate::data::book_side::BookSide;
use crate::data::event_queue::FillEvent;
use crate::orderbook::level1::Level1Snapshot;
use crate::orderbook::slab::BestOrder;

/// Input to the aggregator
#[derive(Debug, Clone)]
pub enum MarketUpdate {
    /// Full replacement of the bid side
    Bids(Arc<BookSide>),
    /// Full replacement of the ask side
    Asks(Arc<BookSide>),
    /// A fill replayed from the event queue
    Fill(FillEvent),
}

/// Most recent fill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastTrade {
    pub price: u64,
    pub quantity: u64,
    pub taker_side: Side,
    pub timestamp: u64,
    pub seq_num: u64,
}

impl From<&FillEvent> for LastTrade {
    fn from(fill: &FillEvent) -> Self {
        Self {
            price: fill.price.max(0) as u64,
            quantity: fill.quantity.max(0) as u64,
            taker_side: fill.taker_side,
            timestamp: fill.timestamp,
            seq_num: fill.seq_num,
        }
    }
}

/// Published snapshot of everything the aggregator knows
#[derive(Debug, Clone, Default)]
pub struct MarketState {
    pub bids: Option<Arc<BookSide>>,
    pub asks: Option<Arc<BookSide>>,
    pub level1: Level1Snapshot,
    pub last_trade: Option<LastTrade>,
    /// Number of updates applied so far
    pub version: u64,
}

impl MarketState {
    /// Volume within `percent` of the midpoint
    ///
    /// Positive offsets sum asks at or below `mid * (100 + percent) / 100`,
    /// zero and negative offsets sum bids at or above it. Returns 0 while
    /// level-1 is not valid.
    pub fn depth(&self, percent: i8, now: u64) -> u64 {
        if !self.level1.valid() {
            return 0;
        }
        let price = self.level1.price_at_offset(percent);
        if percent > 0 {
            self.asks
                .as_ref()
                .map_or(0, |asks| asks.volume(Side::Sell, price, now))
        } else {
            self.bids
                .as_ref()
                .map_or(0, |bids| bids.volume(Side::Buy, price, now))
        }
    }
}

/// Push notifications from the aggregator
///
/// Called on the thread that applied the update; implementations should
/// return quickly.
pub trait MarketObserver: Send + Sync {
    /// Best bid/ask changed and the book is valid
    fn on_level1(&self, _level1: &Level1Snapshot) {}

    /// A new fill arrived
    fn on_trade(&self, _trade: &LastTrade) {}
}

pub struct MarketAggregator {
    state: RwLock<Arc<MarketState>>,
    /// Serialises writers so observers see updates in apply order
    apply_lock: Mutex<()>,
    observers: RwLock<Vec<Arc<dyn MarketObserver>>>,
}

impl Default for MarketAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketAggregator {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Arc::new(MarketState::default())),
            apply_lock: Mutex::new(()),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn register_observer(&self, observer: Arc<dyn MarketObserver>) {
        self.observers.write().push(observer);
    }

    /// Current published state
    pub fn snapshot(&self) -> Arc<MarketState> {
        Arc::clone(&self.state.read())
    }

    pub fn level1(&self) -> Level1Snapshot {
        self.state.read().level1
    }

    pub fn last_trade(&self) -> Option<LastTrade> {
        self.state.read().last_trade
    }

    /// Depth at `percent` from the midpoint using the current time for expiry
    pub fn depth(&self, percent: i8) -> u64 {
        self.snapshot().depth(percent, unix_now_secs())
    }

    pub fn apply(&self, update: MarketUpdate) {
        self.apply_at(update, unix_now_secs());
    }

    /// Apply with an explicit clock for time-in-force expiry
    pub fn apply_at(&self, update: MarketUpdate, now: u64) {
        let _guard = self.apply_lock.lock();
        let current = self.snapshot();
        let mut next = (*current).clone();
        next.version += 1;

        let mut trade = None;
        match update {
            MarketUpdate::Bids(side) => next.bids = Some(side),
            MarketUpdate::Asks(side) => next.asks = Some(side),
            MarketUpdate::Fill(fill) => {
                let last = LastTrade::from(&fill);
                next.last_trade = Some(last);
                trade = Some(last);
            }
        }

        let level1_changed = if trade.is_none() {
            next.level1 = Self::compute_level1(&next, now);
            !next.level1.same_top(&current.level1)
        } else {
            false
        };

        let published = Arc::new(next);
        *self.state.write() = Arc::clone(&published);

        if level1_changed {
            if published.level1.valid() {
                debug!(
                    bid = published.level1.highest_bid,
                    ask = published.level1.lowest_ask,
                    mid = published.level1.midpoint,
                    spread_bps = published.level1.spread_bps,
                    "level1 updated"
                );
                for observer in self.observers.read().iter() {
                    observer.on_level1(&published.level1);
                }
            } else {
                debug!(
                    bid = published.level1.highest_bid,
                    ask = published.level1.lowest_ask,
                    "level1 not valid, observers not notified"
                );
            }
        }

        if let Some(trade) = trade {
            for observer in self.observers.read().iter() {
                observer.on_trade(&trade);
            }
        }
    }

    fn compute_level1(state: &MarketState, now: u64) -> Level1Snapshot {
        let bid = state
            .bids
            .as_ref()
            .map_or(BestOrder::NONE, |b| b.best_order(Side::Buy, now));
        let ask = state
            .asks
            .as_ref()
            .map_or(BestOrder::NONE, |a| a.best_order(Side::Sell, now));
        Level1Snapshot::from_best(bid, ask)
    }
}

/// Aggregator fed through a channel by a dedicated thread
///
/// Producers (subscription listeners) only enqueue; decoding work never
/// waits on observers. Dropping the handle closes the channel and joins the
/// thread after it drains what was queued.
pub struct AggregatorHandle {
    aggregator: Arc<MarketAggregator>,
    sender: Option<Sender<MarketUpdate>>,
    // Dropping this wakes the worker even while cloned senders are alive
    stop: Option<Sender<()>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl AggregatorHandle {
    pub fn spawn(aggregator: Arc<MarketAggregator>, capacity: usize) -> std::io::Result<Self> {
        let (sender, receiver) = bounded(capacity);
        let (stop, stopped) = bounded(0);
        let worker = Arc::clone(&aggregator);
        let handle = thread::Builder::new()
            .name("market-aggregator".to_string())
            .spawn(move || Self::run(worker, receiver, stopped))?;

        Ok(Self {
            aggregator,
            sender: Some(sender),
            stop: Some(stop),
            thread_handle: Some(handle),
        })
    }

    fn run(
        aggregator: Arc<MarketAggregator>,
        receiver: Receiver<MarketUpdate>,
        stopped: Receiver<()>,
    ) {
        loop {
            select! {
                recv(receiver) -> update => match update {
                    Ok(update) => aggregator.apply(update),
                    Err(_) => break,
                },
                recv(stopped) -> _ => {
                    // Apply whatever was queued before the stop
                    let mut drained = 0usize;
                    for update in receiver.try_iter() {
                        aggregator.apply(update);
                        drained += 1;
                    }
                    debug!(drained, "market aggregator drained on stop");
                    break;
                }
            }
        }
        info!("market aggregator thread stopping");
    }

    /// Sender for producers; clone freely.
    ///
    /// Senders may outlive the handle. Anything they publish after the
    /// handle is dropped is discarded with a warning.
    pub fn sender(&self) -> Option<UpdateSender> {
        self.sender.clone().map(UpdateSender)
    }

    pub fn aggregator(&self) -> &Arc<MarketAggregator> {
        &self.aggregator
    }
}

impl Drop for AggregatorHandle {
    fn drop(&mut self) {
        let _ = self.sender.take();
        let _ = self.stop.take();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Where subscription listeners deliver updates
pub trait UpdateSink: Send + Sync {
    fn publish(&self, update: MarketUpdate);
}

impl<T: UpdateSink + ?Sized> UpdateSink for Arc<T> {
    fn publish(&self, update: MarketUpdate) {
        (**self).publish(update);
    }
}

impl UpdateSink for MarketAggregator {
    fn publish(&self, update: MarketUpdate) {
        self.apply(update);
    }
}

/// Channel end of an `AggregatorHandle`
#[derive(Clone)]
pub struct UpdateSender(Sender<MarketUpdate>);

impl UpdateSink for UpdateSender {
    fn publish(&self, update: MarketUpdate) {
        match self.0.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(update)) => {
                // Block rather than drop
                if self.0.send(update).is_err() {
                    warn!("market aggregator stopped, update dropped");
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("market aggregator stopped, update dropped");
            }
        }
    }
}
