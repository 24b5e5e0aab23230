//! Account subscription session
//!
//! One connection, two threads:
//!
//! ```text
//!   caller ──Command──► writer ──frame──► server
//!     │                   │ ▲                │
//!     │ Register     InFlight│ Ack            │ frames
//!     ▼                   ▼ │                ▼
//!   ────────────────────► reader ◄───────────┘
//!                           │
//!                    listener callbacks
//! ```
//!
//! The writer keeps one request in flight: it tells the reader what it is
//! about to send, writes the frame, then blocks until the reader has matched
//! the response. Pending subscribes always go before pending unsubscribes.
//!
//! The reader owns every listener and every subscription state. Frames with
//! `method` and `params.subscription` are notifications and go to the
//! listener registered under that server id; any other frame is the response
//! to the in-flight request.
//!
//! On disconnect or shutdown every pending subscription fails and every live
//! one closes, each callback firing once, and both threads are joined.

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{bounded, select, unbounded, Receiver, Sender};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use super::protocol::{
    is_notification_frame, parse_frame, subscribe_request, subscribe_request_id,
    unsubscribe_request, unsubscribe_request_id, AccountNotification, Inbound, RpcResponse,
};
use super::transport::{FrameSink, FrameSource, TransportOptions, WebSocketTransport};
use crate::config::{Commitment, FeedConfig};
use crate::core::errors::{FeedError, SubscriptionError, TransportError};
use crate::core::subscription_fsm::{
    CloseReason, SubscriptionPending, SubscriptionState, SubscriptionStatus, UnsubscribeResult,
};
use crate::core::PublicKey;
use crate::resilience::panic_message;

/// Receives everything that happens to one subscription
///
/// All methods run on the session's reader thread, in order. Only
/// `on_notification` is required.
pub trait SubscriptionListener: Send {
    /// Server accepted the subscribe and assigned `server_id`
    fn on_active(&mut self, _server_id: u64) {}

    fn on_notification(&mut self, notification: AccountNotification);

    /// Subscribe was rejected or the connection dropped before it resolved
    fn on_failed(&mut self, _error: &SubscriptionError) {}

    /// Server answered the unsubscribe with `false`; the subscription stays active
    fn on_unsubscribe_rejected(&mut self, _server_id: u64) {}

    fn on_closed(&mut self, _reason: CloseReason) {}
}

impl<F> SubscriptionListener for F
where
    F: FnMut(AccountNotification) + Send,
{
    fn on_notification(&mut self, notification: AccountNotification) {
        self(notification)
    }
}

enum Command {
    Subscribe {
        local_id: u64,
        account: PublicKey,
        commitment: Commitment,
    },
    Unsubscribe {
        local_id: u64,
    },
}

/// Request the writer is about to put on the wire
#[derive(Debug, Clone, Copy)]
enum InFlight {
    Subscribe { local_id: u64 },
    Unsubscribe { local_id: u64, server_id: u64 },
}

impl InFlight {
    fn local_id(&self) -> u64 {
        match self {
            InFlight::Subscribe { local_id } | InFlight::Unsubscribe { local_id, .. } => *local_id,
        }
    }

    fn request_id(&self) -> u64 {
        match self {
            InFlight::Subscribe { local_id } => subscribe_request_id(*local_id),
            InFlight::Unsubscribe { local_id, .. } => unsubscribe_request_id(*local_id),
        }
    }
}

enum ReaderMsg {
    Register {
        state: SubscriptionPending,
        listener: Box<dyn SubscriptionListener>,
    },
    InFlight(InFlight),
    WriterStopped(TransportError),
}

/// State shared between the handle and both threads
struct Shared {
    statuses: DashMap<u64, SubscriptionStatus>,
    /// Unsubscribes queued or in flight, cleared once the writer drops them
    /// or the reader resolves them
    unsubscribes: DashSet<u64>,
    shutdown: AtomicBool,
    connected: AtomicBool,
    /// Caller-side route to the reader; `None` once the reader has torn down
    registrations: Mutex<Option<Sender<ReaderMsg>>>,
}

/// Handle to a running session
///
/// Dropping it closes the connection and joins both threads.
pub struct SubscriptionSession {
    shared: Arc<Shared>,
    commands: Option<Sender<Command>>,
    next_local_id: AtomicU64,
    writer: Option<thread::JoinHandle<()>>,
    reader: Option<thread::JoinHandle<()>>,
}

impl SubscriptionSession {
    /// Connect over WebSocket using the endpoint and timeouts in `config`
    pub fn connect(config: &FeedConfig) -> Result<Self, TransportError> {
        let options = TransportOptions {
            connect_timeout: config.connect_timeout(),
            poll_interval: config.poll_interval(),
        };
        let (sink, source) = WebSocketTransport::connect(&config.endpoint, options)?;
        Self::start(sink, source)
    }

    /// Run a session over an already-established transport
    pub fn start<S, R>(sink: S, source: R) -> Result<Self, TransportError>
    where
        S: FrameSink + 'static,
        R: FrameSource + 'static,
    {
        let (command_tx, command_rx) = unbounded();
        let (reader_tx, reader_rx) = unbounded();
        let (ack_tx, ack_rx) = bounded(1);

        let shared = Arc::new(Shared {
            statuses: DashMap::new(),
            unsubscribes: DashSet::new(),
            shutdown: AtomicBool::new(false),
            connected: AtomicBool::new(true),
            registrations: Mutex::new(Some(reader_tx.clone())),
        });

        let reader = ReaderLoop {
            source,
            inbox: reader_rx,
            acks: ack_tx,
            shared: Arc::clone(&shared),
            entries: HashMap::new(),
            routes: HashMap::new(),
            in_flight: None,
        };
        let reader_handle = thread::Builder::new()
            .name("session-reader".to_string())
            .spawn(move || reader.run())
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let writer = WriterLoop {
            sink,
            commands: command_rx,
            reader: reader_tx,
            acks: ack_rx,
            shared: Arc::clone(&shared),
            subscribes: VecDeque::new(),
            unsubscribes: VecDeque::new(),
        };
        let writer_handle = match thread::Builder::new()
            .name("session-writer".to_string())
            .spawn(move || writer.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                shared.shutdown.store(true, Ordering::Release);
                let _ = reader_handle.join();
                return Err(TransportError::Io(e.to_string()));
            }
        };

        Ok(Self {
            shared,
            commands: Some(command_tx),
            next_local_id: AtomicU64::new(0),
            writer: Some(writer_handle),
            reader: Some(reader_handle),
        })
    }

    /// Subscribe to an account given as base58 text and a commitment string
    ///
    /// Returns the local subscription id used for `unsubscribe` and `status`.
    pub fn on_account_change<L>(
        &self,
        account: &str,
        commitment: &str,
        listener: L,
    ) -> Result<u64, FeedError>
    where
        L: SubscriptionListener + 'static,
    {
        let commitment: Commitment = commitment.parse()?;
        let account = PublicKey::from_base58(account)?;
        Ok(self.subscribe(account, commitment, listener)?)
    }

    pub fn subscribe<L>(
        &self,
        account: PublicKey,
        commitment: Commitment,
        listener: L,
    ) -> Result<u64, SubscriptionError>
    where
        L: SubscriptionListener + 'static,
    {
        let commands = self
            .commands
            .as_ref()
            .ok_or(SubscriptionError::SessionClosed)?;

        let local_id = self.next_local_id.fetch_add(2, Ordering::Relaxed);
        let state = SubscriptionPending::new(local_id, account.to_base58());

        {
            let registrations = self.shared.registrations.lock();
            let reader = registrations
                .as_ref()
                .ok_or(SubscriptionError::SessionClosed)?;
            self.shared
                .statuses
                .insert(local_id, SubscriptionStatus::Pending);
            if reader
                .send(ReaderMsg::Register {
                    state,
                    listener: Box::new(listener),
                })
                .is_err()
            {
                self.shared.statuses.remove(&local_id);
                return Err(SubscriptionError::SessionClosed);
            }
        }

        if commands
            .send(Command::Subscribe {
                local_id,
                account,
                commitment,
            })
            .is_err()
        {
            // Writer is gone; the reader fails the registration during teardown
            return Err(SubscriptionError::SessionClosed);
        }

        info!(local_id, %account, %commitment, "subscription queued");
        Ok(local_id)
    }

    /// Queue removal of a subscription
    ///
    /// Returns `false` for unknown ids and for subscriptions that already
    /// failed, closed or have an unsubscribe outstanding.
    pub fn unsubscribe(&self, local_id: u64) -> bool {
        let status = match self.shared.statuses.get(&local_id) {
            Some(entry) => *entry.value(),
            None => return false,
        };

        match status {
            SubscriptionStatus::Pending | SubscriptionStatus::Active(_) => {}
            _ => {
                debug!(local_id, ?status, "unsubscribe ignored");
                return false;
            }
        }

        if !self.shared.unsubscribes.insert(local_id) {
            debug!(local_id, "unsubscribe already outstanding");
            return false;
        }

        let sent = match &self.commands {
            Some(commands) => commands.send(Command::Unsubscribe { local_id }).is_ok(),
            None => false,
        };
        if !sent {
            self.shared.unsubscribes.remove(&local_id);
        }
        sent
    }

    pub fn status(&self, local_id: u64) -> Option<SubscriptionStatus> {
        self.shared.statuses.get(&local_id).map(|entry| *entry.value())
    }

    /// Number of subscriptions that have not reached a terminal state
    pub fn live_count(&self) -> usize {
        self.shared
            .statuses
            .iter()
            .filter(|entry| !entry.value().is_terminal())
            .count()
    }

    /// False once the reader has stopped
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Close the connection and wait for both threads
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        // Dropping the command sender wakes an idle writer
        let _ = self.commands.take();

        if let Some(handle) = self.writer.take() {
            if handle.join().is_err() {
                error!("session writer thread panicked");
            }
        }
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                error!("session reader thread panicked");
            }
        }
    }
}

impl Drop for SubscriptionSession {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Writer
// ============================================================================

struct QueuedSubscribe {
    local_id: u64,
    account: PublicKey,
    commitment: Commitment,
}

struct WriterLoop<S> {
    sink: S,
    commands: Receiver<Command>,
    reader: Sender<ReaderMsg>,
    acks: Receiver<()>,
    shared: Arc<Shared>,
    subscribes: VecDeque<QueuedSubscribe>,
    unsubscribes: VecDeque<u64>,
}

impl<S: FrameSink> WriterLoop<S> {
    fn run(mut self) {
        loop {
            if self.shared.shutdown.load(Ordering::Acquire) {
                break;
            }

            if self.subscribes.is_empty() && self.unsubscribes.is_empty() {
                // Idle: wake on new work, or on the ack channel closing when the reader stops
                let woke = select! {
                    recv(self.commands) -> command => command.map(Some),
                    recv(self.acks) -> ack => ack.map(|_| None),
                };
                match woke {
                    Ok(Some(command)) => self.enqueue(command),
                    Ok(None) => {}
                    Err(_) => break,
                }
            }
            while let Ok(command) = self.commands.try_recv() {
                self.enqueue(command);
            }

            let Some((in_flight, frame)) = self.next_request() else {
                continue;
            };

            if self.reader.send(ReaderMsg::InFlight(in_flight)).is_err() {
                break;
            }
            trace!(request_id = in_flight.request_id(), %frame, "sending request");
            if let Err(e) = self.sink.send_text(frame) {
                warn!(error = %e, request_id = in_flight.request_id(), "request write failed");
                let _ = self.reader.send(ReaderMsg::WriterStopped(e));
                break;
            }

            // One request in flight: wait for the reader to match the response
            if self.acks.recv().is_err() {
                break;
            }
        }

        if let Err(e) = self.sink.close() {
            debug!(error = %e, "close after writer stop");
        }
        info!("session writer stopping");
    }

    fn enqueue(&mut self, command: Command) {
        match command {
            Command::Subscribe {
                local_id,
                account,
                commitment,
            } => self.subscribes.push_back(QueuedSubscribe {
                local_id,
                account,
                commitment,
            }),
            Command::Unsubscribe { local_id } => self.unsubscribes.push_back(local_id),
        }
    }

    fn next_request(&mut self) -> Option<(InFlight, String)> {
        if let Some(sub) = self.subscribes.pop_front() {
            let frame = subscribe_request(sub.local_id, &sub.account, sub.commitment);
            return Some((
                InFlight::Subscribe {
                    local_id: sub.local_id,
                },
                frame,
            ));
        }

        while let Some(local_id) = self.unsubscribes.pop_front() {
            let status = self
                .shared
                .statuses
                .get(&local_id)
                .map(|entry| *entry.value());
            match status {
                Some(SubscriptionStatus::Active(server_id)) => {
                    return Some((
                        InFlight::Unsubscribe {
                            local_id,
                            server_id,
                        },
                        unsubscribe_request(local_id, server_id),
                    ));
                }
                other => {
                    self.shared.unsubscribes.remove(&local_id);
                    debug!(local_id, status = ?other, "dropping unsubscribe, not active");
                }
            }
        }
        None
    }
}

// ============================================================================
// Reader
// ============================================================================

struct Entry {
    state: SubscriptionState,
    listener: Box<dyn SubscriptionListener>,
}

struct ReaderLoop<R> {
    source: R,
    inbox: Receiver<ReaderMsg>,
    acks: Sender<()>,
    shared: Arc<Shared>,
    /// Keyed by local id
    entries: HashMap<u64, Entry>,
    /// Server id to local id, for notification routing
    routes: HashMap<u64, u64>,
    in_flight: Option<InFlight>,
}

impl<R: FrameSource> ReaderLoop<R> {
    fn run(mut self) {
        let reason = match panic::catch_unwind(AssertUnwindSafe(|| self.event_loop())) {
            Ok(reason) => reason,
            Err(payload) => {
                error!(message = %panic_message(payload.as_ref()), "receive thread panicked");
                CloseReason::Disconnected
            }
        };
        self.teardown(reason);
    }

    fn event_loop(&mut self) -> CloseReason {
        loop {
            if self.shared.shutdown.load(Ordering::Acquire) {
                return CloseReason::Shutdown;
            }
            if let Err(e) = self.drain_inbox() {
                warn!(error = %e, "writer stopped, closing session");
                return CloseReason::Disconnected;
            }

            match self.source.recv() {
                Ok(None) => continue,
                Ok(Some(text)) => {
                    // A response can only follow the write, and InFlight is queued before it
                    if let Err(e) = self.drain_inbox() {
                        warn!(error = %e, "writer stopped, closing session");
                        return CloseReason::Disconnected;
                    }
                    self.handle_frame(&text);
                }
                Err(e) => {
                    if self.shared.shutdown.load(Ordering::Acquire) {
                        return CloseReason::Shutdown;
                    }
                    warn!(error = %e, "connection lost");
                    return CloseReason::Disconnected;
                }
            }
        }
    }

    fn drain_inbox(&mut self) -> Result<(), TransportError> {
        while let Ok(msg) = self.inbox.try_recv() {
            match msg {
                ReaderMsg::Register { state, listener } => {
                    let local_id = state.data().local_id;
                    self.entries.insert(
                        local_id,
                        Entry {
                            state: state.into(),
                            listener,
                        },
                    );
                }
                ReaderMsg::InFlight(in_flight) => self.begin(in_flight),
                ReaderMsg::WriterStopped(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn begin(&mut self, in_flight: InFlight) {
        if let InFlight::Unsubscribe { local_id, .. } = in_flight {
            if let Some(mut entry) = self.entries.remove(&local_id) {
                entry.state = match entry.state {
                    SubscriptionState::Active(active) => active.begin_unsubscribe().into(),
                    other => {
                        warn!(local_id, state = other.state_name(), "unsubscribe sent for non-active subscription");
                        other
                    }
                };
                self.publish_status(local_id, &entry.state);
                self.entries.insert(local_id, entry);
            }
        }
        self.in_flight = Some(in_flight);
    }

    fn handle_frame(&mut self, text: &str) {
        let inbound = match parse_frame(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(error = %e, "dropping frame");
                // A malformed reply still answers the in-flight request
                if self.in_flight.is_some() && !is_notification_frame(text) {
                    self.resolve(RpcResponse {
                        id: None,
                        result: None,
                        error: Some(e.to_string()),
                        raw: text.to_string(),
                    });
                }
                return;
            }
        };

        match inbound {
            Inbound::Notification(notification) => self.dispatch(notification),
            Inbound::Response(response) => {
                if self.in_flight.is_none() {
                    warn!(frame = %response.raw, "response with no request in flight");
                    return;
                }
                self.resolve(response);
            }
        }
    }

    fn dispatch(&mut self, notification: AccountNotification) {
        let Some(local_id) = self.routes.get(&notification.subscription).copied() else {
            debug!(sub_id = notification.subscription, "notification for unknown subscription");
            return;
        };
        if let Some(entry) = self.entries.get_mut(&local_id) {
            trace!(
                sub_id = notification.subscription,
                slot = notification.slot,
                len = notification.data.len(),
                "notification"
            );
            entry.listener.on_notification(notification);
        }
    }

    fn resolve(&mut self, response: RpcResponse) {
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };
        if response.id.is_some() && response.id != Some(in_flight.request_id()) {
            warn!(
                expected = in_flight.request_id(),
                got = ?response.id,
                "response id does not match in-flight request"
            );
        }

        let local_id = in_flight.local_id();
        if let InFlight::Unsubscribe { .. } = in_flight {
            self.shared.unsubscribes.remove(&local_id);
        }
        if let Some(entry) = self.entries.remove(&local_id) {
            match in_flight {
                InFlight::Subscribe { .. } => self.resolve_subscribe(local_id, entry, response),
                InFlight::Unsubscribe { .. } => {
                    self.resolve_unsubscribe(local_id, entry, response)
                }
            }
        } else {
            warn!(local_id, "response for unregistered subscription");
        }

        let _ = self.acks.send(());
    }

    fn resolve_subscribe(&mut self, local_id: u64, mut entry: Entry, response: RpcResponse) {
        let pending = match entry.state {
            SubscriptionState::Pending(pending) => pending,
            other => {
                warn!(local_id, state = other.state_name(), "subscribe response for non-pending subscription");
                entry.state = other;
                self.entries.insert(local_id, entry);
                return;
            }
        };

        match response.subscription_id() {
            Some(server_id) => {
                let active = pending.activate(server_id);
                info!(local_id, sub_id = server_id, label = %active.data().label, "subscription active");
                entry.state = active.into();
                self.publish_status(local_id, &entry.state);
                self.routes.insert(server_id, local_id);
                // Back in the table before the callback, so a panic still tears it down
                self.entries.insert(local_id, entry);
                if let Some(entry) = self.entries.get_mut(&local_id) {
                    entry.listener.on_active(server_id);
                }
            }
            None => {
                let failed = pending.fail();
                warn!(local_id, label = %failed.data().label, error = ?response.error, "subscribe rejected");
                entry.state = failed.into();
                self.publish_status(local_id, &entry.state);
                entry.listener.on_failed(&SubscriptionError::Rejected {
                    response: response.raw,
                });
            }
        }
    }

    fn resolve_unsubscribe(&mut self, local_id: u64, mut entry: Entry, response: RpcResponse) {
        let unsubscribing = match entry.state {
            SubscriptionState::Unsubscribing(unsubscribing) => unsubscribing,
            other => {
                warn!(local_id, state = other.state_name(), "unsubscribe response for subscription not unsubscribing");
                entry.state = other;
                self.entries.insert(local_id, entry);
                return;
            }
        };

        let server_id = unsubscribing.server_id();
        match unsubscribing.resolve(response.unsubscribe_accepted()) {
            UnsubscribeResult::Closed(closed) => {
                info!(local_id, sub_id = server_id, "subscription closed");
                self.routes.remove(&server_id);
                entry.state = closed.into();
                self.publish_status(local_id, &entry.state);
                entry.listener.on_closed(CloseReason::Unsubscribed);
            }
            UnsubscribeResult::Rejected(active) => {
                warn!(
                    local_id,
                    sub_id = server_id,
                    rejections = active.data().unsubscribe_rejections,
                    "unsubscribe rejected, subscription stays active"
                );
                entry.state = active.into();
                self.publish_status(local_id, &entry.state);
                self.entries.insert(local_id, entry);
                if let Some(entry) = self.entries.get_mut(&local_id) {
                    entry.listener.on_unsubscribe_rejected(server_id);
                }
            }
        }
    }

    fn publish_status(&self, local_id: u64, state: &SubscriptionState) {
        self.shared.statuses.insert(local_id, state.status());
    }

    fn teardown(mut self, reason: CloseReason) {
        // No caller can register after this, so the drain below sees everything
        let _ = self.shared.registrations.lock().take();
        self.shared.connected.store(false, Ordering::Release);
        while let Ok(msg) = self.inbox.try_recv() {
            match msg {
                ReaderMsg::Register { state, listener } => {
                    let local_id = state.data().local_id;
                    self.entries.insert(
                        local_id,
                        Entry {
                            state: state.into(),
                            listener,
                        },
                    );
                }
                ReaderMsg::InFlight(_) | ReaderMsg::WriterStopped(_) => {}
            }
        }

        let mut ids: Vec<u64> = self.entries.keys().copied().collect();
        ids.sort_unstable();

        for local_id in ids {
            let Some(mut entry) = self.entries.remove(&local_id) else {
                continue;
            };
            entry.state = entry.state.on_disconnect(reason);
            self.publish_status(local_id, &entry.state);

            let listener = &mut entry.listener;
            let state = &entry.state;
            let fired = panic::catch_unwind(AssertUnwindSafe(|| match state {
                SubscriptionState::Failed(_) => {
                    listener.on_failed(&SubscriptionError::Disconnected)
                }
                SubscriptionState::Closed(_) => listener.on_closed(reason),
                _ => {}
            }));
            if let Err(payload) = fired {
                error!(local_id, message = %panic_message(payload.as_ref()), "listener panicked during teardown");
            }
        }
        self.routes.clear();

        info!(%reason, "session reader stopping");
        // Dropping `acks` here wakes a writer waiting on a response
    }
}
