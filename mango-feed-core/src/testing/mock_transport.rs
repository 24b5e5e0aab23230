//! In-memory duplex transport with a scripted server side
//!
//! The client halves implement `FrameSink` / `FrameSource` and plug straight
//! into `SubscriptionSession::start`; the test thread plays the server
//! through `MockServer`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde_json::{json, Value};

use crate::core::errors::TransportError;
use crate::session::protocol::notification_frame;
use crate::session::transport::{FrameSink, FrameSource};

enum ServerFrame {
    Text(String),
    Close,
}

/// Build a connected client/server triple
///
/// `poll_interval` is how long `MockSource::recv` waits before returning `Ok(None)`.
pub fn mock_transport(poll_interval: Duration) -> (MockSink, MockSource, MockServer) {
    let (request_tx, request_rx) = unbounded();
    let (frame_tx, frame_rx) = unbounded();
    let closed = Arc::new(AtomicBool::new(false));

    (
        MockSink {
            requests: request_tx,
            frames: frame_tx.clone(),
            closed: Arc::clone(&closed),
        },
        MockSource {
            frames: frame_rx,
            poll_interval,
        },
        MockServer {
            requests: request_rx,
            frames: frame_tx,
            closed,
        },
    )
}

pub struct MockSink {
    requests: Sender<String>,
    frames: Sender<ServerFrame>,
    closed: Arc<AtomicBool>,
}

impl FrameSink for MockSink {
    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.requests
            .send(text)
            .map_err(|_| TransportError::Write("mock server dropped".to_string()))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        // Echo the close back like a well-behaved server
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.frames.send(ServerFrame::Close);
        }
        Ok(())
    }
}

pub struct MockSource {
    frames: Receiver<ServerFrame>,
    poll_interval: Duration,
}

impl FrameSource for MockSource {
    fn recv(&mut self) -> Result<Option<String>, TransportError> {
        match self.frames.recv_timeout(self.poll_interval) {
            Ok(ServerFrame::Text(text)) => Ok(Some(text)),
            Ok(ServerFrame::Close) => Err(TransportError::Closed),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }
}

/// Server end driven by the test
pub struct MockServer {
    requests: Receiver<String>,
    frames: Sender<ServerFrame>,
    closed: Arc<AtomicBool>,
}

impl MockServer {
    /// Next request written by the client, parsed as JSON
    pub fn expect_request(&self, timeout: Duration) -> Option<Value> {
        let text = self.requests.recv_timeout(timeout).ok()?;
        serde_json::from_str(&text).ok()
    }

    /// Push a raw text frame to the client
    pub fn send(&self, text: String) {
        let _ = self.frames.send(ServerFrame::Text(text));
    }

    pub fn respond(&self, id: u64, result: Value) {
        self.send(json!({ "jsonrpc": "2.0", "result": result, "id": id }).to_string());
    }

    /// Answer the next subscribe with `server_id`; returns the request
    pub fn accept_next(&self, server_id: u64, timeout: Duration) -> Option<Value> {
        let request = self.expect_request(timeout)?;
        let id = request.get("id").and_then(Value::as_u64)?;
        self.respond(id, json!(server_id));
        Some(request)
    }

    pub fn notify(&self, subscription: u64, slot: u64, data: &[u8]) {
        self.send(notification_frame(subscription, slot, data));
    }

    /// Drop the connection from the server side
    pub fn disconnect(&self) {
        let _ = self.frames.send(ServerFrame::Close);
    }

    /// True once the client has closed its sink
    pub fn client_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
