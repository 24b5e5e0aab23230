//! Duplex text-frame transport
//!
//! The session splits a connection into a `FrameSink` owned by the writer
//! thread and a `FrameSource` owned by the reader thread. `recv` must return
//! within a bounded time (`Ok(None)` on timeout) so the reader can notice
//! shutdown.

use std::io::ErrorKind;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use tungstenite::client::IntoClientRequest;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Error as WsError, Message, WebSocket};

use crate::core::errors::TransportError;

/// Outbound half of a connection
pub trait FrameSink: Send {
    fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Start a graceful close; the source observes `Closed` afterwards
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Inbound half of a connection
pub trait FrameSource: Send {
    /// Next text frame, `Ok(None)` if nothing arrived within the poll interval
    fn recv(&mut self) -> Result<Option<String>, TransportError>;
}

/// Socket options for `WebSocketTransport::connect`
#[derive(Debug, Clone, Copy)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }
}

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Blocking WebSocket connection shared by both halves
///
/// Reads hold the lock for at most one poll interval, so a write waits no
/// longer than that.
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn connect(
        url: &str,
        options: TransportOptions,
    ) -> Result<(WebSocketSink, WebSocketSource), TransportError> {
        let connect_err = |reason: String| TransportError::Connect {
            url: url.to_string(),
            reason,
        };

        let request = url
            .into_client_request()
            .map_err(|e| connect_err(e.to_string()))?;

        let uri = request.uri();
        let host = uri
            .host()
            .ok_or_else(|| connect_err("missing host".to_string()))?
            .to_string();
        let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
            Some("wss") => 443,
            _ => 80,
        });

        let stream = Self::open_tcp(&host, port, options.connect_timeout)
            .map_err(|e| connect_err(e.to_string()))?;

        // Handle to the same socket, kept to adjust timeouts after the handshake
        // and to unblock a pending read on close
        let control = stream
            .try_clone()
            .map_err(|e| connect_err(e.to_string()))?;
        control
            .set_read_timeout(Some(options.connect_timeout))
            .map_err(|e| connect_err(e.to_string()))?;
        let _ = control.set_nodelay(true);

        let (socket, response) =
            tungstenite::client_tls(request, stream).map_err(|e| connect_err(e.to_string()))?;

        control
            .set_read_timeout(Some(options.poll_interval))
            .map_err(|e| TransportError::Io(e.to_string()))?;

        info!(url, status = %response.status(), "websocket connected");

        let shared = Arc::new(Mutex::new(socket));
        let control = Arc::new(control);
        Ok((
            WebSocketSink {
                socket: Arc::clone(&shared),
                control: Arc::clone(&control),
            },
            WebSocketSource {
                socket: shared,
                control,
            },
        ))
    }

    fn open_tcp(host: &str, port: u16, timeout: Duration) -> std::io::Result<TcpStream> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!(%addr, error = %e, "tcp connect attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            std::io::Error::new(ErrorKind::NotFound, format!("no address for {}", host))
        }))
    }
}

pub struct WebSocketSink {
    socket: Arc<Mutex<Socket>>,
    control: Arc<TcpStream>,
}

impl FrameSink for WebSocketSink {
    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.socket
            .lock()
            .send(Message::Text(text))
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let result = {
            let mut socket = self.socket.lock();
            socket
                .close(None)
                .and_then(|_| socket.flush())
                .or_else(|e| match e {
                    WsError::ConnectionClosed | WsError::AlreadyClosed => Ok(()),
                    other => Err(other),
                })
        };
        if let Err(e) = result {
            // Peer is not answering; cut the socket so the reader wakes up
            warn!(error = %e, "websocket close handshake failed, shutting socket down");
            let _ = self.control.shutdown(Shutdown::Both);
            return Err(TransportError::Write(e.to_string()));
        }
        Ok(())
    }
}

pub struct WebSocketSource {
    socket: Arc<Mutex<Socket>>,
    control: Arc<TcpStream>,
}

impl FrameSource for WebSocketSource {
    fn recv(&mut self) -> Result<Option<String>, TransportError> {
        let mut socket = self.socket.lock();
        match socket.read() {
            Ok(Message::Text(text)) => Ok(Some(text)),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => Ok(Some(text)),
                Err(_) => {
                    warn!("dropping non-utf8 binary frame");
                    Ok(None)
                }
            },
            Ok(Message::Ping(_)) => {
                // The pong is queued by read(); push it out now
                if let Err(e) = socket.flush() {
                    debug!(error = %e, "failed to flush pong");
                }
                Ok(None)
            }
            Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => Ok(None),
            Ok(Message::Close(frame)) => {
                info!(?frame, "websocket closed by peer");
                let _ = socket.flush();
                Err(TransportError::Closed)
            }
            Err(WsError::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(None)
            }
            Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => {
                Err(TransportError::Closed)
            }
            Err(e) => {
                let _ = self.control.shutdown(Shutdown::Both);
                Err(TransportError::Read(e.to_string()))
            }
        }
    }
}
