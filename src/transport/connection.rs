//! Device session and its receive loop.
//!
//! This module owns one device connection for its whole lifetime:
//! handshake, event routing, outbound sends and teardown.
//!
//! # Event Loop
//!
//! Each session spawns a tokio task that handles:
//!
//! - Incoming messages from the device (decoded event arrays)
//! - Outgoing messages from the Rust API
//! - Dispatch of every inbound event to the session's [`Correlator`]
//!
//! A second task waits for the `DEVICE_INFO` handshake and hands the
//! session to the [`DeviceListener`].
//!
//! # Teardown
//!
//! Whatever ends the loop (close frame, stream end, socket error, failed
//! send, [`Session::close`], or cancellation of the task), the correlator
//! is shut down and the session leaves the registry exactly once.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::{DeviceInfo, Event, EventType, decode_message, encode_events};

use super::correlation::{Correlator, DEFAULT_MAX_PENDING, Pending};
use super::registry::{DeviceListener, SessionRegistry};

// ============================================================================
// SessionOptions
// ============================================================================

/// Per-session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Ceiling on outstanding waiters.
    pub max_pending: usize,

    /// Close sessions that do not identify within this bound.
    /// `None` waits forever.
    pub handshake_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_pending: DEFAULT_MAX_PENDING,
            handshake_timeout: None,
        }
    }
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send one encoded message.
    Send {
        text: String,
        ack: oneshot::Sender<Result<()>>,
    },
    /// Close the connection.
    Close,
}

// ============================================================================
// Session
// ============================================================================

/// Shared state of one device connection.
struct SessionInner {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    correlator: Correlator,
    device: RwLock<Option<DeviceInfo>>,
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    closed_rx: watch::Receiver<bool>,
}

/// One connected device.
///
/// Cheap to clone; clones share the connection. The session stays open
/// until the device disconnects or [`close`](Self::close) is called.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("peer_addr", &self.inner.peer_addr)
            .field("device_id", &self.device_id())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Constructor
// ============================================================================

impl Session {
    /// Takes over an upgraded WebSocket stream.
    ///
    /// Registers the session, then spawns its event loop and handshake
    /// task. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `options.max_pending` leaves no room
    /// for the handshake waiter.
    pub fn spawn<S>(
        ws_stream: WebSocketStream<S>,
        peer_addr: Option<SocketAddr>,
        options: SessionOptions,
        registry: &Arc<SessionRegistry>,
        listener: Arc<dyn DeviceListener>,
    ) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let id = ConnectionId::next();
        let correlator = Correlator::with_max_pending(options.max_pending);

        // Registered before the loop runs so DEVICE_INFO cannot slip past.
        let handshake = correlator.register_types(&[EventType::DeviceInfo])?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);

        let session = Self {
            inner: Arc::new(SessionInner {
                id,
                peer_addr,
                correlator: correlator.clone(),
                device: RwLock::new(None),
                command_tx,
                closed_rx,
            }),
        };

        registry.insert(session.clone());

        let teardown = Teardown {
            id,
            correlator: correlator.clone(),
            registry: Arc::downgrade(registry),
            closed_tx,
        };

        tokio::spawn(run_event_loop(ws_stream, command_rx, correlator, teardown));
        tokio::spawn(session.clone().run_handshake(
            handshake,
            options.handshake_timeout,
            listener,
        ));

        info!(connection_id = %id, ?peer_addr, "Device session started");

        Ok(session)
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    /// Returns the connection handle.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns the device's socket address, if known.
    #[inline]
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr
    }

    /// Returns the session's correlator.
    #[inline]
    #[must_use]
    pub fn correlator(&self) -> &Correlator {
        &self.inner.correlator
    }

    /// Returns the handshake metadata, once received.
    #[must_use]
    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.inner.device.read().clone()
    }

    /// Returns the device identifier, once received.
    #[must_use]
    pub fn device_id(&self) -> Option<String> {
        self.inner
            .device
            .read()
            .as_ref()
            .and_then(|info| info.device_id.clone())
    }

    /// Returns `true` once the `DEVICE_INFO` handshake completed.
    #[inline]
    #[must_use]
    pub fn is_identified(&self) -> bool {
        self.inner.device.read().is_some()
    }

    /// Returns `true` once the connection was torn down.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.correlator.is_closed()
    }
}

// ============================================================================
// Session - Operations
// ============================================================================

impl Session {
    /// Sends events as one message, in order.
    ///
    /// Completes once the message was written to the socket.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the session is closed
    /// - [`Error::WebSocket`] if writing to the socket fails
    pub async fn send(&self, events: &[Event]) -> Result<()> {
        let text = encode_events(events)?;
        let (ack, ack_rx) = oneshot::channel();

        self.inner
            .command_tx
            .send(ConnectionCommand::Send { text, ack })
            .map_err(|_| Error::ConnectionClosed)?;

        ack_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Sends a single event.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_event(&self, event: &Event) -> Result<()> {
        self.send(std::slice::from_ref(event)).await
    }

    /// Asks the event loop to close the connection.
    pub fn close(&self) {
        let _ = self.inner.command_tx.send(ConnectionCommand::Close);
    }

    /// Waits until the connection was torn down.
    pub async fn closed(&self) {
        let mut closed_rx = self.inner.closed_rx.clone();
        let _ = closed_rx.wait_for(|closed| *closed).await;
    }
}

// ============================================================================
// Session - Handshake
// ============================================================================

impl Session {
    /// Waits for `DEVICE_INFO` and announces the session.
    async fn run_handshake(
        self,
        first: Pending,
        limit: Option<Duration>,
        listener: Arc<dyn DeviceListener>,
    ) {
        let id = self.inner.id;
        let deadline = limit.filter(|d| !d.is_zero()).map(|d| Instant::now() + d);
        let mut next = Some(first);

        loop {
            let pending = match next.take() {
                Some(pending) => pending,
                None => match self.inner.correlator.register_types(&[EventType::DeviceInfo]) {
                    Ok(pending) => pending,
                    Err(e) => {
                        debug!(connection_id = %id, error = %e, "Handshake abandoned");
                        return;
                    }
                },
            };

            let remaining = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        self.handshake_timed_out();
                        return;
                    }
                    Some(remaining)
                }
                None => None,
            };

            match pending.wait(remaining).await {
                Ok(Some(event)) => match event.json::<DeviceInfo>() {
                    Ok(info) => {
                        info!(
                            connection_id = %id,
                            device_id = ?info.device_id,
                            "Device identified"
                        );
                        *self.inner.device.write() = Some(info);
                        listener.notify_new_device(self);
                        return;
                    }
                    Err(e) => {
                        warn!(connection_id = %id, error = %e, "Invalid DEVICE_INFO payload");
                    }
                },
                Ok(None) => {
                    self.handshake_timed_out();
                    return;
                }
                Err(e) => {
                    debug!(connection_id = %id, error = %e, "Handshake abandoned");
                    return;
                }
            }
        }
    }

    fn handshake_timed_out(&self) {
        warn!(connection_id = %self.inner.id, "Device did not identify in time, closing");
        self.close();
    }
}

// ============================================================================
// Teardown
// ============================================================================

/// Runs connection teardown when the event loop ends, however it ends.
struct Teardown {
    id: ConnectionId,
    correlator: Correlator,
    registry: Weak<SessionRegistry>,
    closed_tx: watch::Sender<bool>,
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.correlator.shutdown();
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        self.closed_tx.send_replace(true);
        info!(connection_id = %self.id, "Device session ended");
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Event loop that handles WebSocket I/O for one session.
async fn run_event_loop<S>(
    ws_stream: WebSocketStream<S>,
    mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    correlator: Correlator,
    teardown: Teardown,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let id = teardown.id;
    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            // Incoming messages from the device
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        handle_incoming_message(id, text.as_str(), &correlator);
                    }

                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => handle_incoming_message(id, text, &correlator),
                        Err(_) => warn!(connection_id = %id, "Discarding non UTF-8 binary message"),
                    },

                    Some(Ok(Message::Close(frame))) => {
                        debug!(connection_id = %id, ?frame, "WebSocket closed by device");
                        break;
                    }

                    Some(Err(e)) => {
                        error!(connection_id = %id, error = %e, "WebSocket error");
                        break;
                    }

                    None => {
                        debug!(connection_id = %id, "WebSocket stream ended");
                        break;
                    }

                    // Ping, Pong, raw frames
                    _ => {}
                }
            }

            // Commands from the Rust API
            command = command_rx.recv() => {
                match command {
                    Some(ConnectionCommand::Send { text, ack }) => {
                        let result = ws_write
                            .send(Message::Text(text.into()))
                            .await
                            .map_err(Error::from);

                        let failed = result.is_err();
                        if let Err(e) = &result {
                            warn!(connection_id = %id, error = %e, "Send failed");
                        } else {
                            trace!(connection_id = %id, "Message sent");
                        }

                        let _ = ack.send(result);
                        if failed {
                            break;
                        }
                    }

                    Some(ConnectionCommand::Close) => {
                        debug!(connection_id = %id, "Close requested");
                        let _ = ws_write.close().await;
                        break;
                    }

                    None => {
                        debug!(connection_id = %id, "All session handles dropped");
                        let _ = ws_write.close().await;
                        break;
                    }
                }
            }
        }
    }

    debug!(connection_id = %id, "Event loop terminated");
    drop(teardown);
}

/// Decodes one message and dispatches its events in order.
fn handle_incoming_message(id: ConnectionId, text: &str, correlator: &Correlator) {
    let events = match decode_message(text) {
        Ok(events) => events,
        Err(e) => {
            warn!(connection_id = %id, error = %e, len = text.len(), "Discarding malformed message");
            return;
        }
    };

    for event in &events {
        log_event(id, event);
        correlator.dispatch(event);
    }
}

/// Logs an inbound event according to its category.
fn log_event(id: ConnectionId, event: &Event) {
    match event.event_type {
        EventType::Log => {
            info!(connection_id = %id, content = %event.content, "Device log");
        }
        EventType::NetworkLog => {
            trace!(connection_id = %id, content = %event.content, "Network activity");
        }
        EventType::DeviceInfo => {
            debug!(connection_id = %id, content = %event.content, "Device info received");
        }
        EventType::PageFinished => {
            debug!(connection_id = %id, url = %event.content, "Page finished");
        }
        EventType::ReceivedError => {
            warn!(connection_id = %id, content = %event.content, "WebView received error");
        }
        EventType::EvalJsCallback
        | EventType::EvalJsFailure
        | EventType::CookieGetCallback
        | EventType::CookieGetFailure
        | EventType::CookieRemoveAllCallback
        | EventType::CookieRemoveAllFailure => {
            debug!(
                connection_id = %id,
                event_type = %event.event_type,
                parent_id = ?event.parent_id,
                len = event.content.len(),
                "Response received"
            );
        }
        EventType::Settings
        | EventType::EvalJs
        | EventType::CookieGet
        | EventType::CookieRemoveAll
        | EventType::Start
        | EventType::Close => {
            warn!(
                connection_id = %id,
                event_type = %event.event_type,
                "Device sent a command category"
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
