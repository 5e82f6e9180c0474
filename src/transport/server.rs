//! WebSocket server accepting device connections.
//!
//! Every device connects to the same port. Each upgraded connection
//! becomes a [`Session`] tracked by the shared [`SessionRegistry`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             DeviceServer                │
//! │             (single port)               │
//! │  ┌─────────────────────────────────┐    │
//! │  │ conn-1 → Session (identified)   │    │
//! │  │ conn-2 → Session (handshaking)  │    │
//! │  │ conn-3 → Session (identified)   │    │
//! │  └─────────────────────────────────┘    │
//! └─────────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::Result;

use super::connection::{Session, SessionOptions};
use super::registry::{DeviceListener, SessionRegistry};

// ============================================================================
// Constants
// ============================================================================

/// Accept poll interval, bounds how long shutdown takes to notice.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// DeviceServer
// ============================================================================

/// Accepts device connections and runs one session per connection.
///
/// # Example
///
/// ```ignore
/// let queue = Arc::new(DeviceQueue::new());
/// let server = DeviceServer::bind(ip, 8080, SessionOptions::default(), queue.clone()).await?;
/// println!("Devices connect to {}", server.ws_url());
///
/// let session = queue.next().await?;
/// ```
pub struct DeviceServer {
    /// Bound address.
    local_addr: SocketAddr,

    /// Live sessions.
    registry: Arc<SessionRegistry>,

    /// Options applied to every new session.
    options: SessionOptions,

    /// Receives identified sessions.
    listener: Arc<dyn DeviceListener>,

    /// Shutdown flag.
    shutdown: AtomicBool,
}

// ============================================================================
// DeviceServer - Constructor
// ============================================================================

impl DeviceServer {
    /// Binds the listening socket and starts the accept loop.
    ///
    /// # Arguments
    ///
    /// * `ip` - IP address to bind to
    /// * `port` - Port to bind to (0 for random)
    /// * `options` - Options for every accepted session
    /// * `listener` - Receives sessions once they identified
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn bind(
        ip: IpAddr,
        port: u16,
        options: SessionOptions,
        listener: Arc<dyn DeviceListener>,
    ) -> Result<Arc<Self>> {
        let tcp = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let local_addr = tcp.local_addr()?;

        let server = Arc::new(Self {
            local_addr,
            registry: Arc::new(SessionRegistry::new()),
            options,
            listener,
            shutdown: AtomicBool::new(false),
        });

        let server_clone = Arc::clone(&server);
        tokio::spawn(async move {
            server_clone.accept_loop(tcp).await;
        });

        info!(%local_addr, "Device server listening");

        Ok(server)
    }
}

// ============================================================================
// DeviceServer - Public API
// ============================================================================

impl DeviceServer {
    /// Returns the URL devices connect to.
    ///
    /// Format: `ws://{ip}:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the bound port.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns the live-session registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Returns the number of live connections, identified or not.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    #[inline]
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

// ============================================================================
// DeviceServer - Lifecycle
// ============================================================================

impl DeviceServer {
    /// Stops accepting and closes every live session.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        info!(local_addr = %self.local_addr, "Device server shutting down");

        for session in self.registry.drain() {
            session.close();
            debug!(connection_id = %session.id(), "Session closed during shutdown");
        }

        info!("Device server shutdown complete");
    }
}

// ============================================================================
// DeviceServer - Accept Loop
// ============================================================================

impl DeviceServer {
    /// Background task that accepts new connections.
    async fn accept_loop(self: Arc<Self>, tcp: TcpListener) {
        debug!("Accept loop started");

        loop {
            if self.is_shutdown() {
                debug!("Accept loop shutting down");
                break;
            }

            // Accept with timeout to allow checking shutdown flag
            match timeout(ACCEPT_POLL_INTERVAL, tcp.accept()).await {
                Ok(Ok((stream, addr))) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream, addr).await {
                            warn!(error = %e, ?addr, "Connection handling failed");
                        }
                    });
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Accept failed");
                }
                Err(_) => continue,
            }
        }

        debug!("Accept loop terminated");
    }

    /// Upgrades one TCP connection and starts its session.
    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(?addr, "New TCP connection");

        let ws_stream = tokio_tungstenite::accept_async(stream).await?;

        let session = Session::spawn(
            ws_stream,
            Some(addr),
            self.options,
            &self.registry,
            Arc::clone(&self.listener),
        )?;

        // Lost the race with shutdown.
        if self.is_shutdown() {
            self.registry.remove(session.id());
            session.close();
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;

    use crate::error::Error;
    use crate::protocol::{Event, EventType, decode_message, encode_events};
    use crate::transport::registry::DeviceQueue;
    use crate::transport::testing::wait_until;

    const WAIT: Duration = Duration::from_secs(5);

    async fn start() -> (Arc<DeviceServer>, Arc<DeviceQueue>) {
        let queue = Arc::new(DeviceQueue::new());
        let server = DeviceServer::bind(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
            SessionOptions::default(),
            queue.clone(),
        )
        .await
        .expect("bind");
        (server, queue)
    }

    #[tokio::test]
    async fn test_server_creation() {
        let (server, _queue) = start().await;
        assert!(server.port() > 0);
        assert_eq!(server.ws_url(), format!("ws://127.0.0.1:{}", server.port()));
        assert_eq!(server.connection_count(), 0);
        server.shutdown();
        assert!(server.is_shutdown());
    }

    #[tokio::test]
    async fn test_device_handshake_end_to_end() {
        let (server, queue) = start().await;

        let (mut ws, _) = connect_async(server.ws_url()).await.expect("connect");
        wait_until(|| server.connection_count() == 1).await;

        let hello = Event::command(EventType::DeviceInfo, r#"{"device_id":"emulator-5554"}"#);
        let text = encode_events(&[hello]).expect("encode");
        ws.send(Message::Text(text.into())).await.expect("send");

        let session = tokio::time::timeout(WAIT, queue.next())
            .await
            .expect("identified in time")
            .expect("queue open");
        assert_eq!(session.device_id().as_deref(), Some("emulator-5554"));
        assert!(session.peer_addr().is_some());

        session
            .send_event(&Event::command(EventType::Start, ""))
            .await
            .expect("send start");

        let message = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("message in time")
            .expect("stream open")
            .expect("websocket ok");
        let events = decode_message(message.to_text().expect("text")).expect("decode");
        assert_eq!(events[0].event_type, EventType::Start);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_disconnect_leaves_registry() {
        let (server, _queue) = start().await;

        let (mut ws, _) = connect_async(server.ws_url()).await.expect("connect");
        wait_until(|| server.connection_count() == 1).await;

        ws.close(None).await.expect("close");
        wait_until(|| server.connection_count() == 0).await;

        server.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_closes_sessions() {
        let (server, _queue) = start().await;

        let (mut ws, _) = connect_async(server.ws_url()).await.expect("connect");
        wait_until(|| server.connection_count() == 1).await;

        server.shutdown();
        assert_eq!(server.connection_count(), 0);

        let closed = tokio::time::timeout(WAIT, async {
            loop {
                match ws.next().await {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await;
        assert!(closed.is_ok());
    }

    #[tokio::test]
    async fn test_failed_upgrade_reports_websocket_error() {
        let (server, _queue) = start().await;

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.expect("connect");
            stream
                .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .expect("write");
            stream
        });

        let (stream, peer) = listener.accept().await.expect("accept");
        let err = server.handle_connection(stream, peer).await.unwrap_err();
        assert!(matches!(err, Error::WebSocket(_)));
        assert!(err.is_connection_error());
        assert_eq!(server.connection_count(), 0);

        drop(client.await.expect("client task"));
        server.shutdown();
    }
}
