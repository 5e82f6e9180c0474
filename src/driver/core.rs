//! Driver coordinator and device admission.
//!
//! The [`Driver`] struct owns the device server, the live-session registry
//! and the admission queue. It hands out [`WebView`] handles one device at
//! a time.
//!
//! # Example
//!
//! ```no_run
//! use fakeweb::Driver;
//!
//! # async fn example() -> fakeweb::Result<()> {
//! let driver = Driver::builder().port(8080).build().await?;
//!
//! let webview = driver.accept().await?;
//! webview.start("https://example.com").await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::browser::WebView;
use crate::error::Result;
use crate::transport::{DeviceQueue, DeviceServer};

use super::builder::DriverBuilder;
use super::options::ServerOptions;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the driver.
pub(crate) struct DriverInner {
    /// Options the server was bound with.
    pub options: ServerOptions,

    /// WebSocket server accepting devices.
    pub server: Arc<DeviceServer>,

    /// Identified devices not yet handed out.
    pub queue: Arc<DeviceQueue>,
}

// ============================================================================
// Driver
// ============================================================================

/// Device coordinator.
///
/// The driver is responsible for:
/// - Managing the WebSocket server lifecycle
/// - Admitting identified devices one at a time
/// - Tracking live device sessions
///
/// Cheap to clone; clones share the server.
#[derive(Clone)]
pub struct Driver {
    /// Shared inner state.
    pub(crate) inner: Arc<DriverInner>,
}

// ============================================================================
// Driver - Display
// ============================================================================

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("local_addr", &self.local_addr())
            .field("connection_count", &self.connection_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Driver - Public API
// ============================================================================

impl Driver {
    /// Creates a configuration builder for the driver.
    #[inline]
    #[must_use]
    pub fn builder() -> DriverBuilder {
        DriverBuilder::new()
    }

    /// Waits for the next identified device.
    ///
    /// Devices that disconnected while waiting in the queue are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
    /// once the driver was shut down.
    pub async fn accept(&self) -> Result<WebView> {
        let session = self.inner.queue.next().await?;
        debug!(
            connection_id = %session.id(),
            device_id = ?session.device_id(),
            "Device accepted"
        );
        Ok(WebView::new(session))
    }

    /// Waits up to `limit` for the next identified device.
    ///
    /// Returns `Ok(None)` if no device identified in time.
    ///
    /// # Errors
    ///
    /// See [`accept`](Self::accept).
    pub async fn accept_timeout(&self, limit: Duration) -> Result<Option<WebView>> {
        match tokio::time::timeout(limit, self.accept()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Returns a handle to every live identified device, oldest first.
    ///
    /// Includes devices already handed out by [`accept`](Self::accept).
    #[must_use]
    pub fn webviews(&self) -> Vec<WebView> {
        self.inner
            .server
            .registry()
            .identified()
            .into_iter()
            .map(WebView::new)
            .collect()
    }

    /// Returns the URL devices connect to.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        self.inner.server.ws_url()
    }

    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.server.local_addr()
    }

    /// Returns the number of live connections, identified or not.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.server.connection_count()
    }

    /// Returns the options the driver was built with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ServerOptions {
        &self.inner.options
    }

    /// Stops accepting devices and closes every live session.
    ///
    /// Pending and later [`accept`](Self::accept) calls fail once queued
    /// devices are drained.
    pub fn shutdown(&self) {
        info!(local_addr = %self.local_addr(), "Shutting down driver");
        self.inner.queue.close();
        self.inner.server.shutdown();
    }
}

// ============================================================================
// Driver - Internal API
// ============================================================================

impl Driver {
    /// Binds the server with validated options.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails.
    pub(crate) async fn new(options: ServerOptions) -> Result<Self> {
        let queue = Arc::new(DeviceQueue::new());
        let server = DeviceServer::bind(
            options.bind_ip,
            options.port,
            options.session_options(),
            queue.clone(),
        )
        .await?;

        let inner = Arc::new(DriverInner {
            options,
            server,
            queue,
        });

        info!(ws_url = %inner.server.ws_url(), "Driver initialized");

        Ok(Self { inner })
    }
}

// ============================================================================
// Tests
// ============================================================================
