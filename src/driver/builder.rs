//! Builder pattern for driver configuration.
//!
//! Provides a fluent API for configuring and creating [`Driver`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use fakeweb::Driver;
//!
//! # async fn example() -> fakeweb::Result<()> {
//! let driver = Driver::builder()
//!     .port(9000)
//!     .handshake_timeout(Duration::from_secs(10))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;
use std::time::Duration;

use crate::error::Result;

use super::core::Driver;
use super::options::ServerOptions;

// ============================================================================
// DriverBuilder
// ============================================================================

/// Builder for configuring a [`Driver`] instance.
///
/// Use [`Driver::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct DriverBuilder {
    /// Server options.
    options: ServerOptions,
}

// ============================================================================
// DriverBuilder Implementation
// ============================================================================

impl DriverBuilder {
    /// Creates a new driver builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address to listen on.
    ///
    /// # Arguments
    ///
    /// * `ip` - IP address (e.g., `0.0.0.0` to accept remote devices)
    #[inline]
    #[must_use]
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.options.bind_ip = ip;
        self
    }

    /// Sets the port to listen on.
    ///
    /// # Arguments
    ///
    /// * `port` - Port number, 0 for a random free port
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.options.port = port;
        self
    }

    /// Sets the ceiling on outstanding waiters per device.
    #[inline]
    #[must_use]
    pub fn max_pending(mut self, max_pending: usize) -> Self {
        self.options.max_pending = max_pending;
        self
    }

    /// Closes devices that do not identify within `timeout`.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.options.handshake_timeout = Some(timeout);
        self
    }

    /// Replaces every option at once.
    ///
    /// # Arguments
    ///
    /// * `options` - Options, e.g. from [`ServerOptions::from_env`]
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ServerOptions) -> Self {
        self.options = options;
        self
    }

    /// Validates the options and binds the server.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) if the options are invalid
    /// - [`Error::Io`](crate::Error::Io) if binding fails
    pub async fn build(self) -> Result<Driver> {
        self.options.validate()?;
        Driver::new(self.options).await
    }
}

// ============================================================================
// Tests
// ============================================================================
