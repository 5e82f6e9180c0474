//! Server configuration.
//!
//! Provides a type-safe interface for configuring where the driver listens
//! and how device sessions behave.
//!
//! # Example
//!
//! ```ignore
//! use fakeweb::ServerOptions;
//!
//! let options = ServerOptions::new()
//!     .with_port(9000)
//!     .with_handshake_timeout(Duration::from_secs(10));
//! ```
//!
//! # Environment
//!
//! | Variable | Field |
//! |----------|-------|
//! | `FAKEWEB_BIND_IP` | `bind_ip` |
//! | `FAKEWEB_PORT` | `port` |
//! | `FAKEWEB_MAX_PENDING` | `max_pending` |
//! | `FAKEWEB_HANDSHAKE_TIMEOUT_MS` | `handshake_timeout` (`0` disables) |

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::{DEFAULT_MAX_PENDING, SessionOptions};

// ============================================================================
// Constants
// ============================================================================

/// Default bind address.
pub const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

const ENV_BIND_IP: &str = "FAKEWEB_BIND_IP";
const ENV_PORT: &str = "FAKEWEB_PORT";
const ENV_MAX_PENDING: &str = "FAKEWEB_MAX_PENDING";
const ENV_HANDSHAKE_TIMEOUT_MS: &str = "FAKEWEB_HANDSHAKE_TIMEOUT_MS";

// ============================================================================
// ServerOptions
// ============================================================================

/// Driver server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    /// Address to listen on.
    pub bind_ip: IpAddr,

    /// Port to listen on (0 for random).
    pub port: u16,

    /// Ceiling on outstanding waiters per session.
    pub max_pending: usize,

    /// Close sessions that do not identify within this bound.
    pub handshake_timeout: Option<Duration>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ServerOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bind_ip: DEFAULT_BIND_IP,
            port: DEFAULT_PORT,
            max_pending: DEFAULT_MAX_PENDING,
            handshake_timeout: None,
        }
    }

    /// Creates default options overridden from `FAKEWEB_*` environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates default options overridden by `lookup`.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = Self::new();

        if let Some(ip) = parse_var(&lookup, ENV_BIND_IP)? {
            options.bind_ip = ip;
        }
        if let Some(port) = parse_var(&lookup, ENV_PORT)? {
            options.port = port;
        }
        if let Some(max_pending) = parse_var(&lookup, ENV_MAX_PENDING)? {
            options.max_pending = max_pending;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_HANDSHAKE_TIMEOUT_MS)? {
            options.handshake_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        options.validate()?;
        Ok(options)
    }
}

/// Parses one variable, ignoring it when unset or blank.
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    raw.parse()
        .map(Some)
        .map_err(|e| Error::config(format!("{key}={raw:?} is invalid: {e}")))
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ServerOptions {
    /// Sets the address to listen on.
    #[inline]
    #[must_use]
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Sets the port to listen on.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the ceiling on outstanding waiters per session.
    #[inline]
    #[must_use]
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Closes sessions that do not identify within `timeout`.
    #[inline]
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl ServerOptions {
    /// Returns the per-session part of the options.
    #[inline]
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            max_pending: self.max_pending,
            handshake_timeout: self.handshake_timeout.filter(|d| !d.is_zero()),
        }
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `max_pending` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_pending == 0 {
            return Err(Error::config("max_pending must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
