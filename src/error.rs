//! Error types for fakeweb.
//!
//! Every failure the driver can report, from wire decoding to remote
//! execution errors.
//!
//! # Usage
//!
//! Fallible operations return [`Result<T>`]. Waits that simply expire are
//! values, not errors:
//!
//! ```ignore
//! use fakeweb::{Error, Result};
//!
//! async fn example(webview: &WebView) -> Result<()> {
//!     match webview.execute_js("document.title", None).await {
//!         Ok(Some(title)) => println!("{title}"),
//!         Ok(None) => println!("no answer yet"),
//!         Err(Error::Execution { payload, .. }) => eprintln!("script failed: {payload}"),
//!         Err(e) => return Err(e),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Wire | [`Error::Decode`], [`Error::Protocol`] |
//! | Transport | [`Error::ConnectionClosed`], [`Error::WebSocket`] |
//! | Remote | [`Error::Execution`], [`Error::ConnectivityTimeout`], [`Error::ReceivedError`] |
//! | External | [`Error::Io`], [`Error::Json`] |
//!
//! A waiter that expires is not an error: correlation waits return
//! `Ok(None)` instead.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::protocol::{EventType, WebRequest};

// ============================================================================
// Result Alias
// ============================================================================

/// Result alias over [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Error type shared by every fakeweb operation.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when server or driver configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Which setting was rejected and why.
        message: String,
    },

    /// Invalid argument passed to a command.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Wire Errors
    // ========================================================================
    /// Malformed wire payload.
    ///
    /// Inbound messages failing to decode are logged and skipped by the
    /// receive loop; this error only reaches callers of the codec directly.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the malformed payload.
        message: String,
    },

    /// Protocol violation or local protocol limit reached.
    #[error("Protocol error: {message}")]
    Protocol {
        /// What the device sent that did not fit the protocol.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The device connection is closed.
    ///
    /// Raised into every waiter still pending at teardown.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Remote Errors
    // ========================================================================
    /// The device answered a command with its failure category.
    #[error("{event_type} failed: {payload}")]
    Execution {
        /// Category of the failure response.
        event_type: EventType,
        /// Remote payload, verbatim.
        payload: String,
    },

    /// The WebView gave up connecting to a resource.
    #[error("WebView connection timeout: {}", request.uri)]
    ConnectivityTimeout {
        /// The request that timed out.
        request: Box<WebRequest>,
    },

    /// The WebView reported an error other than a connection timeout.
    #[error("code: {}, msg: {}", display_opt(code), display_opt(msg))]
    ReceivedError {
        /// Remote error code.
        code: Option<i64>,
        /// Remote error description.
        msg: Option<String>,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The WebSocket upgrade, a send or a receive failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

/// Renders an optional remote field the way the device reports missing ones.
fn display_opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map_or_else(|| "None".to_string(), ToString::to_string)
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an execution failure carrying the remote payload.
    #[inline]
    pub fn execution(event_type: EventType, payload: impl Into<String>) -> Self {
        Self::Execution {
            event_type,
            payload: payload.into(),
        }
    }

    /// Creates a connectivity timeout error.
    #[inline]
    pub fn connectivity_timeout(request: WebRequest) -> Self {
        Self::ConnectivityTimeout {
            request: Box::new(request),
        }
    }

    /// Creates a generic received error.
    #[inline]
    pub fn received_error(code: Option<i64>, msg: Option<String>) -> Self {
        Self::ReceivedError { code, msg }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectivityTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::WebSocket(_))
    }

    /// Returns `true` if the error was reported by the device.
    #[inline]
    #[must_use]
    pub fn is_remote_error(&self) -> bool {
        matches!(
            self,
            Self::Execution { .. } | Self::ConnectivityTimeout { .. } | Self::ReceivedError { .. }
        )
    }

    /// Returns the URI of a connectivity timeout.
    #[inline]
    #[must_use]
    pub fn timed_out_uri(&self) -> Option<&str> {
        match self {
            Self::ConnectivityTimeout { request } => Some(request.uri.as_str()),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
