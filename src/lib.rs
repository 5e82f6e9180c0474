//! fakeweb - Remote control plane for mobile WebViews.
//!
//! This library drives embedded browsers (WebViews) running inside mobile
//! applications over one persistent WebSocket connection per device.
//!
//! # Architecture
//!
//! The driver follows a server-device model:
//!
//! - **Local End (Rust)**: Listens for devices, sends commands, correlates events
//! - **Remote End (Device)**: Connects in, executes commands, pushes events
//!
//! Key design principles:
//!
//! - Every message is an ordered JSON array of events `{id, type, content, parent_id}`
//! - Responses carry the command's id in `parent_id`; pushes carry only a category
//! - Each connection owns a [`Correlator`](transport::Correlator) routing
//!   events to waiters and hooks without blocking the receive loop
//! - Connection loss fails every pending waiter with [`Error::ConnectionClosed`]
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use fakeweb::{Driver, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Listen for devices
//!     let driver = Driver::builder().port(8080).build().await?;
//!
//!     // Wait for a device to connect and identify
//!     let webview = driver.accept().await?;
//!
//!     // Navigate and interact
//!     webview.start("https://example.com").await?;
//!     webview.loaded(Some(Duration::from_secs(30))).await?;
//!     let title = webview.execute_js("document.title", None).await?;
//!     println!("Page title: {title:?}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`browser`] | Command layer: [`WebView`], [`Element`] |
//! | [`driver`] | Driver and configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Event model and wire codec |
//! | [`transport`] | Sessions, correlation, WebSocket server |

// ============================================================================
// Modules
// ============================================================================

/// Command layer: WebView, Element, settings.
pub mod browser;

/// Driver and configuration.
///
/// Use [`Driver::builder()`] to create a configured driver instance.
pub mod driver;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Event model and wire codec.
pub mod protocol;

/// WebSocket transport layer.
///
/// Device sessions, event correlation and the WebSocket server.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Browser types
pub use browser::{Element, LoadState, Reply, WebView, WebViewSettings};

// Driver types
pub use driver::{Driver, DriverBuilder, ServerOptions};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, EventId, HookId};

// Protocol types
pub use protocol::{DeviceInfo, Event, EventType, WebRequest};
