//! Browser entities module.
//!
//! This module provides the command layer over a connected device:
//!
//! | Type | Description |
//! |------|-------------|
//! | [`WebView`] | Device WebView (owns a session handle) |
//! | [`WebViewSettings`] | `SETTINGS` payload |
//! | [`Element`] | DOM element reference |
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use fakeweb::{Driver, Result, WebViewSettings};
//!
//! # async fn example() -> Result<()> {
//! let driver = Driver::builder().build().await?;
//! let webview = driver.accept().await?;
//!
//! webview
//!     .settings(&WebViewSettings::new().with_user_agent("Mozilla/5.0"))
//!     .await?;
//! webview.start("https://example.com").await?;
//! webview.loaded(Some(Duration::from_secs(30))).await?;
//!
//! let title = webview.execute_js("document.title", None).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// DOM element handles.
pub mod element;

/// WebView settings payload.
pub mod settings;

/// Device WebView automation.
pub mod webview;

// ============================================================================
// Re-exports
// ============================================================================

pub use element::Element;
pub use settings::WebViewSettings;
pub use webview::{LoadState, Reply, WebView};
