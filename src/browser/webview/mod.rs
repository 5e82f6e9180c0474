//! Device WebView automation.
//!
//! Each [`WebView`] drives the embedded browser of one connected device.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | WebView struct, accessors, request/response primitive |
//! | `navigation` | Settings, start, close, page-load waits |
//! | `script` | JavaScript execution, element lookup, clicks |
//! | `storage` | Cookies |
//! | `hooks` | Push-event callbacks |
//!
//! # Example
//!
//! ```ignore
//! let webview = driver.accept().await?;
//!
//! // Navigate
//! webview.start("https://example.com").await?;
//! webview.loaded(Some(Duration::from_secs(30))).await?;
//!
//! // Interact
//! if let Some(button) = webview.query_selector("#submit").await? {
//!     webview.click(10, 10, &button).await?;
//! }
//!
//! // Observe
//! webview.hook_network(|log| println!("{log}"));
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod core;
mod hooks;
mod navigation;
mod script;
mod storage;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{LoadState, Reply, WebView};
