//! Driver module.
//!
//! This module provides the main entry point: a server devices connect to,
//! and an admission queue handing them out as [`WebView`](crate::WebView)s.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Driver`] | Server owner and device admission |
//! | [`DriverBuilder`] | Fluent configuration builder |
//! | [`ServerOptions`] | Bind address and session options |
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use fakeweb::{Driver, Result};
//!
//! # async fn example() -> Result<()> {
//! let driver = Driver::builder().port(8080).build().await?;
//!
//! let webview = driver.accept().await?;
//! webview.start("https://example.com").await?;
//! webview.loaded(Some(Duration::from_secs(30))).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for driver configuration.
pub mod builder;

/// Core driver implementation.
pub mod core;

/// Server options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::DriverBuilder;
pub use self::core::Driver;
pub use options::ServerOptions;
