//! WebSocket transport layer.
//!
//! This module handles communication between the local end (Rust) and
//! connected devices via WebSocket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  WebView (Rust) │                              │  Device         │
//! │                 │         WebSocket            │  (WebView host) │
//! │  DeviceServer   │◄────────────────────────────►│                 │
//! │  → Session      │        ip:PORT               │  WebSocket      │
//! │  → Correlator   │                              │  Client         │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `DeviceServer::bind` - Listen for devices
//! 2. Device connects, `Session::spawn` registers it
//! 3. Device sends `DEVICE_INFO`, the session is handed to the listener
//! 4. `Session` - Send commands, correlate responses and push events
//! 5. Disconnect or `Session::close` - Pending waiters fail, session unregisters
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `correlation` | Waiter bookkeeping and event routing |
//! | `connection` | Device session and event loop |
//! | `registry` | Live sessions and admission queue |
//! | `server` | WebSocket server and acceptance |

// ============================================================================
// Submodules
// ============================================================================

/// Event correlation engine.
pub mod correlation;

/// Device session and event loop.
pub mod connection;

/// Live-session registry and admission queue.
pub mod registry;

/// WebSocket server for device connections.
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Session, SessionOptions};
pub use correlation::{Correlator, DEFAULT_MAX_PENDING, Dispatched, EventHook, Pending};
pub use registry::{DeviceListener, DeviceQueue, SessionRegistry};
pub use server::DeviceServer;
