//! WebSocket protocol message types.
//!
//! This module defines the message format exchanged with the device.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | Command event | Local → Device | `SETTINGS`, `START`, `EVALJS`, ... |
//! | Response event | Device → Local | `*_CALLBACK` / `*_FAILURE` with `parent_id` |
//! | Push event | Device → Local | `LOG`, `NETWORK_LOG`, page state, `DEVICE_INFO` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | [`Event`] and [`EventType`] |
//! | `payload` | JSON payloads carried in event content |
//! | `wire` | Message encoding and decoding |

// ============================================================================
// Submodules
// ============================================================================

/// Event message types.
pub mod event;

/// Structured event payloads.
pub mod payload;

/// Transport message codec.
pub mod wire;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{Event, EventType};
pub use payload::{DeviceInfo, ERROR_CODE_CONNECTION_TIMEOUT, ReceivedErrorPayload, WebRequest};
pub use wire::{decode_message, encode_events};
