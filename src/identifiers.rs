//! Type-safe identifiers for protocol entities.
//!
//! Newtype wrappers keep event identities, connection handles and hook
//! handles from being mixed up at compile time.
//!
//! | Type | Origin | Representation |
//! |------|--------|----------------|
//! | [`EventId`] | Whichever side originates a command | UUID v4 string (any string inbound) |
//! | [`ConnectionId`] | Local, per accepted connection | Non-zero `u64` counter |
//! | [`HookId`] | Local, per registered hook | Non-zero `u64` counter |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Counters
// ============================================================================

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(1);

/// Returns the next value of a process-wide counter.
///
/// Counters start at 1 and only wrap after `u64::MAX` allocations.
#[inline]
fn next_non_zero(counter: &AtomicU64) -> NonZeroU64 {
    loop {
        let value = counter.fetch_add(1, Ordering::Relaxed);
        if let Some(id) = NonZeroU64::new(value) {
            return id;
        }
    }
}

// ============================================================================
// EventId
// ============================================================================

/// Identity of an [`Event`](crate::protocol::Event).
///
/// Locally generated ids are UUID v4 strings. Ids generated by the device
/// are opaque strings and are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Generates a fresh random identity.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing identity string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// ConnectionId
// ============================================================================

/// Handle of one accepted device connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(NonZeroU64);

impl ConnectionId {
    /// Allocates the next connection handle.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(next_non_zero(&NEXT_CONNECTION_ID))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ============================================================================
// HookId
// ============================================================================

/// Handle returned when registering a hook, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(NonZeroU64);

impl HookId {
    /// Allocates the next hook handle.
    #[inline]
    #[must_use]
    pub(crate) fn next() -> Self {
        Self(next_non_zero(&NEXT_HOOK_ID))
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
