//! DOM element handle.
//!
//! Elements live on the device: the page-side bridge `window.__FEC` keeps
//! them and hands out string ids. An [`Element`] only carries that id.

use std::fmt;

// ============================================================================
// Element
// ============================================================================

/// Reference to an element held by the device-side script bridge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element {
    eid: String,
}

impl Element {
    /// Creates a handle from a raw script result.
    ///
    /// Surrounding whitespace, then double quotes, then single quotes are
    /// stripped, so a JSON-encoded string result yields the bare id.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let eid = raw.trim().trim_matches('"').trim_matches('\'');
        Self {
            eid: eid.to_string(),
        }
    }

    /// Returns the bridge id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.eid
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Element({})", self.eid)
    }
}

// ============================================================================
// Tests
// ============================================================================
