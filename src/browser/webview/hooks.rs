//! Push-event hooks.

use tracing::debug;

use crate::identifiers::HookId;
use crate::protocol::EventType;

use super::WebView;

// ============================================================================
// WebView - Hooks
// ============================================================================

impl WebView {
    /// Calls `callback` with the content of every inbound event of
    /// `event_type`.
    ///
    /// Hooks do not consume events: waiters still receive them, and every
    /// hook on a category fires. Callbacks run on the connection's receive
    /// task and should return quickly.
    pub fn hook<F>(&self, event_type: EventType, callback: F) -> HookId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = self.inner.session.correlator().add_hook(event_type, callback);
        debug!(connection_id = %self.connection_id(), hook_id = %id, %event_type, "Hook added");
        id
    }

    /// Calls `callback` for every `NETWORK_LOG` event.
    pub fn hook_network<F>(&self, callback: F) -> HookId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.hook(EventType::NetworkLog, callback)
    }

    /// Calls `callback` for every `LOG` event.
    pub fn hook_log<F>(&self, callback: F) -> HookId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.hook(EventType::Log, callback)
    }

    /// Removes a hook. Returns `false` if it was already removed.
    pub fn unhook(&self, id: HookId) -> bool {
        self.inner.session.correlator().remove_hook(id)
    }
}

// ============================================================================
// Tests
// ============================================================================
