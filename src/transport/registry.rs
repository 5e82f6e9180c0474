//! Live-connection registry and device admission queue.
//!
//! These are the only pieces of state shared across connections.
//!
//! ```text
//!  accept ──► SessionRegistry.insert ──► DEVICE_INFO ──► DeviceListener
//!                    ▲                                      │
//!  teardown ─────────┘ remove                               ▼
//!                                              DeviceQueue.next() ──► caller
//! ```

// ============================================================================
// Imports
// ============================================================================

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

use super::Session;

// ============================================================================
// DeviceListener
// ============================================================================

/// Receives sessions once they completed the `DEVICE_INFO` handshake.
pub trait DeviceListener: Send + Sync {
    /// Called once per session, from the session's handshake task.
    fn notify_new_device(&self, session: Session);
}

// ============================================================================
// SessionRegistry
// ============================================================================

/// Every live connection, identified or not.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<FxHashMap<ConnectionId, Session>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session.
    pub fn insert(&self, session: Session) {
        let id = session.id();
        self.sessions.write().insert(id, session);
        debug!(connection_id = %id, "Session registered");
    }

    /// Removes a session.
    pub fn remove(&self, id: ConnectionId) -> Option<Session> {
        let removed = self.sessions.write().remove(&id);
        if removed.is_some() {
            debug!(connection_id = %id, "Session unregistered");
        }
        removed
    }

    /// Returns a session by connection handle.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<Session> {
        self.sessions.read().get(&id).cloned()
    }

    /// Returns the number of live sessions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns `true` if no session is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Returns every live session that completed the handshake,
    /// oldest connection first.
    #[must_use]
    pub fn identified(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .values()
            .filter(|session| session.is_identified())
            .cloned()
            .collect();
        sessions.sort_by_key(Session::id);
        sessions
    }

    /// Removes and returns every session.
    pub fn drain(&self) -> Vec<Session> {
        self.sessions.write().drain().map(|(_, s)| s).collect()
    }
}

// ============================================================================
// DeviceQueue
// ============================================================================

/// Admission queue handing identified devices to callers one at a time.
pub struct DeviceQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<Session>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Session>>,
}

impl Default for DeviceQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceQueue {
    /// Creates an open, empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Enqueues an identified session.
    pub fn push(&self, session: Session) {
        let id = session.id();
        let queued = self
            .tx
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(session).is_ok());

        if queued {
            debug!(connection_id = %id, "Device queued");
        } else {
            debug!(connection_id = %id, "Device queue closed, session not queued");
        }
    }

    /// Waits for the next identified session that is still connected.
    ///
    /// Sessions that disconnected while queued are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] once the queue is closed and
    /// drained.
    pub async fn next(&self) -> Result<Session> {
        let mut rx = self.rx.lock().await;
        loop {
            match rx.recv().await {
                Some(session) if session.is_closed() => {
                    debug!(connection_id = %session.id(), "Skipping disconnected device");
                }
                Some(session) => return Ok(session),
                None => return Err(Error::ConnectionClosed),
            }
        }
    }

    /// Stops accepting sessions. Waiting callers fail once the queue is
    /// drained.
    pub fn close(&self) {
        self.tx.lock().take();
    }
}

impl DeviceListener for DeviceQueue {
    fn notify_new_device(&self, session: Session) {
        self.push(session);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use crate::transport::testing::connect;

    #[tokio::test]
    async fn test_registry_tracks_sessions() {
        let registry = Arc::new(SessionRegistry::new());
        let queue = Arc::new(DeviceQueue::new());
        let (session, _device) = connect(&registry, &queue).await;

        assert_eq!(registry.len(), 1);
        assert!(registry.get(session.id()).is_some());
        assert!(registry.identified().is_empty());

        assert!(registry.remove(session.id()).is_some());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_queue_hands_out_identified_devices() {
        let registry = Arc::new(SessionRegistry::new());
        let queue = Arc::new(DeviceQueue::new());
        let (session, mut device) = connect(&registry, &queue).await;

        device.identify("pixel-7").await;

        let next = tokio::time::timeout(Duration::from_secs(5), queue.next())
            .await
            .expect("device in time")
            .expect("queue open");
        assert_eq!(next.id(), session.id());
        assert_eq!(next.device_id().as_deref(), Some("pixel-7"));
        assert_eq!(registry.identified().len(), 1);
    }

    #[tokio::test]
    async fn test_queue_skips_disconnected_devices() {
        let registry = Arc::new(SessionRegistry::new());
        let queue = Arc::new(DeviceQueue::new());
        let (gone, _gone_device) = connect(&registry, &queue).await;
        let (live, _live_device) = connect(&registry, &queue).await;

        gone.close();
        gone.closed().await;

        queue.push(gone);
        queue.push(live.clone());

        let next = queue.next().await.expect("queue open");
        assert_eq!(next.id(), live.id());
    }

    #[tokio::test]
    async fn test_closed_queue_fails_waiters() {
        let queue = DeviceQueue::new();
        queue.close();
        assert!(matches!(queue.next().await, Err(Error::ConnectionClosed)));
    }
}
