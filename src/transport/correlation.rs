//! Per-connection event correlation.
//!
//! A [`Correlator`] routes every inbound [`Event`] to the callers waiting
//! for it:
//!
//! | Table | Key | Matches | Consumes |
//! |-------|-----|---------|----------|
//! | Response waiters | command [`EventId`] | `event.parent_id == id` | yes |
//! | Category waiters | set of [`EventType`] | `event.event_type ∈ set` | yes |
//! | Hooks | [`EventType`] | `event.event_type == type` | no |
//!
//! One event may satisfy a response waiter, a category waiter and any
//! number of hooks at the same time.
//!
//! # Waiter Queues
//!
//! Several waiters may share a key. They are served oldest first: each
//! matching event resolves exactly one waiter per table, the head of the
//! queue. A category waiter registered on several categories sits in every
//! one of those queues and leaves all of them when it resolves.
//!
//! # Lifecycle of a Waiter
//!
//! ```text
//! register_* ──► Pending ──wait()──┬─► Ok(Some(event))      dispatch matched
//!                                  ├─► Ok(None)             timeout elapsed
//!                                  └─► Err(ConnectionClosed) shutdown
//! ```
//!
//! Register before sending the command that provokes the answer: events
//! dispatched before registration are not replayed.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{EventId, HookId};
use crate::protocol::{Event, EventType};

// ============================================================================
// Constants
// ============================================================================

/// Default ceiling on outstanding waiters per connection.
pub const DEFAULT_MAX_PENDING: usize = 1024;

// ============================================================================
// Types
// ============================================================================

/// Hook callback, invoked with the content of every matching event.
pub type EventHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Internal waiter handle.
type WaiterToken = u64;

/// What a waiter is waiting for.
#[derive(Debug, Clone)]
enum WaiterKey {
    Response(EventId),
    Types(Vec<EventType>),
}

/// A registered waiter.
struct Waiter {
    key: WaiterKey,
    tx: oneshot::Sender<Result<Event>>,
}

/// Summary of one [`Correlator::dispatch`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dispatched {
    /// A response waiter was resolved.
    pub response: bool,
    /// A category waiter was resolved.
    pub category: bool,
    /// Number of hooks invoked.
    pub hooks: usize,
}

impl Dispatched {
    /// Returns `true` if any waiter consumed the event.
    #[inline]
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.response || self.category
    }
}

// ============================================================================
// CorrelationState
// ============================================================================

/// Tables guarded by the correlator lock.
#[derive(Default)]
struct CorrelationState {
    next_token: WaiterToken,
    waiters: FxHashMap<WaiterToken, Waiter>,
    by_parent: FxHashMap<EventId, VecDeque<WaiterToken>>,
    by_type: FxHashMap<EventType, VecDeque<WaiterToken>>,
    hooks: FxHashMap<EventType, Vec<(HookId, EventHook)>>,
    closed: bool,
}

impl CorrelationState {
    /// Stores a waiter and indexes it under every key.
    fn insert(&mut self, key: WaiterKey, tx: oneshot::Sender<Result<Event>>) -> WaiterToken {
        self.next_token += 1;
        let token = self.next_token;

        match &key {
            WaiterKey::Response(id) => {
                self.by_parent.entry(id.clone()).or_default().push_back(token);
            }
            WaiterKey::Types(types) => {
                for event_type in types {
                    self.by_type.entry(*event_type).or_default().push_back(token);
                }
            }
        }

        self.waiters.insert(token, Waiter { key, tx });
        token
    }

    /// Removes a waiter from the store and every index.
    fn remove(&mut self, token: WaiterToken) -> Option<Waiter> {
        let waiter = self.waiters.remove(&token)?;

        match &waiter.key {
            WaiterKey::Response(id) => unindex(&mut self.by_parent, id, token),
            WaiterKey::Types(types) => {
                for event_type in types {
                    unindex(&mut self.by_type, event_type, token);
                }
            }
        }

        Some(waiter)
    }

    /// Removes the oldest waiter for a command identity.
    fn take_response(&mut self, parent_id: &EventId) -> Option<Waiter> {
        let token = *self.by_parent.get(parent_id)?.front()?;
        self.remove(token)
    }

    /// Removes the oldest waiter for a category.
    fn take_category(&mut self, event_type: EventType) -> Option<Waiter> {
        let token = *self.by_type.get(&event_type)?.front()?;
        self.remove(token)
    }
}

/// Drops `token` from the queue under `key`, and the queue once empty.
fn unindex<K>(index: &mut FxHashMap<K, VecDeque<WaiterToken>>, key: &K, token: WaiterToken)
where
    K: std::hash::Hash + Eq,
{
    if let Some(queue) = index.get_mut(key) {
        queue.retain(|t| *t != token);
        if queue.is_empty() {
            index.remove(key);
        }
    }
}

/// Delivers an event to the first live waiter returned by `take`.
fn deliver(event: &Event, mut take: impl FnMut() -> Option<Waiter>) -> bool {
    while let Some(waiter) = take() {
        if waiter.tx.send(Ok(event.clone())).is_ok() {
            return true;
        }
    }
    false
}

// ============================================================================
// Correlator
// ============================================================================

/// Shared correlator state.
struct CorrelatorInner {
    state: Mutex<CorrelationState>,
    max_pending: usize,
}

/// Matches inbound events to waiting callers and hooks.
///
/// Cheap to clone; clones share the same tables.
///
/// # Thread Safety
///
/// The tables sit behind a single lock that is never held across an
/// `.await` or while a hook runs.
#[derive(Clone)]
pub struct Correlator {
    inner: Arc<CorrelatorInner>,
}

impl fmt::Debug for Correlator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Correlator")
            .field("pending", &state.waiters.len())
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Correlator - Constructor
// ============================================================================

impl Correlator {
    /// Creates a correlator with the default waiter ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING)
    }

    /// Creates a correlator accepting at most `max_pending` outstanding
    /// waiters.
    #[must_use]
    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            inner: Arc::new(CorrelatorInner {
                state: Mutex::new(CorrelationState::default()),
                max_pending,
            }),
        }
    }
}

// ============================================================================
// Correlator - Waiters
// ============================================================================

impl Correlator {
    /// Registers a waiter for the response to command `id`.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the correlator was shut down
    /// - [`Error::Protocol`] if too many waiters are outstanding
    pub fn register_response(&self, id: EventId) -> Result<Pending> {
        self.register(WaiterKey::Response(id))
    }

    /// Registers a waiter for the first event whose category is in `types`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `types` is empty
    /// - [`Error::ConnectionClosed`] if the correlator was shut down
    /// - [`Error::Protocol`] if too many waiters are outstanding
    pub fn register_types(&self, types: &[EventType]) -> Result<Pending> {
        if types.is_empty() {
            return Err(Error::invalid_argument("no event types to wait for"));
        }

        let mut unique = types.to_vec();
        unique.sort_by_key(|t| t.as_str());
        unique.dedup();

        self.register(WaiterKey::Types(unique))
    }

    /// Waits for the response to command `id`.
    ///
    /// Returns `Ok(None)` if `limit` elapses first. `None` or a zero limit
    /// waits indefinitely.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection closes while waiting
    /// - [`Error::Protocol`] if too many waiters are outstanding
    pub async fn wait_for_response(
        &self,
        id: EventId,
        limit: Option<Duration>,
    ) -> Result<Option<Event>> {
        self.register_response(id)?.wait(limit).await
    }

    /// Waits for the first event whose category is in `types`.
    ///
    /// Returns `Ok(None)` if `limit` elapses first. `None` or a zero limit
    /// waits indefinitely.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection closes while waiting
    /// - [`Error::InvalidArgument`] if `types` is empty
    /// - [`Error::Protocol`] if too many waiters are outstanding
    pub async fn wait_for_types(
        &self,
        types: &[EventType],
        limit: Option<Duration>,
    ) -> Result<Option<Event>> {
        self.register_types(types)?.wait(limit).await
    }

    fn register(&self, key: WaiterKey) -> Result<Pending> {
        let (tx, rx) = oneshot::channel();

        let token = {
            let mut state = self.inner.state.lock();

            if state.closed {
                return Err(Error::ConnectionClosed);
            }

            let pending = state.waiters.len();
            if pending >= self.inner.max_pending {
                warn!(
                    pending,
                    max = self.inner.max_pending,
                    "Too many pending waiters"
                );
                return Err(Error::protocol(format!(
                    "Too many pending waiters: {}/{}",
                    pending, self.inner.max_pending
                )));
            }

            trace!(?key, "Waiter registered");
            state.insert(key, tx)
        };

        Ok(Pending {
            token,
            rx,
            inner: Arc::clone(&self.inner),
        })
    }
}

// ============================================================================
// Correlator - Hooks
// ============================================================================

impl Correlator {
    /// Registers a hook for every subsequent event of `event_type`.
    ///
    /// Hooks never consume events and run on the receive task, so they
    /// must not block. After [`shutdown`](Self::shutdown) the hook is
    /// dropped unregistered.
    pub fn add_hook<F>(&self, event_type: EventType, hook: F) -> HookId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = HookId::next();
        let mut state = self.inner.state.lock();

        if state.closed {
            debug!(%event_type, hook_id = %id, "Hook dropped, correlator closed");
            return id;
        }

        state
            .hooks
            .entry(event_type)
            .or_default()
            .push((id, Arc::new(hook)));

        debug!(%event_type, hook_id = %id, "Hook registered");
        id
    }

    /// Removes a hook. Returns `false` if it was not registered.
    pub fn remove_hook(&self, id: HookId) -> bool {
        let mut state = self.inner.state.lock();

        let mut removed = false;
        state.hooks.retain(|_, hooks| {
            let before = hooks.len();
            hooks.retain(|(hook_id, _)| *hook_id != id);
            removed |= hooks.len() != before;
            !hooks.is_empty()
        });

        removed
    }

    /// Returns the number of hooks registered for `event_type`.
    #[must_use]
    pub fn hook_count(&self, event_type: EventType) -> usize {
        self.inner
            .state
            .lock()
            .hooks
            .get(&event_type)
            .map_or(0, Vec::len)
    }
}

// ============================================================================
// Correlator - Dispatch & Shutdown
// ============================================================================

impl Correlator {
    /// Routes one inbound event.
    ///
    /// In order: the oldest response waiter for `parent_id`, the oldest
    /// category waiter for the event's type, then every hook for the type.
    /// Never blocks on the resumed callers.
    pub fn dispatch(&self, event: &Event) -> Dispatched {
        let (response, category, hooks) = {
            let mut state = self.inner.state.lock();

            let response = match &event.parent_id {
                Some(parent_id) => deliver(event, || state.take_response(parent_id)),
                None => false,
            };

            let category = deliver(event, || state.take_category(event.event_type));

            let hooks: Vec<EventHook> = state
                .hooks
                .get(&event.event_type)
                .map(|hooks| hooks.iter().map(|(_, hook)| Arc::clone(hook)).collect())
                .unwrap_or_default();

            (response, category, hooks)
        };

        for hook in &hooks {
            hook(&event.content);
        }

        let dispatched = Dispatched {
            response,
            category,
            hooks: hooks.len(),
        };

        trace!(
            id = %event.id,
            event_type = %event.event_type,
            response = dispatched.response,
            category = dispatched.category,
            hooks = dispatched.hooks,
            "Event dispatched"
        );

        dispatched
    }

    /// Fails every pending waiter with [`Error::ConnectionClosed`] and
    /// clears all tables, hooks included.
    ///
    /// Returns the number of waiters failed. Calling it again is a no-op.
    pub fn shutdown(&self) -> usize {
        let waiters: Vec<Waiter> = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return 0;
            }
            state.closed = true;
            state.by_parent.clear();
            state.by_type.clear();
            state.hooks.clear();
            state.waiters.drain().map(|(_, waiter)| waiter).collect()
        };

        let count = waiters.len();
        for waiter in waiters {
            let _ = waiter.tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending waiters on shutdown");
        }

        count
    }

    /// Returns the number of outstanding waiters.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) ran.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }
}

// ============================================================================
// Pending
// ============================================================================

/// A registered waiter.
///
/// Dropping it before it resolves removes the registration.
#[must_use = "a waiter does nothing unless awaited"]
pub struct Pending {
    token: WaiterToken,
    rx: oneshot::Receiver<Result<Event>>,
    inner: Arc<CorrelatorInner>,
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl Pending {
    /// Waits for the waiter to resolve.
    ///
    /// Returns `Ok(None)` if `limit` elapses first; the registration is
    /// removed and later events no longer reach it. `None` or a zero limit
    /// waits indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection closes first.
    pub async fn wait(mut self, limit: Option<Duration>) -> Result<Option<Event>> {
        let received = match limit.filter(|d| !d.is_zero()) {
            None => (&mut self.rx).await,
            Some(limit) => {
                let outcome = timeout(limit, &mut self.rx).await;
                match outcome {
                    Ok(received) => received,
                    Err(_) => return self.expire(limit),
                }
            }
        };

        match received {
            Ok(resolution) => resolution.map(Some),
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Withdraws the waiter after its deadline.
    fn expire(&mut self, limit: Duration) -> Result<Option<Event>> {
        if self.inner.state.lock().remove(self.token).is_some() {
            debug!(timeout_ms = limit.as_millis() as u64, "Waiter timed out");
            return Ok(None);
        }

        // Resolved between the deadline and the lock.
        match self.rx.try_recv() {
            Ok(resolution) => resolution.map(Some),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.inner.state.lock().remove(self.token);
    }
}

// ============================================================================
// Tests
// ============================================================================
