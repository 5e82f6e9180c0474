//! Core WebView struct, accessors and the request/response primitive.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::{DeviceInfo, Event, EventType};
use crate::transport::Session;

// ============================================================================
// Types
// ============================================================================

/// Outcome of a request/response command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The device answered with the success category.
    Success(String),
    /// The device answered with the failure category.
    Failure(String),
    /// No answer within the timeout.
    NoReply,
}

impl Reply {
    /// Converts the reply into the façade result shape.
    ///
    /// `Failure` becomes [`Error::Execution`] tagged with `failure_type`.
    pub(crate) fn into_content(self, failure_type: EventType) -> Result<Option<String>> {
        match self {
            Self::Success(content) => Ok(Some(content)),
            Self::Failure(payload) => Err(Error::execution(failure_type, payload)),
            Self::NoReply => Ok(None),
        }
    }
}

/// Outcome of waiting for a page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// The page finished loading.
    Finished,
    /// No page-state event arrived within the timeout.
    TimedOut,
}

impl LoadState {
    /// Returns `true` if the page finished loading.
    #[inline]
    #[must_use]
    pub fn is_finished(self) -> bool {
        self == Self::Finished
    }
}

/// Internal shared state for a WebView handle.
pub(crate) struct WebViewInner {
    /// Device connection.
    pub session: Session,
    /// Most recent navigation target.
    pub start_url: Mutex<String>,
}

// ============================================================================
// WebView
// ============================================================================

/// A handle to the WebView of one connected device.
///
/// Clones share the handle, including the most recent navigation target
/// used by [`loaded`](Self::loaded).
#[derive(Clone)]
pub struct WebView {
    pub(crate) inner: Arc<WebViewInner>,
}

impl fmt::Debug for WebView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebView")
            .field("connection_id", &self.connection_id())
            .field("device_id", &self.device_id())
            .finish_non_exhaustive()
    }
}

impl WebView {
    /// Creates a handle over an identified session.
    pub(crate) fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(WebViewInner {
                session,
                start_url: Mutex::new(String::new()),
            }),
        }
    }
}

// ============================================================================
// WebView - Accessors
// ============================================================================

impl WebView {
    /// Returns the underlying session.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Returns the connection handle.
    #[inline]
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.inner.session.id()
    }

    /// Returns the device identifier from the handshake.
    #[must_use]
    pub fn device_id(&self) -> Option<String> {
        self.inner.session.device_id()
    }

    /// Returns the handshake metadata.
    #[must_use]
    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.inner.session.device_info()
    }

    /// Returns the most recent navigation target, empty before the first
    /// [`start`](Self::start).
    #[must_use]
    pub fn start_url(&self) -> String {
        self.inner.start_url.lock().clone()
    }

    /// Returns `true` once the device disconnected.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.session.is_closed()
    }

    /// Waits until the device disconnected.
    pub async fn closed(&self) {
        self.inner.session.closed().await;
    }
}

// ============================================================================
// WebView - Commands
// ============================================================================

impl WebView {
    /// Sends a command and waits for its answer.
    ///
    /// The waiter is registered before the command is sent, so an answer
    /// cannot be missed. `None` or a zero timeout waits indefinitely.
    ///
    /// # Arguments
    ///
    /// * `event_type` - A command category with a callback/failure pair
    /// * `content` - Command payload
    /// * `timeout` - How long to wait for the answer
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `event_type` has no answer categories
    /// - [`Error::ConnectionClosed`] if the device disconnects
    /// - [`Error::Protocol`] if the device answers with another category
    pub async fn request(
        &self,
        event_type: EventType,
        content: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Reply> {
        let Some((success, failure)) = event_type.reply_types() else {
            return Err(Error::invalid_argument(format!(
                "{event_type} is not a request/response command"
            )));
        };

        let command = Event::command(event_type, content);
        let pending = self
            .inner
            .session
            .correlator()
            .register_response(command.id.clone())?;

        debug!(
            connection_id = %self.connection_id(),
            event_id = %command.id,
            %event_type,
            "Sending request"
        );
        self.inner.session.send_event(&command).await?;

        let Some(response) = pending.wait(timeout).await? else {
            debug!(event_id = %command.id, %event_type, "Request timed out");
            return Ok(Reply::NoReply);
        };

        match response.event_type {
            t if t == success => Ok(Reply::Success(response.content)),
            t if t == failure => Ok(Reply::Failure(response.content)),
            other => {
                warn!(event_id = %command.id, %other, "Unexpected answer category");
                Err(Error::protocol(format!(
                    "unexpected {other} answer to {event_type}"
                )))
            }
        }
    }

    /// Sends events without waiting for an answer.
    pub(crate) async fn send(&self, events: &[Event]) -> Result<()> {
        self.inner.session.send(events).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::browser::webview::testing::{answer_next, connect};

    #[test]
    fn test_webview_is_clone_and_debug() {
        fn assert_traits<T: Clone + fmt::Debug>() {}
        assert_traits::<WebView>();
    }

    #[test]
    fn test_reply_into_content() {
        assert_eq!(
            Reply::Success("ok".into())
                .into_content(EventType::EvalJsFailure)
                .expect("success"),
            Some("ok".to_string())
        );
        assert_eq!(
            Reply::NoReply
                .into_content(EventType::EvalJsFailure)
                .expect("no reply"),
            None
        );
        let err = Reply::Failure("boom".into())
            .into_content(EventType::EvalJsFailure)
            .unwrap_err();
        assert_eq!(err.to_string(), "EVALJS_FAILURE failed: boom");
    }

    #[tokio::test]
    async fn test_request_success() {
        let (webview, device) = connect().await;
        let device = answer_next(device, EventType::CookieGetCallback, "a=b");

        let reply = webview
            .request(EventType::CookieGet, "http://x", Some(Duration::from_secs(5)))
            .await
            .expect("request");
        assert_eq!(reply, Reply::Success("a=b".to_string()));

        let (_device, command) = device.await.expect("device task");
        assert_eq!(command.event_type, EventType::CookieGet);
        assert_eq!(command.content, "http://x");
    }

    #[tokio::test]
    async fn test_request_failure() {
        let (webview, device) = connect().await;
        let _device = answer_next(device, EventType::EvalJsFailure, "ReferenceError");

        let reply = webview
            .request(EventType::EvalJs, "nope()", Some(Duration::from_secs(5)))
            .await
            .expect("request");
        assert_eq!(reply, Reply::Failure("ReferenceError".to_string()));
    }

    #[tokio::test]
    async fn test_request_no_reply() {
        let (webview, _device) = connect().await;

        let reply = webview
            .request(EventType::EvalJs, "1", Some(Duration::from_millis(30)))
            .await
            .expect("request");
        assert_eq!(reply, Reply::NoReply);
        assert_eq!(webview.session().correlator().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_request_unexpected_category() {
        let (webview, device) = connect().await;
        let _device = answer_next(device, EventType::CookieGetCallback, "a=b");

        let err = webview
            .request(EventType::EvalJs, "1", Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_request_rejects_fire_and_forget_category() {
        let (webview, _device) = connect().await;
        let err = webview.request(EventType::Start, "", None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_request_fails_on_disconnect() {
        let (webview, device) = connect().await;
        let request = tokio::spawn({
            let webview = webview.clone();
            async move { webview.request(EventType::EvalJs, "1", None).await }
        });

        let mut device = device;
        device.recv_events().await;
        device.close().await;

        assert!(matches!(
            request.await.expect("join"),
            Err(Error::ConnectionClosed)
        ));
    }
}
