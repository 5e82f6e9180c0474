//! WebView navigation and page-load methods.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::browser::WebViewSettings;
use crate::error::{Error, Result};
use crate::identifiers::HookId;
use crate::protocol::{Event, EventType};
use crate::transport::Correlator;

use super::{LoadState, WebView};

/// Categories that end a page-load wait iteration.
const PAGE_STATE_TYPES: [EventType; 2] = [EventType::PageFinished, EventType::ReceivedError];

// ============================================================================
// PageStateFeed
// ============================================================================

/// Hooks forwarding every page-state event into one load wait.
///
/// The hooks stay registered for the whole wait, so events the device
/// sends back to back queue up instead of racing the next iteration.
/// The channel closes when the connection shuts down.
struct PageStateFeed<'a> {
    correlator: &'a Correlator,
    hooks: Vec<HookId>,
}

impl<'a> PageStateFeed<'a> {
    fn subscribe(correlator: &'a Correlator) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let hooks = PAGE_STATE_TYPES
            .into_iter()
            .map(|event_type| {
                let tx = tx.clone();
                correlator.add_hook(event_type, move |content| {
                    let _ = tx.send(Event::command(event_type, content));
                })
            })
            .collect();

        (Self { correlator, hooks }, rx)
    }
}

impl Drop for PageStateFeed<'_> {
    fn drop(&mut self) {
        for id in self.hooks.drain(..) {
            self.correlator.remove_hook(id);
        }
    }
}

// ============================================================================
// WebView - Navigation
// ============================================================================

impl WebView {
    /// Applies WebView settings on the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be sent.
    pub async fn settings(&self, settings: &WebViewSettings) -> Result<()> {
        debug!(connection_id = %self.connection_id(), ?settings, "Applying settings");

        let event = Event::with_payload(EventType::Settings, settings)?;
        self.send(&[event]).await
    }

    /// Loads `url` in the device's WebView.
    ///
    /// Sends the load URL and the start command in one message, and
    /// remembers `url` as the navigation target for [`loaded`](Self::loaded).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `url` is not an absolute URL
    /// - [`Error::ConnectionClosed`] if the device disconnected
    pub async fn start(&self, url: &str) -> Result<()> {
        Url::parse(url).map_err(|e| Error::invalid_argument(format!("invalid URL {url:?}: {e}")))?;

        debug!(connection_id = %self.connection_id(), url = %url, "Starting WebView");

        *self.inner.start_url.lock() = url.to_string();

        let load = Event::with_payload(EventType::Settings, &WebViewSettings::load_url(url))?;
        let start = Event::command(EventType::Start, "");
        self.send(&[load, start]).await
    }

    /// Closes the device's WebView.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be sent.
    pub async fn close(&self) -> Result<()> {
        debug!(connection_id = %self.connection_id(), "Closing WebView");
        self.send(&[Event::command(EventType::Close, "")]).await
    }
}

// ============================================================================
// WebView - Page Load
// ============================================================================

impl WebView {
    /// Waits until the page finished loading.
    ///
    /// Received errors are ignored, except a connection timeout for a URI
    /// under the last [`start`](Self::start) URL. `timeout` bounds each
    /// wait for a page-state event; `None` or zero waits indefinitely.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectivityTimeout`] if the navigation target timed out
    /// - [`Error::ConnectionClosed`] if the device disconnected
    pub async fn loaded(&self, timeout: Option<Duration>) -> Result<LoadState> {
        self.wait_page_state(timeout, false).await
    }

    /// Waits until the page finished loading, failing on any received error.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectivityTimeout`] for a connection timeout
    /// - [`Error::ReceivedError`] for any other received error
    /// - [`Error::Json`] if an error payload cannot be parsed
    /// - [`Error::ConnectionClosed`] if the device disconnected
    pub async fn loaded_raise(&self, timeout: Option<Duration>) -> Result<LoadState> {
        self.wait_page_state(timeout, true).await
    }

    async fn wait_page_state(&self, timeout: Option<Duration>, raise_all: bool) -> Result<LoadState> {
        let (_feed, mut events) = PageStateFeed::subscribe(self.inner.session.correlator());

        loop {
            let next = match timeout.filter(|d| !d.is_zero()) {
                None => events.recv().await,
                Some(limit) => match tokio::time::timeout(limit, events.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        debug!(connection_id = %self.connection_id(), "Page load wait timed out");
                        return Ok(LoadState::TimedOut);
                    }
                },
            };

            let Some(event) = next else {
                return Err(Error::ConnectionClosed);
            };

            if event.event_type == EventType::PageFinished {
                debug!(connection_id = %self.connection_id(), url = %event.content, "Page loaded");
                return Ok(LoadState::Finished);
            }

            let error = match event.received_error() {
                Ok(Some(error)) => error,
                Ok(None) => continue,
                Err(e) if raise_all => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Ignoring unparsable received error");
                    continue;
                }
            };

            if raise_all || self.is_navigation_timeout(&error) {
                return Err(error);
            }

            debug!(error = %error, "Ignoring received error during page load");
        }
    }

    /// Returns `true` if `error` is a connection timeout under the last
    /// navigation target.
    fn is_navigation_timeout(&self, error: &Error) -> bool {
        let start_url = self.inner.start_url.lock();
        error
            .timed_out_uri()
            .is_some_and(|uri| uri.starts_with(start_url.as_str()))
    }
}

// ============================================================================
// Tests
// ============================================================================
