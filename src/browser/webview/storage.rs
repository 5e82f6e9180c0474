//! Cookie methods.

use std::time::Duration;

use tracing::debug;

use crate::error::Result;
use crate::protocol::EventType;

use super::WebView;

// ============================================================================
// WebView - Cookies
// ============================================================================

impl WebView {
    /// Returns the cookie header the device's cookie store holds for `url`.
    ///
    /// Returns `Ok(None)` if no answer arrives within `timeout`.
    ///
    /// # Errors
    ///
    /// - [`Error::Execution`](crate::Error::Execution) if the device failed
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the
    ///   device disconnected
    pub async fn get_cookies(&self, url: &str, timeout: Option<Duration>) -> Result<Option<String>> {
        debug!(connection_id = %self.connection_id(), url = %url, "Getting cookies");

        self.request(EventType::CookieGet, url, timeout)
            .await?
            .into_content(EventType::CookieGetFailure)
    }

    /// Clears the device's cookie store.
    ///
    /// Returns the device's answer, or `Ok(None)` if none arrives within
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// See [`get_cookies`](Self::get_cookies).
    pub async fn remove_all_cookies(&self, timeout: Option<Duration>) -> Result<Option<String>> {
        debug!(connection_id = %self.connection_id(), "Removing all cookies");

        self.request(EventType::CookieRemoveAll, "", timeout)
            .await?
            .into_content(EventType::CookieRemoveAllFailure)
    }
}

// ============================================================================
// Tests
// ============================================================================
