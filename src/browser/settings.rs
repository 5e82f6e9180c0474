//! WebView settings payload.
//!
//! Sent as the content of a `SETTINGS` event. The device applies only the
//! fields present, so absent fields are omitted from the wire.
//!
//! # Example
//!
//! ```
//! use fakeweb::WebViewSettings;
//!
//! let settings = WebViewSettings::new()
//!     .with_user_agent("Mozilla/5.0 (Linux; Android 14)")
//!     .with_proxies("socks5://127.0.0.1:1080");
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// WebViewSettings
// ============================================================================

/// Device-side WebView configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebViewSettings {
    /// User agent reported by the WebView.
    #[serde(
        rename = "fakeUserAgentString",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub user_agent: Option<String>,

    /// Package name reported in `X-Requested-With`.
    #[serde(
        rename = "fakeWebViewPackageName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub package_name: Option<String>,

    /// Proxy URL. `socks`, `http` and `https` schemes are supported.
    #[serde(
        rename = "fakeProxies",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub proxies: Option<String>,

    /// URL loaded on the next `START`.
    #[serde(
        rename = "fakeLoadUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub load_url: Option<String>,
}

impl WebViewSettings {
    /// Creates empty settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates settings carrying only the URL to load.
    #[inline]
    #[must_use]
    pub fn load_url(url: impl Into<String>) -> Self {
        Self {
            load_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Sets the user agent.
    #[inline]
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the reported package name.
    #[inline]
    #[must_use]
    pub fn with_package_name(mut self, package_name: impl Into<String>) -> Self {
        self.package_name = Some(package_name.into());
        self
    }

    /// Sets the proxy URL.
    #[inline]
    #[must_use]
    pub fn with_proxies(mut self, proxies: impl Into<String>) -> Self {
        self.proxies = Some(proxies.into());
        self
    }

    /// Returns `true` if no field is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_settings_serialize_to_empty_object() {
        let json = serde_json::to_string(&WebViewSettings::new()).expect("serialize");
        assert_eq!(json, "{}");
        assert!(WebViewSettings::new().is_empty());
    }

    #[test]
    fn test_wire_keys() {
        let settings = WebViewSettings::new()
            .with_user_agent("ua")
            .with_package_name("com.example")
            .with_proxies("http://127.0.0.1:8888");
        let value = serde_json::to_value(&settings).expect("serialize");

        assert_eq!(value["fakeUserAgentString"], "ua");
        assert_eq!(value["fakeWebViewPackageName"], "com.example");
        assert_eq!(value["fakeProxies"], "http://127.0.0.1:8888");
        assert!(value.get("fakeLoadUrl").is_none());
    }

    #[test]
    fn test_load_url_only() {
        let json = serde_json::to_string(&WebViewSettings::load_url("http://x")).expect("serialize");
        assert_eq!(json, r#"{"fakeLoadUrl":"http://x"}"#);
    }
}
