//! Structured payloads carried as JSON text in [`Event::content`](super::Event).

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

// ============================================================================
// Constants
// ============================================================================

/// Error code the WebView reports when a resource load times out
/// (Android `WebViewClient.ERROR_TIMEOUT`).
pub const ERROR_CODE_CONNECTION_TIMEOUT: i64 = -8;

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// DeviceInfo
// ============================================================================

/// Metadata a device sends in its `DEVICE_INFO` handshake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device identifier, if the device reports one.
    #[serde(default)]
    pub device_id: Option<String>,

    /// Every other field, verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceInfo {
    /// Returns a string field from the metadata.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

// ============================================================================
// WebRequest
// ============================================================================

/// The resource request attached to a received error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebRequest {
    /// Requested URI.
    #[serde(default, deserialize_with = "null_as_default")]
    pub uri: String,

    /// HTTP method.
    #[serde(default, deserialize_with = "null_as_default")]
    pub method: String,

    /// Request headers, verbatim. Values are usually strings but the
    /// device does not guarantee it.
    #[serde(default, deserialize_with = "null_as_default")]
    pub request_headers: Map<String, Value>,

    /// Whether the request followed a redirect.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_redirect: bool,

    /// Whether the request was for the main frame.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_for_main_frame: bool,
}

// ============================================================================
// ReceivedErrorPayload
// ============================================================================

/// Content of a `WEBVIEW_RECEIVED_ERROR` event.
///
/// # Format
///
/// ```json
/// {
///   "code": -8,
///   "msg": "net::ERR_TIMED_OUT",
///   "request": {
///     "uri": "http://x",
///     "method": "GET",
///     "requestHeaders": {},
///     "isRedirect": false,
///     "isForMainFrame": true
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedErrorPayload {
    /// Error code.
    #[serde(default)]
    pub code: Option<i64>,

    /// Error description.
    #[serde(default)]
    pub msg: Option<String>,

    /// The failing request.
    #[serde(default)]
    pub request: Option<WebRequest>,
}

impl ReceivedErrorPayload {
    /// Returns `true` if the payload reports a connection timeout.
    #[inline]
    #[must_use]
    pub fn is_connection_timeout(&self) -> bool {
        self.code == Some(ERROR_CODE_CONNECTION_TIMEOUT)
    }

    /// Translates the payload into the error taxonomy.
    ///
    /// A timeout code with an attached request becomes
    /// [`Error::ConnectivityTimeout`]; everything else stays a
    /// [`Error::ReceivedError`].
    #[must_use]
    pub fn into_error(self) -> Error {
        match self {
            Self {
                code: Some(ERROR_CODE_CONNECTION_TIMEOUT),
                request: Some(request),
                ..
            } => Error::connectivity_timeout(request),
            Self { code, msg, .. } => Error::received_error(code, msg),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
