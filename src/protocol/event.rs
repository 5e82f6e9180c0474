//! Event message types.
//!
//! An [`Event`] is the only message unit on the wire. Both sides create
//! events; commands carry a fresh [`EventId`] and responses point back at
//! it through `parent_id`.
//!
//! # Format
//!
//! ```json
//! {
//!   "id": "3f1c...",
//!   "type": "EVALJS_CALLBACK",
//!   "content": "2",
//!   "parent_id": "abc"
//! }
//! ```
//!
//! # Categories
//!
//! | Family | Command | Success | Failure |
//! |--------|---------|---------|---------|
//! | Script | `EVALJS` | `EVALJS_CALLBACK` | `EVALJS_FAILURE` |
//! | Cookies | `COOKIE_GET` | `COOKIE_GET_CALLBACK` | `COOKIE_GET_FAILURE` |
//! | Cookies | `COOKIE_REMOVE_ALL` | `COOKIE_REMOVE_ALL_CALLBACK` | `COOKIE_REMOVE_ALL_FAILURE` |
//!
//! Pushes from the device: `LOG`, `NETWORK_LOG`, `DEVICE_INFO`,
//! `WEBVIEW_PAGE_FINISHED`, `WEBVIEW_RECEIVED_ERROR`.
//! Fire-and-forget commands: `SETTINGS`, `START`, `CLOSE`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identifiers::EventId;

use super::payload::ReceivedErrorPayload;

// ============================================================================
// EventType
// ============================================================================

/// Category of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Console output from the page.
    #[serde(rename = "LOG")]
    Log,
    /// Network activity observed by the WebView.
    #[serde(rename = "NETWORK_LOG")]
    NetworkLog,
    /// Device metadata sent once after connecting.
    #[serde(rename = "DEVICE_INFO")]
    DeviceInfo,
    /// WebView configuration.
    #[serde(rename = "SETTINGS")]
    Settings,
    /// Evaluate JavaScript.
    #[serde(rename = "EVALJS")]
    EvalJs,
    /// Script result.
    #[serde(rename = "EVALJS_CALLBACK")]
    EvalJsCallback,
    /// Script failure.
    #[serde(rename = "EVALJS_FAILURE")]
    EvalJsFailure,
    /// Remove every cookie.
    #[serde(rename = "COOKIE_REMOVE_ALL")]
    CookieRemoveAll,
    /// Cookies removed.
    #[serde(rename = "COOKIE_REMOVE_ALL_CALLBACK")]
    CookieRemoveAllCallback,
    /// Cookie removal failed.
    #[serde(rename = "COOKIE_REMOVE_ALL_FAILURE")]
    CookieRemoveAllFailure,
    /// Read cookies for a URL.
    #[serde(rename = "COOKIE_GET")]
    CookieGet,
    /// Cookie string.
    #[serde(rename = "COOKIE_GET_CALLBACK")]
    CookieGetCallback,
    /// Cookie read failed.
    #[serde(rename = "COOKIE_GET_FAILURE")]
    CookieGetFailure,
    /// The page finished loading.
    #[serde(rename = "WEBVIEW_PAGE_FINISHED")]
    PageFinished,
    /// The WebView reported a load error.
    #[serde(rename = "WEBVIEW_RECEIVED_ERROR")]
    ReceivedError,
    /// Start loading the configured URL.
    #[serde(rename = "START")]
    Start,
    /// Close the WebView.
    #[serde(rename = "CLOSE")]
    Close,
}

impl EventType {
    /// Every category, in wire-documentation order.
    pub const ALL: [Self; 17] = [
        Self::Log,
        Self::NetworkLog,
        Self::DeviceInfo,
        Self::Settings,
        Self::EvalJs,
        Self::EvalJsCallback,
        Self::EvalJsFailure,
        Self::CookieRemoveAll,
        Self::CookieRemoveAllCallback,
        Self::CookieRemoveAllFailure,
        Self::CookieGet,
        Self::CookieGetCallback,
        Self::CookieGetFailure,
        Self::PageFinished,
        Self::ReceivedError,
        Self::Start,
        Self::Close,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Log => "LOG",
            Self::NetworkLog => "NETWORK_LOG",
            Self::DeviceInfo => "DEVICE_INFO",
            Self::Settings => "SETTINGS",
            Self::EvalJs => "EVALJS",
            Self::EvalJsCallback => "EVALJS_CALLBACK",
            Self::EvalJsFailure => "EVALJS_FAILURE",
            Self::CookieRemoveAll => "COOKIE_REMOVE_ALL",
            Self::CookieRemoveAllCallback => "COOKIE_REMOVE_ALL_CALLBACK",
            Self::CookieRemoveAllFailure => "COOKIE_REMOVE_ALL_FAILURE",
            Self::CookieGet => "COOKIE_GET",
            Self::CookieGetCallback => "COOKIE_GET_CALLBACK",
            Self::CookieGetFailure => "COOKIE_GET_FAILURE",
            Self::PageFinished => "WEBVIEW_PAGE_FINISHED",
            Self::ReceivedError => "WEBVIEW_RECEIVED_ERROR",
            Self::Start => "START",
            Self::Close => "CLOSE",
        }
    }

    /// Looks up a category by its wire name.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Returns the `(success, failure)` categories answering a
    /// request/response command, or `None` for every other category.
    #[must_use]
    pub const fn reply_types(self) -> Option<(Self, Self)> {
        match self {
            Self::EvalJs => Some((Self::EvalJsCallback, Self::EvalJsFailure)),
            Self::CookieGet => Some((Self::CookieGetCallback, Self::CookieGetFailure)),
            Self::CookieRemoveAll => Some((
                Self::CookieRemoveAllCallback,
                Self::CookieRemoveAllFailure,
            )),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Event
// ============================================================================

/// An immutable protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identity, assigned by the originating side.
    pub id: EventId,

    /// Category.
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Text payload. Structured payloads are JSON encoded as text.
    pub content: String,

    /// Identity of the command this event answers.
    #[serde(default)]
    pub parent_id: Option<EventId>,
}

impl Event {
    /// Creates a command event with a fresh identity.
    #[inline]
    #[must_use]
    pub fn command(event_type: EventType, content: impl Into<String>) -> Self {
        Self {
            id: EventId::generate(),
            event_type,
            content: content.into(),
            parent_id: None,
        }
    }

    /// Creates a command event whose content is `payload` encoded as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `payload` cannot be serialized.
    pub fn with_payload<T: Serialize + ?Sized>(event_type: EventType, payload: &T) -> Result<Self> {
        let content = serde_json::to_string(payload)?;
        Ok(Self::command(event_type, content))
    }

    /// Creates a response to `parent` with a fresh identity.
    #[must_use]
    pub fn reply_to(parent: &Event, event_type: EventType, content: impl Into<String>) -> Self {
        Self::command(event_type, content).with_parent(parent.id.clone())
    }

    /// Sets the identity this event answers.
    #[inline]
    #[must_use]
    pub fn with_parent(mut self, parent_id: EventId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Replaces the generated identity.
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = id;
        self
    }

    /// Returns `true` if this event answers the command `id`.
    #[inline]
    #[must_use]
    pub fn answers(&self, id: &EventId) -> bool {
        self.parent_id.as_ref() == Some(id)
    }

    /// Parses the content as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the content is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.content)?)
    }

    /// Translates a `WEBVIEW_RECEIVED_ERROR` event into a typed error.
    ///
    /// Returns `Ok(None)` for every other category.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the error payload cannot be parsed.
    pub fn received_error(&self) -> Result<Option<Error>> {
        if self.event_type != EventType::ReceivedError {
            return Ok(None);
        }
        let payload: ReceivedErrorPayload = self.json()?;
        Ok(Some(payload.into_error()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_from_wire() {
        assert_eq!(EventType::from_wire("EVALJS"), Some(EventType::EvalJs));
        assert_eq!(
            EventType::from_wire("WEBVIEW_PAGE_FINISHED"),
            Some(EventType::PageFinished)
        );
        assert_eq!(EventType::from_wire("evaljs"), None);
        assert_eq!(EventType::from_wire("WEBVIEW_PROGRESS"), None);
    }

    #[test]
    fn test_event_type_wire_names() {
        for event_type in EventType::ALL {
            let json = serde_json::to_string(&event_type).expect("serialize");
            assert_eq!(json, format!("\"{}\"", event_type.as_str()));
        }
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        let result = serde_json::from_str::<EventType>("\"TELEPORT\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_reply_types() {
        assert_eq!(
            EventType::EvalJs.reply_types(),
            Some((EventType::EvalJsCallback, EventType::EvalJsFailure))
        );
        assert_eq!(
            EventType::CookieRemoveAll.reply_types(),
            Some((
                EventType::CookieRemoveAllCallback,
                EventType::CookieRemoveAllFailure
            ))
        );
        assert_eq!(EventType::Start.reply_types(), None);
    }

    #[test]
    fn test_command_assigns_fresh_id() {
        let a = Event::command(EventType::EvalJs, "1+1");
        let b = Event::command(EventType::EvalJs, "1+1");
        assert_ne!(a.id, b.id);
        assert!(a.parent_id.is_none());
    }

    #[test]
    fn test_with_payload_encodes_text() {
        let event = Event::with_payload(EventType::Settings, &json!({ "fakeLoadUrl": "http://x" }))
            .expect("payload");
        assert_eq!(event.content, r#"{"fakeLoadUrl":"http://x"}"#);

        let value: serde_json::Value = event.json().expect("parse back");
        assert_eq!(value["fakeLoadUrl"], "http://x");
    }

    #[test]
    fn test_answers() {
        let command = Event::command(EventType::CookieGet, "http://x");
        let reply = Event::reply_to(&command, EventType::CookieGetCallback, "a=b");
        assert!(reply.answers(&command.id));
        assert_ne!(reply.id, command.id);
        assert!(!command.answers(&reply.id));
    }

    #[test]
    fn test_json_failure_is_callers_problem() {
        let event = Event::command(EventType::DeviceInfo, "not json");
        assert!(matches!(
            event.json::<serde_json::Value>(),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_received_error_only_for_error_category() {
        let event = Event::command(EventType::PageFinished, "http://x");
        assert!(event.received_error().expect("no parse").is_none());
    }
}
