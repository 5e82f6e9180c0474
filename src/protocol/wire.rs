//! Wire encoding.
//!
//! Every transport message is a JSON array of events, in the order they
//! must be processed:
//!
//! ```json
//! [
//!   { "id": "a", "type": "SETTINGS", "content": "{\"fakeLoadUrl\":\"http://x\"}", "parent_id": null },
//!   { "id": "b", "type": "START", "content": "", "parent_id": null }
//! ]
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};

use super::{Event, EventType};

// ============================================================================
// Decoding
// ============================================================================

/// Decodes one transport message into its events.
///
/// Elements of a category this crate does not know are skipped with a
/// warning; the rest of the message is kept.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the message is not JSON, is not an array,
/// or any element is missing a field or has a field of the wrong type.
pub fn decode_message(text: &str) -> Result<Vec<Event>> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| Error::decode(format!("invalid JSON: {e}")))?;

    let Value::Array(items) = value else {
        return Err(Error::decode(format!(
            "expected an array of events, got {}",
            json_kind(&value)
        )));
    };

    let mut events = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        if let Some(category) = unknown_category(&item) {
            warn!(index, category, "Skipping event of unknown category");
            continue;
        }

        let event = serde_json::from_value::<Event>(item)
            .map_err(|e| Error::decode(format!("event #{index}: {e}")))?;
        events.push(event);
    }

    Ok(events)
}

/// Returns the `type` of an element when it is a string naming no known
/// category.
fn unknown_category(item: &Value) -> Option<&str> {
    item.get("type")
        .and_then(Value::as_str)
        .filter(|name| EventType::from_wire(name).is_none())
}

/// Names the JSON type of `value` for error messages.
fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Encodes events into one transport message.
///
/// # Errors
///
/// Returns [`Error::Json`] if serialization fails.
pub fn encode_events(events: &[Event]) -> Result<String> {
    Ok(serde_json::to_string(events)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::identifiers::EventId;

    #[test]
    fn test_decode_batch_in_order() {
        let events = decode_message(
            r#"[
                {"id": "r1", "type": "EVALJS_CALLBACK", "content": "2", "parent_id": "abc"},
                {"id": "r2", "type": "LOG", "content": "hello"}
            ]"#,
        )
        .expect("decode");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::EvalJsCallback);
        assert_eq!(events[0].parent_id, Some(EventId::new("abc")));
        assert_eq!(events[1].event_type, EventType::Log);
        assert!(events[1].parent_id.is_none());
    }

    #[test]
    fn test_decode_null_parent() {
        let events = decode_message(
            r#"[{"id": "p", "type": "WEBVIEW_PAGE_FINISHED", "content": "", "parent_id": null}]"#,
        )
        .expect("decode");
        assert!(events[0].parent_id.is_none());
    }

    #[test]
    fn test_decode_rejects_non_array() {
        let err = decode_message(r#"{"id": "x"}"#).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert!(err.to_string().contains("an object"));
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        assert!(matches!(
            decode_message("not json").unwrap_err(),
            Error::Decode { .. }
        ));
    }

    #[test]
    fn test_decode_rejects_incomplete_event() {
        let err = decode_message(r#"[{"id": "x", "type": "LOG"}]"#).unwrap_err();
        assert!(err.to_string().contains("event #0"));
    }

    #[test]
    fn test_decode_skips_unknown_category() {
        let events = decode_message(
            r#"[
                {"id": "r1", "type": "EVALJS_CALLBACK", "content": "2", "parent_id": "abc"},
                {"id": "p1", "type": "WEBVIEW_PROGRESS", "content": "40"},
                {"id": "l1", "type": "LOG", "content": "done"}
            ]"#,
        )
        .expect("decode");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, EventId::new("r1"));
        assert_eq!(events[1].id, EventId::new("l1"));
    }

    #[test]
    fn test_decode_rejects_non_string_category() {
        let err = decode_message(r#"[{"id": "x", "type": 7, "content": ""}]"#).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_encode_writes_null_parent() {
        let event = Event::command(EventType::Close, "").with_id(EventId::new("c1"));
        let text = encode_events(&[event]).expect("encode");
        assert_eq!(
            text,
            r#"[{"id":"c1","type":"CLOSE","content":"","parent_id":null}]"#
        );
    }

    proptest! {
        #[test]
        fn prop_decode_never_panics(text in ".{0,256}") {
            let _ = decode_message(&text);
        }

        #[test]
        fn prop_content_survives_the_wire(content in any::<String>()) {
            let event = Event::command(EventType::Log, content.clone());
            let text = encode_events(std::slice::from_ref(&event)).expect("encode");
            let decoded = decode_message(&text).expect("decode");
            prop_assert_eq!(&decoded[0].content, &content);
        }
    }
}
