//! JavaScript execution methods.

use std::time::Duration;

use tracing::debug;

use crate::browser::Element;
use crate::error::Result;
use crate::protocol::EventType;

use super::WebView;

// ============================================================================
// WebView - Script Execution
// ============================================================================

impl WebView {
    /// Evaluates JavaScript in the page and returns the device's result.
    ///
    /// The result is the text the device reports, typically the JSON
    /// encoding of the script's value. Returns `Ok(None)` if no answer
    /// arrives within `timeout`; `None` or zero waits indefinitely.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let sum = webview.execute_js("1+1", Some(Duration::from_secs(5))).await?;
    /// assert_eq!(sum.as_deref(), Some("2"));
    /// ```
    ///
    /// # Errors
    ///
    /// - [`Error::Execution`](crate::Error::Execution) if the script failed
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the
    ///   device disconnected
    pub async fn execute_js(&self, code: &str, timeout: Option<Duration>) -> Result<Option<String>> {
        debug!(connection_id = %self.connection_id(), script_len = code.len(), "Executing script");

        self.request(EventType::EvalJs, code, timeout)
            .await?
            .into_content(EventType::EvalJsFailure)
    }

    /// Finds the first element matching a CSS selector.
    ///
    /// The element is registered with the page-side bridge and returned as
    /// a handle. Returns `Ok(None)` if nothing matches.
    ///
    /// # Errors
    ///
    /// See [`execute_js`](Self::execute_js).
    pub async fn query_selector(&self, selectors: &str) -> Result<Option<Element>> {
        let script = format!(
            r#"(function(selectors){{
                const ele = document.querySelector(selectors)
                if (ele) return window.__FEC.set(ele)
                return null
            }})({})"#,
            json_string(selectors)
        );

        let element = self
            .execute_js(&script, None)
            .await?
            .filter(|eid| !eid.is_empty() && eid != "null")
            .map(|eid| Element::new(&eid));

        debug!(selectors = %selectors, found = element.is_some(), "Query selector");
        Ok(element)
    }

    /// Dispatches a synthetic click on `element` at viewport position
    /// (`x`, `y`).
    ///
    /// # Errors
    ///
    /// See [`execute_js`](Self::execute_js).
    pub async fn click(&self, x: i32, y: i32, element: &Element) -> Result<()> {
        debug!(x, y, %element, "Clicking element");

        let script = format!(
            r#"(function(x, y, eid){{
                const ele = window.__FEC.get(eid)
                if (ele) {{
                    const event = new MouseEvent('click', {{
                        'view': window,
                        'bubbles': true,
                        'cancelable': true,
                        'clientX': x,
                        'clientY': y
                    }})
                    ele.dispatchEvent(event)
                }}
            }})({x}, {y}, {})"#,
            json_string(element.id())
        );

        self.execute_js(&script, None).await?;
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Quotes a string as a JavaScript string literal.
pub(crate) fn json_string(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

// ============================================================================
// Tests
// ============================================================================
