//! Terminal result of a submitted execution.

use serde_json::{Value, json};

use crate::protocol::ResultMessage;

/// How a submission ended.
///
/// `JsError` is a successful protocol exchange carrying a script failure;
/// it is not a relay fault and its message is passed through verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The script returned a value.
    Ok {
        /// Return value (`null` when the script returned nothing).
        value: Value,
        /// Page URL reported by the browser.
        url: Option<String>,
        /// Page title reported by the browser.
        title: Option<String>,
    },
    /// The script threw; the browser reported the message.
    JsError {
        /// Error text as reported by the page.
        message: String,
    },
    /// The browser connection dropped or was replaced while waiting.
    ConnectionLost,
    /// No `result` arrived within the timeout.
    Timeout,
}

impl Outcome {
    /// Map a browser `result` frame to an outcome.
    pub fn from_result(result: ResultMessage) -> Self {
        if result.ok {
            Self::Ok {
                value: result.result.unwrap_or(Value::Null),
                url: result.url,
                title: result.title,
            }
        } else {
            Self::JsError {
                message: result
                    .error
                    .unwrap_or_else(|| "script failed without an error message".into()),
            }
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ok { .. } => "ok",
            Self::JsError { .. } => "error",
            Self::ConnectionLost => "connection_lost",
            Self::Timeout => "timeout",
        }
    }

    /// Whether the script ran and returned a value.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// JSON body returned to HTTP callers.
    ///
    /// `{ok, status, result|error, url?, title?}`
    pub fn to_json(&self) -> Value {
        let status = self.label();
        match self {
            Self::Ok { value, url, title } => {
                let mut body = json!({ "ok": true, "status": status, "result": value });
                if let Some(url) = url {
                    body["url"] = json!(url);
                }
                if let Some(title) = title {
                    body["title"] = json!(title);
                }
                body
            }
            Self::JsError { message } => json!({ "ok": false, "status": status, "error": message }),
            Self::ConnectionLost => json!({
                "ok": false,
                "status": status,
                "error": "browser connection lost",
            }),
            Self::Timeout => json!({
                "ok": false,
                "status": status,
                "error": "timed out waiting for the browser",
            }),
        }
    }
}
