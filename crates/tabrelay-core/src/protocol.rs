//! Wire protocol between the relay and the browser tab.
//!
//! Every frame is a JSON object with a `type` discriminant. The two
//! directions are separate closed sum types:
//!
//! | direction | types |
//! |---|---|
//! | relay → browser ([`RelayMessage`]) | `execute`, `pong` |
//! | browser → relay ([`BrowserMessage`]) | `result`, `reinit_control`, `refocus_notification`, `ping` |
//!
//! [`decode`] never partially applies a malformed frame: it either returns a
//! fully validated [`BrowserMessage`] or a [`DecodeError`]. `result` frames
//! may carry extra telemetry fields, which are kept in
//! [`ResultMessage::extra`]; every other inbound type rejects unknown fields.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::control::ControlConfiguration;
use crate::errors::DecodeError;
use crate::ids::RequestId;

/// Messages sent from the relay to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// Run `code` in the page and reply with a `result` echoing `request_id`.
    Execute {
        /// Correlation token the browser must echo.
        request_id: RequestId,
        /// JavaScript source to evaluate.
        code: String,
    },
    /// Reply to a keepalive `ping`.
    Pong,
}

impl RelayMessage {
    /// Wire `type` discriminant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Execute { .. } => "execute",
            Self::Pong => "pong",
        }
    }
}

/// Reply to an `execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    /// Echo of the `execute` request id.
    pub request_id: RequestId,
    /// Whether the script completed without throwing.
    pub ok: bool,
    /// Script return value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Page URL at completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Page title at completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Unrecognized fields, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Messages received from the browser.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserMessage {
    /// Completion of an `execute`.
    Result(ResultMessage),
    /// The page re-initialized its control mode.
    ReinitControl {
        /// Configuration the page is now running with.
        config: ControlConfiguration,
    },
    /// Outcome of an automatic refocus attempt.
    RefocusNotification {
        /// Whether focus was restored.
        success: bool,
        /// Human-readable detail.
        message: String,
    },
    /// Keepalive probe.
    Ping,
}

impl BrowserMessage {
    /// Wire `type` discriminant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Result(_) => "result",
            Self::ReinitControl { .. } => "reinit_control",
            Self::RefocusNotification { .. } => "refocus_notification",
            Self::Ping => "ping",
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ReinitControlFields {
    config: Value,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RefocusFields {
    success: bool,
    message: String,
}

/// Decode one inbound frame.
pub fn decode(raw: &[u8]) -> Result<BrowserMessage, DecodeError> {
    let value: Value =
        serde_json::from_slice(raw).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(DecodeError::NotAnObject);
    };
    let kind = match fields.remove("type") {
        Some(Value::String(kind)) => kind,
        _ => return Err(DecodeError::MissingType),
    };

    match kind.as_str() {
        "result" => {
            let msg: ResultMessage = fields_as("result", fields)?;
            if msg.request_id.as_str().is_empty() {
                return Err(DecodeError::InvalidField {
                    variant: "result",
                    reason: "`request_id` must be a non-empty string".into(),
                });
            }
            Ok(BrowserMessage::Result(msg))
        }
        "reinit_control" => {
            let msg: ReinitControlFields = fields_as("reinit_control", fields)?;
            let config = ControlConfiguration::from_value(msg.config).map_err(|e| {
                DecodeError::InvalidField {
                    variant: "reinit_control",
                    reason: e.to_string(),
                }
            })?;
            Ok(BrowserMessage::ReinitControl { config })
        }
        "refocus_notification" => {
            let msg: RefocusFields = fields_as("refocus_notification", fields)?;
            Ok(BrowserMessage::RefocusNotification {
                success: msg.success,
                message: msg.message,
            })
        }
        "ping" => {
            if let Some(key) = fields.keys().next() {
                return Err(DecodeError::InvalidField {
                    variant: "ping",
                    reason: format!("unknown field `{key}`"),
                });
            }
            Ok(BrowserMessage::Ping)
        }
        _ => Err(DecodeError::UnknownType(kind)),
    }
}

/// Encode one outbound frame.
pub fn encode(msg: &RelayMessage) -> String {
    let value = match msg {
        RelayMessage::Execute { request_id, code } => json!({
            "type": msg.kind(),
            "request_id": request_id.as_str(),
            "code": code,
        }),
        RelayMessage::Pong => json!({ "type": msg.kind() }),
    };
    value.to_string()
}

fn fields_as<T: DeserializeOwned>(
    variant: &'static str,
    fields: Map<String, Value>,
) -> Result<T, DecodeError> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| DecodeError::InvalidField {
        variant,
        reason: e.to_string(),
    })
}
