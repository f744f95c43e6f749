//! Control-mode configuration.
//!
//! The relay never interprets these settings; it only checks that the bag is
//! a map of string keys and fills in documented defaults before handing it
//! to the in-page control script.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::errors::RelayError;

/// Opaque key/value settings for the browser-side control mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlConfiguration(Map<String, Value>);

impl ControlConfiguration {
    /// Build from an arbitrary JSON value, rejecting anything but an object.
    pub fn from_value(value: Value) -> Result<Self, RelayError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(RelayError::InvalidControlConfig(format!(
                "expected an object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// An empty bag with no keys.
    pub fn empty() -> Self {
        Self(Map::new())
    }

    /// Overlay `overrides` on top of `self`. Null override values are skipped.
    #[must_use]
    pub fn merged_with(mut self, overrides: &ControlConfiguration) -> Self {
        for (key, value) in &overrides.0 {
            if value.is_null() {
                continue;
            }
            let _ = self.0.insert(key.clone(), value.clone());
        }
        self
    }

    /// Look up a single key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bag has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl Default for ControlConfiguration {
    /// Documented defaults understood by the in-page control script.
    fn default() -> Self {
        let value = json!({
            "auto_refocus": "off",
            "focus_outline_color": "#ff6a00",
            "focus_outline_width_px": 3,
            "key_delay_ms": 30,
            "action_timeout_ms": 5000,
            "tts_enabled": false,
            "tts_rate": 1.0,
        });
        match value {
            Value::Object(map) => Self(map),
            _ => Self::empty(),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
