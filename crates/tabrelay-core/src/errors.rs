//! Error types for the relay.
//!
//! [`DecodeError`] covers malformed inbound wire messages. These are logged
//! and dropped by the dispatch loop; they never close the connection.
//! [`RelayError`] covers failures surfaced to callers of the relay itself.

use thiserror::Error;

/// A browser message that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Payload is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Payload is valid JSON but not an object.
    #[error("message must be a JSON object")]
    NotAnObject,

    /// The `type` discriminant is absent or not a string.
    #[error("message is missing a string `type` field")]
    MissingType,

    /// The `type` discriminant is not an inbound message type.
    #[error("unknown message type `{0}`")]
    UnknownType(String),

    /// A variant's fields failed validation.
    #[error("invalid `{variant}` message: {reason}")]
    InvalidField {
        /// The message type being decoded.
        variant: &'static str,
        /// What was wrong.
        reason: String,
    },
}

impl DecodeError {
    /// Short classification string for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::NotAnObject => "not_an_object",
            Self::MissingType => "missing_type",
            Self::UnknownType(_) => "unknown_type",
            Self::InvalidField { .. } => "invalid_field",
        }
    }
}

/// Errors returned by relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No live browser connection.
    #[error("no browser connected")]
    NotConnected,

    /// A browser is connected but its outbound queue is full.
    #[error("browser is connected but its send queue is full")]
    SendQueueFull,

    /// Inbound payload could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A control configuration was not a map of string keys.
    #[error("invalid control configuration: {0}")]
    InvalidControlConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_display() {
        let err = DecodeError::UnknownType("bogus".into());
        assert_eq!(err.to_string(), "unknown message type `bogus`");

        let err = DecodeError::InvalidField {
            variant: "result",
            reason: "missing field `ok`".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid `result` message: missing field `ok`"
        );
    }

    #[test]
    fn decode_error_kinds() {
        assert_eq!(DecodeError::NotAnObject.kind(), "not_an_object");
        assert_eq!(DecodeError::MissingType.kind(), "missing_type");
        assert_eq!(DecodeError::InvalidJson("x".into()).kind(), "invalid_json");
    }

    #[test]
    fn relay_error_from_decode() {
        let err: RelayError = DecodeError::MissingType.into();
        assert!(matches!(err, RelayError::Decode(DecodeError::MissingType)));
        assert_eq!(err.to_string(), "message is missing a string `type` field");
    }

    #[test]
    fn not_connected_display() {
        assert_eq!(RelayError::NotConnected.to_string(), "no browser connected");
    }

    #[test]
    fn send_queue_full_is_distinct_from_not_connected() {
        let msg = RelayError::SendQueueFull.to_string();
        assert!(msg.contains("connected"));
        assert!(msg.contains("queue is full"));
        assert_ne!(msg, RelayError::NotConnected.to_string());
    }
}
