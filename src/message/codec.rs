//! Byte encoding of messages and path options as stored in Redis.
//!
//! The format is JSON. Only lossless round-tripping is relied upon.

use thiserror::Error;

use super::{LogMessage, PathOptions};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected {expected} store slots per message, got {got}")]
    MissingSlot { expected: usize, got: usize },
}

pub fn serialize_message(msg: &LogMessage) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(msg)?)
}

pub fn deserialize_message(bytes: &[u8]) -> Result<LogMessage, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn serialize_options(opts: &PathOptions) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(opts)?)
}

pub fn deserialize_options(bytes: &[u8]) -> Result<PathOptions, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_round_trip_keeps_fields() {
        let msg = LogMessage::new("disk full")
            .with_host("db-02")
            .with_program("postgres", Some(4242))
            .with_value("severity", "err")
            .with_tag("storage");

        let bytes = serialize_message(&msg).unwrap();
        let back = deserialize_message(&bytes).unwrap();

        assert_eq!(back.id, msg.id);
        assert_eq!(back.received_at, msg.received_at);
        assert_eq!(back.host, "db-02");
        assert_eq!(back.program, "postgres");
        assert_eq!(back.pid, Some(4242));
        assert_eq!(back.message, "disk full");
        assert_eq!(back.values.get("severity").map(String::as_str), Some("err"));
        assert_eq!(back.tags, vec!["storage".to_string()]);
        assert!(!back.has_ack_record());
    }

    #[test]
    fn test_malformed_message_is_an_error() {
        let err = deserialize_message(b"\x00\x01not json").unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn test_options_round_trip() {
        let opts = PathOptions {
            ack_needed: false,
            flow_control_requested: true,
        };
        let back = deserialize_options(&serialize_options(&opts).unwrap()).unwrap();
        assert_eq!(back, opts);
    }
}
