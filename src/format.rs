//! Helpers for encoding/decoding the persisted session payload.
//!
//! This is primarily useful for testing and debugging.
//!
//! The payload is a deterministic JSON serialization of the session's data
//! map plus the reserved metadata keys. It is considered an implementation
//! detail and may evolve; when an encryption key is configured, the store
//! sees the sealed envelope instead.

use std::collections::HashMap;

use serde_json::Value;
use time::OffsetDateTime;

/// Encode a session data map (metadata included) into payload bytes.
pub fn encode_payload(map: &HashMap<String, Value>) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(map)
}

/// Decode payload bytes into a session data map.
///
/// Returns `None` for anything that is not a JSON object: a corrupt payload
/// is indistinguishable from a missing one further up the stack.
pub fn decode_payload(bytes: &[u8]) -> Option<HashMap<String, Value>> {
    serde_json::from_slice(bytes).ok()
}

/// Serialize an instant the way the payload metadata keys store it.
pub fn timestamp_value(instant: OffsetDateTime) -> Value {
    Value::from(instant.unix_timestamp())
}

/// Remove `key` from the map and interpret it as a stored instant.
pub(crate) fn take_timestamp(map: &mut HashMap<String, Value>, key: &str) -> Option<OffsetDateTime> {
    let seconds = map.remove(key)?.as_i64()?;
    OffsetDateTime::from_unix_timestamp(seconds).ok()
}

/// Remove `key` from the map and interpret it as a stored string.
pub(crate) fn take_string(map: &mut HashMap<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}
