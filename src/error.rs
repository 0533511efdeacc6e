use std::time::Duration;

use crate::envelope::EncryptError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
/// Invalid engine configuration, raised eagerly at construction.
pub enum ConfigError {
    /// The encryption key is too short to key AES-256.
    #[error("encryption key must be at least {min} bytes, got {actual}")]
    KeyTooShort { min: usize, actual: usize },
    /// The idle timeout exceeds the absolute timeout.
    #[error("idle timeout ({idle:?}) must not exceed absolute timeout ({absolute:?})")]
    TimeoutOrder { idle: Duration, absolute: Duration },
}

#[derive(Debug, thiserror::Error)]
/// A failure of a session engine operation.
///
/// Security-relevant rejections (bad cookie, failed decryption, binding
/// mismatch, timeouts) never surface here: the engine silently falls back
/// to a fresh session for those. What does surface is programmer error
/// (`NotStarted`, `ReservedKey`) and infrastructure failure (`Store`).
pub enum SessionError {
    /// An operation other than `start` was invoked before `start`.
    #[error("the session has not been started yet")]
    NotStarted,
    /// The application tried to write to the reserved metadata namespace.
    #[error("keys prefixed with `_` are reserved for session metadata: `{0}`")]
    ReservedKey(String),
    /// A session value could not be serialized or deserialized.
    #[error("failed to serialize or deserialize a session value")]
    Codec(#[source] serde_json::Error),
    /// The session payload could not be sealed for storage.
    #[error(transparent)]
    Seal(#[from] EncryptError),
    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
