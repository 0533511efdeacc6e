//! The contract between the engine and its backing store.
//!
//! The engine only ever sees opaque bytes: serialization (and, when
//! configured, encryption) happens above this interface. Implementations
//! must behave as if [`read`][SessionStore::read] returns `None` for any id
//! whose previous [`write`][SessionStore::write] was more than `ttl` ago.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::SessionId;

/// Where session payloads are persisted.
///
/// Implementations must be safe for concurrent use by separate engine
/// instances. No ordering between concurrent `write`s for the same id is
/// required; the engine compensates by writing only when dirty and by
/// keeping lifecycle transitions monotone.
#[async_trait]
pub trait SessionStore: Debug + Send + Sync + 'static {
    /// Returns the most recent payload for `id`, or `None` if the id is
    /// absent or its TTL has elapsed.
    async fn read(&self, id: &SessionId) -> Result<Option<Vec<u8>>, StoreError>;

    /// Persists `payload` under `id`, overwriting any prior payload. The
    /// TTL is relative, counted from call time. Implementations must not
    /// silently truncate the payload.
    async fn write(&self, id: &SessionId, payload: &[u8], ttl: Duration) -> Result<(), StoreError>;

    /// Removes the payload for `id`. Succeeds whether or not it existed.
    async fn destroy(&self, id: &SessionId) -> Result<(), StoreError>;

    /// Hint to purge expired entries. A no-op is acceptable when the store
    /// has native TTL support; `max_ttl` bounds how old an entry may be for
    /// stores that do not track per-entry deadlines.
    async fn gc(&self, max_ttl: Duration) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
/// An infrastructure failure in the backing store.
///
/// Surfaced from `start` and `commit` so the application can decide whether
/// to fail the request.
pub enum StoreError {
    /// The backend could not complete the operation.
    #[error("session store backend error: {0}")]
    Backend(String),
}
