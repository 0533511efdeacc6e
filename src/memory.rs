use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::SessionId;
use crate::store::{SessionStore, StoreError};

/// An in-memory session store.
///
/// # Limitations
///
/// This store won't persist payloads between server restarts and won't
/// synchronize them between multiple server instances. It is primarily
/// intended for testing and local development.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore(Arc<Mutex<HashMap<SessionId, StoredPayload>>>);

#[derive(Debug)]
struct StoredPayload {
    bytes: Vec<u8>,
    deadline: OffsetDateTime,
}

impl StoredPayload {
    fn is_stale(&self) -> bool {
        self.deadline <= OffsetDateTime::now_utc()
    }
}

impl MemoryStore {
    /// Creates a new (empty) in-memory session store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    #[tracing::instrument(name = "Read session payload", level = tracing::Level::TRACE, skip_all)]
    async fn read(&self, id: &SessionId) -> Result<Option<Vec<u8>>, StoreError> {
        let mut guard = self.0.lock().await;
        match guard.get(id) {
            Some(payload) if !payload.is_stale() => Ok(Some(payload.bytes.clone())),
            Some(_) => {
                guard.remove(id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(name = "Write session payload", level = tracing::Level::TRACE, skip_all)]
    async fn write(&self, id: &SessionId, payload: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let mut guard = self.0.lock().await;
        guard.insert(
            *id,
            StoredPayload {
                bytes: payload.to_vec(),
                deadline: OffsetDateTime::now_utc() + ttl,
            },
        );
        Ok(())
    }

    #[tracing::instrument(name = "Destroy session payload", level = tracing::Level::TRACE, skip_all)]
    async fn destroy(&self, id: &SessionId) -> Result<(), StoreError> {
        let mut guard = self.0.lock().await;
        guard.remove(id);
        Ok(())
    }

    #[tracing::instrument(name = "Sweep expired session payloads", level = tracing::Level::TRACE, skip_all)]
    async fn gc(&self, _max_ttl: Duration) -> Result<(), StoreError> {
        // Per-entry deadlines are tracked, so the `max_ttl` hint is unused.
        let mut guard = self.0.lock().await;
        guard.retain(|_, payload| !payload.is_stale());
        Ok(())
    }
}
