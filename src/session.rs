//! The shared per-request session handle.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tower_cookies::Cookie;

use crate::csrf::CsrfToken;
use crate::engine::{RequestMeta, SessionEngine};
use crate::error::SessionError;
use crate::id::SessionId;
use crate::state::SessionStatus;

/// A cloneable handle to the request's session.
///
/// The [layer][crate::SessionManagerLayer] starts the underlying engine
/// before the inner service runs and inserts this handle into the request
/// extensions; handlers pull it out (e.g. via `axum::Extension`) to read
/// and mutate session state. All clones refer to the same engine, so a
/// mutation through one clone is visible through the others.
#[derive(Debug, Clone)]
pub struct Session(Arc<Mutex<SessionEngine>>);

impl Session {
    pub(crate) fn new(engine: SessionEngine) -> Self {
        Self(Arc::new(Mutex::new(engine)))
    }

    pub(crate) async fn start(&self, meta: &RequestMeta) -> Result<(), SessionError> {
        self.0.lock().await.start(meta).await.map(|_| ())
    }

    pub(crate) async fn commit(&self) -> Result<Cookie<'static>, SessionError> {
        self.0.lock().await.commit().await
    }

    /// The current session id.
    pub async fn id(&self) -> Result<SessionId, SessionError> {
        Ok(self.0.lock().await.current()?.id())
    }

    /// Where the session is in its lifecycle.
    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        Ok(self.0.lock().await.current()?.status())
    }

    /// Reads `key`, deserialized into `T`. `None` if absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        self.0.lock().await.get(key)
    }

    /// Writes `key`. Keys in the reserved `_` namespace are rejected.
    pub async fn set<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: T,
    ) -> Result<(), SessionError> {
        self.0.lock().await.set(key, value)
    }

    /// Removes `key`, returning the previous raw value.
    pub async fn remove(&self, key: &str) -> Result<Option<Value>, SessionError> {
        self.0.lock().await.remove(key)
    }

    /// Drops every value in the session.
    pub async fn clear(&self) -> Result<(), SessionError> {
        self.0.lock().await.clear()
    }

    /// Rotates the session id, preserving data. See
    /// [`SessionEngine::regenerate_id`].
    pub async fn regenerate_id(&self) -> Result<SessionId, SessionError> {
        self.0.lock().await.regenerate_id().await
    }

    /// Destroys the session. See [`SessionEngine::destroy`].
    pub async fn destroy(&self) -> Result<(), SessionError> {
        self.0.lock().await.destroy().await
    }

    /// Issues a new CSRF token, invalidating any prior one.
    pub async fn generate_csrf_token(&self) -> Result<CsrfToken, SessionError> {
        self.0.lock().await.generate_csrf_token()
    }

    /// Validates a submitted CSRF token without consuming it.
    pub async fn is_csrf_token_valid(&self, submitted: &str) -> Result<bool, SessionError> {
        self.0.lock().await.is_csrf_token_valid(submitted)
    }
}
