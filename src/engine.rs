//! The session lifecycle state machine.
//!
//! One engine instance is bound to one request. `start` resolves the
//! incoming cookie to a [`SessionState`], applying timeout, decryption,
//! and client-binding policy; the application mutates the state through
//! the engine, and `commit` persists it and produces the response cookie.
//!
//! Policy rejections (malformed cookie, unknown id, corrupt or forged
//! payload, timeouts, binding mismatch) are silent: the engine falls back
//! to a fresh session and never tells the client why.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::OffsetDateTime;
use tower_cookies::Cookie;

use crate::config::SessionConfig;
use crate::csrf::CsrfToken;
use crate::envelope::Envelope;
use crate::error::{ConfigError, SessionError};
use crate::fingerprint;
use crate::format;
use crate::id::SessionId;
use crate::state::{RESERVED_KEY_PREFIX, SessionState, SessionStatus, keys};
use crate::store::SessionStore;

/// What the engine consumes from an HTTP request.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    cookie: Option<String>,
    user_agent: Option<String>,
    client_ip: String,
}

impl RequestMeta {
    /// Extracts the session-relevant request surface: the (already
    /// isolated) session cookie value, the `User-Agent` header, and the
    /// client address per [`fingerprint::client_ip`].
    pub fn from_parts(
        headers: &HeaderMap,
        cookie: Option<String>,
        peer: Option<IpAddr>,
    ) -> Self {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        Self {
            cookie,
            user_agent,
            client_ip: fingerprint::client_ip(headers, peer),
        }
    }

    /// Builds request metadata from already-extracted values.
    pub fn new(
        cookie: Option<String>,
        user_agent: Option<String>,
        client_ip: impl Into<String>,
    ) -> Self {
        Self {
            cookie,
            user_agent,
            client_ip: client_ip.into(),
        }
    }
}

/// The session engine: one instance per request, single logical owner.
///
/// Every operation other than [`start`][SessionEngine::start] fails with
/// [`SessionError::NotStarted`] before initialization. The engine is not
/// safe for concurrent use; multiplexing deployments construct one engine
/// per request, as [the middleware][crate::SessionManagerLayer] does.
#[derive(Debug)]
pub struct SessionEngine {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
    envelope: Option<Envelope>,
    state: Option<SessionState>,
    current_user_agent: Option<String>,
    current_ip_hash: Option<String>,
}

impl SessionEngine {
    /// Builds an engine over `store` with the given configuration.
    ///
    /// Configuration is validated eagerly: timeout ordering and key length
    /// problems surface here, not at first use.
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let envelope = match &config.encryption_key {
            Some(secret) => Some(Envelope::new(secret)?),
            None => None,
        };
        Ok(Self {
            store,
            config: config.normalized(),
            envelope,
            state: None,
            current_user_agent: None,
            current_ip_hash: None,
        })
    }

    /// Resolves the request to a session state.
    ///
    /// Idempotent per engine instance: a second call returns the state
    /// produced by the first.
    pub async fn start(&mut self, meta: &RequestMeta) -> Result<&SessionState, SessionError> {
        if self.state.is_none() {
            self.current_user_agent = Some(meta.user_agent.clone().unwrap_or_default());
            self.current_ip_hash = Some(fingerprint::ip_hash(&meta.client_ip));
            let state = self.resume(meta).await?;
            self.state = Some(state);
        }
        self.current()
    }

    async fn resume(&self, meta: &RequestMeta) -> Result<SessionState, SessionError> {
        let now = OffsetDateTime::now_utc();

        let Some(raw) = meta.cookie.as_deref() else {
            return Ok(SessionState::fresh(now));
        };
        let Ok(id) = SessionId::parse(raw) else {
            tracing::debug!("session cookie rejected (malformed id)");
            return Ok(SessionState::fresh(now));
        };
        let Some(payload) = self.store.read(&id).await? else {
            return Ok(SessionState::fresh(now));
        };
        let Some(mut data) = self.open_payload(&payload) else {
            tracing::warn!("stored session payload rejected (corrupt or unauthenticated)");
            self.store.destroy(&id).await?;
            return Ok(SessionState::fresh(now));
        };

        // Missing metadata is tolerated: the session just looks brand new.
        let created_at = format::take_timestamp(&mut data, keys::CREATED_AT).unwrap_or(now);
        let last_activity_at =
            format::take_timestamp(&mut data, keys::LAST_ACTIVITY_AT).unwrap_or(now);

        if now - last_activity_at > self.config.idle_timeout {
            tracing::debug!("session discarded (idle timeout)");
            self.store.destroy(&id).await?;
            return Ok(SessionState::fresh(now));
        }
        if now - created_at > self.config.absolute_timeout {
            tracing::debug!("session discarded (absolute timeout)");
            self.store.destroy(&id).await?;
            return Ok(SessionState::fresh(now));
        }

        let stored_user_agent = format::take_string(&mut data, keys::USER_AGENT);
        let stored_ip_hash = format::take_string(&mut data, keys::IP_HASH);
        if !self.verify_binding(stored_user_agent.as_deref(), stored_ip_hash.as_deref()) {
            tracing::warn!("session discarded (client binding mismatch)");
            self.store.destroy(&id).await?;
            return Ok(SessionState::fresh(now));
        }

        Ok(SessionState::resumed(id, data, created_at, now))
    }

    /// Checks each enabled binding whose fingerprint is present in the
    /// stored payload against the current request, in constant time.
    fn verify_binding(
        &self,
        stored_user_agent: Option<&str>,
        stored_ip_hash: Option<&str>,
    ) -> bool {
        if self.config.bind_to_user_agent
            && let Some(stored) = stored_user_agent
        {
            let current = self.current_user_agent.as_deref().unwrap_or_default();
            if !fingerprint::constant_time_eq(stored, current) {
                return false;
            }
        }
        if self.config.bind_to_ip
            && let Some(stored) = stored_ip_hash
        {
            let current = self.current_ip_hash.as_deref().unwrap_or_default();
            if !fingerprint::constant_time_eq(stored, current) {
                return false;
            }
        }
        true
    }

    /// The current state. Fails before [`start`][SessionEngine::start].
    pub fn current(&self) -> Result<&SessionState, SessionError> {
        self.state.as_ref().ok_or(SessionError::NotStarted)
    }

    fn take_state(&mut self) -> Result<SessionState, SessionError> {
        self.state.take().ok_or(SessionError::NotStarted)
    }

    /// Reads `key` from the session, deserialized into `T`.
    ///
    /// Does not mark the state dirty.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        self.current()?
            .get(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(SessionError::Codec)
    }

    /// Writes `key`. Keys in the reserved `_` namespace are rejected.
    pub fn set<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<(), SessionError> {
        self.current()?;
        let key = key.into();
        if key.starts_with(RESERVED_KEY_PREFIX) {
            return Err(SessionError::ReservedKey(key));
        }
        let value = serde_json::to_value(value).map_err(SessionError::Codec)?;
        let state = self.take_state()?;
        self.state = Some(state.inserting(key, value));
        Ok(())
    }

    /// Removes `key`, returning the previous raw value. The state is only
    /// dirtied if the key existed. Reserved keys may be removed; that is
    /// how callers get single-use CSRF semantics.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, SessionError> {
        self.current()?;
        let (state, previous) = self.take_state()?.removing(key);
        self.state = Some(state);
        Ok(previous)
    }

    /// Drops every value, reserved metadata included.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.current()?;
        let state = self.take_state()?.cleared();
        self.state = Some(state);
        Ok(())
    }

    /// Rotates the session id, preserving the data.
    ///
    /// The new id's payload is written immediately with the full TTL; the
    /// old id is rewritten with the configured grace TTL so a concurrent
    /// request still holding it keeps resolving during the rotation
    /// window. The response cookie will carry the new id.
    ///
    /// A destroyed session stays destroyed: the call is a no-op then.
    pub async fn regenerate_id(&mut self) -> Result<SessionId, SessionError> {
        let state = self.current()?;
        if state.status() == SessionStatus::Destroyed {
            tracing::debug!("regenerate requested on a destroyed session, ignoring");
            return Ok(state.id());
        }
        let old_id = state.id();

        let state = self.take_state()?.rotated(SessionId::generate());
        let new_id = state.id();
        let payload = self.seal_state(&state)?;
        let ttl = self.storage_ttl(&state);
        self.state = Some(state);

        self.store.write(&new_id, &payload, ttl).await?;
        self.store.write(&old_id, &payload, self.config.grace).await?;
        if let Some(state) = self.state.as_mut() {
            state.mark_clean();
        }
        Ok(new_id)
    }

    /// Destroys the session: the stored payload is deleted and the state
    /// transitions to `Destroyed`, which is terminal for this engine.
    /// Commit will emit an expiring cookie.
    pub async fn destroy(&mut self) -> Result<(), SessionError> {
        let id = self.current()?.id();
        self.store.destroy(&id).await?;
        let state = self.take_state()?.destroyed();
        self.state = Some(state);
        Ok(())
    }

    /// Persists the state if it is dirty and returns the response cookie.
    ///
    /// A read-only request performs zero store writes. A destroyed session
    /// is never written; its cookie is the expiring one.
    pub async fn commit(&mut self) -> Result<Cookie<'static>, SessionError> {
        let state = self.current()?;
        if state.is_dirty() && state.status() != SessionStatus::Destroyed {
            let id = state.id();
            let payload = self.seal_state(state)?;
            let ttl = self.storage_ttl(state);
            self.store.write(&id, &payload, ttl).await?;
            if let Some(state) = self.state.as_mut() {
                state.mark_clean();
            }
        }
        let state = self.current()?;
        Ok(self.config.cookie.emit(state))
    }

    /// Issues a new CSRF token, persisting only its digest in the session.
    /// Any previously outstanding token is invalidated.
    pub fn generate_csrf_token(&mut self) -> Result<CsrfToken, SessionError> {
        self.current()?;
        let token = CsrfToken::generate();
        let state = self
            .take_state()?
            .inserting(keys::CSRF_TOKEN.to_owned(), Value::String(token.hash()));
        self.state = Some(state);
        Ok(token)
    }

    /// Validates a submitted token against the stored digest.
    ///
    /// False when no token is outstanding or the submission is malformed;
    /// otherwise a constant-time digest comparison. The token is not
    /// consumed.
    pub fn is_csrf_token_valid(&self, submitted: &str) -> Result<bool, SessionError> {
        let state = self.current()?;
        let Some(Value::String(stored)) = state.get(keys::CSRF_TOKEN) else {
            return Ok(false);
        };
        let Ok(token) = CsrfToken::parse(submitted) else {
            return Ok(false);
        };
        Ok(token.equals_hashed(stored))
    }

    /// Serializes the state (metadata and, when binding is enabled, the
    /// current request's fingerprints included), sealing it when an
    /// envelope is configured.
    fn seal_state(&self, state: &SessionState) -> Result<Vec<u8>, SessionError> {
        let mut map: HashMap<String, Value> = state.data().clone();
        map.insert(
            keys::CREATED_AT.to_owned(),
            format::timestamp_value(state.created_at()),
        );
        map.insert(
            keys::LAST_ACTIVITY_AT.to_owned(),
            format::timestamp_value(state.last_activity_at()),
        );
        if self.config.bind_to_user_agent
            && let Some(user_agent) = &self.current_user_agent
        {
            map.insert(
                keys::USER_AGENT.to_owned(),
                Value::String(user_agent.clone()),
            );
        }
        if self.config.bind_to_ip
            && let Some(ip_hash) = &self.current_ip_hash
        {
            map.insert(keys::IP_HASH.to_owned(), Value::String(ip_hash.clone()));
        }

        let plain = format::encode_payload(&map).map_err(SessionError::Codec)?;
        match &self.envelope {
            Some(envelope) => Ok(envelope.encrypt(&plain)?),
            None => Ok(plain),
        }
    }

    fn open_payload(&self, payload: &[u8]) -> Option<HashMap<String, Value>> {
        match &self.envelope {
            Some(envelope) => {
                let plain = envelope.decrypt(payload).ok()?;
                format::decode_payload(&plain)
            }
            None => format::decode_payload(payload),
        }
    }

    /// Store TTL: the remaining absolute lifetime, so payloads don't
    /// linger past absolute expiry.
    fn storage_ttl(&self, state: &SessionState) -> Duration {
        let elapsed = OffsetDateTime::now_utc() - state.created_at();
        let elapsed = Duration::try_from(elapsed).unwrap_or(Duration::ZERO);
        self.config.absolute_timeout.saturating_sub(elapsed)
    }
}
