#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use http::{HeaderMap, Request, Response, header};
use http_body_util::BodyExt as _;
use serde_json::Value;
use time::OffsetDateTime;
use tower_cookies::Cookie;
use tower_secure_session::{
    MemoryStore, Session, SessionConfig, SessionId, SessionManagerLayer, SessionStore, StoreError,
    format, keys,
};

pub async fn body_string(body: Body) -> String {
    let bytes = body
        .collect()
        .await
        .expect("body collects successfully")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub async fn handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let session = req
        .extensions()
        .get::<Session>()
        .cloned()
        .expect("request includes Session extension");

    session
        .set("foo", 42)
        .await
        .expect("session set succeeds");

    Ok(Response::new(Body::empty()))
}

pub async fn noop_handler(_: Request<Body>) -> Result<Response<Body>, Infallible> {
    Ok(Response::new(Body::empty()))
}

/// A layer over a fresh `MemoryStore`; the store handle is returned so
/// tests can seed and inspect entries directly.
pub fn make_layer(config: SessionConfig) -> (MemoryStore, SessionManagerLayer) {
    let store = MemoryStore::new();
    let layer =
        SessionManagerLayer::new(store.clone(), config).expect("session config is valid");
    (store, layer)
}

pub fn get_session_cookie(res: &Response<Body>) -> Cookie<'static> {
    get_session_cookie_from_headers(res.headers())
}

pub fn get_session_cookie_from_headers(headers: &HeaderMap) -> Cookie<'static> {
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .expect("response includes set-cookie header");
    let set_cookie = set_cookie
        .to_str()
        .expect("set-cookie header is valid utf-8");
    Cookie::parse_encoded(set_cookie)
        .expect("set-cookie parses successfully")
        .into_owned()
}

pub fn cookie_header_value(cookie: &Cookie<'_>) -> String {
    cookie.encoded().to_string()
}

/// Plants a session payload directly in the store, bypassing the engine,
/// so tests can fabricate arbitrary timestamps and binding fingerprints.
pub async fn seed_session(
    store: &MemoryStore,
    id: &SessionId,
    entries: &[(&str, Value)],
    created_at: OffsetDateTime,
    last_activity_at: OffsetDateTime,
) {
    let mut map: HashMap<String, Value> = entries
        .iter()
        .map(|(key, value)| ((*key).to_owned(), value.clone()))
        .collect();
    map.insert(
        keys::CREATED_AT.to_owned(),
        format::timestamp_value(created_at),
    );
    map.insert(
        keys::LAST_ACTIVITY_AT.to_owned(),
        format::timestamp_value(last_activity_at),
    );
    let payload = format::encode_payload(&map).expect("payload encodes successfully");
    store
        .write(id, &payload, Duration::from_secs(3600))
        .await
        .expect("store write succeeds");
}

/// A store wrapper that counts writes, for asserting write amplification.
#[derive(Debug, Clone)]
pub struct CountingStore {
    inner: MemoryStore,
    writes: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Acquire)
    }
}

#[async_trait]
impl SessionStore for CountingStore {
    async fn read(&self, id: &SessionId) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.read(id).await
    }

    async fn write(&self, id: &SessionId, payload: &[u8], ttl: Duration) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::Release);
        self.inner.write(id, payload, ttl).await
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), StoreError> {
        self.inner.destroy(id).await
    }

    async fn gc(&self, max_ttl: Duration) -> Result<(), StoreError> {
        self.inner.gc(max_ttl).await
    }
}
