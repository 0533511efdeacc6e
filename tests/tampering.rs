// Tests that tampered or forged stored payloads never reach the
// application, plus the envelope's own round-trip and rejection behavior.
mod common;

use std::sync::Arc;
use std::time::Duration;

use tower_secure_session::{
    Envelope, MemoryStore, RequestMeta, SessionConfig, SessionEngine, SessionId,
    SessionStore as _,
};

const KEY: &[u8; 32] = b"an example very very secret key!";

fn meta(cookie: Option<String>) -> RequestMeta {
    RequestMeta::new(cookie, Some("test agent".to_owned()), "203.0.113.7")
}

fn encrypted_config() -> SessionConfig {
    SessionConfig::default().with_encryption_key(*KEY)
}

fn engine(store: &MemoryStore, config: SessionConfig) -> SessionEngine {
    SessionEngine::new(Arc::new(store.clone()), config).expect("session config is valid")
}

fn flip_one_bit(blob: &mut [u8]) {
    // The blob is base64; swapping two alphabet characters well before any
    // trailing padding flips payload bits without invalidating the
    // encoding. Index 10 lands inside the encoded IV.
    let byte = &mut blob[10];
    *byte = if *byte == b'A' { b'B' } else { b'A' };
}

#[tokio::test]
async fn envelope_round_trip() {
    // Exercise: encrypt/decrypt for a spread of plaintexts, empty included.
    // Expectation: bit-identical round trip.
    let envelope = Envelope::new(KEY).expect("key is long enough");

    for plaintext in [&b""[..], b"x", b"{\"a\": 1}", &[0u8; 1024][..]] {
        let blob = envelope.encrypt(plaintext).expect("encrypt succeeds");
        let opened = envelope.decrypt(&blob).expect("decrypt succeeds");
        assert_eq!(opened, plaintext);
    }
}

#[tokio::test]
async fn envelope_produces_fresh_blobs() {
    // Two encryptions of the same plaintext must differ (fresh IV per call).
    let envelope = Envelope::new(KEY).expect("key is long enough");
    let first = envelope.encrypt(b"same plaintext").expect("encrypt succeeds");
    let second = envelope.encrypt(b"same plaintext").expect("encrypt succeeds");
    assert_ne!(first, second);
}

#[tokio::test]
async fn envelope_rejects_bit_flips() {
    let envelope = Envelope::new(KEY).expect("key is long enough");
    let mut blob = envelope.encrypt(b"payload").expect("encrypt succeeds");
    flip_one_bit(&mut blob);
    assert!(envelope.decrypt(&blob).is_err());
}

#[tokio::test]
async fn envelope_rejects_garbage() {
    let envelope = Envelope::new(KEY).expect("key is long enough");

    // Invalid base64.
    assert!(envelope.decrypt(b"!!not base64!!").is_err());
    // Valid base64, but shorter than IV + TAG.
    assert!(envelope.decrypt(b"AAAA").is_err());
    // Empty.
    assert!(envelope.decrypt(b"").is_err());
}

#[tokio::test]
async fn envelope_rejects_wrong_key() {
    let envelope = Envelope::new(KEY).expect("key is long enough");
    let other = Envelope::new(b"a different 32 byte secret here!").expect("key is long enough");

    let blob = envelope.encrypt(b"payload").expect("encrypt succeeds");
    assert!(other.decrypt(&blob).is_err());
}

#[tokio::test]
async fn tampered_stored_payload_yields_fresh_session() {
    // Exercise: commit an encrypted session, flip one bit of the stored
    // blob, then resume with the original cookie.
    // Expectation: the forged payload is silently discarded: fresh id,
    // no readable values, stale entry destroyed.
    let store = MemoryStore::new();

    let mut first = engine(&store, encrypted_config());
    first.start(&meta(None)).await.expect("start succeeds");
    first.set("user", "alice").expect("set succeeds");
    let cookie = first.commit().await.expect("commit succeeds");
    let id = SessionId::parse(cookie.value()).expect("cookie carries a valid id");

    let mut blob = store
        .read(&id)
        .await
        .expect("store read succeeds")
        .expect("store holds the committed payload");
    flip_one_bit(&mut blob);
    store
        .write(&id, &blob, Duration::from_secs(3600))
        .await
        .expect("store write succeeds");

    let mut second = engine(&store, encrypted_config());
    let state = second
        .start(&meta(Some(cookie.value().to_owned())))
        .await
        .expect("start succeeds");

    assert_ne!(state.id(), id);
    assert_eq!(second.get::<String>("user").expect("get succeeds"), None);
    assert!(
        store.read(&id).await.expect("store read succeeds").is_none()
    );
}

#[tokio::test]
async fn encrypted_sessions_round_trip() {
    // The presence of the envelope must be invisible to the application.
    let store = MemoryStore::new();

    let mut first = engine(&store, encrypted_config());
    first.start(&meta(None)).await.expect("start succeeds");
    first.set("user", "alice").expect("set succeeds");
    let cookie = first.commit().await.expect("commit succeeds");
    let id = SessionId::parse(cookie.value()).expect("cookie carries a valid id");

    // What the store sees is not the plaintext payload.
    let stored = store
        .read(&id)
        .await
        .expect("store read succeeds")
        .expect("store holds the committed payload");
    assert!(!stored.windows(5).any(|w| w == b"alice"));

    let mut second = engine(&store, encrypted_config());
    second
        .start(&meta(Some(cookie.value().to_owned())))
        .await
        .expect("start succeeds");
    assert_eq!(
        second.get::<String>("user").expect("get succeeds"),
        Some("alice".to_owned())
    );
}
