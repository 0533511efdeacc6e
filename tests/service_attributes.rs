// Tests for how `CookieConfig` maps to emitted cookie attributes, including
// the safety coercions for prefixed and cross-site cookies.
mod common;

use axum::body::Body;
use http::Request;
use tower::{ServiceBuilder, ServiceExt as _};

use tower_secure_session::{
    ConfigError, CookieConfig, DEFAULT_COOKIE_NAME, MemoryStore, SameSite, SessionConfig,
    SessionManagerLayer,
};

fn config_with_cookie(cookie: CookieConfig) -> SessionConfig {
    SessionConfig::default().with_cookie(cookie)
}

async fn emitted_cookie(config: SessionConfig) -> tower_cookies::Cookie<'static> {
    let (_store, layer) = common::make_layer(config);
    let svc = ServiceBuilder::new()
        .layer(layer)
        .service_fn(common::handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");
    common::get_session_cookie(&res)
}

#[tokio::test]
async fn cookie_name_default() {
    // Exercise: default configuration.
    // Expectation: cookie name defaults to `__Host-id`.
    let session_cookie = emitted_cookie(SessionConfig::default()).await;
    assert_eq!(session_cookie.name(), DEFAULT_COOKIE_NAME);
}

#[tokio::test]
async fn name() {
    // Exercise: configure a custom cookie name via `with_name`.
    // Expectation: emitted cookie name matches the configured value.
    let cookie = CookieConfig::default().with_name("my.sid");
    let session_cookie = emitted_cookie(config_with_cookie(cookie)).await;
    assert_eq!(session_cookie.name(), "my.sid");
}

#[tokio::test]
async fn http_only() {
    // Exercise: default `HttpOnly=true`, then toggle to `HttpOnly=false`.
    // Expectation: attribute is present by default and absent when disabled.
    let session_cookie = emitted_cookie(SessionConfig::default()).await;
    assert_eq!(session_cookie.http_only(), Some(true));

    let cookie = CookieConfig::default()
        .with_name("sid")
        .with_http_only(false);
    let session_cookie = emitted_cookie(config_with_cookie(cookie)).await;
    assert_eq!(session_cookie.http_only(), None);
}

#[tokio::test]
async fn secure() {
    // Exercise: `Secure=false` under a non-prefixed name.
    // Expectation: attribute absent. (Under the default `__Host-` name the
    // coercion would force it back on.)
    let cookie = CookieConfig::default().with_name("sid").with_secure(false);
    let session_cookie = emitted_cookie(config_with_cookie(cookie)).await;
    assert_eq!(session_cookie.secure(), None);

    let cookie = CookieConfig::default().with_name("sid").with_secure(true);
    let session_cookie = emitted_cookie(config_with_cookie(cookie)).await;
    assert_eq!(session_cookie.secure(), Some(true));
}

#[tokio::test]
async fn same_site_strict() {
    let cookie = CookieConfig::default().with_same_site(SameSite::Strict);
    let session_cookie = emitted_cookie(config_with_cookie(cookie)).await;
    assert_eq!(session_cookie.same_site(), Some(SameSite::Strict));
}

#[tokio::test]
async fn same_site_lax() {
    let cookie = CookieConfig::default().with_same_site(SameSite::Lax);
    let session_cookie = emitted_cookie(config_with_cookie(cookie)).await;
    assert_eq!(session_cookie.same_site(), Some(SameSite::Lax));
}

#[tokio::test]
async fn path() {
    // Exercise: set a custom cookie Path under a non-prefixed name.
    // Expectation: emitted cookie contains the configured Path.
    let cookie = CookieConfig::default()
        .with_name("sid")
        .with_path("/foo/bar");
    let session_cookie = emitted_cookie(config_with_cookie(cookie)).await;
    assert_eq!(session_cookie.path(), Some("/foo/bar"));
}

#[tokio::test]
async fn domain() {
    let cookie = CookieConfig::default()
        .with_name("sid")
        .with_domain("example.com");
    let session_cookie = emitted_cookie(config_with_cookie(cookie)).await;
    assert_eq!(session_cookie.domain(), Some("example.com"));
}

#[tokio::test]
async fn host_prefix_coercions() {
    // Exercise: a `__Host-` name combined with attributes the prefix
    // forbids.
    // Expectation: Secure forced on, Domain dropped, Path forced to `/`,
    // regardless of the builder input.
    let cookie = CookieConfig::default()
        .with_name("__Host-sid")
        .with_secure(false)
        .with_domain("example.com")
        .with_path("/foo");
    let session_cookie = emitted_cookie(config_with_cookie(cookie)).await;

    assert_eq!(session_cookie.secure(), Some(true));
    assert_eq!(session_cookie.domain(), None);
    assert_eq!(session_cookie.path(), Some("/"));
}

#[tokio::test]
async fn same_site_none_forces_secure() {
    // Exercise: `SameSite=None` with `Secure=false`.
    // Expectation: Secure forced on, since browsers reject the combination
    // otherwise.
    let cookie = CookieConfig::default()
        .with_name("sid")
        .with_secure(false)
        .with_same_site(SameSite::None);
    let session_cookie = emitted_cookie(config_with_cookie(cookie)).await;

    assert_eq!(session_cookie.same_site(), Some(SameSite::None));
    assert_eq!(session_cookie.secure(), Some(true));
}

#[tokio::test]
async fn id_is_a_valid_uuid() {
    let session_cookie = emitted_cookie(SessionConfig::default()).await;
    assert!(tower_secure_session::SessionId::parse(session_cookie.value()).is_ok());
}

#[test]
fn timeout_inversion_is_rejected_eagerly() {
    // Exercise: idle timeout greater than absolute timeout.
    // Expectation: layer construction fails with `ConfigError`.
    let config = SessionConfig::default()
        .with_idle_timeout(std::time::Duration::from_secs(7200))
        .with_absolute_timeout(std::time::Duration::from_secs(3600));
    let result = SessionManagerLayer::new(MemoryStore::new(), config);
    assert!(matches!(result, Err(ConfigError::TimeoutOrder { .. })));
}

#[test]
fn short_encryption_key_is_rejected_eagerly() {
    let config = SessionConfig::default().with_encryption_key(*b"too short");
    let result = SessionManagerLayer::new(MemoryStore::new(), config);
    assert!(matches!(result, Err(ConfigError::KeyTooShort { .. })));
}
