//! Tower layer and service for server-side sessions.
//!
//! `SessionManagerLayer` wraps [`tower_cookies::CookieManager`] and inserts
//! a [`Session`] handle into request extensions. The session engine is
//! started before the inner service runs and committed after it returns,
//! so every response carries exactly one freshly-emitted session cookie.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use http::{Request, Response};
use tower_cookies::{CookieManager, Cookies};
use tower_layer::Layer;
use tower_service::Service;

use crate::{
    config::SessionConfig,
    engine::{RequestMeta, SessionEngine},
    error::ConfigError,
    session::Session,
    store::SessionStore,
};

#[derive(Debug, Clone)]
/// A Tower [`Layer`] that provides server-side sessions.
///
/// This layer wraps [`tower_cookies::CookieManager`] internally.
pub struct SessionManagerLayer {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionManagerLayer {
    /// Creates a session manager over the given store.
    ///
    /// Configuration problems (timeout ordering, key length) surface here
    /// rather than on the first request; cookie safety coercions are also
    /// applied at this point.
    pub fn new<S: SessionStore>(store: S, config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store: Arc::new(store),
            config: config.normalized(),
        })
    }
}

impl<S> Layer<S> for SessionManagerLayer {
    type Service = CookieManager<SessionManager<S>>;

    fn layer(&self, inner: S) -> Self::Service {
        CookieManager::new(SessionManager {
            inner,
            store: self.store.clone(),
            config: self.config.clone(),
        })
    }
}

#[derive(Debug, Clone)]
/// The service produced by [`SessionManagerLayer`].
///
/// This type is part of the public API surface due to trait constraints,
/// but it is primarily an implementation detail.
pub struct SessionManager<S> {
    inner: S,
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl<ReqBody, ResBody, S> Service<Request<ReqBody>> for SessionManager<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let store = self.store.clone();
        let config = self.config.clone();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let cookies = match req.extensions().get::<Cookies>().cloned() {
                Some(cookies) => cookies,
                None => {
                    tracing::error!(
                        cookie_name = %config.cookie.name,
                        "session layer missing Cookies extension (is CookieManager enabled?)"
                    );
                    return Ok(internal_server_error());
                }
            };

            let cookie_value = cookies
                .get(&config.cookie.name)
                .map(|cookie| cookie.value().to_string());
            // The peer address, when the server exposes it as a request
            // extension (axum's `ConnectInfo<SocketAddr>` does), feeds the
            // IP fingerprint for deployments without forwarding headers.
            let peer = req
                .extensions()
                .get::<std::net::SocketAddr>()
                .map(|addr| addr.ip());
            let meta = RequestMeta::from_parts(req.headers(), cookie_value, peer);

            let engine = match SessionEngine::new(store, config.clone()) {
                Ok(engine) => engine,
                Err(err) => {
                    tracing::error!(err = %err, "session engine construction failed");
                    return Ok(internal_server_error());
                }
            };
            let session = Session::new(engine);

            if let Err(err) = session.start(&meta).await {
                tracing::error!(
                    err = %err,
                    cookie_name = %config.cookie.name,
                    "session start failed"
                );
                return Ok(internal_server_error());
            }
            req.extensions_mut().insert(session.clone());

            let res = inner.call(req).await?;

            match session.commit().await {
                Ok(cookie) => {
                    // The jar replaces any prior cookie of the same name.
                    cookies.add(cookie);
                    Ok(res)
                }
                Err(err) => {
                    tracing::error!(
                        err = %err,
                        cookie_name = %config.cookie.name,
                        "session commit failed"
                    );
                    Ok(internal_server_error())
                }
            }
        })
    }
}

fn internal_server_error<ResBody: Default>() -> Response<ResBody> {
    let mut res = Response::default();
    *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
    res
}
