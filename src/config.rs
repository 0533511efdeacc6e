use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use time::OffsetDateTime;
use tower_cookies::Cookie;
use zeroize::Zeroizing;

use crate::SameSite;
use crate::envelope::KEY_SIZE;
use crate::error::ConfigError;
use crate::id::SessionId;
use crate::state::{SessionState, SessionStatus};

/// The default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "__Host-id";

const HOST_PREFIX: &str = "__Host-";

/// How the session cookie is shaped.
///
/// Two safety coercions are applied when the configuration is installed
/// into a layer or engine, overriding whatever the builder was given:
///
/// 1. A name starting with `__Host-` forces `Secure`, forbids `Domain`,
///    and forces `Path=/`.
/// 2. `SameSite=None` forces `Secure`.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub(crate) name: Cow<'static, str>,
    pub(crate) secure: bool,
    pub(crate) http_only: bool,
    pub(crate) same_site: SameSite,
    pub(crate) path: Cow<'static, str>,
    pub(crate) domain: Option<Cow<'static, str>>,
    pub(crate) lifetime: Option<Duration>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.into(),
            secure: true,
            http_only: true,
            same_site: SameSite::Strict,
            path: "/".into(),
            domain: None,
            lifetime: None,
        }
    }
}

impl CookieConfig {
    #[must_use]
    pub fn with_name<N: Into<Cow<'static, str>>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub fn with_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain<D: Into<Cow<'static, str>>>(mut self, domain: D) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets `Max-Age` on the emitted cookie. Without it the cookie lives
    /// for the browser session.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub(crate) fn normalized(mut self) -> Self {
        if self.name.starts_with(HOST_PREFIX) {
            self.secure = true;
            self.domain = None;
            self.path = "/".into();
        }
        if self.same_site == SameSite::None {
            self.secure = true;
        }
        self
    }

    /// Builds the `Set-Cookie` value for the given state: an expiring
    /// cookie for a destroyed session, the session cookie otherwise.
    pub(crate) fn emit(&self, state: &SessionState) -> Cookie<'static> {
        match state.status() {
            SessionStatus::Destroyed => self.build_removal_cookie(state.id()),
            _ => self.build_cookie(state.id()),
        }
    }

    pub(crate) fn build_cookie(&self, id: SessionId) -> Cookie<'static> {
        let mut cookie_builder = Cookie::build((self.name.clone(), id.to_string()))
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only)
            .same_site(self.same_site);

        if let Some(lifetime) = self.lifetime {
            let max_age = time::Duration::try_from(lifetime).unwrap_or(time::Duration::MAX);
            cookie_builder = cookie_builder.max_age(max_age);
        }

        if let Some(domain) = self.domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        cookie_builder.build()
    }

    pub(crate) fn build_removal_cookie(&self, id: SessionId) -> Cookie<'static> {
        // Carries the old id with both expiry signals so clients drop it,
        // preserving Path/Secure/HttpOnly/SameSite.
        let mut cookie = self.build_cookie(id);
        cookie.set_max_age(time::Duration::ZERO);
        cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
        cookie
    }
}

/// Configure how sessions are managed.
///
/// The defaults follow OWASP's guidelines for secure session management:
/// 30 minute idle timeout, 4 hour absolute timeout, client binding on.
#[derive(Clone)]
pub struct SessionConfig {
    pub(crate) idle_timeout: Duration,
    pub(crate) absolute_timeout: Duration,
    pub(crate) bind_to_ip: bool,
    pub(crate) bind_to_user_agent: bool,
    pub(crate) encryption_key: Option<Zeroizing<Vec<u8>>>,
    pub(crate) grace: Duration,
    pub(crate) cookie: CookieConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(1800),
            absolute_timeout: Duration::from_secs(14400),
            bind_to_ip: true,
            bind_to_user_agent: true,
            encryption_key: None,
            grace: Duration::from_secs(10),
            cookie: CookieConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Inactivity window before a resumed session is discarded.
    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Maximum session lifetime regardless of activity; also bounds the
    /// store TTL.
    #[must_use]
    pub fn with_absolute_timeout(mut self, absolute_timeout: Duration) -> Self {
        self.absolute_timeout = absolute_timeout;
        self
    }

    /// Enables or disables the client-IP fingerprint check on resume.
    #[must_use]
    pub fn with_ip_binding(mut self, bind_to_ip: bool) -> Self {
        self.bind_to_ip = bind_to_ip;
        self
    }

    /// Enables or disables the `User-Agent` fingerprint check on resume.
    #[must_use]
    pub fn with_user_agent_binding(mut self, bind_to_user_agent: bool) -> Self {
        self.bind_to_user_agent = bind_to_user_agent;
        self
    }

    /// Enables the encryption envelope for stored payloads. The secret
    /// must be at least 32 bytes.
    #[must_use]
    pub fn with_encryption_key<K: Into<Vec<u8>>>(mut self, secret: K) -> Self {
        self.encryption_key = Some(Zeroizing::new(secret.into()));
        self
    }

    /// Retention window for the old id after [`regenerate_id`].
    ///
    /// [`regenerate_id`]: crate::Session::regenerate_id
    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, cookie: CookieConfig) -> Self {
        self.cookie = cookie;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout > self.absolute_timeout {
            return Err(ConfigError::TimeoutOrder {
                idle: self.idle_timeout,
                absolute: self.absolute_timeout,
            });
        }
        if let Some(key) = &self.encryption_key
            && key.len() < KEY_SIZE
        {
            return Err(ConfigError::KeyTooShort {
                min: KEY_SIZE,
                actual: key.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn normalized(mut self) -> Self {
        self.cookie = self.cookie.normalized();
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("idle_timeout", &self.idle_timeout)
            .field("absolute_timeout", &self.absolute_timeout)
            .field("bind_to_ip", &self.bind_to_ip)
            .field("bind_to_user_agent", &self.bind_to_user_agent)
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "**redacted**"),
            )
            .field("grace", &self.grace)
            .field("cookie", &self.cookie)
            .finish()
    }
}
