//! Secure server-side session management for tower services.
//!
//! This crate provides a layer that inserts a [`Session`] handle into
//! request extensions and persists session state in a pluggable
//! server-side [`SessionStore`], governed by a security-policy state
//! machine: idle and absolute timeouts, hijack detection via client
//! binding, id rotation with a grace window, CSRF tokens, and an optional
//! AES-256-GCM envelope around payloads at rest.
//!
//! # Security
//! The client only ever holds an opaque UUIDv4 session id. Malformed or
//! unknown cookies, forged or corrupt payloads, expired sessions, and
//! binding mismatches are all handled the same silent way: the request
//! gets a fresh, empty session, and the engine never tells the client why.
//!
//! The cookie defaults are strict: `__Host-id`, `Secure`, `HttpOnly`,
//! `SameSite=Strict`, `Path=/`.

mod config;
mod csrf;
mod engine;
mod envelope;
mod error;
pub mod fingerprint;
pub mod format;
mod id;
mod layer;
mod memory;
mod session;
mod state;
mod store;

pub use tower_cookies::cookie::SameSite;

pub use crate::config::{CookieConfig, DEFAULT_COOKIE_NAME, SessionConfig};
pub use crate::csrf::{CsrfToken, ParseCsrfTokenError};
pub use crate::engine::{RequestMeta, SessionEngine};
pub use crate::envelope::{DecryptError, EncryptError, Envelope};
pub use crate::error::{ConfigError, SessionError};
pub use crate::id::{ParseSessionIdError, SessionId};
pub use crate::layer::{SessionManager, SessionManagerLayer};
pub use crate::memory::MemoryStore;
pub use crate::session::Session;
pub use crate::state::{RESERVED_KEY_PREFIX, SessionState, SessionStatus, keys};
pub use crate::store::{SessionStore, StoreError};
