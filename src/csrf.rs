use std::fmt;

use rand::RngCore as _;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq as _;

/// The size of a CSRF token in bytes.
const TOKEN_SIZE: usize = 32;
/// The length of a hex-encoded token.
const TOKEN_HEX_LEN: usize = 2 * TOKEN_SIZE;

/// An anti-forgery token tied to a session.
///
/// The raw value is handed to the client (embedded in a form or header) and
/// never persisted; the session stores its SHA-256 digest instead, so a
/// leaked session payload does not leak usable tokens.
///
/// Equality and digest comparisons are constant-time.
#[derive(Clone)]
pub struct CsrfToken {
    /// Lowercase hex, `TOKEN_HEX_LEN` characters.
    raw: String,
}

impl CsrfToken {
    /// Generate a new token from 32 CSPRNG bytes.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self {
            raw: hex::encode(bytes),
        }
    }

    /// Parse a token submitted by a client.
    ///
    /// Accepts exactly 64 hex characters, either case; the stored form is
    /// normalized to lowercase so digests are stable.
    pub fn parse(s: &str) -> Result<Self, ParseCsrfTokenError> {
        if s.len() != TOKEN_HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseCsrfTokenError);
        }
        Ok(Self {
            raw: s.to_ascii_lowercase(),
        })
    }

    /// The hex-encoded SHA-256 digest of the raw value. This is what gets
    /// persisted in the session payload.
    pub fn hash(&self) -> String {
        hex::encode(Sha256::digest(self.raw.as_bytes()))
    }

    /// Constant-time comparison of this token's digest against a stored
    /// hex digest.
    pub fn equals_hashed(&self, stored_hex: &str) -> bool {
        self.hash().as_bytes().ct_eq(stored_hex.as_bytes()).into()
    }

    /// The raw token value, for embedding in a form field or header.
    pub fn expose(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for CsrfToken {
    fn eq(&self, other: &Self) -> bool {
        self.raw.as_bytes().ct_eq(other.raw.as_bytes()).into()
    }
}

impl Eq for CsrfToken {}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfToken")
            .field("raw", &"**redacted**")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid csrf token")]
/// The submitted value is not a well-formed CSRF token.
pub struct ParseCsrfTokenError;
