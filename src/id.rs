use std::fmt;
use std::hash::{Hash, Hasher};

use subtle::ConstantTimeEq as _;

/// The identifier for a session.
///
/// Session ids are 128-bit UUIDv4 values generated from the operating
/// system's CSPRNG. Any `SessionId` in memory has passed validation:
/// the only ways to obtain one are [`SessionId::generate`] and
/// [`SessionId::parse`].
///
/// Equality is constant-time over the byte representation.
#[derive(Clone, Copy)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Generate a new random identifier using the random number generator
    /// provided by the underlying operating system.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Parse a session id from its canonical textual form.
    ///
    /// Only the strict 36-character hyphenated UUIDv4 shape is accepted:
    /// hex digits (either case), version nibble `4`, variant nibble in
    /// `[89ab]`. No whitespace trimming, no braced or URN forms.
    pub fn parse(s: &str) -> Result<Self, ParseSessionIdError> {
        let bytes = s.as_bytes();
        if bytes.len() != 36 {
            return Err(ParseSessionIdError);
        }
        for (i, &b) in bytes.iter().enumerate() {
            let ok = match i {
                8 | 13 | 18 | 23 => b == b'-',
                14 => b == b'4',
                19 => matches!(b, b'8' | b'9' | b'a' | b'b' | b'A' | b'B'),
                _ => b.is_ascii_hexdigit(),
            };
            if !ok {
                return Err(ParseSessionIdError);
            }
        }
        uuid::Uuid::try_parse(s)
            .map(Self)
            .map_err(|_| ParseSessionIdError)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl PartialEq for SessionId {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes().ct_eq(other.as_bytes()).into()
    }
}

impl Eq for SessionId {}

impl Hash for SessionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(self.as_bytes());
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionId").field(&"**redacted**").finish()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid session id")]
/// The value presented as a session id does not match the canonical
/// UUIDv4 grammar.
pub struct ParseSessionIdError;
