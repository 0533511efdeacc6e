//! Client-binding fingerprints.
//!
//! A resumed session can be bound to the network identity it was created
//! under: the client IP (hashed) and the `User-Agent` string. A mismatch on
//! resume is treated as a possible hijack.
//!
//! The forwarding headers consulted by [`client_ip`] are declaratively
//! trusted. Deployments that do not terminate their own reverse proxy must
//! disable IP binding.

use std::net::IpAddr;

use http::HeaderMap;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq as _;

/// Mixed into the IP digest so the stored value is not a direct PII leak.
/// Not intended to resist offline attack.
const IP_HASH_SALT: &[u8] = b"tower-secure-session.ip-binding.v1";

/// Returned when neither a forwarding header nor a peer address is known.
const UNKNOWN_ADDR: &str = "0.0.0.0";

/// Determine the client address for binding purposes.
///
/// Picks the first present of `X-Forwarded-For` (first comma-separated
/// entry, trimmed), `Client-IP`, `X-Real-IP`, then the peer address,
/// falling back to `0.0.0.0`.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for")
        && let Some(first) = forwarded.split(',').next()
    {
        let first = first.trim();
        if !first.is_empty() {
            return first.to_owned();
        }
    }
    for name in ["client-ip", "x-real-ip"] {
        if let Some(value) = header_str(headers, name) {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_owned();
            }
        }
    }
    match peer {
        Some(addr) => addr.to_string(),
        None => UNKNOWN_ADDR.to_owned(),
    }
}

/// Hex-encoded SHA-256 of `ip || salt`.
pub fn ip_hash(ip: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hasher.update(IP_HASH_SALT);
    hex::encode(hasher.finalize())
}

/// Constant-time string comparison for binding values.
///
/// Both operands are reduced to fixed-size digests before comparing, so
/// the comparison is length-independent even for variable-length values
/// like `User-Agent` strings.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());
    a.ct_eq(&b).into()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
