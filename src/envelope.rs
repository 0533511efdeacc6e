//! Authenticated encryption for session payloads at rest.
//!
//! When an encryption key is configured, everything the store sees is the
//! base64 encoding of `IV(12) || TAG(16) || CIPHERTEXT` under AES-256-GCM.
//! The store itself never knows whether its bytes are encrypted.

use std::fmt;

use aes_gcm::aead::rand_core::RngCore as _;
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ConfigError;

/// The size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// The size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// The size of the AES-GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Key wrapper that zeroizes its contents on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct SecureKey([u8; KEY_SIZE]);

/// Seals and opens session payloads with AES-256-GCM.
///
/// A fresh random nonce is sampled for every [`encrypt`][Envelope::encrypt]
/// call, so nonces are never reused under the same key. Decryption never
/// yields partially-authenticated plaintext.
#[derive(Clone)]
pub struct Envelope {
    key: SecureKey,
}

impl Envelope {
    /// Build an envelope from an engine-level secret.
    ///
    /// The secret must be at least [`KEY_SIZE`] bytes; the first
    /// [`KEY_SIZE`] bytes key the cipher.
    pub fn new(secret: &[u8]) -> Result<Self, ConfigError> {
        if secret.len() < KEY_SIZE {
            return Err(ConfigError::KeyTooShort {
                min: KEY_SIZE,
                actual: secret.len(),
            });
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&secret[..KEY_SIZE]);
        Ok(Self {
            key: SecureKey(key),
        })
    }

    /// Encrypt a plaintext, producing base64 of `IV || TAG || CIPHERTEXT`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptError> {
        let cipher = Aes256Gcm::new((&self.key.0).into());

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        // The aead API appends the tag to the ciphertext; the wire layout
        // wants it up front, right after the nonce.
        let sealed = cipher.encrypt(&nonce, plaintext).map_err(|_| EncryptError)?;
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

        let mut blob = Vec::with_capacity(NONCE_SIZE + TAG_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(tag);
        blob.extend_from_slice(ciphertext);
        Ok(BASE64.encode(blob).into_bytes())
    }

    /// Decrypt a blob produced by [`encrypt`][Envelope::encrypt].
    ///
    /// Malformed base64, truncated payloads, and authentication failures
    /// all map to the same opaque [`DecryptError`].
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, DecryptError> {
        let raw = BASE64.decode(blob).map_err(|_| DecryptError)?;
        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return Err(DecryptError);
        }
        let (nonce_bytes, rest) = raw.split_at(NONCE_SIZE);
        let (tag, ciphertext) = rest.split_at(TAG_SIZE);

        let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(tag);

        let nonce_bytes: [u8; NONCE_SIZE] = nonce_bytes.try_into().map_err(|_| DecryptError)?;
        let nonce = Nonce::from(nonce_bytes);

        let cipher = Aes256Gcm::new((&self.key.0).into());
        cipher
            .decrypt(&nonce, sealed.as_slice())
            .map_err(|_| DecryptError)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("key", &"**redacted**")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("session payload could not be opened")]
/// The blob could not be decoded and authenticated.
///
/// Deliberately carries no detail: callers must not be able to distinguish
/// a malformed blob from a forged one.
pub struct DecryptError;

#[derive(Debug, thiserror::Error)]
#[error("session payload could not be sealed")]
/// The plaintext could not be sealed.
pub struct EncryptError;
