//! Per-message nonce construction and wire obfuscation.
//!
//! A nonce is `4 bytes of salt ‖ 8 bytes of little-endian Unix seconds`. The
//! salt only has to be unique-ish within a second, not secret, so a
//! time-seeded RNG is sufficient.
//!
//! On the wire the time field is masked: the salt, tripled into a 12-byte
//! sub-nonce, keys a ChaCha20 pass over the last 8 bytes. XOR with the same
//! keystream is an involution, so [`Nonce::transform`] applied twice returns
//! the original nonce, and both ends recover the real nonce without any
//! handshake or per-session state.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

use crate::core::{CipherError, NONCE_SALT_SIZE, NONCE_SIZE};

use super::ChaCha20;

/// A 12-byte per-message nonce (salt ‖ little-endian seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Build a fresh nonce from the thread RNG and the current wall clock.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes[..NONCE_SALT_SIZE]);
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        bytes[NONCE_SALT_SIZE..].copy_from_slice(&secs.to_le_bytes());
        Self(bytes)
    }

    /// Wrap raw nonce bytes.
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Wrap a slice, rejecting anything but exactly 12 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CipherError> {
        let array: [u8; NONCE_SIZE] = bytes
            .try_into()
            .map_err(|_| CipherError::InvalidNonceLength(bytes.len()))?;
        Ok(Self(array))
    }

    /// The raw nonce bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    /// The 4-byte salt portion.
    pub fn salt(&self) -> &[u8] {
        &self.0[..NONCE_SALT_SIZE]
    }

    /// Apply the self-inverse wire transform under `key`.
    ///
    /// Masks (or unmasks) the 8-byte time field with a keystream derived from
    /// the salt; the salt itself travels in the clear.
    pub fn transform(&self, key: &[u8]) -> Result<Self, CipherError> {
        let mut sub_nonce = [0u8; NONCE_SIZE];
        for chunk in sub_nonce.chunks_exact_mut(NONCE_SALT_SIZE) {
            chunk.copy_from_slice(self.salt());
        }
        let mut cipher = ChaCha20::new(key, &sub_nonce, 0)?;
        let masked = cipher.apply_keystream(&self.0[NONCE_SALT_SIZE..]);

        let mut out = [0u8; NONCE_SIZE];
        out[..NONCE_SALT_SIZE].copy_from_slice(self.salt());
        out[NONCE_SALT_SIZE..].copy_from_slice(&masked);
        Ok(Self(out))
    }
}
