//! From-scratch ChaCha20 stream cipher (RFC 8439 core).
//!
//! The hub and every client generation speak plain ChaCha20 with the IETF
//! 96-bit nonce and a 32-bit block counter. The keystream is XORed into the
//! payload, so the same engine both encrypts and decrypts.

use std::fmt;

use crate::core::{CIPHER_BLOCK_SIZE, CipherError, KEY_SIZE, NONCE_SIZE};

/// The "expand 32-byte k" constant words.
const SIGMA: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];

/// ChaCha20 double-rounds per block (20 quarter-round applications total).
const DOUBLE_ROUNDS: usize = 10;

/// ChaCha20 keystream engine.
///
/// Deterministic: the same `(key, nonce, counter)` triple always produces the
/// same keystream, and applying the engine twice with the same parameters
/// restores the original bytes.
#[derive(Clone)]
pub struct ChaCha20 {
    /// Initial block state: constants, key, counter, nonce.
    state: [u32; 16],
}

impl ChaCha20 {
    /// Create an engine from raw key and nonce bytes.
    ///
    /// Wrong slice lengths are rejected here, before any data is touched.
    pub fn new(key: &[u8], nonce: &[u8], counter: u32) -> Result<Self, CipherError> {
        if key.len() != KEY_SIZE {
            return Err(CipherError::InvalidKeyLength(key.len()));
        }
        if nonce.len() != NONCE_SIZE {
            return Err(CipherError::InvalidNonceLength(nonce.len()));
        }

        let mut state = [0u32; 16];
        state[..4].copy_from_slice(&SIGMA);
        for (i, chunk) in key.chunks_exact(4).enumerate() {
            state[4 + i] = u32::from_le_bytes(chunk.try_into().unwrap());
        }
        state[12] = counter;
        for (i, chunk) in nonce.chunks_exact(4).enumerate() {
            state[13 + i] = u32::from_le_bytes(chunk.try_into().unwrap());
        }
        Ok(Self { state })
    }

    /// XOR the keystream into `data`, returning the transformed bytes.
    ///
    /// A final partial block consumes the keystream from its low end, one
    /// byte per input byte.
    pub fn apply_keystream(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        for chunk in data.chunks(CIPHER_BLOCK_SIZE) {
            let block = self.next_block();
            out.extend(chunk.iter().zip(block.iter()).map(|(d, k)| d ^ k));
        }
        out
    }

    /// Produce the next 64-byte keystream block and advance the counter.
    fn next_block(&mut self) -> [u8; CIPHER_BLOCK_SIZE] {
        let mut working = self.state;
        for _ in 0..DOUBLE_ROUNDS {
            // Column pattern
            Self::quarter_round(&mut working, 0, 4, 8, 12);
            Self::quarter_round(&mut working, 1, 5, 9, 13);
            Self::quarter_round(&mut working, 2, 6, 10, 14);
            Self::quarter_round(&mut working, 3, 7, 11, 15);
            // Diagonal pattern
            Self::quarter_round(&mut working, 0, 5, 10, 15);
            Self::quarter_round(&mut working, 1, 6, 11, 12);
            Self::quarter_round(&mut working, 2, 7, 8, 13);
            Self::quarter_round(&mut working, 3, 4, 9, 14);
        }

        let mut block = [0u8; CIPHER_BLOCK_SIZE];
        for (i, word) in working.iter().enumerate() {
            let sum = word.wrapping_add(self.state[i]);
            block[i * 4..i * 4 + 4].copy_from_slice(&sum.to_le_bytes());
        }
        self.state[12] = self.state[12].wrapping_add(1);
        block
    }

    /// One quarter-round over state indices `a`, `b`, `c`, `d`.
    #[inline]
    fn quarter_round(s: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
        s[a] = s[a].wrapping_add(s[b]);
        s[d] ^= s[a];
        s[d] = s[d].rotate_left(16);

        s[c] = s[c].wrapping_add(s[d]);
        s[b] ^= s[c];
        s[b] = s[b].rotate_left(12);

        s[a] = s[a].wrapping_add(s[b]);
        s[d] ^= s[a];
        s[d] = s[d].rotate_left(8);

        s[c] = s[c].wrapping_add(s[d]);
        s[b] ^= s[c];
        s[b] = s[b].rotate_left(7);
    }
}

// The state embeds the key; render only the counter.
impl fmt::Debug for ChaCha20 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaCha20")
            .field("counter", &self.state[12])
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rfc_key() -> Vec<u8> {
        (0u8..32).collect()
    }

    #[test]
    fn test_rejects_bad_key_length() {
        let err = ChaCha20::new(&[0u8; 16], &[0u8; 12], 0).unwrap_err();
        assert_eq!(err, CipherError::InvalidKeyLength(16));
    }

    #[test]
    fn test_rejects_bad_nonce_length() {
        let err = ChaCha20::new(&[0u8; 32], &[0u8; 8], 0).unwrap_err();
        assert_eq!(err, CipherError::InvalidNonceLength(8));
    }

    #[test]
    fn test_rfc8439_keystream_block() {
        // RFC 8439 section 2.3.2: key 00..1f, nonce 000000090000004a00000000,
        // counter 1.
        let nonce = hex::decode("000000090000004a00000000").unwrap();
        let mut cipher = ChaCha20::new(&rfc_key(), &nonce, 1).unwrap();
        let keystream = cipher.apply_keystream(&[0u8; 64]);
        let expected = hex::decode(
            "10f1e7e4d13b5915500fdd1fa32071c4c7d1f4c733c068030422aa9ac3d46c4e\
             d2826446079faa0914c2d705d98b02a2b5129cd1de164eb9cbd083e8a2503c4e",
        )
        .unwrap();
        assert_eq!(keystream, expected);
    }

    #[test]
    fn test_rfc8439_encryption() {
        // RFC 8439 section 2.4.2.
        let nonce = hex::decode("000000000000004a00000000").unwrap();
        let plaintext = b"Ladies and Gentlemen of the class of '99: \
If I could offer you only one tip for the future, sunscreen would be it.";
        let mut cipher = ChaCha20::new(&rfc_key(), &nonce, 1).unwrap();
        let ciphertext = cipher.apply_keystream(plaintext);
        let expected = hex::decode(
            "6e2e359a2568f98041ba0728dd0d6981e97e7aec1d4360c20a27afccfd9fae0b\
             f91b65c5524733ab8f593dabcd62b3571639d624e65152ab8f530c359f0861d8\
             07ca0dbf500d6a6156a38e088a22b65e52bc514d16ccf806818ce91ab7793736\
             5af90bbf74a35be6b40b8eedf2785e42874d",
        )
        .unwrap();
        assert_eq!(ciphertext, expected);
    }

    #[test]
    fn test_debug_omits_key_material() {
        let cipher = ChaCha20::new(&rfc_key(), &[0u8; 12], 7).unwrap();
        let rendered = format!("{cipher:?}");
        assert!(rendered.contains("counter: 7"));
        assert!(!rendered.contains("state"));
    }

    #[test]
    fn test_roundtrip() {
        let key = [7u8; 32];
        let nonce = [3u8; 12];
        let data: Vec<u8> = (0..1000).map(|i| (i % 251) as u8).collect();

        let mut enc = ChaCha20::new(&key, &nonce, 0).unwrap();
        let ciphertext = enc.apply_keystream(&data);
        assert_ne!(ciphertext, data);

        let mut dec = ChaCha20::new(&key, &nonce, 0).unwrap();
        assert_eq!(dec.apply_keystream(&ciphertext), data);
    }

    #[test]
    fn test_deterministic() {
        let key = rfc_key();
        let nonce = [9u8; 12];
        let mut a = ChaCha20::new(&key, &nonce, 5).unwrap();
        let mut b = ChaCha20::new(&key, &nonce, 5).unwrap();
        assert_eq!(a.apply_keystream(&[0u8; 200]), b.apply_keystream(&[0u8; 200]));
    }

    #[test]
    fn test_partial_block_lengths() {
        let key = rfc_key();
        let nonce = [1u8; 12];
        for len in [0usize, 1, 3, 63, 64, 65, 127, 130] {
            let data = vec![0xABu8; len];
            let mut enc = ChaCha20::new(&key, &nonce, 0).unwrap();
            let ct = enc.apply_keystream(&data);
            assert_eq!(ct.len(), len);
            let mut dec = ChaCha20::new(&key, &nonce, 0).unwrap();
            assert_eq!(dec.apply_keystream(&ct), data);
        }
    }

    #[test]
    fn test_partial_block_matches_prefix() {
        // A short message must see the same keystream prefix as a long one.
        let key = rfc_key();
        let nonce = [2u8; 12];
        let mut long = ChaCha20::new(&key, &nonce, 0).unwrap();
        let full = long.apply_keystream(&[0u8; 100]);
        let mut short = ChaCha20::new(&key, &nonce, 0).unwrap();
        let prefix = short.apply_keystream(&[0u8; 10]);
        assert_eq!(prefix, full[..10]);
    }
}
