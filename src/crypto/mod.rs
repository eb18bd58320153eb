//! HEARTH Protocol - Crypto Layer
//!
//! This module implements the secure-channel primitives:
//!
//! - **Stream cipher**: [`ChaCha20`], a from-scratch IETF ChaCha20 keystream
//!   engine (RFC 8439 core, 96-bit nonce, 32-bit block counter)
//! - **Nonce construction**: [`Nonce`] with its self-inverse wire
//!   obfuscation transform
//!
//! # Security model
//!
//! The protocol carries no authentication tag. Decryption always "succeeds";
//! a tampered or mis-keyed frame decrypts to garbage, which the message codec
//! rejects through discriminator and bounds checks. Callers must not treat a
//! successful decrypt as proof of authenticity. This is a known limitation of
//! the deployed wire format, preserved for compatibility.

mod cipher;
mod nonce;

pub use cipher::ChaCha20;
pub use nonce::Nonce;
