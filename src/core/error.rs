//! Error types for the HEARTH protocol.

use thiserror::Error;

/// Errors from the stream cipher and nonce handling.
///
/// These are caller-side misuse, detected at construction time before any
/// network I/O.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Key is not exactly 32 bytes.
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    /// Nonce is not exactly 12 bytes.
    #[error("invalid nonce length: expected 12 bytes, got {0}")]
    InvalidNonceLength(usize),
}

/// Errors from binary message encoding and decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer ended before an expected field completed.
    #[error("unexpected end of buffer: needed {needed} more bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes the pending field still required.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// Data-type code shorter than the 3-character minimum.
    #[error("data type code must be at least 3 characters, got {0}")]
    DataTypeTooShort(usize),

    /// A code field contained non-ASCII bytes.
    #[error("code fields must be ASCII")]
    NotAscii,

    /// A variable-length string exceeds its 1-byte length prefix.
    #[error("string too long for wire format: {0} bytes")]
    StringTooLong(usize),

    /// Unknown leading discriminator byte.
    #[error("unknown discriminator byte: {0}")]
    UnknownDiscriminator(u8),

    /// A decoded count field is negative or an encoded collection does not
    /// fit its count field.
    #[error("invalid element count: {0}")]
    InvalidCount(i64),

    /// Offset unit byte outside the protocol's enumeration.
    #[error("unknown offset unit: {0}")]
    UnknownOffsetUnit(u8),

    /// A text field was not valid UTF-8.
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    /// Trailing bytes after a fixed-size message.
    #[error("trailing bytes after message: {0} left over")]
    TrailingBytes(usize),
}

/// Errors in the transport layer.
#[cfg(feature = "transport")]
#[derive(Debug, Error)]
pub enum TransportError {
    /// All send attempts exhausted without a reply.
    #[error("no reply after {attempts} attempts")]
    Timeout {
        /// Total datagrams sent before giving up.
        attempts: u32,
    },

    /// Socket-level I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level channel errors surfaced to callers of [`crate::channel::SecureChannel`].
#[cfg(feature = "transport")]
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Cipher misuse (bad key or nonce length).
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),

    /// Encode/decode failure, including truncated replies.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Transport failure, including retry exhaustion.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Reply frame shorter than the minimum valid size.
    #[error("malformed frame: {len} bytes, minimum is {min}")]
    MalformedFrame {
        /// Received frame length.
        len: usize,
        /// Minimum valid frame length.
        min: usize,
    },

    /// Reply failed to decompress.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// The hub returned an error-variant response.
    #[error("server error: {0}")]
    Server(String),
}
