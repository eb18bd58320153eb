//! Protocol constants.
//!
//! These values are fixed by the hub's wire protocol and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// CRYPTOGRAPHIC CONSTANTS
// =============================================================================

/// ChaCha20 key size.
pub const KEY_SIZE: usize = 32;

/// ChaCha20 nonce size (IETF, 96-bit).
pub const NONCE_SIZE: usize = 12;

/// Random salt portion of the nonce (bytes 0..4).
pub const NONCE_SALT_SIZE: usize = 4;

/// ChaCha20 keystream block size.
pub const CIPHER_BLOCK_SIZE: usize = 64;

// =============================================================================
// FRAME SIZES
// =============================================================================

/// Minimum valid wire frame: a 12-byte obfuscated nonce plus at least one
/// ciphertext byte.
pub const MIN_FRAME_SIZE: usize = NONCE_SIZE + 1;

/// Largest datagram the transport will accept (maximum UDP payload).
pub const MAX_DATAGRAM_SIZE: usize = 65507;

// =============================================================================
// QUERY DISCRIMINATORS
// =============================================================================

/// Sensor catalog request.
pub const QUERY_LIST_SENSORS: u8 = 0;

/// Latest readings request.
pub const QUERY_LAST_VALUES: u8 = 1;

/// Time series request.
pub const QUERY_TIME_SERIES: u8 = 2;

/// Wire size of a `ListSensors` or `LastValues` command.
pub const SHORT_QUERY_SIZE: usize = 2;

/// Wire size of a `TimeSeries` command.
pub const TIME_SERIES_QUERY_SIZE: usize = 12;

// =============================================================================
// RESPONSE DISCRIMINATORS
// =============================================================================

/// Raw (unaggregated) series, or the "no error" byte on single-purpose
/// replies (catalog, last values).
pub const RESPONSE_OK: u8 = 0;

/// Aggregated series.
pub const RESPONSE_AGGREGATED: u8 = 1;

/// Server-reported error; the remaining bytes are a UTF-8 message.
pub const RESPONSE_ERROR: u8 = 2;

// =============================================================================
// DATA MODEL SIZES
// =============================================================================

/// Data-type and location-type codes are 3 ASCII bytes on the wire.
pub const TYPE_CODE_SIZE: usize = 3;

/// Measurement channel keys are fixed 4-byte ASCII codes.
pub const CHANNEL_KEY_SIZE: usize = 4;

// =============================================================================
// TIMING
// =============================================================================

/// Default receive timeout per attempt. Deployments on slow links raise this.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_millis(1000);

/// Maximum total send attempts per call.
pub const MAX_SEND_ATTEMPTS: u32 = 3;
