//! HEARTH Protocol - Transport Layer
//!
//! A deliberately small layer: one request datagram, one reply datagram,
//! bounded retries. The protocol has no request-ID field, so a socket can
//! carry at most one call at a time — [`RetryingTransport`] therefore opens a
//! fresh ephemeral socket per round trip, which also makes concurrent calls
//! on one channel safe.
//!
//! ```text
//! Idle → Sent → (Received | TimedOut) → [retry] → Sent → … → Success | ExhaustedRetries
//! ```

mod udp;

pub use udp::{RetryPolicy, RetryingTransport};
