//! HEARTH Protocol - Secure Channel
//!
//! Ties the layers together: encode a [`Query`], seal it into a wire frame,
//! run the retrying UDP round trip, open the reply, and decode a
//! [`Response`].
//!
//! Wire frame: `[deployment prefix] ‖ obfuscated nonce (12 bytes) ‖
//! ciphertext`. The prefix is outbound-only and lets a hub multiplex
//! protocol generations on one port; replies carry no prefix. There is no
//! length field — the datagram boundary is the frame boundary.
//!
//! # No authentication tag
//!
//! This protocol generation authenticates nothing: decryption cannot fail,
//! it can only produce garbage, which the codec then rejects through
//! discriminator and bounds checks. Treat the channel as protecting against
//! casual observation, not active tampering.

use std::fmt;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;

use bzip2::read::BzDecoder;
use tokio::sync::oneshot;
use tracing::debug;

use crate::codec::{Query, Response};
use crate::core::{ChannelError, KEY_SIZE, MIN_FRAME_SIZE, NONCE_SIZE};
use crate::crypto::{ChaCha20, Nonce};
use crate::transport::{RetryPolicy, RetryingTransport};

/// Reply compression, a per-deployment constant (never negotiated
/// per message).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Replies arrive as plain ciphertext.
    None,
    /// Replies are bzip2-compressed before encryption (hub default).
    #[default]
    Bzip2,
}

/// Channel configuration, read-mostly after construction.
#[derive(Clone)]
struct ChannelConfig {
    key: [u8; KEY_SIZE],
    server_addr: SocketAddr,
    prefix: Vec<u8>,
    compression: Compression,
}

/// Builder for [`SecureChannel`].
#[derive(Debug, Clone)]
pub struct ChannelBuilder {
    key: Vec<u8>,
    server_addr: SocketAddr,
    prefix: Vec<u8>,
    retry: RetryPolicy,
    compression: Compression,
}

impl ChannelBuilder {
    /// Start building a channel to the given hub address.
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            key: Vec::new(),
            server_addr,
            prefix: Vec::new(),
            retry: RetryPolicy::default(),
            compression: Compression::default(),
        }
    }

    /// Set the 32-byte shared key (validated at [`build`](Self::build)).
    pub fn key(mut self, key: &[u8]) -> Self {
        self.key = key.to_vec();
        self
    }

    /// Set the outbound protocol-selector prefix (empty by default).
    pub fn prefix(mut self, prefix: &[u8]) -> Self {
        self.prefix = prefix.to_vec();
        self
    }

    /// Set the per-attempt receive timeout.
    pub fn recv_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.retry.recv_timeout = timeout;
        self
    }

    /// Set the total send-attempt budget.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.retry.max_attempts = attempts;
        self
    }

    /// Set the deployment's reply compression.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Validate the configuration and build the channel.
    ///
    /// A key of the wrong length is rejected here, before any I/O.
    pub fn build(self) -> Result<SecureChannel, ChannelError> {
        let key: [u8; KEY_SIZE] = self
            .key
            .as_slice()
            .try_into()
            .map_err(|_| crate::core::CipherError::InvalidKeyLength(self.key.len()))?;
        Ok(SecureChannel {
            config: Arc::new(ChannelConfig {
                key,
                server_addr: self.server_addr,
                prefix: self.prefix,
                compression: self.compression,
            }),
            transport: RetryingTransport::new(self.retry),
        })
    }
}

/// Secure query channel to one hub.
///
/// Cheap to clone; every call opens its own socket, so clones (and one
/// instance shared across tasks) may issue calls concurrently.
#[derive(Clone)]
pub struct SecureChannel {
    config: Arc<ChannelConfig>,
    transport: RetryingTransport,
}

// The config holds the shared key; render only the public parameters.
impl fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureChannel")
            .field("server_addr", &self.config.server_addr)
            .field("compression", &self.config.compression)
            .finish_non_exhaustive()
    }
}

impl SecureChannel {
    /// Start a builder for a channel to `server_addr`.
    pub fn builder(server_addr: SocketAddr) -> ChannelBuilder {
        ChannelBuilder::new(server_addr)
    }

    /// The hub this channel talks to.
    pub fn server_addr(&self) -> SocketAddr {
        self.config.server_addr
    }

    /// Send a query and await the decoded response.
    ///
    /// Encode and field validation happen before any packet leaves, so
    /// invalid-argument failures never consume the retry budget. A reply
    /// with the error discriminator surfaces as [`ChannelError::Server`].
    pub async fn send(&self, query: &Query) -> Result<Response, ChannelError> {
        let payload = query.encode()?;
        let frame = self.seal(&payload)?;
        debug!(query = query.discriminator(), frame_len = frame.len(), "query sealed");

        let reply = self.transport.round_trip(&frame, self.config.server_addr).await?;
        let plaintext = self.open(&reply)?;
        let body = self.decompress(plaintext)?;
        debug!(reply_len = reply.len(), body_len = body.len(), "reply opened");

        match Response::decode(&body, query)? {
            Response::Error(message) => Err(ChannelError::Server(message)),
            response => Ok(response),
        }
    }

    /// Fire-and-collect form of [`send`](Self::send) for callers without an
    /// async context at hand: the round trip runs on a spawned task and the
    /// result arrives on the returned oneshot receiver.
    pub fn dispatch(&self, query: Query) -> oneshot::Receiver<Result<Response, ChannelError>> {
        let (tx, rx) = oneshot::channel();
        let channel = self.clone();
        tokio::spawn(async move {
            let _ = tx.send(channel.send(&query).await);
        });
        rx
    }

    /// Seal a plaintext payload into an outbound frame.
    fn seal(&self, payload: &[u8]) -> Result<Vec<u8>, ChannelError> {
        let nonce = Nonce::generate();
        let masked = nonce.transform(&self.config.key)?;
        let mut cipher = ChaCha20::new(&self.config.key, nonce.as_bytes(), 0)?;
        let ciphertext = cipher.apply_keystream(payload);

        let mut frame =
            Vec::with_capacity(self.config.prefix.len() + NONCE_SIZE + ciphertext.len());
        frame.extend_from_slice(&self.config.prefix);
        frame.extend_from_slice(masked.as_bytes());
        frame.extend_from_slice(&ciphertext);
        Ok(frame)
    }

    /// Open a reply frame into its plaintext (possibly compressed) body.
    fn open(&self, frame: &[u8]) -> Result<Vec<u8>, ChannelError> {
        if frame.len() < MIN_FRAME_SIZE {
            return Err(ChannelError::MalformedFrame {
                len: frame.len(),
                min: MIN_FRAME_SIZE,
            });
        }
        // The wire nonce is exactly 12 bytes; everything after it is
        // ciphertext.
        let masked = Nonce::from_slice(&frame[..NONCE_SIZE])?;
        let nonce = masked.transform(&self.config.key)?;
        let mut cipher = ChaCha20::new(&self.config.key, nonce.as_bytes(), 0)?;
        Ok(cipher.apply_keystream(&frame[NONCE_SIZE..]))
    }

    /// Undo the deployment's reply compression.
    fn decompress(&self, body: Vec<u8>) -> Result<Vec<u8>, ChannelError> {
        match self.config.compression {
            Compression::None => Ok(body),
            Compression::Bzip2 => {
                let mut out = Vec::new();
                BzDecoder::new(body.as_slice())
                    .read_to_end(&mut out)
                    .map_err(|e| ChannelError::Decompression(e.to_string()))?;
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use bzip2::Compression as BzLevel;
    use bzip2::read::BzEncoder;
    use tokio::net::UdpSocket;

    use crate::codec::{ChannelKey, LastReading, Sample, Sensor};
    use crate::core::{CodecError, TransportError};

    use super::*;

    fn test_key() -> Vec<u8> {
        (0u8..32).collect()
    }

    fn test_channel(addr: SocketAddr, compression: Compression) -> SecureChannel {
        SecureChannel::builder(addr)
            .key(&test_key())
            .compression(compression)
            .recv_timeout(Duration::from_millis(200))
            .build()
            .unwrap()
    }

    /// Server-side frame handling for the mock hub: same involution,
    /// opposite direction.
    fn hub_open(key: &[u8], frame: &[u8]) -> Vec<u8> {
        let masked = Nonce::from_slice(&frame[..NONCE_SIZE]).unwrap();
        let nonce = masked.transform(key).unwrap();
        let mut cipher = ChaCha20::new(key, nonce.as_bytes(), 0).unwrap();
        cipher.apply_keystream(&frame[NONCE_SIZE..])
    }

    fn hub_seal(key: &[u8], body: &[u8], compress: bool) -> Vec<u8> {
        let body = if compress {
            let mut out = Vec::new();
            BzEncoder::new(body, BzLevel::best())
                .read_to_end(&mut out)
                .unwrap();
            out
        } else {
            body.to_vec()
        };
        let nonce = Nonce::generate();
        let masked = nonce.transform(key).unwrap();
        let mut cipher = ChaCha20::new(key, nonce.as_bytes(), 0).unwrap();
        let mut frame = masked.as_bytes().to_vec();
        frame.extend_from_slice(&cipher.apply_keystream(body.as_slice()));
        frame
    }

    /// Spawn a one-shot mock hub that answers any request with `response`.
    async fn spawn_hub(response: Response, compress: bool) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
            // The request must open into a well-formed command.
            let command = hub_open(&test_key(), &buf[..len]);
            assert!(!command.is_empty());
            let body = response.encode().unwrap();
            let frame = hub_seal(&test_key(), &body, compress);
            socket.send_to(&frame, peer).await.unwrap();
        });
        addr
    }

    fn catalog() -> Response {
        Response::SensorCatalog(vec![Sensor {
            id: 1,
            data_type: "env".into(),
            location: "Bedroom".into(),
            location_type: "bed".into(),
        }])
    }

    #[test]
    fn test_builder_rejects_short_key() {
        let err = SecureChannel::builder("127.0.0.1:1".parse().unwrap())
            .key(&[1, 2, 3])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Cipher(crate::core::CipherError::InvalidKeyLength(3))
        ));
    }

    #[test]
    fn test_debug_omits_key_material() {
        let channel = test_channel("127.0.0.1:1".parse().unwrap(), Compression::None);
        let rendered = format!("{channel:?}");
        assert!(rendered.contains("server_addr"));
        assert!(!rendered.contains("key"));
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let channel = test_channel("127.0.0.1:1".parse().unwrap(), Compression::None);
        let payload = b"not a real command, just bytes".to_vec();
        let frame = channel.seal(&payload).unwrap();
        assert_eq!(frame.len(), NONCE_SIZE + payload.len());
        assert_ne!(&frame[NONCE_SIZE..], payload.as_slice());
        assert_eq!(channel.open(&frame).unwrap(), payload);
    }

    #[test]
    fn test_seal_prepends_prefix() {
        let channel = SecureChannel::builder("127.0.0.1:1".parse().unwrap())
            .key(&test_key())
            .prefix(b"v2")
            .build()
            .unwrap();
        let frame = channel.seal(b"x").unwrap();
        assert_eq!(&frame[..2], b"v2");
        assert_eq!(frame.len(), 2 + NONCE_SIZE + 1);
    }

    #[test]
    fn test_open_rejects_short_frame() {
        let channel = test_channel("127.0.0.1:1".parse().unwrap(), Compression::None);
        for len in 0..MIN_FRAME_SIZE {
            let err = channel.open(&vec![0u8; len]).unwrap_err();
            assert!(
                matches!(err, ChannelError::MalformedFrame { len: l, min } if l == len && min == 13)
            );
        }
    }

    #[tokio::test]
    async fn test_end_to_end_catalog() {
        let addr = spawn_hub(catalog(), false).await;
        let channel = test_channel(addr, Compression::None);
        let response = channel.send(&Query::ListSensors).await.unwrap();
        assert_eq!(response, catalog());
    }

    #[tokio::test]
    async fn test_end_to_end_compressed() {
        let addr = spawn_hub(catalog(), true).await;
        let channel = test_channel(addr, Compression::Bzip2);
        let response = channel.send(&Query::ListSensors).await.unwrap();
        assert_eq!(response, catalog());
    }

    #[tokio::test]
    async fn test_end_to_end_last_values() {
        let mut values = BTreeMap::new();
        values.insert(ChannelKey::new("temp").unwrap(), 2312);
        let mut by_sensor = BTreeMap::new();
        by_sensor.insert(
            9u8,
            LastReading {
                date: 20250610,
                sample: Sample {
                    time: 91500,
                    values,
                },
            },
        );
        let expected = Response::LastValues(by_sensor);

        let addr = spawn_hub(expected.clone(), true).await;
        let channel = test_channel(addr, Compression::Bzip2);
        let response = channel.send(&Query::LastValues { days: 2 }).await.unwrap();
        assert_eq!(response, expected);
    }

    #[tokio::test]
    async fn test_server_error_surfaced_verbatim() {
        let addr = spawn_hub(Response::Error("Invalid command".into()), false).await;
        let channel = test_channel(addr, Compression::None);
        let err = channel.send(&Query::ListSensors).await.unwrap_err();
        assert!(matches!(err, ChannelError::Server(msg) if msg == "Invalid command"));
    }

    #[tokio::test]
    async fn test_invalid_query_fails_before_io() {
        // Unroutable address: if encoding tried the network first, this
        // would time out instead of failing fast.
        let channel = test_channel("127.0.0.1:9".parse().unwrap(), Compression::None);
        let query = Query::TimeSeries(crate::codec::TimeSeriesQuery {
            max_points: 10,
            data_type: "ab".into(),
            start: crate::codec::SeriesStart::Date(20250101),
            period: None,
        });
        let err = channel.send(&query).await.unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Codec(CodecError::DataTypeTooShort(2))
        ));
    }

    #[tokio::test]
    async fn test_silent_hub_times_out() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        // Keep the socket alive but never answer.
        tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            loop {
                let _ = socket.recv_from(&mut buf).await;
            }
        });
        let channel = SecureChannel::builder(addr)
            .key(&test_key())
            .recv_timeout(Duration::from_millis(30))
            .build()
            .unwrap();
        let err = channel.send(&Query::ListSensors).await.unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Transport(TransportError::Timeout { attempts: 3 })
        ));
    }

    #[tokio::test]
    async fn test_dispatch_delivers_on_oneshot() {
        let addr = spawn_hub(catalog(), false).await;
        let channel = test_channel(addr, Compression::None);
        let rx = channel.dispatch(Query::ListSensors);
        let result = rx.await.unwrap();
        assert_eq!(result.unwrap(), catalog());
    }

    #[tokio::test]
    async fn test_garbage_reply_rejected_by_codec() {
        // A wrong-key hub produces garbage plaintext; with no auth tag the
        // codec is the last line of defense.
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            let (_, peer) = socket.recv_from(&mut buf).await.unwrap();
            let wrong_key = [0xEEu8; 32];
            let frame = hub_seal(&wrong_key, &catalog().encode().unwrap(), false);
            socket.send_to(&frame, peer).await.unwrap();
        });
        let channel = test_channel(addr, Compression::None);
        let err = channel.send(&Query::ListSensors).await.unwrap_err();
        // Depending on the garbage, either the discriminator or a bounds
        // check trips; both are typed protocol errors, never a panic.
        assert!(matches!(
            err,
            ChannelError::Codec(_) | ChannelError::Server(_)
        ));
    }
}
