//! Retrying UDP exchange.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::core::{DEFAULT_RECV_TIMEOUT, MAX_DATAGRAM_SIZE, MAX_SEND_ATTEMPTS, TransportError};

/// Retry/timeout configuration for one channel.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// How long to wait for a reply after each send. Local deployments keep
    /// this small; internet-facing ones raise it.
    pub recv_timeout: Duration,
    /// Total send attempts before giving up (not "retries after the first").
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            max_attempts: MAX_SEND_ATTEMPTS,
        }
    }
}

/// One-shot UDP request/reply with bounded retries.
#[derive(Debug, Clone)]
pub struct RetryingTransport {
    policy: RetryPolicy,
}

impl RetryingTransport {
    /// Create a transport with the given policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The configured policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `frame` to `addr` and await one reply datagram.
    ///
    /// Opens a fresh ephemeral socket, then sends and waits up to
    /// `recv_timeout`, resending on silence until `max_attempts` datagrams
    /// have gone out. Whatever datagram arrives first is the answer to the
    /// most recent send; exhaustion yields [`TransportError::Timeout`].
    pub async fn round_trip(
        &self,
        frame: &[u8],
        addr: SocketAddr,
    ) -> Result<Vec<u8>, TransportError> {
        let bind_addr: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(addr).await?;

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        for attempt in 1..=self.policy.max_attempts {
            socket.send(frame).await?;
            debug!(attempt, bytes = frame.len(), %addr, "datagram sent");

            match timeout(self.policy.recv_timeout, socket.recv(&mut buf)).await {
                Ok(Ok(len)) => {
                    debug!(attempt, bytes = len, "reply received");
                    buf.truncate(len);
                    return Ok(buf);
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    warn!(attempt, timeout_ms = self.policy.recv_timeout.as_millis() as u64,
                        "no reply, will retry if attempts remain");
                }
            }
        }

        Err(TransportError::Timeout {
            attempts: self.policy.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Spawn a mock hub that counts requests and answers only from the
    /// `reply_from`-th request onward (0 = never).
    async fn spawn_mock_hub(reply_from: u32) -> (SocketAddr, Arc<AtomicU32>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let seen = Arc::new(AtomicU32::new(0));
        let seen_clone = seen.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            loop {
                let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let count = seen_clone.fetch_add(1, Ordering::SeqCst) + 1;
                if reply_from != 0 && count >= reply_from {
                    let mut reply = b"ack:".to_vec();
                    reply.extend_from_slice(&buf[..len]);
                    let _ = socket.send_to(&reply, peer).await;
                }
            }
        });
        (addr, seen)
    }

    fn fast_transport() -> RetryingTransport {
        RetryingTransport::new(RetryPolicy {
            recv_timeout: Duration::from_millis(50),
            max_attempts: 3,
        })
    }

    #[tokio::test]
    async fn test_first_attempt_succeeds() {
        let (addr, seen) = spawn_mock_hub(1).await;
        let reply = fast_transport().round_trip(b"ping", addr).await.unwrap();
        assert_eq!(reply, b"ack:ping");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let (addr, seen) = spawn_mock_hub(3).await;
        let reply = fast_transport().round_trip(b"ping", addr).await.unwrap();
        assert_eq!(reply, b"ack:ping");
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_times_out_after_exactly_three_sends() {
        let (addr, seen) = spawn_mock_hub(0).await;
        let err = fast_transport().round_trip(b"ping", addr).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { attempts: 3 }));
        // Give the mock a moment to drain its queue before counting.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_large_reply_fits_one_datagram() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (_, peer) = socket.recv_from(&mut buf).await.unwrap();
            let reply = vec![0x5Au8; 32_000];
            socket.send_to(&reply, peer).await.unwrap();
        });
        let reply = fast_transport().round_trip(b"big", addr).await.unwrap();
        assert_eq!(reply.len(), 32_000);
        assert!(reply.iter().all(|&b| b == 0x5A));
    }
}
