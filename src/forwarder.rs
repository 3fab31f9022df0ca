//! Upstream forwarding with single-retry recovery.
//!
//! Every exchange uses a fresh ephemeral socket connected to the fixed
//! upstream resolver, so replies are correlated per attempt rather than
//! through a shared pending-query table. A failed exchange is retried once
//! after a short backoff; a second failure surfaces to the caller, which
//! drops the query.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::debug;

use crate::transport::MAX_DNS_PACKET_SIZE;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(2);
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Forwards raw DNS queries to a single upstream resolver.
pub struct Forwarder {
    upstream: SocketAddr,
    timeout: Duration,
    backoff: Duration,
}

impl Forwarder {
    pub fn new(upstream: SocketAddr) -> Self {
        Self {
            upstream,
            timeout: UPSTREAM_TIMEOUT,
            backoff: RETRY_BACKOFF,
        }
    }

    /// Forward a query upstream and return the raw reply.
    ///
    /// Retries exactly once after a transient failure. The error from the
    /// second attempt is returned as-is; the caller decides what dropping
    /// the query looks like.
    pub async fn forward(&self, query: &[u8]) -> io::Result<Vec<u8>> {
        match self.exchange(query).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                debug!(upstream = %self.upstream, error = %err, "retrying upstream exchange");
                tokio::time::sleep(self.backoff).await;
                self.exchange(query).await
            }
        }
    }

    /// One request/response round trip on a fresh socket.
    async fn exchange(&self, query: &[u8]) -> io::Result<Vec<u8>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(self.upstream).await?;
        socket.send(query).await?;

        let mut buf = [0u8; MAX_DNS_PACKET_SIZE];
        let len = tokio::time::timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "upstream timed out"))??;

        if len < 12 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "short reply from upstream",
            ));
        }
        // The socket is connected, but a confused upstream could still answer
        // the wrong transaction.
        if buf[..2] != query[..2] {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "reply transaction id mismatch",
            ));
        }

        Ok(buf[..len].to_vec())
    }
}
