//! Query routing.
//!
//! One `Dispatcher` sits between the transports and everything else: parse
//! the datagram, decide suppress-or-forward, emit exactly one stats event
//! per query, produce the reply bytes. Transports only move bytes.

use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dns::{Question, RecordType};
use crate::filter::FilterList;
use crate::forwarder::Forwarder;
use crate::stats::QueryEvent;

/// Decides what each inbound query becomes.
///
/// Shared by every transport task; owns the filter set, the upstream
/// forwarder and the sending side of the stats queue.
pub struct Dispatcher {
    filter: FilterList,
    forwarder: Forwarder,
    events: mpsc::Sender<QueryEvent>,
}

impl Dispatcher {
    pub fn new(filter: FilterList, forwarder: Forwarder, events: mpsc::Sender<QueryEvent>) -> Self {
        Self {
            filter,
            forwarder,
            events,
        }
    }

    /// Handle one raw query datagram and return the reply to send, or
    /// `None` when the query is dropped (malformed input, or upstream
    /// failed twice).
    ///
    /// Every parseable query emits exactly one stats event, before the
    /// reply exists; a full queue blocks here rather than losing events.
    pub async fn handle(&self, packet: &[u8]) -> Option<Vec<u8>> {
        let question = Question::parse(packet)?;
        let start = Instant::now();

        let filtered = question.rtype == RecordType::Aaaa && self.filter.contains(&question.name);

        let event = QueryEvent {
            name: question.name.clone(),
            rtype: question.rtype,
            filtered,
        };
        // A closed queue only happens during shutdown drain; the reply
        // path keeps working regardless.
        let _ = self.events.send(event).await;

        if filtered {
            debug!(domain = %question.name, "suppressed AAAA query");
            return Some(question.empty_reply(packet));
        }

        match self.forwarder.forward(packet).await {
            Ok(reply) => {
                debug!(
                    domain = %question.name,
                    qtype = %question.rtype,
                    elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "forwarded"
                );
                Some(reply)
            }
            Err(err) => {
                warn!(
                    domain = %question.name,
                    error = %err,
                    "dropping query, upstream failed twice"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;

    use tokio::net::UdpSocket;

    fn build_query(domain: &str, qtype: u16) -> Vec<u8> {
        let mut pkt = Vec::new();
        pkt.extend_from_slice(&0x1234u16.to_be_bytes());
        pkt.extend_from_slice(&0x0100u16.to_be_bytes());
        pkt.extend_from_slice(&1u16.to_be_bytes());
        pkt.extend_from_slice(&[0u8; 6]);
        for label in domain.split('.').filter(|l| !l.is_empty()) {
            pkt.push(label.len() as u8);
            pkt.extend_from_slice(label.as_bytes());
        }
        pkt.push(0);
        pkt.extend_from_slice(&qtype.to_be_bytes());
        pkt.extend_from_slice(&1u16.to_be_bytes());
        pkt
    }

    fn dispatcher(
        filters: &[&str],
        upstream: SocketAddr,
    ) -> (Dispatcher, mpsc::Receiver<QueryEvent>) {
        let (tx, rx) = mpsc::channel(10);
        let dispatcher = Dispatcher::new(
            FilterList::new(filters.iter().copied()),
            Forwarder::new(upstream),
            tx,
        );
        (dispatcher, rx)
    }

    /// Upstream that answers every query by setting the response bit.
    async fn echo_upstream() -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            while let Ok((len, src)) = socket.recv_from(&mut buf).await {
                let mut reply = buf[..len].to_vec();
                reply[2] |= 0x80;
                let _ = socket.send_to(&reply, src).await;
            }
        });
        addr
    }

    /// Bound socket whose queries are observable; never answers.
    async fn silent_upstream() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    #[tokio::test]
    async fn suppresses_matching_aaaa_without_upstream_contact() {
        let (upstream, addr) = silent_upstream().await;
        let (dispatcher, mut events) = dispatcher(&["youtube.com"], addr);

        let query = build_query("youtube.com", 28);
        let reply = dispatcher.handle(&query).await.unwrap();

        // Correlated, answerless reply.
        assert_eq!(&reply[..2], &query[..2]);
        assert_eq!(u16::from_be_bytes([reply[6], reply[7]]), 0);

        let event = events.recv().await.unwrap();
        assert_eq!(event.name, "youtube.com.");
        assert_eq!(event.rtype, RecordType::Aaaa);
        assert!(event.filtered);

        // The upstream never saw a datagram.
        let mut buf = [0u8; 512];
        assert!(upstream.try_recv_from(&mut buf).is_err());
    }

    #[tokio::test]
    async fn forwards_unmatched_names() {
        let addr = echo_upstream().await;
        let (dispatcher, mut events) = dispatcher(&["youtube.com"], addr);

        let query = build_query("example.com", 28);
        let reply = dispatcher.handle(&query).await.unwrap();

        assert_eq!(&reply[..2], &query[..2]);
        assert_ne!(reply[2] & 0x80, 0);

        let event = events.recv().await.unwrap();
        assert_eq!(event.name, "example.com.");
        assert!(!event.filtered);
    }

    #[tokio::test]
    async fn non_aaaa_query_for_filtered_domain_recurses() {
        let addr = echo_upstream().await;
        let (dispatcher, mut events) = dispatcher(&["youtube.com"], addr);

        let query = build_query("youtube.com", 1);
        let reply = dispatcher.handle(&query).await.unwrap();

        // Answered by the upstream, not synthesized locally.
        assert_ne!(reply[2] & 0x80, 0);

        let event = events.recv().await.unwrap();
        assert_eq!(event.rtype, RecordType::A);
        assert!(!event.filtered);
    }

    #[tokio::test]
    async fn malformed_packet_drops_without_event() {
        let (upstream, addr) = silent_upstream().await;
        let (dispatcher, mut events) = dispatcher(&["youtube.com"], addr);

        assert!(dispatcher.handle(&[0u8; 5]).await.is_none());

        assert!(events.try_recv().is_err());
        let mut buf = [0u8; 512];
        assert!(upstream.try_recv_from(&mut buf).is_err());
    }

    #[tokio::test]
    async fn upstream_failure_drops_but_still_counts() {
        // Closed port: both attempts fail fast.
        let (upstream, addr) = silent_upstream().await;
        drop(upstream);
        let (dispatcher, mut events) = dispatcher(&["youtube.com"], addr);

        let query = build_query("example.com", 1);
        assert!(dispatcher.handle(&query).await.is_none());

        // The event was emitted before the outcome was known.
        let event = events.recv().await.unwrap();
        assert_eq!(event.name, "example.com.");
        assert!(!event.filtered);
    }
}
