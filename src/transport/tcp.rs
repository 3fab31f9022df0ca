//! TCP transport.
//!
//! DNS over TCP frames each message with a 2-byte big-endian length
//! prefix. Each accepted connection serves one query through the shared
//! dispatcher; the upstream exchange itself stays connectionless, so both
//! transports share one forwarding and retry contract.

use std::io;
use std::net::SocketAddr;
use std::rc::Rc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::dispatch::Dispatcher;

use super::MAX_DNS_PACKET_SIZE;

/// TCP listener for the proxy, enabled by flag.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { listener })
    }

    /// Address the listener actually bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Start the accept loop. Each connection is handled in its own task.
    pub fn start(self, dispatcher: Rc<Dispatcher>, shutdown: broadcast::Receiver<()>) {
        tokio::task::spawn_local(run_accept_loop(self.listener, dispatcher, shutdown));
    }
}

async fn run_accept_loop(
    listener: TcpListener,
    dispatcher: Rc<Dispatcher>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((client, _)) => {
                    tokio::task::spawn_local(handle_connection(client, dispatcher.clone()));
                }
                Err(e) => warn!(error = %e, "tcp accept error"),
            },
            _ = shutdown.recv() => break,
        }
    }

    debug!("tcp listener stopped");
}

/// Serve one query on an accepted connection, then let it close.
async fn handle_connection(mut client: TcpStream, dispatcher: Rc<Dispatcher>) {
    let query = match read_message(&mut client).await {
        Some(q) => q,
        None => return,
    };

    let reply = match dispatcher.handle(&query).await {
        Some(r) => r,
        None => return,
    };

    let mut framed = Vec::with_capacity(2 + reply.len());
    framed.extend_from_slice(&(reply.len() as u16).to_be_bytes());
    framed.extend_from_slice(&reply);

    if let Err(e) = client.write_all(&framed).await {
        debug!(error = %e, "tcp reply write failed");
    }
}

/// Read one length-prefixed DNS message, returning the bare message bytes.
async fn read_message(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await.ok()?;

    let msg_len = u16::from_be_bytes(len_buf) as usize;
    if msg_len == 0 || msg_len > MAX_DNS_PACKET_SIZE {
        return None;
    }

    let mut msg = vec![0u8; msg_len];
    stream.read_exact(&mut msg).await.ok()?;

    Some(msg)
}
