//! UDP transport.
//!
//! One task owns the listening socket and spawns a local task per inbound
//! datagram, so a slow upstream exchange never stalls the receive loop.
//! The loop exits when the shutdown channel fires; datagrams already
//! handed off keep running to completion.

use std::io;
use std::net::SocketAddr;
use std::rc::Rc;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::dispatch::Dispatcher;

use super::MAX_DNS_PACKET_SIZE;

/// UDP listener for the proxy.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind the listening socket. Failure here is fatal to startup.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);

        Ok(Self { socket })
    }

    /// Address the socket actually bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Start the receive loop. Returns immediately; the loop runs until
    /// `shutdown` fires.
    pub fn start(self, dispatcher: Rc<Dispatcher>, shutdown: broadcast::Receiver<()>) {
        tokio::task::spawn_local(run(self.socket, dispatcher, shutdown));
    }
}

async fn run(
    socket: Arc<UdpSocket>,
    dispatcher: Rc<Dispatcher>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

    loop {
        let (len, src) = tokio::select! {
            result = socket.recv_from(&mut buf) => match result {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "udp recv error");
                    continue;
                }
            },
            _ = shutdown.recv() => break,
        };

        if len < 12 {
            continue;
        }

        let packet = buf[..len].to_vec();
        let socket = socket.clone();
        let dispatcher = dispatcher.clone();
        tokio::task::spawn_local(async move {
            if let Some(reply) = dispatcher.handle(&packet).await {
                if let Err(e) = socket.send_to(&reply, src).await {
                    warn!(error = %e, "udp send error");
                }
            }
        });
    }

    debug!("udp listener stopped");
}
