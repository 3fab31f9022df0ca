//! Proxy orchestration.
//!
//! Wires the transports, dispatcher, stats collector and operator console
//! together, then serves until shutdown is confirmed and the collector has
//! drained every queued event.

use std::cell::RefCell;
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc};
use tracing::info;

use crate::console::Console;
use crate::dispatch::Dispatcher;
use crate::filter::FilterList;
use crate::forwarder::Forwarder;
use crate::stats::{run_collector, StatsTable, EVENT_QUEUE_CAPACITY};
use crate::transport::{tcp::TcpTransport, udp::UdpTransport};

/// Configuration for the proxy.
pub struct ProxyConfig {
    /// Local address to bind.
    pub bind_addr: SocketAddr,
    /// Upstream resolver all recursed queries go to.
    pub upstream: SocketAddr,
    /// Names whose AAAA queries are answered locally.
    pub filters: Vec<String>,
    /// Also listen for DNS over TCP.
    pub tcp: bool,
}

/// Run the proxy with the given configuration.
///
/// Binds the transports (fatal on failure), then serves until the console
/// confirms termination. Returns only after the stats collector has folded
/// in every event from queries that were still in flight.
pub async fn run(config: ProxyConfig) -> io::Result<()> {
    let started = Instant::now();

    let filter = FilterList::new(&config.filters);
    let table = Rc::new(RefCell::new(StatsTable::new()));
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let (shutdown_tx, _) = broadcast::channel(1);

    let udp = UdpTransport::bind(config.bind_addr).await?;
    let tcp = if config.tcp {
        Some(TcpTransport::bind(config.bind_addr).await?)
    } else {
        None
    };

    println!(
        "DNS proxy listening on {} (upstream {})",
        config.bind_addr, config.upstream
    );
    println!(
        "suppressing AAAA for {} domains: {}",
        filter.len(),
        config.filters.join(", ")
    );
    info!(
        bind = %config.bind_addr,
        upstream = %config.upstream,
        tcp = config.tcp,
        "proxy started"
    );

    let dispatcher = Rc::new(Dispatcher::new(
        filter,
        Forwarder::new(config.upstream),
        events_tx,
    ));

    udp.start(dispatcher.clone(), shutdown_tx.subscribe());
    if let Some(tcp) = tcp {
        tcp.start(dispatcher.clone(), shutdown_tx.subscribe());
    }
    // The transports hold the only dispatcher handles from here on; when
    // their loops and in-flight queries finish, the event queue closes.
    drop(dispatcher);

    let collector = tokio::task::spawn_local(run_collector(events_rx, table.clone()));

    Console::new(table, started, shutdown_tx).run().await?;

    collector.await.map_err(io::Error::other)?;
    info!("proxy stopped");

    Ok(())
}
