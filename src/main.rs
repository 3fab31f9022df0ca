use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sixdrop::proxy::{self, ProxyConfig};

#[derive(Parser)]
#[command(name = "sixdrop")]
#[command(about = "Selective AAAA-suppressing DNS forwarding proxy", long_about = None)]
struct Args {
    /// Local port to listen on
    #[arg(short, long, default_value = "53")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Upstream DNS server (host:port)
    #[arg(short, long, default_value = "10.10.10.1:53")]
    upstream: String,

    /// Domain whose AAAA queries are answered empty (repeatable)
    #[arg(
        short,
        long = "filter",
        value_name = "DOMAIN",
        default_values_t = ["youtube.com.".to_string(), "googlevideo.com.".to_string()]
    )]
    filter: Vec<String>,

    /// Also listen for DNS over TCP
    #[arg(long)]
    tcp: bool,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&args.log_level).context("invalid log level")?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let bind_addr = SocketAddr::new(
        args.bind.parse::<IpAddr>().context("invalid bind address")?,
        args.port,
    );
    let upstream: SocketAddr = args
        .upstream
        .parse()
        .context("invalid upstream address")?;

    let config = ProxyConfig {
        bind_addr,
        upstream,
        filters: args.filter,
        tcp: args.tcp,
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let local = tokio::task::LocalSet::new();
    local
        .block_on(&rt, proxy::run(config))
        .context("proxy server failed")?;

    Ok(())
}
