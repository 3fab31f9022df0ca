//! Sixdrop - a selective AAAA-suppressing DNS forwarding proxy.
//!
//! Forwards every query to a single upstream resolver, except AAAA queries
//! for a configured set of domains, which are answered locally with no
//! records. Per-domain statistics flow through a bounded queue into one
//! collector task and are reported on operator signals.
//!
//! The binary in `main.rs` drives [`proxy::run`]; the modules are public
//! so the integration tests and benches can wire them up directly.

pub mod console;
pub mod dispatch;
pub mod dns;
pub mod filter;
pub mod forwarder;
pub mod proxy;
pub mod stats;
pub mod transport;
