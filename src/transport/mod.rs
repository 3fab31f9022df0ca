//! Transport layer for the proxy.
//!
//! UDP is the primary listener; TCP is optional and off by default. Both
//! hand every query to the shared dispatcher and differ only in framing.

pub mod tcp;
pub mod udp;

/// Maximum size of a DNS packet (with some headroom).
pub const MAX_DNS_PACKET_SIZE: usize = 4096;
