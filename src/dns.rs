//! DNS message parsing and construction.
//!
//! Just enough of the wire format to run the proxy: pull the question out
//! of an inbound datagram and synthesize an answerless reply for suppressed
//! queries. Everything else travels through the proxy as opaque bytes.

use std::fmt;

const HEADER_LEN: usize = 12;

/// DNS record types the proxy cares to name; anything else stays numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Ns,
    Cname,
    Soa,
    Ptr,
    Mx,
    Txt,
    Aaaa,
    Srv,
    Https,
    Unknown(u16),
}

impl RecordType {
    /// Map a wire-format QTYPE to a `RecordType`.
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::A,
            2 => Self::Ns,
            5 => Self::Cname,
            6 => Self::Soa,
            12 => Self::Ptr,
            15 => Self::Mx,
            16 => Self::Txt,
            28 => Self::Aaaa,
            33 => Self::Srv,
            65 => Self::Https,
            n => Self::Unknown(n),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::Ns => write!(f, "NS"),
            Self::Cname => write!(f, "CNAME"),
            Self::Soa => write!(f, "SOA"),
            Self::Ptr => write!(f, "PTR"),
            Self::Mx => write!(f, "MX"),
            Self::Txt => write!(f, "TXT"),
            Self::Aaaa => write!(f, "AAAA"),
            Self::Srv => write!(f, "SRV"),
            Self::Https => write!(f, "HTTPS"),
            Self::Unknown(n) => write!(f, "TYPE{}", n),
        }
    }
}

/// The question section of a parsed DNS query.
#[derive(Debug, Clone)]
pub struct Question {
    /// Transaction id, echoed back in any reply.
    pub id: u16,
    /// Queried name in lowercase trailing-dot form (e.g. `www.youtube.com.`).
    pub name: String,
    /// Query type.
    pub rtype: RecordType,
    /// Header flags from the query; RD is echoed into replies.
    flags: u16,
    /// Byte offset one past QCLASS, i.e. the end of the first question.
    question_end: usize,
}

impl Question {
    /// Parse the first question out of a raw DNS query datagram.
    ///
    /// Returns `None` for anything that is not a well-formed standard query
    /// with at least one question; the caller drops such datagrams.
    pub fn parse(packet: &[u8]) -> Option<Self> {
        if packet.len() < HEADER_LEN {
            return None;
        }

        let id = u16::from_be_bytes([packet[0], packet[1]]);
        let flags = u16::from_be_bytes([packet[2], packet[3]]);

        // Standard queries only: QR=0, opcode=0.
        if flags & 0x8000 != 0 || (flags >> 11) & 0xF != 0 {
            return None;
        }

        let qdcount = u16::from_be_bytes([packet[4], packet[5]]);
        if qdcount == 0 {
            return None;
        }

        let mut pos = HEADER_LEN;
        let mut name = String::new();

        loop {
            let label_len = *packet.get(pos)? as usize;
            pos += 1;
            if label_len == 0 {
                break;
            }
            // Labels cap at 63 bytes; compression never appears in a qname.
            if label_len > 63 || pos + label_len > packet.len() {
                return None;
            }
            let label = std::str::from_utf8(&packet[pos..pos + label_len]).ok()?;
            for c in label.chars() {
                name.push(c.to_ascii_lowercase());
            }
            name.push('.');
            pos += label_len;
        }

        if name.is_empty() {
            // Query for the root itself.
            name.push('.');
        }

        if pos + 4 > packet.len() {
            return None;
        }
        let qtype = u16::from_be_bytes([packet[pos], packet[pos + 1]]);
        pos += 4;

        Some(Self {
            id,
            name,
            rtype: RecordType::from_u16(qtype),
            flags,
            question_end: pos,
        })
    }

    /// Build a reply to this question carrying no answer records.
    ///
    /// The reply is correlated by transaction id, echoes the original
    /// question section byte-for-byte, preserves the RD flag and reports
    /// NOERROR. `packet` must be the datagram this question was parsed from.
    pub fn empty_reply(&self, packet: &[u8]) -> Vec<u8> {
        let mut reply = Vec::with_capacity(self.question_end);

        reply.extend_from_slice(&self.id.to_be_bytes());
        let rd = self.flags & 0x0100;
        let flags: u16 = 0x8000 | rd | 0x0080; // QR=1, RD echoed, RA=1
        reply.extend_from_slice(&flags.to_be_bytes());
        reply.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
        reply.extend_from_slice(&0u16.to_be_bytes()); // ANCOUNT
        reply.extend_from_slice(&0u16.to_be_bytes()); // NSCOUNT
        reply.extend_from_slice(&0u16.to_be_bytes()); // ARCOUNT
        reply.extend_from_slice(&packet[HEADER_LEN..self.question_end]);

        reply
    }
}
