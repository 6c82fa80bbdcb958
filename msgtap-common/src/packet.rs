//! Raw packet captures shared between the transport layer and the tap.

use bytes::Bytes;
use std::fmt;
use std::net::Ipv4Addr;

/// Protocol-level maximum packet length. Expansion buffers are pre-sized to
/// this so zero-code expansion can run in place.
pub const MAX_PACKET_SIZE: usize = 8192;

/// Smallest buffer that can hold a valid header: 1 flags byte, 4 sequence
/// bytes, and at least 2 bytes of message-number encoding.
pub const MIN_VALID_PACKET_SIZE: usize = 7;

/// Header flag bits (first byte of every template-protocol packet).
pub const ZERO_CODE_FLAG: u8 = 0x80;
pub const RELIABLE_FLAG: u8 = 0x40;
pub const RESENT_FLAG: u8 = 0x20;
pub const ACK_FLAG: u8 = 0x10;

/// An address/port pair as seen on the wire. The template protocol is
/// IPv4-only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Host {
    pub addr: Ipv4Addr,
    pub port: u16,
}

impl Host {
    pub fn new(addr: Ipv4Addr, port: u16) -> Self {
        Self { addr, port }
    }

    /// True if this host is the local process itself: loopback address plus
    /// the process's own listening port. This is how packet direction is
    /// inferred, and it misclassifies traffic when the tap is fed from a
    /// different vantage point (e.g. a relay between two remote peers).
    pub fn is_local(&self, listen_port: u16) -> bool {
        self.addr == Ipv4Addr::LOCALHOST && self.port == listen_port
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// What kind of traffic a capture holds. Only `Template` messages are
/// decoded; the HTTP kinds exist for captures handed over by the HTTP
/// transport and render as a fixed placeholder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Template,
    HttpRequest,
    HttpResponse,
}

/// An immutable capture of a single packet.
///
/// The payload is deep-copied at construction because the transport reuses
/// its receive buffer immediately after handing the packet over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEntry {
    pub kind: MessageKind,
    pub from: Host,
    pub to: Host,
    pub data: Bytes,
}

impl RawEntry {
    pub fn new(kind: MessageKind, from: Host, to: Host, payload: &[u8]) -> Self {
        Self {
            kind,
            from,
            to,
            data: Bytes::copy_from_slice(payload),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(last_octet: u8, port: u16) -> Host {
        Host::new(Ipv4Addr::new(10, 0, 0, last_octet), port)
    }

    #[test]
    fn test_entry_copies_payload() {
        let mut buf = vec![1u8, 2, 3];
        let entry = RawEntry::new(MessageKind::Template, host(1, 9000), host(2, 9001), &buf);
        buf[0] = 0xFF;
        assert_eq!(
            &entry.data[..],
            &[1, 2, 3],
            "entry must not alias the transport buffer"
        );
        assert_eq!(entry.len(), 3);
    }

    #[test]
    fn test_is_local_heuristic() {
        let local = Host::new(Ipv4Addr::LOCALHOST, 13000);
        assert!(local.is_local(13000));
        assert!(!local.is_local(13001), "port must match");
        assert!(
            !host(1, 13000).is_local(13000),
            "non-loopback address is never local"
        );
    }

    #[test]
    fn test_host_display() {
        assert_eq!(host(7, 443).to_string(), "10.0.0.7:443");
    }
}
