//! Go-Back-N receive-side state machine.
//!
//! [`GbnReceiver`] implements the rules a compliant receiver follows:
//!
//! - A datagram whose checksum does not verify is treated as lost: it is
//!   dropped and **never** acknowledged.
//! - Only the **in-order** packet is accepted (seq == `expected mod seq_space`);
//!   its payload is appended and its own sequence number is acknowledged.
//! - Out-of-order or duplicate packets are discarded and the last in-order
//!   sequence number is re-acknowledged (cumulative ACK).  Before anything
//!   has been accepted there is nothing to re-acknowledge.
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility.

use crate::packet::{parse_packet, PacketError};

/// What the caller should do with one inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// In-order packet appended; acknowledge `ack`.
    Accepted { ack: u16 },
    /// Out-of-order or duplicate; re-acknowledge `ack` if there is one.
    Discarded { ack: Option<u16> },
    /// Failed framing or checksum; stay silent.
    Corrupt(PacketError),
}

impl Delivery {
    /// Acknowledgment to send back, if any.
    pub fn ack(&self) -> Option<u16> {
        match self {
            Delivery::Accepted { ack } => Some(*ack),
            Delivery::Discarded { ack } => *ack,
            Delivery::Corrupt(_) => None,
        }
    }
}

/// Go-Back-N receive-side state for one download.
#[derive(Debug)]
pub struct GbnReceiver {
    /// Index of the next chunk expected.
    expected: usize,
    seq_space: u32,
    /// In-order payload bytes received so far.
    data: Vec<u8>,
}

impl GbnReceiver {
    pub fn new(seq_space: u32) -> Self {
        Self {
            expected: 0,
            seq_space,
            data: Vec::new(),
        }
    }

    /// Process one raw datagram.
    pub fn on_datagram(&mut self, buf: &[u8]) -> Delivery {
        let packet = match parse_packet(buf) {
            Ok(p) => p,
            Err(e) => return Delivery::Corrupt(e),
        };
        if packet.seq == self.expected_seq() {
            self.data.extend_from_slice(&packet.payload);
            self.expected += 1;
            Delivery::Accepted { ack: packet.seq }
        } else {
            Delivery::Discarded {
                ack: self.last_in_order(),
            }
        }
    }

    /// Sequence number of the next in-order packet.
    pub fn expected_seq(&self) -> u16 {
        (self.expected % self.seq_space as usize) as u16
    }

    /// Sequence number of the most recently accepted packet.
    pub fn last_in_order(&self) -> Option<u16> {
        self.expected
            .checked_sub(1)
            .map(|i| (i % self.seq_space as usize) as u16)
    }

    /// Number of packets accepted so far.
    pub fn accepted(&self) -> usize {
        self.expected
    }

    /// In-order bytes received so far.
    pub fn received_len(&self) -> usize {
        self.data.len()
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::build_packet;

    #[test]
    fn initial_state() {
        let r = GbnReceiver::new(16);
        assert_eq!(r.expected_seq(), 0);
        assert_eq!(r.last_in_order(), None);
        assert_eq!(r.received_len(), 0);
    }

    #[test]
    fn in_order_packet_accepted_and_acked() {
        let mut r = GbnReceiver::new(16);
        let d = r.on_datagram(&build_packet(0, b"hello"));
        assert_eq!(d, Delivery::Accepted { ack: 0 });
        assert_eq!(r.expected_seq(), 1);
        assert_eq!(r.received_len(), 5);
    }

    #[test]
    fn out_of_order_before_any_accept_is_not_acked() {
        let mut r = GbnReceiver::new(16);
        let d = r.on_datagram(&build_packet(2, b"future"));
        assert_eq!(d, Delivery::Discarded { ack: None });
        assert_eq!(d.ack(), None);
        assert_eq!(r.received_len(), 0);
    }

    #[test]
    fn out_of_order_reacks_last_in_order() {
        let mut r = GbnReceiver::new(16);
        r.on_datagram(&build_packet(0, b"a"));
        r.on_datagram(&build_packet(1, b"b"));
        let d = r.on_datagram(&build_packet(3, b"d"));
        assert_eq!(d.ack(), Some(1));
        assert_eq!(r.received_len(), 2);
    }

    #[test]
    fn duplicate_packet_discarded() {
        let mut r = GbnReceiver::new(16);
        r.on_datagram(&build_packet(0, b"hello"));
        let d = r.on_datagram(&build_packet(0, b"hello"));
        assert_eq!(d, Delivery::Discarded { ack: Some(0) });
        assert_eq!(r.received_len(), 5);
    }

    #[test]
    fn corrupt_packet_is_silently_dropped() {
        let mut r = GbnReceiver::new(16);
        let mut bytes = build_packet(0, b"payload");
        bytes[5] ^= 0x01;
        let d = r.on_datagram(&bytes);
        assert!(matches!(d, Delivery::Corrupt(PacketError::ChecksumFailed { .. })));
        assert_eq!(d.ack(), None);
        assert_eq!(r.expected_seq(), 0);
    }

    #[test]
    fn corrupt_delivery_keeps_its_error_when_cloned() {
        let mut r = GbnReceiver::new(16);
        let mut bytes = build_packet(4, b"xy");
        bytes[2] ^= 0xff;
        let d = r.on_datagram(&bytes);
        let copy = d.clone();
        assert_eq!(copy, d);
        assert!(matches!(copy, Delivery::Corrupt(PacketError::ChecksumFailed { seq: 4, .. })));
    }

    #[test]
    fn seq_wrap_around() {
        let mut r = GbnReceiver::new(4);
        for i in 0..10usize {
            let seq = (i % 4) as u16;
            assert_eq!(r.on_datagram(&build_packet(seq, &[i as u8])).ack(), Some(seq));
        }
        assert_eq!(r.accepted(), 10);
        assert_eq!(r.into_data(), (0u8..10).collect::<Vec<_>>());
    }
}
