//! Wire-format definitions for data packets and acknowledgments.
//!
//! This module is responsible for:
//! - Building a data packet from a sequence number and a payload.
//! - Parsing a raw datagram back into a [`Packet`] and verifying its checksum.
//! - Encoding / decoding the 2-byte acknowledgment datagram.
//!
//! Pure data transformation; sockets live in [`crate::socket`].
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |        Sequence Number        |           Checksum            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Payload ...                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The checksum covers `(seq, 0x0000, payload)`: the checksum field is zero
//! while its own value is computed.  There is no length field; the payload
//! runs to the end of the datagram.
//!
//! An acknowledgment is a bare 2-byte sequence number ([`ACK_LEN`]).

use thiserror::Error;

use crate::checksum::frame_checksum;

/// Byte length of the fixed-size data header on the wire.
pub const HEADER_LEN: usize = 4;

/// Byte length of an acknowledgment datagram.
pub const ACK_LEN: usize = 2;

// Byte offsets of each field within the serialised header.
const OFF_SEQ: usize = 0;
const OFF_CHECKSUM: usize = 2;

/// A data packet: sequence number, checksum and payload.
///
/// Never mutated after construction; a retransmission rebuilds the identical
/// bytes from the same chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number, already reduced modulo the sequence space.
    pub seq: u16,
    /// Checksum as carried in the header.
    ///
    /// For packets built locally this is always the correct value; for parsed
    /// packets it is whatever arrived on the wire.
    pub checksum: u16,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a packet for `seq`, computing its checksum.
    pub fn new(seq: u16, payload: Vec<u8>) -> Self {
        let checksum = frame_checksum(seq, &payload);
        Self {
            seq,
            checksum,
            payload,
        }
    }

    /// Serialise this packet into a newly allocated byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf.extend_from_slice(&self.checksum.to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Split a raw datagram into its fields without checking the checksum.
    ///
    /// Returns [`PacketError::BufferTooShort`] if `buf` cannot hold a header.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::BufferTooShort(buf.len()));
        }
        let seq = u16::from_be_bytes([buf[OFF_SEQ], buf[OFF_SEQ + 1]]);
        let checksum = u16::from_be_bytes([buf[OFF_CHECKSUM], buf[OFF_CHECKSUM + 1]]);
        Ok(Self {
            seq,
            checksum,
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }

    /// `true` when the carried checksum matches one recomputed over
    /// `(seq, 0x0000, payload)`.
    pub fn verify(&self) -> bool {
        frame_checksum(self.seq, &self.payload) == self.checksum
    }
}

/// Frame `payload` under sequence number `seq` and return the wire bytes.
pub fn build_packet(seq: u16, payload: &[u8]) -> Vec<u8> {
    Packet::new(seq, payload.to_vec()).encode()
}

/// Parse and verify a data datagram.
///
/// A receiver must treat [`PacketError::ChecksumFailed`] as a lost packet:
/// drop it silently and never acknowledge it.
pub fn parse_packet(buf: &[u8]) -> Result<Packet, PacketError> {
    let packet = Packet::decode(buf)?;
    if !packet.verify() {
        return Err(PacketError::ChecksumFailed {
            seq: packet.seq,
            carried: packet.checksum,
        });
    }
    Ok(packet)
}

/// Encode a cumulative acknowledgment for `seq`.
pub fn encode_ack(seq: u16) -> [u8; ACK_LEN] {
    seq.to_be_bytes()
}

/// Decode an acknowledgment datagram.  Anything but exactly [`ACK_LEN`] bytes
/// is rejected.
pub fn decode_ack(buf: &[u8]) -> Result<u16, PacketError> {
    match buf {
        [hi, lo] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(PacketError::BadAck(buf.len())),
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("datagram of {0} bytes is too short to contain a header")]
    BufferTooShort(usize),
    #[error("checksum verification failed for seq {seq} (carried {carried:#06x})")]
    ChecksumFailed { seq: u16, carried: u16 },
    #[error("acknowledgment must be 2 bytes, got {0}")]
    BadAck(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::checksum;

    #[test]
    fn build_parse_roundtrip() {
        let bytes = build_packet(7, b"hello");
        let pkt = parse_packet(&bytes).unwrap();
        assert_eq!(pkt.seq, 7);
        assert_eq!(pkt.payload, b"hello");
        assert!(pkt.verify());
    }

    #[test]
    fn header_layout_is_big_endian() {
        let bytes = build_packet(0x0102, b"");
        assert_eq!(&bytes[OFF_SEQ..OFF_SEQ + 2], &[0x01, 0x02]);
        assert_eq!(bytes.len(), HEADER_LEN);
    }

    #[test]
    fn checksum_is_computed_with_zeroed_field() {
        let bytes = build_packet(3, b"abc");
        let mut zeroed = bytes.clone();
        zeroed[OFF_CHECKSUM] = 0;
        zeroed[OFF_CHECKSUM + 1] = 0;
        let carried = u16::from_be_bytes([bytes[OFF_CHECKSUM], bytes[OFF_CHECKSUM + 1]]);
        assert_eq!(carried, checksum(&zeroed));
    }

    #[test]
    fn encoded_length_equals_header_plus_payload() {
        let payload = [0x5au8; 1456];
        assert_eq!(build_packet(0, &payload).len(), HEADER_LEN + payload.len());
    }

    #[test]
    fn decode_short_buffer_returns_error() {
        assert_eq!(Packet::decode(&[]), Err(PacketError::BufferTooShort(0)));
        assert_eq!(
            Packet::decode(&[0u8; HEADER_LEN - 1]),
            Err(PacketError::BufferTooShort(HEADER_LEN - 1))
        );
    }

    #[test]
    fn corrupt_payload_fails_verification() {
        let mut bytes = build_packet(9, b"test payload");
        bytes[HEADER_LEN + 2] ^= 0x10;
        assert!(matches!(
            parse_packet(&bytes),
            Err(PacketError::ChecksumFailed { seq: 9, .. })
        ));
    }

    #[test]
    fn any_single_bit_flip_is_detected() {
        let bytes = build_packet(5, b"some file bytes!!");
        for byte in 0..bytes.len() {
            for bit in 0..8 {
                let mut corrupt = bytes.clone();
                corrupt[byte] ^= 1 << bit;
                assert!(
                    parse_packet(&corrupt).is_err(),
                    "flip at byte {byte} bit {bit} went undetected"
                );
            }
        }
    }

    #[test]
    fn ack_codec() {
        assert_eq!(encode_ack(0x0a0b), [0x0a, 0x0b]);
        assert_eq!(decode_ack(&[0x00, 0x0f]), Ok(15));
        assert_eq!(decode_ack(&[0x00]), Err(PacketError::BadAck(1)));
        assert_eq!(decode_ack(b"INFO x"), Err(PacketError::BadAck(6)));
    }
}
