//! Splits a file's bytes into fixed-size chunks.
//!
//! The ordered chunk sequence produced here is the file's wire-level
//! representation for one transfer.  Chunks are created once when the
//! session starts and are never mutated afterwards.

/// One fixed-size slice of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position of this chunk in the file.
    pub index: usize,
    /// At most `payload_size` bytes; only the final chunk may be shorter.
    pub bytes: Vec<u8>,
}

impl Chunk {
    /// Sequence number this chunk travels under in a space of `seq_space`.
    pub fn seq(&self, seq_space: u32) -> u16 {
        (self.index % seq_space as usize) as u16
    }
}

/// Split `data` front-to-back into chunks of exactly `payload_size` bytes,
/// the last one holding the remainder.
///
/// Empty input yields no chunks.
///
/// # Panics
///
/// Panics if `payload_size` is zero.  [`crate::config::TransferConfig::validate`]
/// rejects that value before a session is ever built.
pub fn fragment(data: &[u8], payload_size: usize) -> Vec<Chunk> {
    assert!(payload_size >= 1, "payload_size must be at least 1");
    data.chunks(payload_size)
        .enumerate()
        .map(|(index, bytes)| Chunk {
            index,
            bytes: bytes.to_vec(),
        })
        .collect()
}
