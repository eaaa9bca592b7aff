//! 16-bit integrity checksum used by the packet framer.
//!
//! The construction follows the Internet checksum (RFC 1071): the buffer is
//! treated as a sequence of big-endian 16-bit words, an odd trailing byte is
//! padded with a zero byte on the right, the words are summed and the result
//! is complemented.
//!
//! Unlike RFC 1071, carries out of the low 16 bits are **not** folded back
//! into the sum: the wide sum is truncated to its low 16 bits before
//! complementing, as every existing peer of this protocol computes it.
//!
//! Every single-bit flip still changes the low 16 bits of the sum (it adds or
//! subtracts a power of two below 2^16), so single-bit corruption is always
//! detected.

/// Checksum over an arbitrary byte buffer.
pub fn checksum(buf: &[u8]) -> u16 {
    !(word_sum(buf) as u16)
}

/// Checksum of a data frame: computed over `(seq, 0x0000, payload)`.
///
/// Equivalent to `checksum(&[seq_hi, seq_lo, 0, 0, payload..])` without
/// allocating the concatenation.  The header is an even number of bytes, so
/// the payload's word alignment is unchanged.
pub fn frame_checksum(seq: u16, payload: &[u8]) -> u16 {
    let sum = u64::from(seq) + word_sum(payload);
    !(sum as u16)
}

/// Sum of big-endian 16-bit words, without carry folding.
fn word_sum(buf: &[u8]) -> u64 {
    let mut words = buf.chunks_exact(2);
    let mut sum: u64 = words
        .by_ref()
        .map(|w| u64::from(u16::from_be_bytes([w[0], w[1]])))
        .sum();
    // Odd trailing byte: pad with a zero byte on the right.
    if let [last] = words.remainder() {
        sum += u64::from(*last) << 8;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_is_all_ones() {
        assert_eq!(checksum(&[]), 0xffff);
    }

    #[test]
    fn single_word() {
        assert_eq!(checksum(&[0x12, 0x34]), !0x1234);
    }

    #[test]
    fn odd_length_pads_on_the_right() {
        assert_eq!(checksum(&[0xab]), checksum(&[0xab, 0x00]));
        assert_eq!(checksum(&[0x01, 0x02, 0x03]), !(0x0102u16 + 0x0300));
    }

    #[test]
    fn carry_is_truncated_not_folded() {
        // 0xffff + 0x0002 = 0x1_0001; low 16 bits = 0x0001.
        // A folding implementation would give !(0x0002) instead.
        assert_eq!(checksum(&[0xff, 0xff, 0x00, 0x02]), !0x0001);
    }

    #[test]
    fn frame_checksum_matches_concatenated_buffer() {
        let payload = b"odd-length payload";
        let mut buf = vec![0x00, 0x0b, 0x00, 0x00];
        buf.extend_from_slice(payload);
        assert_eq!(frame_checksum(11, payload), checksum(&buf));
    }

    #[test]
    fn every_single_bit_flip_changes_checksum() {
        let data: Vec<u8> = (0u8..=40).collect();
        let original = checksum(&data);
        for byte in 0..data.len() {
            for bit in 0..8 {
                let mut corrupt = data.clone();
                corrupt[byte] ^= 1 << bit;
                assert_ne!(checksum(&corrupt), original, "flip at {byte}:{bit} undetected");
            }
        }
    }
}
