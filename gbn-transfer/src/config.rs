//! Tunable transfer parameters.
//!
//! Defaults reproduce the reference deployment: 1456-byte payloads (a 1500
//! byte Ethernet frame minus IP/UDP and our 4-byte header, with headroom),
//! a window of 4 over a sequence space of 16, and a 0.5s retransmit timeout.

use std::time::Duration;

use thiserror::Error;

use crate::packet::HEADER_LEN;

pub const DEFAULT_PAYLOAD_SIZE: usize = 1456;
pub const DEFAULT_WINDOW_SIZE: usize = 4;
pub const DEFAULT_SEQ_SPACE: u32 = 16;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Largest payload a single UDP/IPv4 datagram can carry.
pub const MAX_DATAGRAM_PAYLOAD: usize = 65_507;

/// Sequence numbers travel in a 2-byte field.
const MAX_SEQ_SPACE: u32 = 1 << 16;

/// Parameters shared by every session a server runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Maximum payload bytes per data packet.
    pub payload_size: usize,
    /// Maximum number of unacknowledged packets in flight (GBN `N`).
    pub window_size: usize,
    /// Sequence numbers are chunk indices modulo this value.
    pub seq_space: u32,
    /// Retransmit deadline, measured from the last (re)send of `base`.
    pub timeout: Duration,
    /// Consecutive expired deadlines tolerated without ack progress.
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            payload_size: DEFAULT_PAYLOAD_SIZE,
            window_size: DEFAULT_WINDOW_SIZE,
            seq_space: DEFAULT_SEQ_SPACE,
            timeout: DEFAULT_TIMEOUT,
            max_retries: None,
        }
    }
}

impl TransferConfig {
    /// Check every invariant the window controller relies on.
    ///
    /// `window_size < seq_space` is the one that matters for correctness: with
    /// a larger window two in-flight packets could share a sequence number and
    /// a cumulative ack would be ambiguous.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.payload_size == 0 {
            return Err(ConfigError::ZeroPayload);
        }
        if self.payload_size + HEADER_LEN > MAX_DATAGRAM_PAYLOAD {
            return Err(ConfigError::PayloadTooLarge(self.payload_size));
        }
        if !(2..=MAX_SEQ_SPACE).contains(&self.seq_space) {
            return Err(ConfigError::SeqSpaceOutOfRange(self.seq_space));
        }
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.window_size as u64 >= u64::from(self.seq_space) {
            return Err(ConfigError::WindowTooLarge {
                window: self.window_size,
                seq_space: self.seq_space,
            });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Receive buffer size needed for one data datagram.
    pub fn datagram_len(&self) -> usize {
        HEADER_LEN + self.payload_size
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("payload size must be at least 1 byte")]
    ZeroPayload,
    #[error("payload size {0} does not fit in a UDP datagram")]
    PayloadTooLarge(usize),
    #[error("sequence space {0} must be between 2 and 65536")]
    SeqSpaceOutOfRange(u32),
    #[error("window size must be at least 1")]
    ZeroWindow,
    #[error("window size {window} must be smaller than the sequence space {seq_space}")]
    WindowTooLarge { window: usize, seq_space: u32 },
    #[error("retransmit timeout must be non-zero")]
    ZeroTimeout,
}
