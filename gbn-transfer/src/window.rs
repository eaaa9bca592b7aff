//! Go-Back-N send-side window over a fixed sequence of chunks.
//!
//! [`GbnWindow`] maintains a sliding window of up to `N` in-flight chunks.
//!
//! # Protocol contract
//!
//! - At most `window_size` chunks may be in flight at once.
//! - Chunk `i` travels under sequence number `i mod seq_space`.
//! - ACKs are **cumulative**: ack `a` means the peer holds every chunk up to
//!   and including the outstanding one whose sequence number is `a`.
//! - On timeout, the caller retransmits **all** chunks in `[base, next_seq)`.
//! - `window_size < seq_space`, so no two in-flight chunks share a sequence
//!   number and an ack maps to at most one outstanding chunk.
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility.

use std::collections::VecDeque;
use std::ops::Range;

use tokio::time::Instant;

/// Bookkeeping for one in-flight chunk.
#[derive(Debug, Clone)]
pub struct InFlight {
    /// Chunk index.
    pub index: usize,
    /// Total number of times this chunk has been transmitted.
    pub tx_count: u32,
    /// Time of the most recent transmission.
    pub sent_at: Instant,
}

/// Go-Back-N send-side state for one transfer.
///
/// ```text
///      base              next_seq
///        │                  │
///  ──────┼──────────────────┼───────────────┼──▶ chunk index
///  acked │ <── in flight ──▶│ <── sendable ▶│
///                                      base + N
/// ```
///
/// Invariant: `base <= next_seq <= min(total, base + window_size)`.
#[derive(Debug)]
pub struct GbnWindow {
    /// Index of the oldest unacknowledged chunk (left window edge).
    base: usize,
    /// Index of the next chunk not yet sent.
    next_seq: usize,
    total: usize,
    window_size: usize,
    seq_space: u32,
    /// One entry per index in `[base, next_seq)`, oldest first.
    in_flight: VecDeque<InFlight>,
}

impl GbnWindow {
    /// Create a window over `total` chunks.
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is zero or not smaller than `seq_space`.
    pub fn new(total: usize, window_size: usize, seq_space: u32) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        assert!(
            (window_size as u64) < u64::from(seq_space),
            "window_size {window_size} must be below seq_space {seq_space}"
        );
        Self {
            base: 0,
            next_seq: 0,
            total,
            window_size,
            seq_space,
            in_flight: VecDeque::with_capacity(window_size),
        }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn next_seq(&self) -> usize {
        self.next_seq
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Sequence number carried by chunk `index`.
    pub fn seq_of(&self, index: usize) -> u16 {
        (index % self.seq_space as usize) as u16
    }

    /// Index of the next chunk the window permits sending, if any.
    ///
    /// Call [`record_sent`](Self::record_sent) after transmitting it.
    pub fn next_sendable(&self) -> Option<usize> {
        (self.next_seq < self.base + self.window_size && self.next_seq < self.total)
            .then_some(self.next_seq)
    }

    /// Mark the chunk at `next_seq` as transmitted at `now` and advance
    /// `next_seq`.
    pub fn record_sent(&mut self, now: Instant) {
        debug_assert!(
            self.next_sendable().is_some(),
            "record_sent called on a full window (base={} next_seq={} total={})",
            self.base,
            self.next_seq,
            self.total
        );
        self.in_flight.push_back(InFlight {
            index: self.next_seq,
            tx_count: 1,
            sent_at: now,
        });
        self.next_seq += 1;
    }

    /// Process a cumulative ACK and return the number of newly acknowledged
    /// chunks.
    ///
    /// The ack is matched against the outstanding range `[base, next_seq)`
    /// only.  A duplicate, stale or far-future ack matches nothing and leaves
    /// the window untouched, so `base` can never pass `next_seq`.
    pub fn on_ack(&mut self, ack: u16) -> usize {
        let Some(acked) = self.outstanding().find(|&i| self.seq_of(i) == ack) else {
            return 0;
        };
        let slid = acked + 1 - self.base;
        self.in_flight.drain(..slid);
        self.base = acked + 1;
        slid
    }

    /// Indices currently awaiting acknowledgement.
    pub fn outstanding(&self) -> Range<usize> {
        self.base..self.next_seq
    }

    /// Number of chunks currently awaiting acknowledgement.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Iterate over all in-flight chunks from oldest to newest.
    pub fn entries(&self) -> impl Iterator<Item = &InFlight> {
        self.in_flight.iter()
    }

    /// Increment the transmission count and refresh `sent_at` for every
    /// in-flight chunk.
    ///
    /// Call this immediately after retransmitting the entire window.
    pub fn on_retransmit(&mut self, now: Instant) {
        for entry in self.in_flight.iter_mut() {
            entry.tx_count += 1;
            entry.sent_at = now;
        }
    }

    /// Time when the oldest in-flight chunk (`base`) was last sent.
    ///
    /// Returns `None` when nothing is in flight.
    pub fn oldest_sent_at(&self) -> Option<Instant> {
        self.in_flight.front().map(|e| e.sent_at)
    }

    /// `true` once every chunk has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.base == self.total
    }
}
