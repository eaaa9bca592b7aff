//! Retransmit timer for one transfer session.
//!
//! Go-Back-N keeps a single deadline per window, not one per packet: the
//! deadline is `timeout` after the oldest outstanding chunk (`base`) was last
//! (re)sent.  When `base` advances, the deadline moves with it; when it
//! expires, the whole in-flight range is resent once and every timestamp is
//! refreshed.
//!
//! Waiting for an ack is expressed as an [`AckWait`] value, so the session
//! loop matches on "ack arrived" vs "deadline elapsed" rather than treating
//! the timeout as an error.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

use crate::window::GbnWindow;

/// Outcome of a bounded wait for the next acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckWait {
    /// An ack datagram arrived carrying this sequence number.
    Ack(u16),
    /// The deadline passed with no ack.
    Elapsed,
    /// The ack source was dropped; no ack can ever arrive again.
    Closed,
}

/// What the session should do after a deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Retransmit the window; carries the consecutive-timeout count.
    Retransmit(u32),
    /// The retry ceiling was exceeded.
    GiveUp(u32),
}

/// Retransmit deadline and retry accounting for one session.
#[derive(Debug)]
pub struct RetransmitTimer {
    timeout: Duration,
    max_retries: Option<u32>,
    /// Consecutive expiries without ack progress.
    retries: u32,
}

impl RetransmitTimer {
    pub fn new(timeout: Duration, max_retries: Option<u32>) -> Self {
        Self {
            timeout,
            max_retries,
            retries: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Deadline for the current window, or `None` when nothing is in flight.
    pub fn deadline(&self, window: &GbnWindow) -> Option<Instant> {
        window.oldest_sent_at().map(|sent| sent + self.timeout)
    }

    /// Wait for the next ack until `deadline`.
    pub async fn wait_for_ack(&self, acks: &mut mpsc::Receiver<u16>, deadline: Instant) -> AckWait {
        match timeout_at(deadline, acks.recv()).await {
            Ok(Some(ack)) => AckWait::Ack(ack),
            Ok(None) => AckWait::Closed,
            Err(_elapsed) => AckWait::Elapsed,
        }
    }

    /// The window advanced; the retry streak is over.
    pub fn on_progress(&mut self) {
        self.retries = 0;
    }

    /// Record an expired deadline.
    pub fn on_expiry(&mut self) -> Expiry {
        self.retries += 1;
        match self.max_retries {
            Some(max) if self.retries > max => Expiry::GiveUp(self.retries),
            _ => Expiry::Retransmit(self.retries),
        }
    }
}
