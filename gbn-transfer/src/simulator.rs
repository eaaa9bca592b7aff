//! Fault-injecting network link for deterministic testing.
//!
//! Real networks drop, reorder, duplicate and corrupt datagrams.  To exercise
//! the retransmission machinery without depending on actual network
//! conditions, [`SimulatedLink`] implements [`DatagramSink`] and forwards
//! every datagram into an in-memory channel after applying a fault model:
//!
//! | Fault            | Description                                       |
//! |------------------|---------------------------------------------------|
//! | Targeted loss    | Drop the first transmission of listed seq numbers.|
//! | Packet loss      | Drop a datagram with probability `loss_rate`.     |
//! | Corruption       | Flip one random bit with `corrupt_rate`.          |
//! | Reordering       | Hold a datagram back until the next one is sent.  |
//! | Duplication      | Deliver a datagram twice with `duplicate_rate`.   |
//!
//! Random faults come from a [`StdRng`] seeded by [`SimulatorConfig::seed`],
//! so a failing run can be replayed exactly.

use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::packet::Packet;
use crate::socket::{DatagramSink, SocketError};

/// Configuration for the fault-injection model.
///
/// All probabilities are clamped to `[0.0, 1.0]`.
#[derive(Debug, Clone, Default)]
pub struct SimulatorConfig {
    /// Probability that any given datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that a datagram is delivered twice.
    pub duplicate_rate: f64,
    /// Probability that one bit of a datagram is flipped.
    pub corrupt_rate: f64,
    /// Probability that a datagram is held back and delivered after the next.
    pub reorder_rate: f64,
    /// Sequence numbers whose first transmission is dropped.
    pub drop_first: Vec<u16>,
    /// RNG seed for the random faults.
    pub seed: u64,
}

/// A datagram that made it across the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub bytes: Vec<u8>,
    pub dest: SocketAddr,
    /// Time the sender handed it to the link.
    pub sent_at: Instant,
}

/// What happened to one send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Delivered,
    Dropped,
    Corrupted,
    Duplicated,
    Reordered,
}

/// One entry of the link's transmission log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmission {
    /// Sequence number, when the datagram framed as a data packet.
    pub seq: Option<u16>,
    pub at: Instant,
    pub fate: Fate,
}

struct LinkState {
    rng: StdRng,
    pending_drops: Vec<u16>,
    held: Option<Datagram>,
    log: Vec<Transmission>,
}

/// A fault-injecting [`DatagramSink`].
pub struct SimulatedLink {
    config: SimulatorConfig,
    state: Mutex<LinkState>,
    out: mpsc::UnboundedSender<Datagram>,
}

impl SimulatedLink {
    /// Create a link and the receiving end of its delivery channel.
    pub fn new(config: SimulatorConfig) -> (Self, mpsc::UnboundedReceiver<Datagram>) {
        let (out, rx) = mpsc::unbounded_channel();
        let state = LinkState {
            rng: StdRng::seed_from_u64(config.seed),
            pending_drops: config.drop_first.clone(),
            held: None,
            log: Vec::new(),
        };
        let link = Self {
            config,
            state: Mutex::new(state),
            out,
        };
        (link, rx)
    }

    /// A transparent link: everything is delivered once, in order.
    pub fn perfect() -> (Self, mpsc::UnboundedReceiver<Datagram>) {
        Self::new(SimulatorConfig::default())
    }

    /// Every send attempt so far, in order.
    pub fn transmissions(&self) -> Vec<Transmission> {
        self.lock().log.clone()
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, dgram: Datagram) {
        // A closed channel is a peer that stopped listening; the datagram is lost.
        let _ = self.out.send(dgram);
    }

    fn transmit(&self, bytes: &[u8], dest: SocketAddr) {
        let at = Instant::now();
        let seq = Packet::decode(bytes).ok().map(|p| p.seq);
        let mut st = self.lock();
        let record = |st: &mut LinkState, fate| st.log.push(Transmission { seq, at, fate });

        let targeted = seq.and_then(|s| st.pending_drops.iter().position(|&d| d == s));
        if let Some(pos) = targeted {
            st.pending_drops.remove(pos);
            record(&mut *st, Fate::Dropped);
            return;
        }
        if roll(&mut st.rng, self.config.loss_rate) {
            record(&mut *st, Fate::Dropped);
            return;
        }

        let mut dgram = Datagram {
            bytes: bytes.to_vec(),
            dest,
            sent_at: at,
        };
        let mut fate = Fate::Delivered;
        if !dgram.bytes.is_empty() && roll(&mut st.rng, self.config.corrupt_rate) {
            let byte = st.rng.random_range(0..dgram.bytes.len());
            let bit = st.rng.random_range(0..8u32);
            dgram.bytes[byte] ^= 1 << bit;
            fate = Fate::Corrupted;
        }
        if st.held.is_none() && roll(&mut st.rng, self.config.reorder_rate) {
            st.held = Some(dgram);
            record(&mut *st, Fate::Reordered);
            return;
        }
        let duplicate = roll(&mut st.rng, self.config.duplicate_rate);
        if duplicate {
            fate = Fate::Duplicated;
        }
        record(&mut *st, fate);
        let held = st.held.take();
        drop(st);

        if duplicate {
            self.deliver(dgram.clone());
        }
        self.deliver(dgram);
        if let Some(late) = held {
            self.deliver(late);
        }
    }
}

fn roll(rng: &mut StdRng, p: f64) -> bool {
    p > 0.0 && rng.random_bool(p.clamp(0.0, 1.0))
}

impl DatagramSink for SimulatedLink {
    async fn send_datagram(&self, bytes: &[u8], dest: SocketAddr) -> Result<(), SocketError> {
        self.transmit(bytes, dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::build_packet;

    fn dest() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Datagram>) -> Vec<Datagram> {
        let mut out = Vec::new();
        while let Ok(d) = rx.try_recv() {
            out.push(d);
        }
        out
    }

    #[tokio::test]
    async fn perfect_link_is_transparent() {
        let (link, mut rx) = SimulatedLink::perfect();
        for seq in 0..5u16 {
            link.send_datagram(&build_packet(seq, b"x"), dest()).await.unwrap();
        }
        let got: Vec<u16> = drain(&mut rx)
            .iter()
            .map(|d| Packet::decode(&d.bytes).unwrap().seq)
            .collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn drop_first_only_drops_once() {
        let (link, mut rx) = SimulatedLink::new(SimulatorConfig {
            drop_first: vec![1],
            ..SimulatorConfig::default()
        });
        link.send_datagram(&build_packet(1, b"a"), dest()).await.unwrap();
        link.send_datagram(&build_packet(1, b"a"), dest()).await.unwrap();
        assert_eq!(drain(&mut rx).len(), 1);
        let fates: Vec<Fate> = link.transmissions().iter().map(|t| t.fate).collect();
        assert_eq!(fates, vec![Fate::Dropped, Fate::Delivered]);
    }

    #[tokio::test]
    async fn full_loss_delivers_nothing() {
        let (link, mut rx) = SimulatedLink::new(SimulatorConfig {
            loss_rate: 1.0,
            ..SimulatorConfig::default()
        });
        link.send_datagram(b"anything", dest()).await.unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn corruption_breaks_checksum() {
        let (link, mut rx) = SimulatedLink::new(SimulatorConfig {
            corrupt_rate: 1.0,
            seed: 7,
            ..SimulatorConfig::default()
        });
        link.send_datagram(&build_packet(0, b"payload"), dest()).await.unwrap();
        let got = drain(&mut rx);
        assert_eq!(got.len(), 1);
        assert!(crate::packet::parse_packet(&got[0].bytes).is_err());
    }

    #[tokio::test]
    async fn reorder_swaps_adjacent_datagrams() {
        let (link, mut rx) = SimulatedLink::new(SimulatorConfig {
            reorder_rate: 1.0,
            ..SimulatorConfig::default()
        });
        link.send_datagram(&build_packet(0, b"a"), dest()).await.unwrap();
        link.send_datagram(&build_packet(1, b"b"), dest()).await.unwrap();
        let got: Vec<u16> = drain(&mut rx)
            .iter()
            .map(|d| Packet::decode(&d.bytes).unwrap().seq)
            .collect();
        assert_eq!(got, vec![1, 0]);
    }

    #[tokio::test]
    async fn same_seed_same_faults() {
        let config = SimulatorConfig {
            loss_rate: 0.3,
            duplicate_rate: 0.2,
            seed: 42,
            ..SimulatorConfig::default()
        };
        let run = |config: SimulatorConfig| async move {
            let (link, _rx) = SimulatedLink::new(config);
            for seq in 0..64u16 {
                link.send_datagram(&build_packet(seq % 16, b"z"), dest()).await.unwrap();
            }
            link.transmissions().iter().map(|t| t.fate).collect::<Vec<_>>()
        };
        assert_eq!(run(config.clone()).await, run(config).await);
    }
}
