//! One file transfer to one peer.
//!
//! # Loop
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            ▼                                              │
//!   send every chunk the window permits                     │
//!            │                                              │
//!   base == total? ──yes──▶ done                            │
//!            │ no                                           │
//!   wait for ack until base.sent_at + timeout               │
//!            ├── Ack(a)    → slide window ──────────────────┤
//!            ├── Elapsed   → resend [base, next_seq) ───────┘
//!            └── Closed    → abort
//! ```
//!
//! A [`TransferSession`] owns its chunks, its [`GbnWindow`] and its
//! [`RetransmitTimer`] exclusively.  The only things it shares are the
//! outbound [`DatagramSink`] and the receiving end of an ack channel fed by
//! whoever demultiplexes inbound datagrams (see [`crate::server`]).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::catalog::{Catalog, CatalogError};
use crate::config::{ConfigError, TransferConfig};
use crate::fragment::{fragment, Chunk};
use crate::packet::build_packet;
use crate::socket::{DatagramSink, SocketError};
use crate::timer::{AckWait, Expiry, RetransmitTimer};
use crate::window::GbnWindow;

/// Why a session stopped before every chunk was acknowledged.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid transfer configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot read file: {0}")]
    Read(#[from] CatalogError),
    #[error("send failed: {0}")]
    Send(#[source] SocketError),
    #[error("gave up after {0} consecutive timeouts without progress")]
    RetriesExhausted(u32),
    #[error("ack channel closed")]
    Detached,
}

/// Summary of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub file: String,
    pub peer: SocketAddr,
    pub chunks: usize,
    pub bytes: usize,
    /// Every data datagram handed to the sink, retransmissions included.
    pub packets_sent: u64,
    pub retransmissions: u64,
    pub elapsed: Duration,
}

/// Go-Back-N sender for one file and one peer.
pub struct TransferSession<S: DatagramSink> {
    file: String,
    peer: SocketAddr,
    chunks: Vec<Chunk>,
    bytes: usize,
    window: GbnWindow,
    timer: RetransmitTimer,
    sink: Arc<S>,
    acks: mpsc::Receiver<u16>,
    packets_sent: u64,
    retransmissions: u64,
}

impl<S: DatagramSink> TransferSession<S> {
    /// Build a session over `data`, fragmenting it once.
    pub fn new(
        file: impl Into<String>,
        data: &[u8],
        peer: SocketAddr,
        sink: Arc<S>,
        acks: mpsc::Receiver<u16>,
        config: &TransferConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let chunks = fragment(data, config.payload_size);
        let window = GbnWindow::new(chunks.len(), config.window_size, config.seq_space);
        Ok(Self {
            file: file.into(),
            peer,
            chunks,
            bytes: data.len(),
            window,
            timer: RetransmitTimer::new(config.timeout, config.max_retries),
            sink,
            acks,
            packets_sent: 0,
            retransmissions: 0,
        })
    }

    /// Read `name` from the catalog and build a session for it.
    ///
    /// A read failure aborts here, before any packet is sent.
    pub async fn open(
        catalog: &Catalog,
        name: &str,
        peer: SocketAddr,
        sink: Arc<S>,
        acks: mpsc::Receiver<u16>,
        config: &TransferConfig,
    ) -> Result<Self, SessionError> {
        let data = catalog.read(name).await?;
        Self::new(name, &data, peer, sink, acks, config)
    }

    pub fn window(&self) -> &GbnWindow {
        &self.window
    }

    /// Drive the transfer until every chunk is acknowledged.
    pub async fn run(mut self) -> Result<TransferReport, SessionError> {
        let started = Instant::now();
        log::info!(
            "[session {} {}] start: {} byte(s) in {} chunk(s)",
            self.peer,
            self.file,
            self.bytes,
            self.chunks.len()
        );

        loop {
            self.send_window().await?;
            if self.window.is_complete() {
                break;
            }

            let deadline = self
                .timer
                .deadline(&self.window)
                .unwrap_or_else(|| Instant::now() + self.timer.timeout());

            match self.timer.wait_for_ack(&mut self.acks, deadline).await {
                AckWait::Ack(ack) => self.on_ack(ack),
                AckWait::Elapsed => self.on_timeout().await?,
                AckWait::Closed => return Err(SessionError::Detached),
            }
        }

        let report = TransferReport {
            file: self.file,
            peer: self.peer,
            chunks: self.chunks.len(),
            bytes: self.bytes,
            packets_sent: self.packets_sent,
            retransmissions: self.retransmissions,
            elapsed: started.elapsed(),
        };
        log::info!(
            "[session {} {}] complete: {} packet(s), {} retransmitted, {:?}",
            report.peer,
            report.file,
            report.packets_sent,
            report.retransmissions,
            report.elapsed
        );
        Ok(report)
    }

    /// Send step: transmit every chunk the window currently permits.
    async fn send_window(&mut self) -> Result<(), SessionError> {
        while let Some(index) = self.window.next_sendable() {
            self.transmit(index).await?;
            self.window.record_sent(Instant::now());
        }
        Ok(())
    }

    fn on_ack(&mut self, ack: u16) {
        let slid = self.window.on_ack(ack);
        if slid > 0 {
            self.timer.on_progress();
            log::debug!(
                "[session {} {}] ← ACK {} (slid {}, base={})",
                self.peer,
                self.file,
                ack,
                slid,
                self.window.base()
            );
        } else {
            log::trace!(
                "[session {} {}] ← ACK {} ignored (outstanding {:?})",
                self.peer,
                self.file,
                ack,
                self.window.outstanding()
            );
        }
    }

    /// Go-Back-N step: resend every chunk in `[base, next_seq)` once.
    async fn on_timeout(&mut self) -> Result<(), SessionError> {
        let attempt = match self.timer.on_expiry() {
            Expiry::Retransmit(n) => n,
            Expiry::GiveUp(n) => {
                log::warn!(
                    "[session {} {}] aborting: {} consecutive timeouts at base={}",
                    self.peer,
                    self.file,
                    n,
                    self.window.base()
                );
                return Err(SessionError::RetriesExhausted(n));
            }
        };

        let range = self.window.outstanding();
        log::debug!(
            "[session {} {}] timeout #{}, retransmitting {:?}",
            self.peer,
            self.file,
            attempt,
            range
        );
        for index in range {
            self.transmit(index).await?;
            self.retransmissions += 1;
        }
        self.window.on_retransmit(Instant::now());
        Ok(())
    }

    async fn transmit(&mut self, index: usize) -> Result<(), SessionError> {
        let seq = self.window.seq_of(index);
        let bytes = build_packet(seq, &self.chunks[index].bytes);
        self.sink
            .send_datagram(&bytes, self.peer)
            .await
            .map_err(SessionError::Send)?;
        self.packets_sent += 1;
        log::trace!(
            "[session {} {}] → DATA index={} seq={} len={}",
            self.peer,
            self.file,
            index,
            seq,
            bytes.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SimulatedLink;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn small_config() -> TransferConfig {
        TransferConfig {
            payload_size: 4,
            ..TransferConfig::default()
        }
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let (link, _rx) = SimulatedLink::perfect();
        let (_tx, acks) = mpsc::channel(8);
        let config = TransferConfig {
            window_size: 16,
            ..TransferConfig::default()
        };
        let result = TransferSession::new("f", b"data", peer(), Arc::new(link), acks, &config);
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[tokio::test]
    async fn new_fragments_once() {
        let (link, _rx) = SimulatedLink::perfect();
        let (_tx, acks) = mpsc::channel(8);
        let s = TransferSession::new("f", &[1u8; 10], peer(), Arc::new(link), acks, &small_config())
            .unwrap();
        assert_eq!(s.window().total(), 3);
        assert_eq!(s.window().base(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_file_sends_nothing() {
        let (link, mut rx) = SimulatedLink::perfect();
        let link = Arc::new(link);
        let (_tx, acks) = mpsc::channel(8);
        let report = TransferSession::new("empty", b"", peer(), link.clone(), acks, &small_config())
            .unwrap()
            .run()
            .await
            .unwrap();
        assert_eq!(report.chunks, 0);
        assert_eq!(report.packets_sent, 0);
        assert!(link.transmissions().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_ack_channel_detaches() {
        let (link, _rx) = SimulatedLink::perfect();
        let (tx, acks) = mpsc::channel(8);
        drop(tx);
        let config = small_config();
        let result = TransferSession::new("f", b"abcdefgh", peer(), Arc::new(link), acks, &config)
            .unwrap()
            .run()
            .await;
        assert!(matches!(result, Err(SessionError::Detached)));
    }

    #[tokio::test]
    async fn open_unknown_file_fails_before_sending() {
        let (link, _rx) = SimulatedLink::perfect();
        let link = Arc::new(link);
        let (_tx, acks) = mpsc::channel(8);
        let catalog = Catalog::default();
        let config = small_config();
        let result =
            TransferSession::open(&catalog, "missing", peer(), link.clone(), acks, &config).await;
        assert!(matches!(result, Err(SessionError::Read(CatalogError::NotFound(_)))));
        assert!(link.transmissions().is_empty());
    }
}
