//! Listening loop and per-peer session dispatch.
//!
//! # Architecture
//!
//! ```text
//!                 ┌───────────────────────────────┐
//!   datagram ───▶ │ Server::run (single listener) │
//!                 └──────┬─────────────┬──────────┘
//!          2-byte ack    │             │ INFO / DOWNLOAD
//!          from active   │             │
//!          peer          ▼             ▼
//!           SessionRegistry        reply / spawn
//!           (DashMap by peer)          │
//!                 │ mpsc<u16>          ▼
//!                 └──────────▶ TransferSession task
//!                                 (owns window + timer)
//! ```
//!
//! The listener only decodes and forwards.  Every transfer runs in its own
//! tokio task; the shared [`Socket`] is the only resource sessions have in
//! common.

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::catalog::Catalog;
use crate::command::{Command, NOT_FOUND};
use crate::config::{ConfigError, TransferConfig};
use crate::packet::{decode_ack, ACK_LEN};
use crate::session::TransferSession;
use crate::socket::{Socket, SocketError};

/// Acks buffered per session before further ones are dropped.
const ACK_QUEUE: usize = 64;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Socket(#[from] SocketError),
}

/// Listener-side view of one running session.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: u64,
    pub file: String,
    acks: mpsc::Sender<u16>,
}

/// Active sessions keyed by peer address.
pub type SessionRegistry = Arc<DashMap<SocketAddr, SessionHandle>>;

/// A file server speaking the Go-Back-N transfer protocol.
pub struct Server {
    socket: Arc<Socket>,
    catalog: Arc<Catalog>,
    config: TransferConfig,
    sessions: SessionRegistry,
    next_id: u64,
}

impl Server {
    /// Validate `config` and bind the listening socket.
    pub async fn bind(
        addr: SocketAddr,
        catalog: Catalog,
        config: TransferConfig,
    ) -> Result<Self, ServerError> {
        config.validate()?;
        let socket = Socket::bind(addr).await?;
        log::info!("[server] listening on {}", socket.local_addr);
        Ok(Self {
            socket: Arc::new(socket),
            catalog: Arc::new(catalog),
            config,
            sessions: Arc::new(DashMap::new()),
            next_id: 0,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// Shared handle to the registry of running sessions.
    pub fn sessions(&self) -> SessionRegistry {
        Arc::clone(&self.sessions)
    }

    /// Serve forever.
    ///
    /// Nothing that happens to a single datagram or session stops the loop;
    /// errors are logged and the next datagram is read.
    pub async fn run(mut self) {
        loop {
            match self.socket.recv_from().await {
                Ok((bytes, from)) => self.handle_datagram(&bytes, from).await,
                Err(e) => log::warn!("[server] receive failed: {e}"),
            }
        }
    }

    async fn handle_datagram(&mut self, bytes: &[u8], from: SocketAddr) {
        if bytes.len() == ACK_LEN {
            self.route_ack(bytes, from);
            return;
        }
        match Command::parse(bytes) {
            Some(Command::Info(name)) => self.answer_info(&name, from).await,
            Some(Command::Download(name)) => self.start_download(name, from).await,
            None => log::debug!("[server] ignoring {} byte datagram from {from}", bytes.len()),
        }
    }

    /// Forward an ack to the session serving `from`, if there is one.
    fn route_ack(&self, bytes: &[u8], from: SocketAddr) {
        let Ok(ack) = decode_ack(bytes) else {
            return;
        };
        let Some(handle) = self.sessions.get(&from) else {
            log::trace!("[server] stray ACK {ack} from {from}");
            return;
        };
        // A full queue behaves like a lost ack; the session recovers on timeout.
        if handle.acks.try_send(ack).is_err() {
            log::debug!("[server] dropped ACK {ack} for {from} ({})", handle.file);
        }
    }

    async fn answer_info(&self, name: &str, from: SocketAddr) {
        let reply = match self.catalog.size(name) {
            Some(size) => size.to_string(),
            None => NOT_FOUND.to_string(),
        };
        log::debug!("[server] INFO {name:?} from {from} → {reply}");
        self.reply(reply.as_bytes(), from).await;
    }

    async fn start_download(&mut self, name: String, from: SocketAddr) {
        if self.catalog.get(&name).is_none() {
            log::info!("[server] DOWNLOAD {name:?} from {from}: not found");
            self.reply(NOT_FOUND.as_bytes(), from).await;
            return;
        }
        if let Some(active) = self.sessions.get(&from) {
            log::warn!(
                "[server] DOWNLOAD {name:?} from {from} ignored: session {} ({}) still running",
                active.id,
                active.file
            );
            return;
        }

        let id = self.next_id;
        self.next_id += 1;
        let (acks_tx, acks_rx) = mpsc::channel(ACK_QUEUE);
        self.sessions.insert(
            from,
            SessionHandle {
                id,
                file: name.clone(),
                acks: acks_tx,
            },
        );

        let socket = Arc::clone(&self.socket);
        let catalog = Arc::clone(&self.catalog);
        let sessions = Arc::clone(&self.sessions);
        let config = self.config.clone();
        tokio::spawn(async move {
            let opened =
                TransferSession::open(&catalog, &name, from, socket, acks_rx, &config).await;
            let result = match opened {
                Ok(session) => session.run().await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                log::warn!("[server] session {id} ({name} → {from}) aborted: {e}");
            }
            sessions.remove_if(&from, |_, handle| handle.id == id);
        });
    }

    async fn reply(&self, bytes: &[u8], to: SocketAddr) {
        if let Err(e) = self.socket.send_to(bytes, to).await {
            log::warn!("[server] reply to {to} failed: {e}");
        }
    }
}
