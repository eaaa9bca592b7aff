//! Reference downloader.
//!
//! Speaks the receiving side of the protocol: asks for a file's size, sends
//! `DOWNLOAD`, feeds every datagram through a [`GbnReceiver`] and returns the
//! cumulative acks it produces.  Once the announced size has been received it
//! lingers briefly, re-acknowledging retransmissions, so that a lost final
//! ack does not leave the sender retrying.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{timeout, timeout_at, Instant};

use crate::command::{Command, NOT_FOUND};
use crate::config::DEFAULT_SEQ_SPACE;
use crate::packet::encode_ack;
use crate::receiver::{Delivery, GbnReceiver};
use crate::socket::{Socket, SocketError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server does not have {0:?}")]
    NotFound(String),
    #[error("unexpected size reply {0:?}")]
    BadSize(String),
    #[error("no response from server")]
    Stalled,
    #[error(transparent)]
    Socket(#[from] SocketError),
}

/// Client-side timing knobs.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Must match the server's sequence space.
    pub seq_space: u32,
    /// Wait per attempt for a reply to `INFO` or for the first data packet.
    pub request_timeout: Duration,
    /// Attempts for `INFO` and `DOWNLOAD` before giving up.
    pub request_attempts: u32,
    /// Longest silence tolerated once data has started flowing.
    pub stall_timeout: Duration,
    /// Time spent re-acking retransmissions after the last byte arrived.
    pub linger: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            seq_space: DEFAULT_SEQ_SPACE,
            request_timeout: Duration::from_secs(1),
            request_attempts: 5,
            stall_timeout: Duration::from_secs(10),
            linger: Duration::from_secs(1),
        }
    }
}

pub struct Client {
    socket: Socket,
    server: SocketAddr,
    options: ClientOptions,
}

impl Client {
    pub fn new(socket: Socket, server: SocketAddr, options: ClientOptions) -> Self {
        Self {
            socket,
            server,
            options,
        }
    }

    /// Ask the server for the byte length of `name`.
    pub async fn query_size(&self, name: &str) -> Result<u64, ClientError> {
        let request = Command::Info(name.to_string()).encode();
        for attempt in 1..=self.options.request_attempts {
            self.socket.send_to(&request, self.server).await?;
            match timeout(self.options.request_timeout, self.recv_from_server()).await {
                Ok(reply) => return parse_size(name, &reply?),
                Err(_elapsed) => log::debug!("[client] INFO {name:?} attempt {attempt} timed out"),
            }
        }
        Err(ClientError::Stalled)
    }

    /// Download `name` in full.
    pub async fn download(&self, name: &str) -> Result<Vec<u8>, ClientError> {
        let size = self.query_size(name).await? as usize;
        let request = Command::Download(name.to_string()).encode();
        self.socket.send_to(&request, self.server).await?;
        log::info!("[client] downloading {name:?} ({size} bytes) from {}", self.server);

        let mut receiver = GbnReceiver::new(self.options.seq_space);
        let mut attempts = 1;
        while receiver.received_len() < size {
            let wait = if receiver.accepted() == 0 {
                self.options.request_timeout
            } else {
                self.options.stall_timeout
            };
            match timeout(wait, self.recv_from_server()).await {
                Ok(bytes) => {
                    let bytes = bytes?;
                    if bytes == NOT_FOUND.as_bytes() {
                        return Err(ClientError::NotFound(name.to_string()));
                    }
                    self.deliver(&mut receiver, &bytes).await?;
                }
                Err(_elapsed)
                    if receiver.accepted() == 0 && attempts < self.options.request_attempts =>
                {
                    attempts += 1;
                    log::debug!("[client] no data yet; re-sending DOWNLOAD (attempt {attempts})");
                    self.socket.send_to(&request, self.server).await?;
                }
                Err(_elapsed) => return Err(ClientError::Stalled),
            }
        }

        self.linger(&mut receiver).await;
        log::info!("[client] received {name:?}: {} byte(s)", receiver.received_len());
        Ok(receiver.into_data())
    }

    /// Re-ack late retransmissions for `linger`.  Every byte is already in,
    /// so a socket error here only ends the linger early.
    async fn linger(&self, receiver: &mut GbnReceiver) {
        let until = Instant::now() + self.options.linger;
        while let Ok(bytes) = timeout_at(until, self.recv_from_server()).await {
            let delivered = match bytes {
                Ok(bytes) => self.deliver(receiver, &bytes).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = delivered {
                log::debug!("[client] ending linger early: {e}");
                break;
            }
        }
    }

    async fn deliver(&self, receiver: &mut GbnReceiver, bytes: &[u8]) -> Result<(), ClientError> {
        let delivery = receiver.on_datagram(bytes);
        if let Delivery::Corrupt(e) = &delivery {
            log::debug!("[client] dropping datagram: {e}");
        }
        if let Some(ack) = delivery.ack() {
            self.socket.send_to(&encode_ack(ack), self.server).await?;
            log::trace!("[client] → ACK {ack}");
        }
        Ok(())
    }

    /// Next datagram from the server; anything from other addresses is skipped.
    async fn recv_from_server(&self) -> Result<Vec<u8>, SocketError> {
        loop {
            let (bytes, from) = self.socket.recv_from().await?;
            if from == self.server {
                return Ok(bytes);
            }
        }
    }
}

fn parse_size(name: &str, reply: &[u8]) -> Result<u64, ClientError> {
    let text = String::from_utf8_lossy(reply);
    let text = text.trim();
    if text == NOT_FOUND {
        return Err(ClientError::NotFound(name.to_string()));
    }
    text.parse().map_err(|_| ClientError::BadSize(text.to_string()))
}
