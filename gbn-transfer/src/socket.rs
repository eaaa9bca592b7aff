//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket`.  All protocol
//! logic lives elsewhere; this module owns only byte I/O.
//!
//! Sessions do not talk to [`Socket`] directly but to the [`DatagramSink`]
//! trait, so the same session code runs over a real socket or over
//! [`crate::simulator::SimulatedLink`].

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;

/// Maximum UDP payload size (theoretical limit; in practice kept much smaller).
const MAX_DATAGRAM: usize = 65_535;

/// Errors that can arise from socket operations.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("socket I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Outbound half of a datagram transport.
///
/// A datagram send is atomic at the syscall boundary, so implementations
/// may be shared by many sessions without extra locking.
pub trait DatagramSink: Send + Sync + 'static {
    /// Send `bytes` as a single datagram to `dest`.
    fn send_datagram(
        &self,
        bytes: &[u8],
        dest: SocketAddr,
    ) -> impl Future<Output = Result<(), SocketError>> + Send;
}

/// An async, datagram-oriented UDP socket.
///
/// All methods are `&self` so the socket can be shared across tasks.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Send `bytes` as a single UDP datagram to `dest`.
    pub async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> Result<(), SocketError> {
        self.inner.send_to(bytes, dest).await?;
        Ok(())
    }

    /// Receive the next datagram.
    ///
    /// Returns `(bytes, sender_address)`.  Decoding is left to the caller,
    /// which knows whether it expects a command, an ack or a data packet.
    pub async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), SocketError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (n, addr) = self.inner.recv_from(&mut buf).await?;
        buf.truncate(n);
        Ok((buf, addr))
    }
}

impl DatagramSink for Socket {
    async fn send_datagram(&self, bytes: &[u8], dest: SocketAddr) -> Result<(), SocketError> {
        self.send_to(bytes, dest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn loopback() -> Socket {
        Socket::bind("127.0.0.1:0".parse().unwrap()).await.expect("bind")
    }

    #[tokio::test]
    async fn bind_resolves_ephemeral_port() {
        let s = loopback().await;
        assert_ne!(s.local_addr.port(), 0);
    }

    #[tokio::test]
    async fn datagram_roundtrip_over_loopback() {
        let a = loopback().await;
        let b = loopback().await;
        a.send_datagram(b"INFO x", b.local_addr).await.unwrap();
        let (bytes, from) = b.recv_from().await.unwrap();
        assert_eq!(bytes, b"INFO x");
        assert_eq!(from, a.local_addr);
    }
}
