//! Module `session`
//!
//! Defines the session identifier and the per-client session record shared
//! between the connection handler and the broadcast dispatcher.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

/// Unique identifier for a client session.
///
/// Assigned by the server when the connection is accepted and never reused
/// for the lifetime of the server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) const fn new(raw: u64) -> Self {
        SessionId(raw)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State of one connected client.
///
/// The read half of the connection stays with the session's handler task;
/// only the write half is carried here, behind a mutex, so the broadcast
/// dispatcher and teardown can share it through registry snapshots.
#[derive(Clone)]
pub struct ClientSession {
    id: SessionId,
    name: String,
    remote_addr: SocketAddr,
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl ClientSession {
    pub fn new(
        id: SessionId,
        name: String,
        remote_addr: SocketAddr,
        writer: OwnedWriteHalf,
    ) -> Self {
        Self {
            id,
            name,
            remote_addr,
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Returns the session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the display name the client announced at handshake.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the remote socket address of the connection.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Writes one message to the client.
    ///
    /// The text goes out as raw UTF-8 with no terminator; the receiving
    /// side frames by arrival timing, not by delimiters.
    pub async fn send(&self, text: &str) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(text.as_bytes()).await
    }

    /// Closes the write side of the connection, best effort.
    ///
    /// The peer observes end-of-stream on its next read.
    pub async fn close(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};

    async fn session_with_peer(id: u64, name: &str) -> (ClientSession, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = TcpStream::connect(addr).await.unwrap();
        let (server, remote_addr) = listener.accept().await.unwrap();
        let (_read_half, write_half) = server.into_split();
        let session =
            ClientSession::new(SessionId::new(id), name.to_string(), remote_addr, write_half);
        (session, peer)
    }

    #[tokio::test]
    async fn test_send_writes_raw_bytes() {
        let (session, mut peer) = session_with_peer(1, "alice").await;

        session.send("alice: hi").await.unwrap();

        let mut buf = [0u8; 64];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"alice: hi");
    }

    #[tokio::test]
    async fn test_close_signals_eof_to_peer() {
        let (session, mut peer) = session_with_peer(1, "alice").await;

        session.close().await;

        let mut buf = [0u8; 64];
        assert_eq!(peer.read(&mut buf).await.unwrap(), 0);
    }
}
