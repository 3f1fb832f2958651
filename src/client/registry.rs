//! Client registry
//!
//! Tracks every session that has completed the name handshake.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::client::session::{ClientSession, SessionId};

/// Registry of active client sessions, keyed by session id.
pub struct ClientRegistry {
    sessions: HashMap<SessionId, ClientSession>,
}

/// Registry handle shared between the acceptor, the session handlers, and
/// the broadcast dispatcher.
pub type SharedRegistry = Arc<Mutex<ClientRegistry>>;

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    pub fn insert(&mut self, session: ClientSession) {
        self.sessions.insert(session.id(), session);
    }

    /// Removes a session, returning it if it was present.
    ///
    /// Removing an id that is not registered is a no-op, so competing
    /// teardown paths can both call this safely.
    pub fn remove(&mut self, id: SessionId) -> Option<ClientSession> {
        self.sessions.remove(&id)
    }

    pub fn find(&self, id: SessionId) -> Option<&ClientSession> {
        self.sessions.get(&id)
    }

    /// Clones the current membership so callers can iterate without the lock.
    ///
    /// The snapshot can go stale the moment the lock is released; a write to
    /// a departed member fails at its socket and is handled there.
    pub fn snapshot(&self) -> Vec<ClientSession> {
        self.sessions.values().cloned().collect()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};

    async fn test_session(id: u64, name: &str) -> (ClientSession, TcpStream) {
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
    async fn test_insert_and_find() {
        let mut registry = ClientRegistry::new();
        let (session, _peer) = test_session(1, "alice").await;
        registry.insert(session);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find(SessionId::new(1)).unwrap().name(), "alice");
        assert!(registry.find(SessionId::new(2)).is_none());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let mut registry = ClientRegistry::new();
        let (session, _peer) = test_session(7, "bob").await;
        registry.insert(session);

        let removed = registry.remove(SessionId::new(7));
        assert_eq!(removed.unwrap().name(), "bob");
        assert!(registry.remove(SessionId::new(7)).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_reflects_membership() {
        let mut registry = ClientRegistry::new();
        let (alice, _peer_a) = test_session(1, "alice").await;
        let (bob, _peer_b) = test_session(2, "bob").await;
        registry.insert(alice);
        registry.insert(bob);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        let mut names: Vec<&str> = snapshot.iter().map(|s| s.name()).collect();
        names.sort();
        assert_eq!(names, ["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_sessions_keep_distinct_ids() {
        let mut registry = ClientRegistry::new();
        let (first, _peer_a) = test_session(1, "alice").await;
        let (second, _peer_b) = test_session(2, "alice").await;
        registry.insert(first);
        registry.insert(second);

        // Same display name, separate sessions
        assert_eq!(registry.len(), 2);
        assert!(registry.find(SessionId::new(1)).is_some());
        assert!(registry.find(SessionId::new(2)).is_some());
    }
}
