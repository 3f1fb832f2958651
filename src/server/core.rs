use log::{error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::broadcast::{self, Broadcaster, spawn_dispatcher};
use crate::client::handle_connection;
use crate::client::registry::{ClientRegistry, SharedRegistry};
use crate::client::session::SessionId;
use crate::config::RelayConfig;
use crate::error::RelayError;

pub struct Server {
    listener: TcpListener,
    registry: SharedRegistry,
    broadcaster: Broadcaster,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    stop: Arc<Notify>,
    config: Arc<RelayConfig>,
    next_session_id: AtomicU64,
}

impl Server {
    /// Binds the listener and starts the broadcast dispatcher.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let listen_addr = config.listen_addr();
        let addr: SocketAddr = listen_addr
            .parse()
            .map_err(|_| RelayError::BadBindAddress(listen_addr))?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(config.backlog)?;

        info!("Server bound to {}", listener.local_addr()?);

        let registry: SharedRegistry = Arc::new(Mutex::new(ClientRegistry::new()));
        let stop = Arc::new(Notify::new());
        let (broadcaster, dispatcher) = spawn_dispatcher(Arc::clone(&registry), Arc::clone(&stop));

        Ok(Self {
            listener,
            registry,
            broadcaster,
            dispatcher: Mutex::new(Some(dispatcher)),
            stop,
            config: Arc::new(config),
            next_session_id: AtomicU64::new(1),
        })
    }

    /// Accepts connections until the listener fails hard.
    ///
    /// Every accepted connection gets its own task, so accepting never
    /// waits on a session. Accept errors tied to a single remote are logged
    /// and skipped; anything else stops the loop and tears down every
    /// active session.
    pub async fn run(&self) {
        info!("Relay accepting connections (backlog {})", self.config.backlog);

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let id = SessionId::new(self.next_session_id.fetch_add(1, Ordering::Relaxed));
                    info!("Accepted connection from {} as client {}", addr, id);

                    let registry = Arc::clone(&self.registry);
                    let broadcaster = self.broadcaster.clone();
                    let config = Arc::clone(&self.config);

                    // Spawn a task for each client so the accept loop doesn't block
                    tokio::spawn(async move {
                        handle_connection(id, stream, addr, registry, broadcaster, config).await;
                    });
                }
                Err(e) if is_transient_accept_error(&e) => {
                    warn!("Error accepting connection: {}", e);
                }
                Err(e) => {
                    error!("Listener failed: {}", e);
                    break;
                }
            }
        }

        self.teardown_all().await;
    }

    /// Stops the dispatcher once its queue has drained, then disconnects
    /// every remaining session.
    pub async fn shutdown(&self) {
        self.stop.notify_one();
        if let Some(handle) = self.dispatcher.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("Broadcast dispatcher ended abnormally: {}", e);
            }
        }
        self.teardown_all().await;
    }

    /// Address the listener is actually bound to. Useful when the
    /// configured port was 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Number of sessions currently registered.
    pub async fn session_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    async fn teardown_all(&self) {
        let ids = {
            let registry = self.registry.lock().await;
            registry.ids()
        };
        if ids.is_empty() {
            return;
        }

        info!("Tearing down {} active sessions", ids.len());
        for id in ids {
            broadcast::disconnect_session(&self.registry, &self.broadcaster, id).await;
        }
    }
}

/// Accept errors caused by one remote endpoint rather than by the listener
/// itself.
fn is_transient_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_rejects_malformed_address() {
        let config = RelayConfig {
            bind_address: "not an address".to_string(),
            ..RelayConfig::default()
        };

        match Server::bind(config).await {
            Err(RelayError::BadBindAddress(addr)) => {
                assert!(addr.starts_with("not an address"));
            }
            _ => panic!("expected a bad bind address error"),
        }
    }

    #[tokio::test]
    async fn test_bind_reports_actual_port() {
        let config = RelayConfig {
            port: 0,
            ..RelayConfig::default()
        };

        let server = Server::bind(config).await.unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert_eq!(server.session_count().await, 0);
    }

    #[test]
    fn test_transient_accept_errors_are_recognized() {
        let transient = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert!(is_transient_accept_error(&transient));

        let fatal = io::Error::new(io::ErrorKind::InvalidInput, "bad fd");
        assert!(!is_transient_accept_error(&fatal));
    }
}
