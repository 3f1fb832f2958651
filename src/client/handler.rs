use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;

use crate::broadcast::{self, Broadcaster, join_announcement};
use crate::client::registry::SharedRegistry;
use crate::client::session::{ClientSession, SessionId};
use crate::config::RelayConfig;
use crate::framing::FrameReader;

/// Drives one client connection from handshake to teardown.
///
/// - The first message is the client's display name; the session is only
///   registered and announced once that handshake completes.
/// - Every later non-empty message is queued for relay to the other
///   sessions.
/// - The loop ends when the peer disconnects or the read fails, and
///   teardown announces the departure exactly once.
pub async fn handle_connection(
    id: SessionId,
    stream: TcpStream,
    remote_addr: SocketAddr,
    registry: SharedRegistry,
    broadcaster: Broadcaster,
    config: Arc<RelayConfig>,
) {
    let (read_half, write_half) = stream.into_split();
    let mut frames = FrameReader::new(
        read_half,
        config.read_buffer_bytes,
        config.max_message_bytes,
    );

    // Handshake: the first frame names the session
    let name = match frames.next_frame().await {
        Ok(Some(raw)) => {
            let name = raw.trim_end_matches(['\r', '\n']).to_string();
            if name.is_empty() {
                info!("Client {} ({}) sent an empty name, dropping", id, remote_addr);
                return;
            }
            name
        }
        Ok(None) => {
            info!("Client {} ({}) left before naming itself", id, remote_addr);
            return;
        }
        Err(e) => {
            warn!("Client {} ({}) failed during handshake: {}", id, remote_addr, e);
            return;
        }
    };

    let session = ClientSession::new(id, name.clone(), remote_addr, write_half);
    {
        let mut registry = registry.lock().await;
        registry.insert(session);
        info!(
            "Client {} ({}) registered as {:?}, {} connected",
            id,
            remote_addr,
            name,
            registry.len()
        );
    }
    broadcaster.submit_notice(id, join_announcement(&name, remote_addr));

    loop {
        match frames.next_frame().await {
            Ok(Some(text)) => {
                if text.is_empty() {
                    continue;
                }
                broadcaster.submit_chat(id, text);
            }
            Ok(None) => {
                info!("Connection closed by client {} ({})", id, remote_addr);
                break;
            }
            Err(e) => {
                warn!("Failed to read from client {} ({}): {}", id, remote_addr, e);
                break;
            }
        }
    }

    broadcast::disconnect_session(&registry, &broadcaster, id).await;
}
