//! Broadcast path
//!
//! A single queue feeding a single dispatcher task, so every relayed
//! message reaches recipients in exactly the order it was submitted.

use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::client::registry::SharedRegistry;
use crate::client::session::SessionId;

/// Label used when a message's sender is no longer registered at delivery
/// time.
const SYSTEM_LABEL: &str = "system";

/// A message waiting to be relayed.
#[derive(Debug)]
pub enum Broadcast {
    /// Ordinary chat traffic; formatted as "<name>: <text>" at delivery time.
    Chat { sender: SessionId, text: String },
    /// Pre-formatted announcement (joins, departures); relayed verbatim.
    Notice { origin: SessionId, text: String },
}

/// Submission handle for the broadcast queue.
///
/// Clones freely and never blocks. Messages submitted after the dispatcher
/// has stopped are dropped.
#[derive(Clone)]
pub struct Broadcaster {
    tx: UnboundedSender<Broadcast>,
}

impl Broadcaster {
    /// Queues a chat message from a session.
    pub fn submit_chat(&self, sender: SessionId, text: String) {
        self.submit(Broadcast::Chat { sender, text });
    }

    /// Queues a pre-formatted announcement originating from a session.
    pub fn submit_notice(&self, origin: SessionId, text: String) {
        self.submit(Broadcast::Notice { origin, text });
    }

    fn submit(&self, message: Broadcast) {
        if self.tx.send(message).is_err() {
            debug!("Broadcast dropped, dispatcher is not running");
        }
    }
}

/// Announcement text for a session that just registered.
pub fn join_announcement(name: &str, addr: SocketAddr) -> String {
    format!("{} ({}) joined the chat", name, addr)
}

/// Announcement text for a session that left.
pub fn leave_announcement(name: &str, addr: SocketAddr) -> String {
    format!("{} ({}) left the chat", name, addr)
}

/// Spawns the dispatcher task. Returns the submission handle and the task
/// handle so shutdown can wait for the queue to drain.
pub fn spawn_dispatcher(
    registry: SharedRegistry,
    stop: Arc<Notify>,
) -> (Broadcaster, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let broadcaster = Broadcaster { tx };

    let dispatcher = Dispatcher {
        rx,
        registry,
        broadcaster: broadcaster.clone(),
    };
    let handle = tokio::spawn(dispatcher.run(stop));

    (broadcaster, handle)
}

/// Tears down a session by id: removes it from the registry, announces the
/// departure, and closes its connection.
///
/// Safe to call from several places for the same session; only the call
/// that actually removes it announces and closes.
pub async fn disconnect_session(
    registry: &SharedRegistry,
    broadcaster: &Broadcaster,
    id: SessionId,
) {
    let (removed, remaining) = {
        let mut registry = registry.lock().await;
        let removed = registry.remove(id);
        (removed, registry.len())
    };

    if let Some(session) = removed {
        info!(
            "Client {} ({}) disconnected, {} still connected",
            session.id(),
            session.remote_addr(),
            remaining
        );
        broadcaster.submit_notice(
            id,
            leave_announcement(session.name(), session.remote_addr()),
        );
        session.close().await;
    }
}

/// Owns the receiving end of the queue. Exactly one of these runs per
/// server, which is what makes delivery order total.
struct Dispatcher {
    rx: UnboundedReceiver<Broadcast>,
    registry: SharedRegistry,
    broadcaster: Broadcaster,
}

impl Dispatcher {
    async fn run(mut self, stop: Arc<Notify>) {
        loop {
            tokio::select! {
                message = self.rx.recv() => {
                    match message {
                        Some(message) => self.deliver(message).await,
                        None => break,
                    }
                }
                _ = stop.notified() => {
                    // Flush whatever is already queued, then stop
                    while let Ok(message) = self.rx.try_recv() {
                        self.deliver(message).await;
                    }
                    break;
                }
            }
        }
        debug!("Broadcast dispatcher stopped");
    }

    /// Delivers one message to every registered session except its origin.
    ///
    /// Name resolution and the membership snapshot happen under one registry
    /// lock; the socket writes happen after it is released, so a slow
    /// recipient never holds up registration or teardown. A recipient whose
    /// write fails is torn down here and the rest still get the message.
    async fn deliver(&self, message: Broadcast) {
        let (origin, line, recipients) = {
            let registry = self.registry.lock().await;
            let (origin, line) = match message {
                Broadcast::Chat { sender, text } => {
                    let name = registry
                        .find(sender)
                        .map(|session| session.name().to_string())
                        .unwrap_or_else(|| SYSTEM_LABEL.to_string());
                    (sender, format!("{}: {}", name, text))
                }
                Broadcast::Notice { origin, text } => (origin, text),
            };
            (origin, line, registry.snapshot())
        };

        info!("{}", line);

        let mut dead: Vec<SessionId> = Vec::new();
        for session in &recipients {
            if session.id() == origin {
                continue;
            }
            if let Err(e) = session.send(&line).await {
                warn!(
                    "Write to client {} ({}) failed: {}",
                    session.id(),
                    session.remote_addr(),
                    e
                );
                dead.push(session.id());
            }
        }

        for id in dead {
            disconnect_session(&self.registry, &self.broadcaster, id).await;
        }
    }
}
