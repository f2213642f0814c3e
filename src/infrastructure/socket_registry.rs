//! Local connection registry.
//!
//! Per-process map from a connection identity to the outbound channel of its
//! locally attached socket. Everything that must reach a *local* socket goes
//! through here: direct replies, payloads arriving on the connection's
//! personal channel, the shutdown notice and administrative closes. Room
//! state never lives here — only socket plumbing does.

use std::collections::HashMap;

use tokio::sync::{Mutex, mpsc};

use crate::domain::ConnectionId;

/// A frame on its way out to one local socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    /// Close the socket with the given close code.
    Close(u16),
}

/// Sender half of a local socket's outbound channel.
pub type SocketSender = mpsc::UnboundedSender<OutboundFrame>;

/// Registry of the sockets attached to this process.
#[derive(Default)]
pub struct SocketRegistry {
    sockets: Mutex<HashMap<ConnectionId, SocketSender>>,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection_id: ConnectionId, sender: SocketSender) {
        let mut sockets = self.sockets.lock().await;
        sockets.insert(connection_id.clone(), sender);
        tracing::debug!("{} registered", connection_id);
    }

    pub async fn unregister(&self, connection_id: &ConnectionId) {
        let mut sockets = self.sockets.lock().await;
        sockets.remove(connection_id);
        tracing::debug!("{} unregistered", connection_id);
    }

    /// Send a text frame to one locally attached socket.
    ///
    /// A connection that already went away is not an error; the frame is
    /// dropped and logged.
    pub async fn send_text(&self, connection_id: &ConnectionId, text: &str) {
        let sockets = self.sockets.lock().await;
        match sockets.get(connection_id) {
            Some(sender) => {
                if sender.send(OutboundFrame::Text(text.to_string())).is_err() {
                    tracing::warn!("{} socket channel closed, dropping frame", connection_id);
                }
            }
            None => tracing::debug!("{} not attached locally, dropping frame", connection_id),
        }
    }

    /// Send the same text frame to every locally attached socket.
    pub async fn broadcast_all(&self, text: &str) {
        let sockets = self.sockets.lock().await;
        for (connection_id, sender) in sockets.iter() {
            if sender.send(OutboundFrame::Text(text.to_string())).is_err() {
                tracing::warn!("{} socket channel closed during broadcast", connection_id);
            }
        }
    }

    /// Close every locally attached socket with the given close code.
    pub async fn close_all(&self, code: u16) {
        let sockets = self.sockets.lock().await;
        for sender in sockets.values() {
            let _ = sender.send(OutboundFrame::Close(code));
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.sockets.lock().await.len()
    }
}
