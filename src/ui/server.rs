//! Server execution logic.

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::CLOSE_CODE_SHUTDOWN;
use crate::domain::RoomStore;
use crate::infrastructure::SocketRegistry;
use crate::infrastructure::dto::websocket::{EventType, ShutdownMessage};
use crate::usecase::{
    JoinRoomUseCase, LeaveRoomUseCase, SendToPeerUseCase, UpdateStatusUseCase,
};

use super::{
    handler::{health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// WebSocket signaling server
///
/// Serves `/ws` for signaling sessions and `/api/health` for load-balancer
/// probes. On SIGTERM or Ctrl+C the configured shutdown sequence runs
/// before the process stops serving.
pub struct Server {
    join_room_usecase: Arc<JoinRoomUseCase>,
    leave_room_usecase: Arc<LeaveRoomUseCase>,
    update_status_usecase: Arc<UpdateStatusUseCase>,
    send_to_peer_usecase: Arc<SendToPeerUseCase>,
    registry: Arc<SocketRegistry>,
    store: Arc<dyn RoomStore>,
    shutdown_timeout: u64,
}

impl Server {
    pub fn new(
        join_room_usecase: Arc<JoinRoomUseCase>,
        leave_room_usecase: Arc<LeaveRoomUseCase>,
        update_status_usecase: Arc<UpdateStatusUseCase>,
        send_to_peer_usecase: Arc<SendToPeerUseCase>,
        registry: Arc<SocketRegistry>,
        store: Arc<dyn RoomStore>,
        shutdown_timeout: u64,
    ) -> Self {
        Self {
            join_room_usecase,
            leave_room_usecase,
            update_status_usecase,
            send_to_peer_usecase,
            registry,
            store,
            shutdown_timeout,
        }
    }

    /// Build the router; exposed so tests can serve it on an ephemeral port.
    pub fn router(&self) -> Router {
        let app_state = Arc::new(AppState {
            join_room_usecase: self.join_room_usecase.clone(),
            leave_room_usecase: self.leave_room_usecase.clone(),
            update_status_usecase: self.update_status_usecase.clone(),
            send_to_peer_usecase: self.send_to_peer_usecase.clone(),
            registry: self.registry.clone(),
            store: self.store.clone(),
        });

        Router::new()
            .route("/ws", get(websocket_handler))
            .route("/api/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Run the signaling server
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "0.0.0.0")
    /// * `port` - The port number to bind to (e.g., 4233)
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let registry = self.registry.clone();
        let shutdown_timeout = self.shutdown_timeout;
        let app = self.router();

        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!(
            "Starting RTC signaling server on {}",
            listener.local_addr()?
        );
        tracing::info!("Connect to: ws://{}/ws", bind_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                shutdown_sequence(&registry, shutdown_timeout).await;
            })
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}

/// Administrative shutdown: announce the shutdown with the grace period to
/// every locally attached socket, wait it out, then close them all with the
/// administrative close code. A zero grace period skips the announcement.
pub async fn shutdown_sequence(registry: &SocketRegistry, seconds: u64) {
    tracing::warn!("Stopping machine, {} connected", registry.connection_count().await);
    if seconds > 0 {
        tracing::warn!("Announcing shutdown in {} seconds", seconds);
        let notice = ShutdownMessage {
            event: EventType::Shutdown,
            seconds,
        };
        registry
            .broadcast_all(&serde_json::to_string(&notice).unwrap())
            .await;
        tokio::time::sleep(Duration::from_secs(seconds)).await;
    }
    registry.close_all(CLOSE_CODE_SHUTDOWN).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConnectionId;
    use crate::infrastructure::OutboundFrame;
    use tokio::sync::mpsc;

    async fn register_socket(
        registry: &SocketRegistry,
    ) -> mpsc::UnboundedReceiver<OutboundFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(ConnectionId::generate(), tx).await;
        rx
    }

    #[tokio::test]
    async fn test_shutdown_sequence_announces_then_closes_every_socket() {
        // given:
        tokio::time::pause();
        let registry = SocketRegistry::new();
        let mut rx1 = register_socket(&registry).await;
        let mut rx2 = register_socket(&registry).await;

        // when:
        shutdown_sequence(&registry, 3).await;

        // then: identical notice everywhere, then the administrative close
        let notice = OutboundFrame::Text(r#"{"event":"shutdown","seconds":3}"#.to_string());
        assert_eq!(rx1.recv().await, Some(notice.clone()));
        assert_eq!(rx2.recv().await, Some(notice));
        assert_eq!(rx1.recv().await, Some(OutboundFrame::Close(4200)));
        assert_eq!(rx2.recv().await, Some(OutboundFrame::Close(4200)));
    }

    #[tokio::test]
    async fn test_shutdown_sequence_with_zero_grace_skips_the_notice() {
        // given:
        let registry = SocketRegistry::new();
        let mut rx = register_socket(&registry).await;

        // when:
        shutdown_sequence(&registry, 0).await;

        // then:
        assert_eq!(rx.recv().await, Some(OutboundFrame::Close(4200)));
    }
}
