//! Server state shared across connection handlers.

use std::sync::Arc;

use crate::domain::RoomStore;
use crate::infrastructure::SocketRegistry;
use crate::usecase::{
    JoinRoomUseCase, LeaveRoomUseCase, SendToPeerUseCase, UpdateStatusUseCase,
};

/// Shared application state
pub struct AppState {
    pub join_room_usecase: Arc<JoinRoomUseCase>,
    pub leave_room_usecase: Arc<LeaveRoomUseCase>,
    pub update_status_usecase: Arc<UpdateStatusUseCase>,
    pub send_to_peer_usecase: Arc<SendToPeerUseCase>,
    /// Local connection registry (socket plumbing, no room state)
    pub registry: Arc<SocketRegistry>,
    /// Shared room store (subscriptions are managed per connection)
    pub store: Arc<dyn RoomStore>,
}
