//! WebSocket connection handler and session dispatcher.
//!
//! One task pair per socket: the receive loop decodes inbound frames and
//! dispatches them to the coordinator operations one at a time (operations
//! for the same connection complete in issue order; different connections
//! interleave freely), the send loop multiplexes direct replies and
//! personal-channel payloads onto the socket. Parsing and semantic errors
//! answer with an `error` event and never close an established connection;
//! a failed handshake closes with code 4242.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::{ConnectionId, SignalingError};
use crate::infrastructure::OutboundFrame;
use crate::infrastructure::dto::websocket::{ClientMessage, ErrorMessage, EventType, InfoMessage};
use crate::ui::state::AppState;
use crate::{CLOSE_CODE_PROTOCOL_ERROR, PROTOCOL_IDENTIFIER, PROTOCOL_VERSION};

#[derive(Debug, Error)]
#[error("incompatible sub-protocol: {0}")]
struct HandshakeError(String);

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    // The raw header is verified after the upgrade so a mismatch can be
    // answered in-band with an error event and close code 4242.
    let offered_protocol = headers
        .get("sec-websocket-protocol")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    ws.protocols([PROTOCOL_IDENTIFIER])
        .on_upgrade(move |socket| handle_socket(socket, state, offered_protocol))
}

pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>, offered_protocol: String) {
    let (mut sender, mut receiver) = socket.split();

    if offered_protocol != PROTOCOL_IDENTIFIER {
        let error = HandshakeError(offered_protocol);
        tracing::warn!("handshake failed: {}", error);
        let reply = ErrorMessage {
            event: EventType::Error,
            message: error.to_string(),
        };
        let _ = sender
            .send(Message::Text(serde_json::to_string(&reply).unwrap().into()))
            .await;
        let _ = sender
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_CODE_PROTOCOL_ERROR,
                reason: "incompatible sub-protocol".into(),
            })))
            .await;
        return;
    }

    let connection_id = ConnectionId::generate();
    tracing::info!("{} <open>", connection_id);

    let (tx, mut rx) = mpsc::unbounded_channel();
    state.registry.register(connection_id.clone(), tx).await;

    let mut channel_rx = match state.store.subscribe(&connection_id).await {
        Ok(rx) => rx,
        Err(e) => {
            tracing::error!("{} channel subscription failed: {}", connection_id, e);
            state.registry.unregister(&connection_id).await;
            return;
        }
    };

    // Forward direct replies and personal-channel payloads to the socket.
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(OutboundFrame::Text(text)) => {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(OutboundFrame::Close(code)) => {
                        let _ = sender
                            .send(Message::Close(Some(CloseFrame {
                                code,
                                reason: "".into(),
                            })))
                            .await;
                        break;
                    }
                    None => break,
                },
                payload = channel_rx.recv() => match payload {
                    Some(text) => {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    // Decode inbound frames and dispatch them in order.
    let recv_state = state.clone();
    let recv_connection_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!("{} socket error: {}", recv_connection_id, e);
                    break;
                }
            };

            match message {
                Message::Text(text) => {
                    dispatch_frame(&recv_state, &recv_connection_id, &text).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // If one side of the pump stops, tear the other one down.
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.registry.unregister(&connection_id).await;
    if let Err(e) = state.leave_room_usecase.execute(&connection_id).await {
        tracing::error!("{} leave on close failed: {}", connection_id, e);
    }
    state.store.unsubscribe(&connection_id).await;
    tracing::info!("{} <close>", connection_id);
}

/// Decode one inbound frame and run the operation it names.
async fn dispatch_frame(state: &Arc<AppState>, connection_id: &ConnectionId, text: &str) {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            send_error(state, connection_id, &e.to_string()).await;
            return;
        }
    };
    tracing::debug!("{} <{}>", connection_id, message.event_name());

    let outcome = match message {
        ClientMessage::Info => {
            let reply = InfoMessage {
                event: EventType::Info,
                protocol_version: PROTOCOL_VERSION.to_string(),
            };
            state
                .registry
                .send_text(connection_id, &serde_json::to_string(&reply).unwrap())
                .await;
            Ok(())
        }
        ClientMessage::JoinRoom { room_id, status } => {
            match state
                .join_room_usecase
                .execute(connection_id, room_id, status)
                .await
            {
                Ok(reply) => {
                    state
                        .registry
                        .send_text(connection_id, &serde_json::to_string(&reply).unwrap())
                        .await;
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        ClientMessage::LeaveRoom => state.leave_room_usecase.execute(connection_id).await,
        ClientMessage::UpdateStatus { status } => {
            state
                .update_status_usecase
                .execute(connection_id, status)
                .await
        }
        ClientMessage::SendToPeer { peer_id, data } => {
            state
                .send_to_peer_usecase
                .execute(connection_id, peer_id, data)
                .await
        }
    };

    if let Err(e) = outcome {
        match e {
            // Store failures are fatal to the operation, not client mistakes.
            SignalingError::Store(e) => {
                tracing::error!("{} store failure: {}", connection_id, e);
            }
            semantic => send_error(state, connection_id, &semantic.to_string()).await,
        }
    }
}

async fn send_error(state: &Arc<AppState>, connection_id: &ConnectionId, message: &str) {
    let reply = ErrorMessage {
        event: EventType::Error,
        message: message.to_string(),
    };
    state
        .registry
        .send_text(connection_id, &serde_json::to_string(&reply).unwrap())
        .await;
}
