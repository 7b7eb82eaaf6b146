//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::domain::{ConnectionId, RoomId};
use crate::engine::{MatchmakingEngine, SignalKind};
use crate::infrastructure::dto::websocket::ClientEvent;
use crate::ui::state::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Spawns a task that receives messages from the rx channel and pushes
/// them to the WebSocket sender.
///
/// This is the outbound flow: events the engine addressed to this client
/// (via its registered channel) are written to its WebSocket connection.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    // The connection id is server-assigned and opaque to the client; the
    // client learns it from the "connected" event.
    let connection_id = ConnectionId::generate();

    // Create a channel for this client to receive events
    let (tx, rx) = mpsc::unbounded_channel();
    state.engine.connect(connection_id.clone(), tx).await;

    let (sender, mut receiver) = socket.split();

    // Spawn a task to push engine events to this client
    let mut send_task = pusher_loop(rx, sender);

    // Spawn a task to receive requests from this client
    let engine = state.engine.clone();
    let recv_connection_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!("WebSocket error for '{}': {}", recv_connection_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let event = match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::warn!(
                                "Unparseable frame from '{}': {}",
                                recv_connection_id,
                                e
                            );
                            continue;
                        }
                    };
                    dispatch_event(&engine, &recv_connection_id, event).await;
                }
                Message::Ping(_) => {
                    // Ping/pong is handled by the WebSocket protocol layer
                    tracing::debug!("Received ping from '{}'", recv_connection_id);
                }
                Message::Close(_) => {
                    tracing::info!("Client '{}' requested close", recv_connection_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    // Transport gone: queue removal, pairing teardown and registry
    // cleanup happen here regardless of how the socket died.
    state.engine.disconnect(&connection_id).await;
}

/// Route one inbound client event to the engine operation it requests.
async fn dispatch_event(
    engine: &MatchmakingEngine,
    connection_id: &ConnectionId,
    event: ClientEvent,
) {
    match event {
        ClientEvent::FindMatch { name } => {
            engine.find_match(connection_id, name).await;
        }
        ClientEvent::CancelMatch => {
            engine.cancel_match(connection_id).await;
        }
        ClientEvent::Offer { offer, room_id } => {
            engine
                .relay_signal(connection_id, SignalKind::Offer, offer, &RoomId::new(room_id))
                .await;
        }
        ClientEvent::Answer { answer, room_id } => {
            engine
                .relay_signal(
                    connection_id,
                    SignalKind::Answer,
                    answer,
                    &RoomId::new(room_id),
                )
                .await;
        }
        ClientEvent::IceCandidate { candidate, room_id } => {
            engine
                .relay_signal(
                    connection_id,
                    SignalKind::IceCandidate,
                    candidate,
                    &RoomId::new(room_id),
                )
                .await;
        }
        ClientEvent::ChatMessage {
            message,
            room_id,
            sender_name,
        } => {
            engine
                .relay_chat(connection_id, message, sender_name, &RoomId::new(room_id))
                .await;
        }
        ClientEvent::EndCall => {
            engine.end_call(connection_id).await;
        }
    }
}
