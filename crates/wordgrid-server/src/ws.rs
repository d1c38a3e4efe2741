use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use wordgrid_core::board::empty_rack;
use wordgrid_core::protocol::{ClientMessage, ServerMessage};

use crate::error::ProtocolError;
use crate::registry::RoomRegistry;
use crate::room::{self, Player};

pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub jwt_secret: String,
}

/// Top-level socket handler, spawned per connection by the upgrade route.
pub async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    room_code: Option<String>,
    name: Option<String>,
    color: Option<String>,
    user_id: Uuid,
) {
    let (code, handle) = state.registry.get_or_create(room_code.as_deref());
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    room::join(
        &handle,
        Player {
            id: user_id,
            name: name.unwrap_or_else(|| format!("Player-{}", &user_id.to_string()[..6])),
            color: color.unwrap_or_else(|| "#6366f1".to_string()),
            score: 0,
            hand: empty_rack(),
            tx: tx.clone(),
        },
    )
    .await;

    {
        let engine = handle.lock().await;
        let snapshot = engine.state_snapshot();
        engine.send_to(user_id, ServerMessage::Init { player_id: user_id, state: snapshot });
    }
    info!(room = %code, player = %user_id, "player joined");

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                match outgoing {
                    Some(msg) => {
                        let Ok(text) = serde_json::to_string(&msg) else { continue };
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match parse_client_message(&text) {
                            Ok(msg) => dispatch(&handle, &code, user_id, msg).await,
                            Err(e) => {
                                warn!(room = %code, player = %user_id, error = %e, "malformed frame, closing channel");
                                let _ = tx.send(ServerMessage::Error { message: e.to_string() });
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(room = %code, player = %user_id, error = %e, "socket error");
                        break;
                    }
                }
            }
        }
    }

    room::leave(&handle, user_id).await;
    if room::is_empty(&handle).await {
        state.registry.remove(&code).await;
    }
    info!(room = %code, player = %user_id, "player left");
}

fn parse_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))
}

async fn dispatch(handle: &room::RoomHandle, code: &str, player_id: Uuid, msg: ClientMessage) {
    match msg {
        ClientMessage::StartGame => {
            let is_host = handle.lock().await.is_host(player_id);
            if !is_host {
                reply_error(handle, player_id, "only the host may start the game").await;
                return;
            }
            {
                let engine = handle.lock().await;
                engine.broadcast(ServerMessage::GameStartCountdown { seconds: 3 });
            }
            let task_handle = handle.clone();
            let code = code.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(3500)).await;
                if room::start_match(&task_handle).await.is_err() {
                    return;
                }
                let duration = {
                    let engine = task_handle.lock().await;
                    engine.broadcast(ServerMessage::GameStarted);
                    engine.duration
                };
                info!(room = %code, "match started, starting global timer");
                room::start_global_timer(&task_handle, duration).await;
            });
        }
        ClientMessage::Place { x, y, letter, color, hand_index } => {
            let Some(letter) = letter.chars().next() else {
                reply_error(handle, player_id, "letter must not be empty").await;
                return;
            };
            if let Err(e) = room::place_tile(handle, player_id, x, y, letter, color, hand_index).await {
                reply_error(handle, player_id, &e.to_string()).await;
            }
        }
        ClientMessage::UpdateSettings { settings } => {
            if let Err(e) = room::update_settings(handle, player_id, settings).await {
                reply_error(handle, player_id, &e.to_string()).await;
            }
        }
        ClientMessage::Draw { count } => {
            if let Err(e) = room::draw_for_player(handle, player_id, count).await {
                reply_error(handle, player_id, &e.to_string()).await;
            }
        }
        ClientMessage::StartTimer { duration } => {
            room::start_global_timer(handle, duration).await;
        }
        ClientMessage::RerollHand => {
            if let Err(e) = room::reroll(handle, player_id).await {
                reply_error(handle, player_id, &e.to_string()).await;
            }
        }
        ClientMessage::DestroyTile { hand_index } => {
            if let Err(e) = room::destroy_tile(handle, player_id, hand_index).await {
                reply_error(handle, player_id, &e.to_string()).await;
            }
        }
        ClientMessage::Chat { message } => {
            let engine = handle.lock().await;
            let sender = engine
                .players
                .get(&player_id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "unknown".to_string());
            engine.broadcast(ServerMessage::Chat { sender, sender_id: player_id, message });
        }
        ClientMessage::EndGame => {
            room::end_game(handle, None).await;
        }
    }
}

async fn reply_error(handle: &room::RoomHandle, player_id: Uuid, message: &str) {
    let engine = handle.lock().await;
    engine.send_to(player_id, ServerMessage::Error { message: message.to_string() });
}
