//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::world::PlayerInput;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Stable player identifier for the lifetime of the connection
    pub player_id: Uuid,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    info!(player_id = %query.player_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, query.player_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: Uuid, state: AppState) {
    info!(player_id = %player_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    // Register the outbound session before the loop can address it
    let (session, outbound_rx) = state.sessions.register(player_id);

    state.sessions.send(
        &player_id,
        ServerMsg::Welcome {
            player_id,
            server_time: unix_millis(),
        },
    );

    let input_tx = state.sound_loop.input_tx.clone();
    if input_tx
        .send(PlayerInput::Joined { player_id, session })
        .await
        .is_err()
    {
        error!(player_id = %player_id, "Sound loop is not running");
        state.sessions.unregister(&player_id, session);
        return;
    }

    // Run the session with split read/write
    run_session(
        player_id,
        session,
        &state,
        ws_sink,
        ws_stream,
        input_tx.clone(),
        outbound_rx,
    )
    .await;

    // Cleanup on disconnect
    let _ = input_tx
        .send(PlayerInput::Disconnected { player_id, session })
        .await;
    state.sessions.unregister(&player_id, session);

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: Uuid,
    session: u64,
    state: &AppState,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    input_tx: mpsc::Sender<PlayerInput>,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
) {
    let rate_limiter = PlayerRateLimiter::new();

    // Spawn writer task: session queue -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> sound loop
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        let is_sound_request =
                            matches!(msg, ClientMsg::Fire { .. } | ClientMsg::PlaySound { .. });
                        if is_sound_request && !rate_limiter.check_sound() {
                            warn!(player_id = %player_id, "Rate limited sound request");
                            state.sessions.send(
                                &player_id,
                                ServerMsg::Error {
                                    code: "rate_limited".to_string(),
                                    message: "Too many sound requests".to_string(),
                                },
                            );
                            continue;
                        }

                        let leaving = matches!(msg, ClientMsg::Leave);
                        let input = PlayerInput::Message {
                            player_id,
                            session,
                            msg,
                            received_at: unix_millis(),
                        };

                        if input_tx.send(input).await.is_err() {
                            debug!(player_id = %player_id, "Input channel closed");
                            break;
                        }
                        if leaving {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(player_id = %player_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(player_id = %player_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
