//! WebSocket upgrade handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{stream::SplitSink, stream::SplitStream, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::{GameCommand, PlayerId};
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ProtocolError};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let player_id = PlayerId::generate();
    info!(player_id = %player_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel::<Arc<str>>(state.config.session_buffer);

    let commands = state.game.command_tx.clone();
    if commands
        .send(GameCommand::Connect {
            player_id,
            outbound: outbound_tx,
        })
        .await
        .is_err()
    {
        error!(player_id = %player_id, "Game loop is not running");
        return;
    }

    run_session(player_id, ws_sink, ws_stream, commands, outbound_rx).await;

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: PlayerId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    commands: mpsc::Sender<GameCommand>,
    mut outbound_rx: mpsc::Receiver<Arc<str>>,
) {
    // Writer task: game loop -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(text.to_string())).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> game loop
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match ClientMsg::parse(&text) {
                Ok(msg) => {
                    let command = GameCommand::Message {
                        player_id,
                        msg,
                        received_at: unix_millis(),
                    };
                    if commands.send(command).await.is_err() {
                        debug!(player_id = %player_id, "Command channel closed");
                        break;
                    }
                }
                Err(ProtocolError::UnknownType(tag)) => {
                    warn!(player_id = %player_id, message_type = %tag, "Unknown message type");
                }
                Err(e) => {
                    warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                }
            },
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(player_id = %player_id, "Received ping/pong");
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

    // Signal disconnect to the game loop
    let _ = commands.send(GameCommand::Disconnect { player_id }).await;

    writer_handle.abort();
}
