//! WebSocket upgrade handler

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::PlayerInput;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ProtocolError, ServerMsg};

/// WebSocket upgrade handler. Every connection is a fresh anonymous player.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, player_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: Uuid, state: AppState) {
    info!(player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before greeting so nothing between the two is missed
    let update_rx = state.session.subscribe();

    let welcome = ServerMsg::Welcome {
        player_id,
        server_time: unix_millis(),
        tick_rate: state.config.tick_rate,
    };
    let meta = ServerMsg::MetaData {
        meta: state.session.status().meta,
    };

    for msg in [welcome, meta] {
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            error!(player_id = %player_id, error = %e, "Failed to send greeting");
            return;
        }
    }

    run_connection(
        player_id,
        ws_sink,
        ws_stream,
        state.session.input_tx.clone(),
        update_rx,
        state.config.idle_timeout,
    )
    .await;

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Pump messages both ways until the client goes away
async fn run_connection(
    player_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    input_tx: mpsc::Sender<PlayerInput>,
    mut update_rx: broadcast::Receiver<ServerMsg>,
    idle_timeout: Duration,
) {
    let rate_limiter = PlayerRateLimiter::new();
    // Replies meant for this connection only
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMsg>(16);

    // Writer task: session broadcasts and direct replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(reply) = reply_rx.recv() => Ok(reply),
                update = update_rx.recv() => update,
            };
            match received {
                Ok(msg) => {
                    if !msg.is_for(player_id) {
                        continue;
                    }
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(player_id = %player_id, lagged_count = n, "Client lagged, skipping updates");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(player_id = %player_id, "Update channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> session
    loop {
        let next = match tokio::time::timeout(idle_timeout, ws_stream.next()).await {
            Ok(Some(result)) => result,
            Ok(None) => break,
            Err(_) => {
                info!(player_id = %player_id, timeout_secs = idle_timeout.as_secs(), "Idle timeout");
                break;
            }
        };

        match next {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited client message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        let input = PlayerInput { player_id, msg };
                        if input_tx.send(input).await.is_err() {
                            debug!(player_id = %player_id, "Input channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                        let _ = reply_tx.try_send(bad_message(&e));
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
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

    // Disconnect removes the car
    let _ = input_tx
        .send(PlayerInput {
            player_id,
            msg: ClientMsg::LeaveGame,
        })
        .await;

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), ProtocolError> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}

/// Error reply for a message that does not decode
fn bad_message(err: &serde_json::Error) -> ServerMsg {
    ServerMsg::Error {
        code: "bad_message".to_string(),
        message: err.to_string(),
    }
}
