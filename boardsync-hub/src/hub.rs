//! Board channel server: WebSocket handler, frame relaying and server
//! startup.
//!
//! Each connection is authenticated by its `?token=` query parameter and
//! joined to the channel of the board in its path. Frames from clients are
//! stamped with the sender's identity and a server timestamp before they
//! are relayed to the rest of the board.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use boardsync_proto::codec;
use boardsync_proto::frame::{InboundFrame, OutboundFrame};
use boardsync_proto::time::Timestamp;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SeedUser;
use crate::routes;
use crate::state::HubState;

/// Query parameters of the channel endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct ChannelQuery {
    #[serde(default)]
    token: Option<String>,
}

/// Where a relayed frame goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    Everyone,
    Others,
}

/// Turn one client text frame into the frame relayed to the board.
///
/// Text that is not a JSON object with a `type` is relayed as chat. Frame
/// types the hub does not relay yield `None`.
fn relay_frame(user: &SeedUser, text: &str) -> Option<(InboundFrame, Audience)> {
    let value = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) if value.get("type").is_some() => value,
        Ok(value) => {
            let message = value
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map_or_else(|| text.to_string(), str::to_string);
            return Some((chat(user, message), Audience::Everyone));
        }
        Err(_) => return Some((chat(user, text.to_string()), Audience::Everyone)),
    };

    match serde_json::from_value::<OutboundFrame>(value) {
        Ok(OutboundFrame::Chat { message }) => Some((chat(user, message), Audience::Everyone)),
        Ok(OutboundFrame::Typing { is_typing }) => Some((
            InboundFrame::Typing {
                user_id: Some(user.id.clone()),
                username: user.username.clone(),
                is_typing,
            },
            Audience::Others,
        )),
        Ok(OutboundFrame::TaskUpdate {
            task_id,
            action,
            details,
        }) => Some((
            InboundFrame::TaskUpdate {
                task_id: Some(task_id),
                action,
                details,
                username: user.username.clone(),
                user_id: Some(user.id.clone()),
                timestamp: Timestamp::now(),
            },
            Audience::Everyone,
        )),
        Ok(OutboundFrame::Unknown) => None,
        Err(e) => {
            tracing::warn!(user = %user.username, error = %e, "malformed frame");
            None
        }
    }
}

fn chat(user: &SeedUser, message: String) -> InboundFrame {
    InboundFrame::Chat {
        user_id: user.id.clone(),
        username: user.username.clone(),
        message,
        timestamp: Timestamp::now(),
    }
}

/// Send a policy-violation close frame and drop the socket.
async fn reject(mut socket: WebSocket, reason: &'static str) {
    tracing::warn!(reason, "rejecting board channel");
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: Utf8Bytes::from_static(reason),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

/// Handles an upgraded WebSocket connection for one user on one board.
///
/// The connection lifecycle:
/// 1. Resolve the token and check board access, closing with 1008 on failure.
/// 2. Join the board channel, announce the user to the others and welcome them.
/// 3. Relay frames until either side closes.
/// 4. Leave the channel and announce the departure.
pub async fn handle_socket(
    socket: WebSocket,
    state: Arc<HubState>,
    board_id: String,
    token: Option<String>,
) {
    let Some(user) = token
        .as_deref()
        .and_then(|t| state.authenticate(t).ok())
        .cloned()
    else {
        reject(socket, "Invalid token").await;
        return;
    };
    if state.board_for(&user, &board_id).is_err() {
        reject(socket, "Access denied").await;
        return;
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let connection_id = state.join(&board_id, &user, tx).await;

    tracing::info!(board_id = %board_id, user = %user.username, connection_id, "user joined board channel");

    let joined = InboundFrame::UserJoined {
        user_id: Some(user.id.clone()),
        username: user.username.clone(),
        timestamp: Timestamp::now(),
    };
    state.broadcast(&board_id, &joined, Some(connection_id)).await;
    let welcome = InboundFrame::System {
        message: format!("Welcome to the board chat, {}!", user.username),
        timestamp: Timestamp::now(),
    };
    state.send_to(&board_id, connection_id, &welcome).await;

    // Writer: forward queued frames to the socket.
    let writer_user = user.username.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(user = %writer_user, "WebSocket write failed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    // Reader: relay frames from this user.
    let reader_state = Arc::clone(&state);
    let reader_board = board_id.clone();
    let reader_user = user.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if text.len() > codec::MAX_FRAME_SIZE {
                        tracing::warn!(user = %reader_user.username, size = text.len(), "frame too large");
                        continue;
                    }
                    let Some((frame, audience)) = relay_frame(&reader_user, text.as_str()) else {
                        continue;
                    };
                    let skip = (audience == Audience::Others).then_some(connection_id);
                    reader_state.broadcast(&reader_board, &frame, skip).await;
                }
                Message::Close(_) => {
                    tracing::info!(user = %reader_user.username, "received close frame");
                    break;
                }
                _ => {
                    // Ignore binary, ping and pong frames.
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.leave(&board_id, connection_id).await;
    let left = InboundFrame::UserLeft {
        user_id: Some(user.id.clone()),
        username: user.username.clone(),
        timestamp: Timestamp::now(),
    };
    state.broadcast(&board_id, &left, None).await;
    tracing::info!(board_id = %board_id, user = %user.username, "user left board channel");
}

/// Axum handler for `GET /chat/ws/{board_id}?token=...`.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(board_id): Path<String>,
    Query(query): Query<ChannelQuery>,
    State(state): State<Arc<HubState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, board_id, query.token))
}

/// Build the full hub router: REST endpoints plus the channel endpoint.
pub fn router(state: Arc<HubState>) -> axum::Router {
    routes::router()
        .route("/chat/ws/{board_id}", axum::routing::get(ws_handler))
        .with_state(state)
}

/// Starts the hub with a pre-built [`HubState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<HubState>,
) -> Result<(SocketAddr, JoinHandle<()>), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "hub server error");
        }
    });

    Ok((bound_addr, handle))
}
