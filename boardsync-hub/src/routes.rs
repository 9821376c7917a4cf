//! REST endpoints of the hub.
//!
//! Every route authenticates with `Authorization: Bearer <token>` against
//! the seeded token table. Errors are returned as `{"detail": ...}`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::routing::{get, put};
use axum::{Json, Router};
use boardsync_proto::board::Board;
use boardsync_proto::presence::OnlineUsers;
use boardsync_proto::task::{StatusUpdate, StatusUpdated, Task, TaskId};

use crate::config::SeedUser;
use crate::state::{HubError, HubState};

/// REST routes, without state attached.
pub fn router() -> Router<Arc<HubState>> {
    Router::new()
        .route("/tasks/boards/{board_id}", get(get_board))
        .route("/tasks/boards/{board_id}/tasks", get(get_board_tasks))
        .route("/tasks/tasks/{task_id}/status", put(put_task_status))
        .route("/chat/boards/{board_id}/online-users", get(get_online_users))
}

/// Resolve the bearer token of a request.
fn bearer_user(state: &HubState, headers: &HeaderMap) -> Result<SeedUser, HubError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(HubError::Unauthorized)?;
    state.authenticate(token.trim()).cloned()
}

async fn get_board(
    State(state): State<Arc<HubState>>,
    Path(board_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Board>, HubError> {
    let user = bearer_user(&state, &headers)?;
    Ok(Json(state.board_details(&user, &board_id).await?))
}

async fn get_board_tasks(
    State(state): State<Arc<HubState>>,
    Path(board_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<Task>>, HubError> {
    let user = bearer_user(&state, &headers)?;
    Ok(Json(state.board_tasks(&user, &board_id).await?))
}

async fn put_task_status(
    State(state): State<Arc<HubState>>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<StatusUpdated>, HubError> {
    let user = bearer_user(&state, &headers)?;
    state
        .update_task_status(&user, &TaskId::new(task_id), update.status)
        .await?;
    Ok(Json(StatusUpdated::new()))
}

async fn get_online_users(
    State(state): State<Arc<HubState>>,
    Path(board_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<OnlineUsers>, HubError> {
    let user = bearer_user(&state, &headers)?;
    Ok(Json(state.online_snapshot(&user, &board_id).await?))
}
