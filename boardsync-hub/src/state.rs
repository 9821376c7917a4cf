//! Shared hub state: seeded users, boards and tasks plus the live
//! connection registry of every board channel.
//!
//! Users and boards are fixed at startup. Tasks and connections are
//! behind `tokio` locks because REST handlers and socket tasks touch them
//! concurrently.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::extract::ws::Message;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use boardsync_proto::board::{Board, BoardStats};
use boardsync_proto::codec;
use boardsync_proto::frame::InboundFrame;
use boardsync_proto::presence::{OnlineUsers, UserSummary};
use boardsync_proto::task::{Task, TaskId, TaskStatus};
use boardsync_proto::time::Timestamp;
use tokio::sync::{RwLock, mpsc};

use crate::config::{Role, Seed, SeedUser};

/// A request the hub refuses.
///
/// Rendered as `{"detail": ...}` with the matching HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// Missing or unknown token.
    #[error("Invalid token")]
    Unauthorized,
    /// Authenticated, but not allowed.
    #[error("{0}")]
    Forbidden(String),
    /// No such board or task.
    #[error("{0}")]
    NotFound(String),
}

impl HubError {
    /// The HTTP status this error maps to.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn access_denied() -> Self {
        Self::Forbidden("Access denied".to_string())
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

/// One open board channel.
struct Connection {
    user_id: String,
    username: String,
    sender: mpsc::UnboundedSender<Message>,
}

/// Shared hub state.
pub struct HubState {
    /// Users keyed by token.
    users: HashMap<String, SeedUser>,
    boards: HashMap<String, Board>,
    tasks: RwLock<Vec<Task>>,
    /// Board id -> connection id -> connection. Connection ids grow
    /// monotonically, so iteration order is connect order.
    connections: RwLock<HashMap<String, BTreeMap<u64, Connection>>>,
    next_connection: AtomicU64,
}

impl Default for HubState {
    fn default() -> Self {
        Self::new(Seed::demo())
    }
}

impl HubState {
    /// Build the state from seed data.
    #[must_use]
    pub fn new(seed: Seed) -> Self {
        let now = Timestamp::now();
        let users = seed
            .users
            .into_iter()
            .map(|u| (u.token.clone(), u))
            .collect();
        let boards = seed
            .boards
            .into_iter()
            .map(|b| {
                let board = Board {
                    id: b.id.clone(),
                    name: b.name,
                    description: b.description,
                    team_id: b.team_id,
                    member_ids: b.member_ids,
                    created_by: b.created_by,
                    created_at: Some(now.clone()),
                    stats: BoardStats::default(),
                };
                (b.id, board)
            })
            .collect();
        let tasks = seed
            .tasks
            .into_iter()
            .map(|t| Task {
                id: t.id,
                title: t.title,
                description: t.description,
                board_id: t.board_id,
                assigned_to: t.assigned_to,
                status: t.status,
                priority: t.priority,
                due_date: None,
                created_by: t.created_by,
                created_at: now.clone(),
                updated_at: now.clone(),
            })
            .collect();

        Self {
            users,
            boards,
            tasks: RwLock::new(tasks),
            connections: RwLock::new(HashMap::new()),
            next_connection: AtomicU64::new(1),
        }
    }

    // -----------------------------------------------------------------------
    // Access control
    // -----------------------------------------------------------------------

    /// Resolve a token to its user.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Unauthorized`] for an unknown token.
    pub fn authenticate(&self, token: &str) -> Result<&SeedUser, HubError> {
        self.users.get(token).ok_or(HubError::Unauthorized)
    }

    /// Look up a board the user may see.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] for an unknown board, [`HubError::Forbidden`]
    /// if the user is neither an admin nor a member.
    pub fn board_for(&self, user: &SeedUser, board_id: &str) -> Result<&Board, HubError> {
        let board = self
            .boards
            .get(board_id)
            .ok_or_else(|| HubError::NotFound("Board not found".to_string()))?;
        if user.role == Role::Admin || board.member_ids.iter().any(|m| m == &user.id) {
            Ok(board)
        } else {
            Err(HubError::access_denied())
        }
    }

    // -----------------------------------------------------------------------
    // Boards and tasks
    // -----------------------------------------------------------------------

    /// Board details with stats computed from the current tasks.
    ///
    /// # Errors
    ///
    /// See [`Self::board_for`].
    pub async fn board_details(&self, user: &SeedUser, board_id: &str) -> Result<Board, HubError> {
        let mut board = self.board_for(user, board_id)?.clone();
        let tasks = self.tasks.read().await;
        board.stats = BoardStats::from_tasks(tasks.iter().filter(|t| t.board_id == board_id));
        Ok(board)
    }

    /// All tasks of a board, in seed order.
    ///
    /// # Errors
    ///
    /// See [`Self::board_for`].
    pub async fn board_tasks(&self, user: &SeedUser, board_id: &str) -> Result<Vec<Task>, HubError> {
        self.board_for(user, board_id)?;
        let tasks = self.tasks.read().await;
        Ok(tasks
            .iter()
            .filter(|t| t.board_id == board_id)
            .cloned()
            .collect())
    }

    /// Move a task to another column.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] if the task does not exist,
    /// [`HubError::Forbidden`] if the user cannot see its board or is a
    /// team member moving someone else's task.
    pub async fn update_task_status(
        &self,
        user: &SeedUser,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, HubError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .iter_mut()
            .find(|t| &t.id == task_id)
            .ok_or_else(|| HubError::NotFound("Task not found".to_string()))?;

        self.board_for(user, &task.board_id)?;
        if user.role == Role::TeamMember && task.assigned_to.as_deref() != Some(user.id.as_str()) {
            return Err(HubError::Forbidden(
                "You can only update tasks assigned to you".to_string(),
            ));
        }

        task.status = status;
        task.updated_at = Timestamp::now();
        tracing::info!(task_id = %task_id, status = %status.as_str(), user = %user.username, "task status updated");
        Ok(task.clone())
    }

    // -----------------------------------------------------------------------
    // Board channels
    // -----------------------------------------------------------------------

    /// Register a connection on a board channel and return its id.
    pub async fn join(
        &self,
        board_id: &str,
        user: &SeedUser,
        sender: mpsc::UnboundedSender<Message>,
    ) -> u64 {
        let id = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let mut conns = self.connections.write().await;
        conns.entry(board_id.to_string()).or_default().insert(
            id,
            Connection {
                user_id: user.id.clone(),
                username: user.username.clone(),
                sender,
            },
        );
        id
    }

    /// Remove a connection. Returns whether it was registered.
    pub async fn leave(&self, board_id: &str, connection_id: u64) -> bool {
        let mut conns = self.connections.write().await;
        let Some(board) = conns.get_mut(board_id) else {
            return false;
        };
        let removed = board.remove(&connection_id).is_some();
        if board.is_empty() {
            conns.remove(board_id);
        }
        removed
    }

    /// Users connected to a board, deduplicated, in connect order.
    pub async fn online_users(&self, board_id: &str) -> Vec<UserSummary> {
        let conns = self.connections.read().await;
        let mut users: Vec<UserSummary> = Vec::new();
        for conn in conns.get(board_id).into_iter().flat_map(BTreeMap::values) {
            if !users.iter().any(|u| u.id == conn.user_id) {
                users.push(UserSummary {
                    id: conn.user_id.clone(),
                    username: Some(conn.username.clone()),
                });
            }
        }
        users
    }

    /// The online-users response for a board the user may see.
    ///
    /// # Errors
    ///
    /// See [`Self::board_for`].
    pub async fn online_snapshot(&self, user: &SeedUser, board_id: &str) -> Result<OnlineUsers, HubError> {
        self.board_for(user, board_id)?;
        let online_users = self.online_users(board_id).await;
        Ok(OnlineUsers {
            board_id: board_id.to_string(),
            count: online_users.len(),
            online_users,
        })
    }

    /// Send a frame to every connection on a board except `skip`.
    ///
    /// Returns the number of connections the frame was queued for.
    pub async fn broadcast(&self, board_id: &str, frame: &InboundFrame, skip: Option<u64>) -> usize {
        let text = match codec::encode(frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(board_id = %board_id, error = %e, "failed to encode frame");
                return 0;
            }
        };
        let conns = self.connections.read().await;
        let mut delivered = 0;
        for (id, conn) in conns.get(board_id).into_iter().flatten() {
            if Some(*id) == skip {
                continue;
            }
            if conn.sender.send(Message::Text(text.clone().into())).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Send a frame to a single connection.
    pub async fn send_to(&self, board_id: &str, connection_id: u64, frame: &InboundFrame) -> bool {
        let text = match codec::encode(frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(board_id = %board_id, error = %e, "failed to encode frame");
                return false;
            }
        };
        let conns = self.connections.read().await;
        conns
            .get(board_id)
            .and_then(|board| board.get(&connection_id))
            .is_some_and(|conn| conn.sender.send(Message::Text(text.into())).is_ok())
    }
}
