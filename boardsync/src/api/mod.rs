//! REST collaborator for board data.
//!
//! Defines the [`BoardApi`] trait the board session calls into for
//! request/response operations. Implementations:
//! - [`http::HttpBoardApi`]: talks to a board server over HTTP
//! - [`memory::InMemoryBoardApi`]: scripted in-process board for testing

pub mod http;
pub mod memory;

use boardsync_proto::board::Board;
use boardsync_proto::presence::OnlineUsers;
use boardsync_proto::task::{Task, TaskId, TaskStatus};

/// Errors returned by [`BoardApi`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("server returned {status}: {detail}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// The `detail` text of the error body, or the status reason.
        detail: String,
    },

    /// The request never produced a response (connect, timeout, TLS).
    #[error("request failed: {0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Text to show the user: the server's detail when there is one.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

/// Request/response operations on a board server.
///
/// All methods are independent; no call relies on the outcome of another.
pub trait BoardApi: Send + Sync + 'static {
    /// Fetch a board with its members and stats.
    fn fetch_board(
        &self,
        board_id: &str,
    ) -> impl std::future::Future<Output = Result<Board, ApiError>> + Send;

    /// Fetch all tasks of a board, in server order.
    fn fetch_board_tasks(
        &self,
        board_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, ApiError>> + Send;

    /// Set the status of one task.
    ///
    /// The server only acknowledges the change; the new status is the one
    /// requested.
    fn patch_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;

    /// Fetch the users currently connected to the board channel.
    fn fetch_online_users(
        &self,
        board_id: &str,
    ) -> impl std::future::Future<Output = Result<OnlineUsers, ApiError>> + Send;
}
