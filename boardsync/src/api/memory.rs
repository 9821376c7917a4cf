//! In-process [`BoardApi`] for tests and offline runs.
//!
//! Holds one board, its tasks and an online-user list behind a
//! `parking_lot::Mutex`. Every call is recorded so tests can assert on the
//! exact sequence of requests; failures and delays can be injected per
//! operation.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use boardsync_proto::board::{Board, BoardStats};
use boardsync_proto::presence::{OnlineUsers, UserSummary};
use boardsync_proto::task::{Task, TaskId, TaskStatus};
use boardsync_proto::time::Timestamp;

use super::{ApiError, BoardApi};

/// One recorded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    /// `fetch_board(board_id)`.
    FetchBoard(String),
    /// `fetch_board_tasks(board_id)`.
    FetchBoardTasks(String),
    /// `patch_task_status(task_id, status)`.
    PatchTaskStatus {
        /// Target task.
        task_id: TaskId,
        /// Requested status.
        status: TaskStatus,
    },
    /// `fetch_online_users(board_id)`.
    FetchOnlineUsers(String),
}

#[derive(Debug, Default)]
struct Inner {
    board: Option<Board>,
    tasks: Vec<Task>,
    online: Vec<UserSummary>,
    calls: Vec<ApiCall>,
    patch_failure: Option<ApiError>,
    load_failure: Option<ApiError>,
    presence_failure: Option<ApiError>,
    task_fetch_delays: VecDeque<Duration>,
    patch_delay: Duration,
}

/// Scripted board server living in memory.
#[derive(Debug, Default)]
pub struct InMemoryBoardApi {
    inner: Mutex<Inner>,
}

impl InMemoryBoardApi {
    /// Create a server holding `board` and `tasks`.
    #[must_use]
    pub fn new(board: Board, tasks: Vec<Task>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                board: Some(board),
                tasks,
                ..Inner::default()
            }),
        }
    }

    /// Replace the server-side task list (simulates a peer's edits).
    pub fn set_tasks(&self, tasks: Vec<Task>) {
        self.inner.lock().tasks = tasks;
    }

    /// Current server-side tasks.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.inner.lock().tasks.clone()
    }

    /// Set a task's status server-side without recording a call.
    pub fn set_status(&self, task_id: &TaskId, status: TaskStatus) {
        if let Some(task) = self.inner.lock().tasks.iter_mut().find(|t| &t.id == task_id) {
            task.status = status;
        }
    }

    /// Replace the online-user list.
    pub fn set_online(&self, users: Vec<UserSummary>) {
        self.inner.lock().online = users;
    }

    /// Make every status patch fail with `error` (or succeed again with `None`).
    pub fn fail_patches(&self, error: Option<ApiError>) {
        self.inner.lock().patch_failure = error;
    }

    /// Make board and task fetches fail with `error`.
    pub fn fail_loads(&self, error: Option<ApiError>) {
        self.inner.lock().load_failure = error;
    }

    /// Make online-user fetches fail with `error`.
    pub fn fail_presence(&self, error: Option<ApiError>) {
        self.inner.lock().presence_failure = error;
    }

    /// Delay the response of the next task fetch by `delay`.
    ///
    /// The tasks returned are the ones present when the call was made, so a
    /// delayed fetch answers with a snapshot that may be outdated by then.
    pub fn delay_next_task_fetch(&self, delay: Duration) {
        self.inner.lock().task_fetch_delays.push_back(delay);
    }

    /// Delay every status patch by `delay`.
    pub fn delay_patches(&self, delay: Duration) {
        self.inner.lock().patch_delay = delay;
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.inner.lock().calls.clone()
    }

    /// Status patches made so far, in order.
    #[must_use]
    pub fn patch_calls(&self) -> Vec<(TaskId, TaskStatus)> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ApiCall::PatchTaskStatus { task_id, status } => Some((task_id.clone(), *status)),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.inner.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    fn record(&self, call: ApiCall) {
        self.inner.lock().calls.push(call);
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        detail: format!("{what} not found"),
    }
}

impl BoardApi for InMemoryBoardApi {
    async fn fetch_board(&self, board_id: &str) -> Result<Board, ApiError> {
        self.record(ApiCall::FetchBoard(board_id.to_string()));
        let inner = self.inner.lock();
        if let Some(err) = &inner.load_failure {
            return Err(err.clone());
        }
        let mut board = inner
            .board
            .clone()
            .filter(|b| b.id == board_id)
            .ok_or_else(|| not_found("Board"))?;
        board.stats = BoardStats::from_tasks(&inner.tasks);
        Ok(board)
    }

    async fn fetch_board_tasks(&self, board_id: &str) -> Result<Vec<Task>, ApiError> {
        self.record(ApiCall::FetchBoardTasks(board_id.to_string()));
        let (snapshot, delay) = {
            let mut inner = self.inner.lock();
            if let Some(err) = &inner.load_failure {
                return Err(err.clone());
            }
            let snapshot: Vec<Task> = inner
                .tasks
                .iter()
                .filter(|t| t.board_id == board_id)
                .cloned()
                .collect();
            (snapshot, inner.task_fetch_delays.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn patch_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<(), ApiError> {
        self.record(ApiCall::PatchTaskStatus {
            task_id: task_id.clone(),
            status,
        });
        let delay = self.inner.lock().patch_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.inner.lock();
        if let Some(err) = &inner.patch_failure {
            return Err(err.clone());
        }
        let task = inner
            .tasks
            .iter_mut()
            .find(|t| &t.id == task_id)
            .ok_or_else(|| not_found("Task"))?;
        task.status = status;
        task.updated_at = Timestamp::now();
        Ok(())
    }

    async fn fetch_online_users(&self, board_id: &str) -> Result<OnlineUsers, ApiError> {
        self.record(ApiCall::FetchOnlineUsers(board_id.to_string()));
        let inner = self.inner.lock();
        if let Some(err) = &inner.presence_failure {
            return Err(err.clone());
        }
        Ok(OnlineUsers {
            board_id: board_id.to_string(),
            online_users: inner.online.clone(),
            count: inner.online.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardsync_proto::task::TaskPriority;

    fn board() -> Board {
        Board {
            id: "b1".into(),
            name: "Sprint".into(),
            description: None,
            team_id: None,
            member_ids: vec!["u1".into()],
            created_by: Some("u1".into()),
            created_at: None,
            stats: BoardStats::default(),
        }
    }

    fn task(id: &str, status: TaskStatus) -> Task {
        Task {
            id: TaskId::new(id),
            title: id.into(),
            description: None,
            board_id: "b1".into(),
            assigned_to: None,
            status,
            priority: TaskPriority::Medium,
            due_date: None,
            created_by: "u1".into(),
            created_at: Timestamp::default(),
            updated_at: Timestamp::default(),
        }
    }

    #[tokio::test]
    async fn patch_updates_server_state_and_records_call() {
        let api = InMemoryBoardApi::new(board(), vec![task("t1", TaskStatus::Todo)]);
        api.patch_task_status(&TaskId::new("t1"), TaskStatus::Review)
            .await
            .unwrap();
        assert_eq!(api.tasks()[0].status, TaskStatus::Review);
        assert_eq!(
            api.patch_calls(),
            vec![(TaskId::new("t1"), TaskStatus::Review)]
        );
    }

    #[tokio::test]
    async fn patch_unknown_task_is_not_found() {
        let api = InMemoryBoardApi::new(board(), Vec::new());
        let err = api
            .patch_task_status(&TaskId::new("nope"), TaskStatus::Review)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Task not found");
    }

    #[tokio::test]
    async fn injected_patch_failure_leaves_state_alone() {
        let api = InMemoryBoardApi::new(board(), vec![task("t1", TaskStatus::Todo)]);
        api.fail_patches(Some(ApiError::Status {
            status: 403,
            detail: "denied".into(),
        }));
        assert!(
            api.patch_task_status(&TaskId::new("t1"), TaskStatus::Completed)
                .await
                .is_err()
        );
        assert_eq!(api.tasks()[0].status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn fetch_board_computes_stats() {
        let api = InMemoryBoardApi::new(
            board(),
            vec![task("t1", TaskStatus::Todo), task("t2", TaskStatus::Completed)],
        );
        let board = api.fetch_board("b1").await.unwrap();
        assert_eq!(board.stats.total_tasks, 2);
        assert_eq!(board.stats.completed_tasks, 1);
        assert!(api.fetch_board("other").await.is_err());
    }

    #[tokio::test]
    async fn online_users_snapshot() {
        let api = InMemoryBoardApi::new(board(), Vec::new());
        api.set_online(vec![UserSummary::from_id("u1"), UserSummary::from_id("u2")]);
        let snapshot = api.fetch_online_users("b1").await.unwrap();
        assert_eq!(snapshot.count, 2);
        assert_eq!(
            api.count_calls(|c| matches!(c, ApiCall::FetchOnlineUsers(_))),
            1
        );
    }
}
