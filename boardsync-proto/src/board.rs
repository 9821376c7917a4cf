//! Board details as served by the board-details endpoint.

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskStatus};
use crate::time::Timestamp;

/// Aggregate task counts for a board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardStats {
    /// Number of tasks on the board.
    #[serde(default)]
    pub total_tasks: u64,
    /// Number of tasks in the completed column.
    #[serde(default)]
    pub completed_tasks: u64,
    /// Everything that is not completed.
    #[serde(default)]
    pub pending_tasks: u64,
}

impl BoardStats {
    /// Computes stats from a task list.
    #[must_use]
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let (mut total, mut completed) = (0u64, 0u64);
        for task in tasks {
            total += 1;
            if task.status == TaskStatus::Completed {
                completed += 1;
            }
        }
        Self {
            total_tasks: total,
            completed_tasks: completed,
            pending_tasks: total - completed,
        }
    }
}

/// A board with its members and stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// Board identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Owning team, if the server reports one.
    #[serde(default)]
    pub team_id: Option<String>,
    /// User ids allowed on the board.
    #[serde(default)]
    pub member_ids: Vec<String>,
    /// Creator user id.
    #[serde(default)]
    pub created_by: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    /// Task counts at fetch time.
    #[serde(default)]
    pub stats: BoardStats,
}
