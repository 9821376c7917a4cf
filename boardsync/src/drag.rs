//! Drag reconciliation engine.
//!
//! Turns drag gestures into status transitions. A drop resolves to a
//! destination column: a column target directly, a task target via that
//! task's current status. Dropping never reorders within a column.
//!
//! The engine applies the move to the [`TaskRegistry`] optimistically and
//! returns a [`DropResolution::Move`] carrying the pre-move snapshot. The
//! caller confirms the move with the server and, on failure, hands the
//! snapshot back to [`TaskRegistry::restore`].

use boardsync_proto::task::{Task, TaskId, TaskStatus};

use crate::registry::{TaskPatch, TaskRegistry};

/// Something a dragged task can be dropped on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// A status column.
    Column(TaskStatus),
    /// Another task card; means "into that card's column".
    Task(TaskId),
}

/// Errors from starting a drag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DragError {
    /// The task is not on the board.
    #[error("task {0} is not on this board")]
    UnknownTask(TaskId),
}

/// A drag in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    /// The dragged task.
    pub task_id: TaskId,
    /// Current drop target under the pointer, if any.
    pub over: Option<DropTarget>,
}

/// How a gesture ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropResolution {
    /// No drag was active, no target, or the task vanished mid-drag.
    Abandoned,
    /// Dropped into the column it already sits in.
    NoChange {
        /// The dragged task.
        task_id: TaskId,
    },
    /// Moved to another column; the registry already reflects the move.
    Move {
        /// The dragged task.
        task_id: TaskId,
        /// Status before the move.
        from: TaskStatus,
        /// Status after the move.
        to: TaskStatus,
        /// Copy of the task taken before the move, for rollback.
        snapshot: Task,
    },
}

/// Tracks at most one drag at a time.
#[derive(Debug, Default)]
pub struct DragEngine {
    active: Option<DragSession>,
}

impl DragEngine {
    /// Create an idle engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start dragging `task_id`. Replaces any drag already in progress.
    ///
    /// # Errors
    ///
    /// Returns [`DragError::UnknownTask`] if the task is not in `registry`.
    pub fn start<'r>(
        &mut self,
        registry: &'r TaskRegistry,
        task_id: &TaskId,
    ) -> Result<&'r Task, DragError> {
        let task = registry
            .find(task_id)
            .ok_or_else(|| DragError::UnknownTask(task_id.clone()))?;
        self.active = Some(DragSession {
            task_id: task_id.clone(),
            over: None,
        });
        Ok(task)
    }

    /// Update the target under the pointer. Ignored when idle.
    pub fn hover(&mut self, target: Option<DropTarget>) {
        if let Some(session) = &mut self.active {
            session.over = target;
        }
    }

    /// Abort the drag. Returns the task that was being dragged.
    pub fn cancel(&mut self) -> Option<TaskId> {
        self.active.take().map(|session| session.task_id)
    }

    /// The drag in progress, if any.
    #[must_use]
    pub const fn active(&self) -> Option<&DragSession> {
        self.active.as_ref()
    }

    /// The dragged task, for rendering a floating card.
    #[must_use]
    pub fn overlay<'r>(&self, registry: &'r TaskRegistry) -> Option<&'r Task> {
        self.active
            .as_ref()
            .and_then(|session| registry.find(&session.task_id))
    }

    /// End the gesture on `target`. The drag session is gone afterwards,
    /// whatever the outcome.
    pub fn end(&mut self, registry: &mut TaskRegistry, target: Option<&DropTarget>) -> DropResolution {
        let Some(session) = self.active.take() else {
            return DropResolution::Abandoned;
        };
        let Some(to) = target.and_then(|t| resolve_destination(registry, t)) else {
            tracing::debug!(task_id = %session.task_id, "drop outside any target");
            return DropResolution::Abandoned;
        };
        let Some(snapshot) = registry.find(&session.task_id).cloned() else {
            tracing::debug!(task_id = %session.task_id, "dragged task vanished before drop");
            return DropResolution::Abandoned;
        };

        let from = snapshot.status;
        if from == to {
            return DropResolution::NoChange {
                task_id: session.task_id,
            };
        }

        registry.apply(&session.task_id, TaskPatch::status(to));
        tracing::debug!(task_id = %session.task_id, from = %from, to = %to, "task moved locally");
        DropResolution::Move {
            task_id: session.task_id,
            from,
            to,
            snapshot,
        }
    }
}

/// Status a drop on `target` lands in, or `None` for an unknown task.
#[must_use]
pub fn resolve_destination(registry: &TaskRegistry, target: &DropTarget) -> Option<TaskStatus> {
    match target {
        DropTarget::Column(status) => Some(*status),
        DropTarget::Task(task_id) => registry.find(task_id).map(|t| t.status),
    }
}
