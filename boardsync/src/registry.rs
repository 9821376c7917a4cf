//! Task registry: the client's in-memory copy of a board's tasks.
//!
//! The registry is the single source of column contents. It is replaced
//! wholesale by reloads and patched locally by the drag engine. Reloads are
//! sequenced with [`LoadTicket`]s so that a slow response can never
//! overwrite a newer one, and locally applied patches survive snapshots
//! that were requested before the patch was made.

use std::collections::HashMap;

use boardsync_proto::task::{Task, TaskId, TaskPriority, TaskStatus};

/// Sequence number identifying one reload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(u64);

impl LoadTicket {
    /// Raw sequence number.
    #[must_use]
    pub const fn seq(self) -> u64 {
        self.0
    }
}

/// Result of offering a snapshot to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The snapshot replaced the task set.
    Applied,
    /// A newer snapshot was already applied; this one was dropped.
    Stale,
}

/// Fields to overwrite on one task. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// New status.
    pub status: Option<TaskStatus>,
    /// New priority.
    pub priority: Option<TaskPriority>,
    /// New title.
    pub title: Option<String>,
}

impl TaskPatch {
    /// Patch that only changes the status.
    #[must_use]
    pub const fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            priority: None,
            title: None,
        }
    }

    fn apply_to(&self, task: &mut Task) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
    }

    fn merge(&mut self, newer: Self) {
        if newer.status.is_some() {
            self.status = newer.status;
        }
        if newer.priority.is_some() {
            self.priority = newer.priority;
        }
        if newer.title.is_some() {
            self.title = newer.title;
        }
    }
}

/// Search and priority filter of the board's filter bar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Case-insensitive text matched against title and description.
    pub query: String,
    /// Only tasks with this priority, when set.
    pub priority: Option<TaskPriority>,
}

impl TaskFilter {
    /// Whether the filter lets every task through.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty() && self.priority.is_none()
    }

    /// Whether `task` passes the filter.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(priority) = self.priority
            && task.priority != priority
        {
            return false;
        }
        let query = self.query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        task.title.to_lowercase().contains(&query)
            || task
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&query))
    }
}

/// Tasks grouped into the four status columns.
///
/// Within a column, tasks keep the order the server returned them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardColumns<'a> {
    columns: [Vec<&'a Task>; 4],
}

impl<'a> BoardColumns<'a> {
    /// Tasks in the column for `status`.
    #[must_use]
    pub fn tasks(&self, status: TaskStatus) -> &[&'a Task] {
        &self.columns[status.column()]
    }

    /// Ids in the column for `status`, in order.
    #[must_use]
    pub fn ids(&self, status: TaskStatus) -> Vec<&'a TaskId> {
        self.columns[status.column()].iter().map(|t| &t.id).collect()
    }

    /// Number of tasks in the column for `status`.
    #[must_use]
    pub fn len(&self, status: TaskStatus) -> usize {
        self.columns[status.column()].len()
    }

    /// Whether every column is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(Vec::is_empty)
    }
}

/// A local patch waiting to be confirmed by a later snapshot.
#[derive(Debug, Clone)]
struct LocalStamp {
    /// Last ticket issued when the patch was applied.
    seq: u64,
    patch: TaskPatch,
}

/// In-memory task set for one board.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    /// Tasks in server order.
    tasks: Vec<Task>,
    /// Last ticket handed out by [`begin_load`](Self::begin_load).
    issued: u64,
    /// Ticket of the last applied snapshot.
    applied: u64,
    /// Locally patched tasks not yet covered by a newer snapshot.
    stamps: HashMap<TaskId, LocalStamp>,
}

impl TaskRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire task set, unconditionally.
    pub fn load(&mut self, tasks: Vec<Task>) {
        let ticket = self.begin_load();
        self.load_with(ticket, tasks);
    }

    /// Hand out the ticket for a reload about to be requested.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.issued += 1;
        LoadTicket(self.issued)
    }

    /// Offer the snapshot requested with `ticket`.
    ///
    /// A snapshot older than the last applied one is dropped. Tasks patched
    /// locally after `ticket` was issued keep their patched fields, since
    /// the snapshot may predate the patch.
    pub fn load_with(&mut self, ticket: LoadTicket, mut tasks: Vec<Task>) -> LoadOutcome {
        if ticket.0 <= self.applied {
            tracing::debug!(ticket = ticket.0, applied = self.applied, "dropping stale task snapshot");
            return LoadOutcome::Stale;
        }

        self.stamps.retain(|_, stamp| stamp.seq >= ticket.0);
        for task in &mut tasks {
            if let Some(stamp) = self.stamps.get(&task.id) {
                stamp.patch.apply_to(task);
            }
        }

        self.tasks = tasks;
        self.applied = ticket.0;
        LoadOutcome::Applied
    }

    /// Overwrite `patch`'s fields on one task.
    ///
    /// Returns `false` (and does nothing) if the task is not present.
    pub fn apply(&mut self, task_id: &TaskId, patch: TaskPatch) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| &t.id == task_id) else {
            return false;
        };
        patch.apply_to(task);

        let seq = self.issued;
        match self.stamps.get_mut(task_id) {
            Some(stamp) => {
                stamp.seq = seq;
                stamp.patch.merge(patch);
            }
            None => {
                self.stamps.insert(task_id.clone(), LocalStamp { seq, patch });
            }
        }
        true
    }

    /// Put back a previously captured copy of a task.
    ///
    /// Returns `false` if the task has since disappeared from the set; a
    /// removed task is not resurrected.
    pub fn restore(&mut self, snapshot: Task) -> bool {
        self.stamps.remove(&snapshot.id);
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == snapshot.id) else {
            return false;
        };
        *task = snapshot;
        true
    }

    /// Look up a task by id.
    #[must_use]
    pub fn find(&self, task_id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == task_id)
    }

    /// All tasks in server order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether there are no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Ticket of the last applied snapshot, if any.
    #[must_use]
    pub const fn applied_ticket(&self) -> Option<LoadTicket> {
        if self.applied == 0 {
            None
        } else {
            Some(LoadTicket(self.applied))
        }
    }

    /// Group all tasks by status, recomputed from scratch.
    #[must_use]
    pub fn columns(&self) -> BoardColumns<'_> {
        self.columns_filtered(&TaskFilter::default())
    }

    /// Group the tasks passing `filter` by status, recomputed from scratch.
    #[must_use]
    pub fn columns_filtered(&self, filter: &TaskFilter) -> BoardColumns<'_> {
        let columns: [Vec<&Task>; 4] = TaskStatus::ALL.map(|status| {
            self.tasks
                .iter()
                .filter(|t| t.status == status && filter.matches(t))
                .collect()
        });
        BoardColumns { columns }
    }
}
