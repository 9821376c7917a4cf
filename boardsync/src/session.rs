//! Board session: the owner of one board view.
//!
//! A [`BoardSession`] holds the task registry, drag engine, presence
//! tracker, message log and (while chat is open) the board channel. It is
//! the only writer of each of them.
//!
//! REST calls and channel connects run as spawned tasks in a [`JoinSet`].
//! Their completions come back through [`BoardSession::next_input`] next
//! to channel events, and [`BoardSession::apply`] handles exactly one
//! input at a time. A peer's `task_update` can therefore interleave with
//! a patch still in flight; the registry's load tickets keep the result
//! consistent.
//!
//! ```text
//! gesture ─► DragEngine ─► registry (optimistic) ─► spawn patch
//!                                                       │
//! channel frames ─┐                                     ▼
//!                 ├──► next_input() ──► apply() ◄── completions
//! JoinSet ────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use boardsync_proto::board::Board;
use boardsync_proto::frame::{InboundFrame, OutboundFrame};
use boardsync_proto::presence::OnlineUsers;
use boardsync_proto::task::{Task, TaskId, TaskStatus};

use crate::api::{ApiError, BoardApi};
use crate::channel::{
    BoardChannel, ChannelConnector, ChannelError, ChannelEvent, ChannelState, CloseReason,
    FrameTransport,
};
use crate::drag::{DragEngine, DragError, DragSession, DropResolution, DropTarget};
use crate::message_log::{self, MessageLog};
use crate::presence::{PresenceTicket, PresenceTracker};
use crate::registry::{LoadOutcome, LoadTicket, TaskPatch, TaskRegistry};

/// WebSocket close code the server uses for authentication failures.
const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Default number of reconnect attempts after the channel drops.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 3;

/// Default delay before the first reconnect attempt.
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default upper bound on the reconnect delay.
pub const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(8);

/// Bounded exponential backoff for channel reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnects to try before giving up. `0` disables reconnecting.
    pub attempts: u32,
    /// Delay before the first reconnect.
    pub base_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    /// A policy that never reconnects.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            attempts: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before reconnect number `n` (zero-based): `base · 2^n`, capped.
    #[must_use]
    pub fn delay_for(&self, n: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(n))
            .min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RECONNECT_ATTEMPTS,
            base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            max_delay: DEFAULT_RECONNECT_MAX_DELAY,
        }
    }
}

/// Settings for one board session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Board shown by this session.
    pub board_id: String,
    /// Reconnect behavior for the board channel.
    pub reconnect: ReconnectPolicy,
}

impl SessionConfig {
    /// Config for `board_id` with the default reconnect policy.
    pub fn new(board_id: impl Into<String>) -> Self {
        Self {
            board_id: board_id.into(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Replace the reconnect policy.
    #[must_use]
    pub const fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }
}

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Something the user tried did not work.
    Error,
}

/// A message for the user, shown in the status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text to display.
    pub text: String,
}

impl Notice {
    /// An informational notice.
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    /// An error notice.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Result of a background task spawned by the session.
#[derive(Debug)]
pub enum Completion<T> {
    /// Board and tasks fetched for a reload.
    BoardLoaded {
        /// Ticket the reload was issued under.
        ticket: LoadTicket,
        /// Board and its tasks, or the first error.
        result: Result<(Board, Vec<Task>), ApiError>,
    },
    /// Online-user snapshot fetched.
    PresenceLoaded {
        /// Ticket the fetch was issued under.
        ticket: PresenceTicket,
        /// The snapshot.
        result: Result<OnlineUsers, ApiError>,
    },
    /// Status patch answered.
    StatusPatched {
        /// Patched task.
        task_id: TaskId,
        /// Requested status.
        to: TaskStatus,
        /// Task as it was before the drag.
        snapshot: Task,
        /// Server acknowledgement.
        result: Result<(), ApiError>,
    },
    /// Channel connect attempt finished.
    Connected {
        /// Chat generation the attempt belongs to.
        generation: u64,
        /// `0` for the first connect, then one per reconnect.
        attempt: u32,
        /// The connected transport.
        result: Result<T, ChannelError>,
    },
}

/// One unit of work for [`BoardSession::apply`].
#[derive(Debug)]
pub enum SessionInput<T> {
    /// Something arrived on the board channel.
    Channel(ChannelEvent),
    /// A background task finished.
    Completion(Completion<T>),
    /// Nothing is pending: no channel and no task in flight.
    Idle,
}

/// How a drop was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// No drag, no target, or an unknown target.
    Abandoned,
    /// Dropped into its own column; nothing sent.
    Unchanged,
    /// Moved locally and a status patch is in flight.
    Submitted {
        /// Moved task.
        task_id: TaskId,
        /// New status.
        to: TaskStatus,
    },
}

/// Read-only view of a session for rendering.
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    /// Board id.
    pub board_id: &'a str,
    /// Cached board, once loaded.
    pub board: Option<&'a Board>,
    /// Task registry.
    pub registry: &'a TaskRegistry,
    /// Drag in progress.
    pub drag: Option<&'a DragSession>,
    /// Chat history.
    pub log: &'a MessageLog,
    /// Online users and typing indicators.
    pub presence: &'a PresenceTracker,
    /// Channel state.
    pub state: &'a ChannelState,
    /// Whether the chat panel is open.
    pub chat_open: bool,
    /// Background tasks in flight.
    pub pending: usize,
}

/// Owner of one board view.
pub struct BoardSession<A: BoardApi, C: ChannelConnector> {
    api: Arc<A>,
    connector: Arc<C>,
    config: SessionConfig,
    registry: TaskRegistry,
    drag: DragEngine,
    presence: PresenceTracker,
    log: MessageLog,
    board: Option<Board>,
    channel: Option<BoardChannel<C::Transport>>,
    state: ChannelState,
    /// Bumped on every open and close; connects from older generations are dropped.
    generation: u64,
    chat_open: bool,
    typing: bool,
    tasks: JoinSet<Completion<C::Transport>>,
    notices: Vec<Notice>,
}

impl<A: BoardApi, C: ChannelConnector> BoardSession<A, C> {
    /// Create a session. Nothing is fetched or connected yet.
    pub fn new(api: Arc<A>, connector: Arc<C>, config: SessionConfig) -> Self {
        Self {
            api,
            connector,
            config,
            registry: TaskRegistry::new(),
            drag: DragEngine::new(),
            presence: PresenceTracker::new(),
            log: MessageLog::new(),
            board: None,
            channel: None,
            state: ChannelState::Closed(CloseReason::Local),
            generation: 0,
            chat_open: false,
            typing: false,
            tasks: JoinSet::new(),
            notices: Vec::new(),
        }
    }

    // -----------------------------------------------------------------
    // Board data
    // -----------------------------------------------------------------

    /// Request a fresh copy of the board and its tasks.
    pub fn load_board(&mut self) -> LoadTicket {
        let ticket = self.registry.begin_load();
        let api = Arc::clone(&self.api);
        let board_id = self.config.board_id.clone();
        tracing::debug!(board_id = %board_id, ticket = ticket.seq(), "loading board");
        self.tasks.spawn(async move {
            let result = tokio::try_join!(
                api.fetch_board(&board_id),
                api.fetch_board_tasks(&board_id)
            );
            Completion::BoardLoaded { ticket, result }
        });
        ticket
    }

    fn refresh_presence(&mut self) {
        let ticket = self.presence.begin_refresh();
        let api = Arc::clone(&self.api);
        let board_id = self.config.board_id.clone();
        self.tasks.spawn(async move {
            let result = api.fetch_online_users(&board_id).await;
            Completion::PresenceLoaded { ticket, result }
        });
    }

    // -----------------------------------------------------------------
    // Drag gestures
    // -----------------------------------------------------------------

    /// Pick up a task.
    ///
    /// # Errors
    ///
    /// Returns [`DragError::UnknownTask`] if the task is not on the board.
    pub fn begin_drag(&mut self, task_id: &TaskId) -> Result<(), DragError> {
        self.drag.start(&self.registry, task_id).map(|_| ())
    }

    /// Move the drag over a new target.
    pub fn hover(&mut self, target: Option<DropTarget>) {
        self.drag.hover(target);
    }

    /// Abort the drag in progress.
    pub fn cancel_drag(&mut self) {
        if let Some(task_id) = self.drag.cancel() {
            tracing::debug!(task_id = %task_id, "drag cancelled");
        }
    }

    /// Drop the dragged task on `target`.
    ///
    /// A move to another column is applied locally at once and the status
    /// patch is issued in the background.
    pub fn drop_on(&mut self, target: Option<&DropTarget>) -> DropOutcome {
        match self.drag.end(&mut self.registry, target) {
            DropResolution::Abandoned => DropOutcome::Abandoned,
            DropResolution::NoChange { task_id } => {
                tracing::debug!(task_id = %task_id, "dropped into same column");
                DropOutcome::Unchanged
            }
            DropResolution::Move {
                task_id,
                from,
                to,
                snapshot,
            } => {
                tracing::info!(task_id = %task_id, from = %from, to = %to, "patching task status");
                let api = Arc::clone(&self.api);
                let patch_id = task_id.clone();
                self.tasks.spawn(async move {
                    let result = api.patch_task_status(&patch_id, to).await;
                    Completion::StatusPatched {
                        task_id: patch_id,
                        to,
                        snapshot,
                        result,
                    }
                });
                DropOutcome::Submitted { task_id, to }
            }
        }
    }

    // -----------------------------------------------------------------
    // Chat channel
    // -----------------------------------------------------------------

    /// Open the board channel. Does nothing if it is open or connecting.
    pub fn open_chat(&mut self) {
        if self.chat_open && !matches!(self.state, ChannelState::Closed(_)) {
            return;
        }
        self.chat_open = true;
        self.generation += 1;
        self.state = ChannelState::Connecting;
        self.spawn_connect(0, Duration::ZERO);
    }

    /// Close the board channel and discard chat state.
    pub async fn close_chat(&mut self) {
        self.chat_open = false;
        self.generation += 1;
        self.typing = false;
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
        self.log.clear();
        self.presence.clear();
        self.state = ChannelState::Closed(CloseReason::Local);
    }

    /// Open chat if it is closed, close it otherwise.
    pub async fn toggle_chat(&mut self) {
        if self.chat_open {
            self.close_chat().await;
        } else {
            self.open_chat();
        }
    }

    /// Send a chat message. Surrounding whitespace is trimmed.
    ///
    /// Returns `Ok(false)` for empty text.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotOpen`] without an open channel, or the
    /// send error.
    pub async fn send_chat(&mut self, text: &str) -> Result<bool, ChannelError> {
        let message = text.trim();
        if message.is_empty() {
            return Ok(false);
        }
        let channel = self.channel.as_ref().ok_or(ChannelError::NotOpen)?;
        channel
            .send(&OutboundFrame::Chat {
                message: message.to_string(),
            })
            .await?;
        Ok(true)
    }

    /// Report whether the local user is typing. Sends a frame only when the
    /// state changes; returns whether one was sent.
    ///
    /// # Errors
    ///
    /// Returns the send error.
    pub async fn set_typing(&mut self, is_typing: bool) -> Result<bool, ChannelError> {
        if self.typing == is_typing {
            return Ok(false);
        }
        let Some(channel) = self.channel.as_ref() else {
            return Ok(false);
        };
        channel.send(&OutboundFrame::Typing { is_typing }).await?;
        self.typing = is_typing;
        Ok(true)
    }

    fn spawn_connect(&mut self, attempt: u32, delay: Duration) {
        let connector = Arc::clone(&self.connector);
        let board_id = self.config.board_id.clone();
        let generation = self.generation;
        self.tasks.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let result = connector.connect(&board_id).await;
            Completion::Connected {
                generation,
                attempt,
                result,
            }
        });
    }

    /// Schedule reconnect number `attempt` (one-based). Returns `false` once
    /// the policy is exhausted.
    fn schedule_reconnect(&mut self, attempt: u32) -> bool {
        let policy = self.config.reconnect;
        if attempt > policy.attempts {
            return false;
        }
        let delay = policy.delay_for(attempt - 1);
        tracing::info!(board_id = %self.config.board_id, attempt, delay = ?delay, "scheduling reconnect");
        self.state = ChannelState::Connecting;
        self.spawn_connect(attempt, delay);
        true
    }

    // -----------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------

    /// Wait for the next channel event or task completion.
    ///
    /// Returns [`SessionInput::Idle`] at once when there is neither a
    /// channel nor a task in flight. Cancel-safe.
    pub async fn next_input(&mut self) -> SessionInput<C::Transport> {
        let channel = self.channel.as_ref();
        tokio::select! {
            event = recv_or_pending(channel), if channel.is_some() => SessionInput::Channel(event),
            Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => match joined {
                Ok(completion) => SessionInput::Completion(completion),
                Err(e) => {
                    tracing::warn!(err = %e, "background task failed");
                    SessionInput::Idle
                }
            },
            else => SessionInput::Idle,
        }
    }

    /// Handle one input.
    pub async fn apply(&mut self, input: SessionInput<C::Transport>) {
        match input {
            SessionInput::Channel(ChannelEvent::Frame(frame)) => self.handle_frame(frame),
            SessionInput::Channel(ChannelEvent::Closed(reason)) => self.handle_close(reason),
            SessionInput::Completion(completion) => self.handle_completion(completion).await,
            SessionInput::Idle => {}
        }
    }

    /// Process inputs until no background task is in flight.
    pub async fn settle(&mut self) {
        while !self.tasks.is_empty() {
            let input = self.next_input().await;
            self.apply(input).await;
        }
    }

    /// Take the notices produced since the last call.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn handle_frame(&mut self, frame: InboundFrame) {
        if let Some(entry) = message_log::entry_for_frame(&frame) {
            self.log.append(entry);
        }
        match frame {
            InboundFrame::UserJoined { .. } | InboundFrame::UserLeft { .. } => {
                self.refresh_presence();
            }
            InboundFrame::TaskUpdate { task_id, action, .. } => {
                tracing::debug!(task_id = ?task_id, action = %action, "peer task update");
                self.load_board();
            }
            InboundFrame::Typing {
                username, is_typing, ..
            } => self.presence.set_typing(&username, is_typing),
            InboundFrame::Unknown => tracing::debug!("ignoring unknown frame type"),
            InboundFrame::Chat { .. } | InboundFrame::System { .. } => {}
        }
    }

    fn handle_close(&mut self, reason: CloseReason) {
        tracing::warn!(board_id = %self.config.board_id, reason = %reason, "board channel closed");
        self.channel = None;
        self.typing = false;
        self.presence.clear();
        self.notices
            .push(Notice::error(format!("Chat disconnected: {reason}")));

        let retry = match &reason {
            CloseReason::Local => false,
            CloseReason::Server { code, .. } => *code != CLOSE_POLICY_VIOLATION,
            CloseReason::Lost(_) => true,
        };
        self.state = ChannelState::Closed(reason);
        if retry && self.chat_open {
            self.schedule_reconnect(1);
        }
    }

    async fn handle_completion(&mut self, completion: Completion<C::Transport>) {
        match completion {
            Completion::BoardLoaded { ticket, result } => self.on_board_loaded(ticket, result),
            Completion::PresenceLoaded { ticket, result } => match result {
                Ok(snapshot) => {
                    self.presence.apply_snapshot(ticket, snapshot.online_users);
                }
                Err(e) => tracing::warn!(err = %e, "presence refresh failed, keeping stale set"),
            },
            Completion::StatusPatched {
                task_id,
                to,
                snapshot,
                result,
            } => self.on_status_patched(task_id, to, snapshot, result).await,
            Completion::Connected {
                generation,
                attempt,
                result,
            } => self.on_connected(generation, attempt, result).await,
        }
    }

    fn on_board_loaded(&mut self, ticket: LoadTicket, result: Result<(Board, Vec<Task>), ApiError>) {
        match result {
            Ok((board, tasks)) => {
                if self.registry.load_with(ticket, tasks) == LoadOutcome::Applied {
                    tracing::debug!(board_id = %board.id, tasks = self.registry.len(), "board loaded");
                    self.board = Some(board);
                }
            }
            Err(e) => {
                tracing::warn!(board_id = %self.config.board_id, err = %e, "board reload failed");
                if self.board.is_none() {
                    self.notices
                        .push(Notice::error(format!("Failed to load board: {}", e.user_message())));
                }
            }
        }
    }

    async fn on_status_patched(
        &mut self,
        task_id: TaskId,
        to: TaskStatus,
        snapshot: Task,
        result: Result<(), ApiError>,
    ) {
        match result {
            Ok(()) => {
                self.registry.apply(&task_id, TaskPatch::status(to));
                if let Some(channel) = &self.channel {
                    let frame = OutboundFrame::status_changed(task_id.clone(), to);
                    if let Err(e) = channel.send(&frame).await {
                        tracing::warn!(task_id = %task_id, err = %e, "failed to announce task update");
                    }
                } else {
                    tracing::debug!(task_id = %task_id, "chat closed, task update not announced");
                }
                self.load_board();
            }
            Err(e) => {
                tracing::warn!(task_id = %task_id, to = %to, err = %e, "status patch rejected, rolling back");
                self.registry.restore(snapshot);
                self.notices
                    .push(Notice::error(format!("Failed to update task: {}", e.user_message())));
            }
        }
    }

    async fn on_connected(
        &mut self,
        generation: u64,
        attempt: u32,
        result: Result<C::Transport, ChannelError>,
    ) {
        if generation != self.generation || !self.chat_open {
            if let Ok(transport) = result {
                tracing::debug!(generation, "dropping connection from a closed chat");
                transport.close().await;
            }
            return;
        }

        match result {
            Ok(transport) => {
                tracing::info!(board_id = %self.config.board_id, attempt, "board channel open");
                self.channel = Some(BoardChannel::new(self.config.board_id.clone(), transport));
                self.state = ChannelState::Open;
                self.refresh_presence();
                if attempt > 0 {
                    self.load_board();
                    self.notices.push(Notice::info("Chat reconnected"));
                }
            }
            Err(e) => {
                tracing::warn!(board_id = %self.config.board_id, attempt, err = %e, "board channel connect failed");
                if !self.schedule_reconnect(attempt + 1) {
                    self.notices
                        .push(Notice::error(format!("Could not connect to chat: {e}")));
                    self.state = ChannelState::Closed(CloseReason::Lost(e.to_string()));
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    /// Board id.
    #[must_use]
    pub fn board_id(&self) -> &str {
        &self.config.board_id
    }

    /// Cached board, once loaded.
    #[must_use]
    pub const fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    /// The task registry.
    #[must_use]
    pub const fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// The drag engine.
    #[must_use]
    pub const fn drag(&self) -> &DragEngine {
        &self.drag
    }

    /// The presence tracker.
    #[must_use]
    pub const fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// The message log.
    #[must_use]
    pub const fn log(&self) -> &MessageLog {
        &self.log
    }

    /// The message log, for scrolling.
    pub const fn log_mut(&mut self) -> &mut MessageLog {
        &mut self.log
    }

    /// Channel state.
    #[must_use]
    pub const fn state(&self) -> &ChannelState {
        &self.state
    }

    /// Whether the chat panel is open (connected or not).
    #[must_use]
    pub const fn chat_open(&self) -> bool {
        self.chat_open
    }

    /// Number of background tasks in flight.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Snapshot of everything the UI draws.
    #[must_use]
    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            board_id: &self.config.board_id,
            board: self.board.as_ref(),
            registry: &self.registry,
            drag: self.drag.active(),
            log: &self.log,
            presence: &self.presence,
            state: &self.state,
            chat_open: self.chat_open,
            pending: self.tasks.len(),
        }
    }
}

async fn recv_or_pending<T: FrameTransport>(channel: Option<&BoardChannel<T>>) -> ChannelEvent {
    match channel {
        Some(channel) => channel.recv().await,
        None => std::future::pending().await,
    }
}
