//! Application state and event handling.
//!
//! [`App`] owns what only the terminal needs (selection, input buffers,
//! focus). Key handling turns keystrokes into [`Action`]s that the main
//! loop applies to the board session.

use std::collections::VecDeque;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use boardsync_proto::task::{TaskId, TaskPriority, TaskStatus};

use crate::drag::DropTarget;
use crate::registry::{BoardColumns, TaskFilter};
use crate::session::{Notice, NoticeLevel, SessionView};

/// Notices kept for the status bar; older ones are dropped first.
const MAX_NOTICES: usize = 16;

/// Which part of the screen receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelFocus {
    /// Board columns (default).
    Board,
    /// Chat input box.
    ChatInput,
    /// Search box of the filter bar.
    Filter,
}

/// Something the main loop should do to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Leave the application.
    Quit,
    /// Pick up a card.
    BeginDrag(TaskId),
    /// The drop target moved.
    Hover(Option<DropTarget>),
    /// Drop the carried card.
    Drop(Option<DropTarget>),
    /// Put the carried card back.
    CancelDrag,
    /// Open or close the chat panel.
    ToggleChat,
    /// Send the chat input.
    SendChat(String),
    /// The local user started or stopped typing.
    Typing(bool),
    /// Scroll the chat history.
    ScrollChat {
        /// Towards older messages.
        up: bool,
    },
    /// Reload the board.
    Reload,
}

/// Drop cursor while a card is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct DropCursor {
    column: usize,
    /// `None` targets the column itself.
    row: Option<usize>,
}

/// Main application state.
pub struct App {
    /// Focused panel.
    pub focus: PanelFocus,
    /// Selected column (0..4).
    pub selected_column: usize,
    /// Selected card within the column.
    pub selected_row: usize,
    /// Chat input buffer.
    pub input: String,
    /// Active board filter.
    pub filter: TaskFilter,
    /// Notices waiting to be shown, oldest first.
    notices: VecDeque<Notice>,
    /// Chrono format for chat timestamps.
    pub timestamp_format: String,
    /// Whether the app should quit.
    pub should_quit: bool,
    drop_cursor: DropCursor,
}

impl App {
    /// Create an application with nothing selected.
    #[must_use]
    pub fn new(timestamp_format: impl Into<String>) -> Self {
        Self {
            focus: PanelFocus::Board,
            selected_column: 0,
            selected_row: 0,
            input: String::new(),
            filter: TaskFilter::default(),
            notices: VecDeque::new(),
            timestamp_format: timestamp_format.into(),
            should_quit: false,
            drop_cursor: DropCursor::default(),
        }
    }

    /// Handle a key event against the current session view.
    pub fn handle_key_event(&mut self, key: KeyEvent, view: &SessionView<'_>) -> Option<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return Some(Action::Quit);
        }

        let columns = view.registry.columns_filtered(&self.filter);
        match self.focus {
            PanelFocus::ChatInput => self.handle_input_key(key),
            PanelFocus::Filter => {
                self.handle_filter_key(key);
                None
            }
            PanelFocus::Board if view.drag.is_some() => self.handle_drag_key(key, &columns),
            PanelFocus::Board => self.handle_board_key(key, &columns, view.chat_open),
        }
    }

    /// The card under the board selection.
    #[must_use]
    pub fn selected_task<'a>(&self, columns: &BoardColumns<'a>) -> Option<&'a TaskId> {
        let status = TaskStatus::from_column(self.selected_column)?;
        columns.ids(status).get(self.selected_row).copied()
    }

    /// Where the carried card would land, for highlighting.
    #[must_use]
    pub fn drop_target(&self, columns: &BoardColumns<'_>) -> Option<DropTarget> {
        let status = TaskStatus::from_column(self.drop_cursor.column)?;
        match self.drop_cursor.row {
            None => Some(DropTarget::Column(status)),
            Some(row) => columns
                .ids(status)
                .get(row)
                .map(|id| DropTarget::Task((*id).clone())),
        }
    }

    /// Queue a notice for the status bar.
    pub fn show_notice(&mut self, notice: Notice) {
        if self.notices.len() == MAX_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }

    /// Index of the notice on display: the oldest error, else the oldest notice.
    fn current_index(&self) -> Option<usize> {
        self.notices
            .iter()
            .position(|n| n.level == NoticeLevel::Error)
            .or_else(|| (!self.notices.is_empty()).then_some(0))
    }

    /// The notice on display, if any.
    #[must_use]
    pub fn notice(&self) -> Option<&Notice> {
        self.current_index().and_then(|i| self.notices.get(i))
    }

    /// Notices waiting behind the one on display.
    #[must_use]
    pub fn queued_notices(&self) -> usize {
        self.notices.len().saturating_sub(1)
    }

    /// Drop the notice on display so the next one shows.
    pub fn dismiss_notice(&mut self) {
        if let Some(i) = self.current_index() {
            self.notices.remove(i);
        }
    }

    // -- board --

    fn handle_board_key(
        &mut self,
        key: KeyEvent,
        columns: &BoardColumns<'_>,
        chat_open: bool,
    ) -> Option<Action> {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Some(Action::Quit)
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.selected_column = self.selected_column.saturating_sub(1);
                self.clamp_row(columns);
                None
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.selected_column = (self.selected_column + 1).min(TaskStatus::ALL.len() - 1);
                self.clamp_row(columns);
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_row = self.selected_row.saturating_sub(1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected_row += 1;
                self.clamp_row(columns);
                None
            }
            KeyCode::Char(' ') => {
                let task_id = self.selected_task(columns)?.clone();
                self.drop_cursor = DropCursor {
                    column: self.selected_column,
                    row: None,
                };
                Some(Action::BeginDrag(task_id))
            }
            KeyCode::Char('c') => Some(Action::ToggleChat),
            KeyCode::Tab if chat_open => {
                self.focus = PanelFocus::ChatInput;
                None
            }
            KeyCode::Char('/') => {
                self.focus = PanelFocus::Filter;
                None
            }
            KeyCode::Char('p') => {
                self.filter.priority = next_priority_filter(self.filter.priority);
                self.selected_row = 0;
                None
            }
            KeyCode::Char('r') => Some(Action::Reload),
            KeyCode::PageUp => Some(Action::ScrollChat { up: true }),
            KeyCode::PageDown => Some(Action::ScrollChat { up: false }),
            _ => None,
        }
    }

    fn handle_drag_key(&mut self, key: KeyEvent, columns: &BoardColumns<'_>) -> Option<Action> {
        let last_column = TaskStatus::ALL.len() - 1;
        let cursor = &mut self.drop_cursor;
        match key.code {
            KeyCode::Esc => return Some(Action::CancelDrag),
            KeyCode::Char(' ') | KeyCode::Enter => {
                let target = self.drop_target(columns);
                self.selected_column = self.drop_cursor.column;
                self.selected_row = 0;
                return Some(Action::Drop(target));
            }
            KeyCode::Left | KeyCode::Char('h') => {
                cursor.column = cursor.column.saturating_sub(1);
                cursor.row = None;
            }
            KeyCode::Right | KeyCode::Char('l') => {
                cursor.column = (cursor.column + 1).min(last_column);
                cursor.row = None;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                cursor.row = match cursor.row {
                    None | Some(0) => None,
                    Some(row) => Some(row - 1),
                };
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = TaskStatus::from_column(cursor.column).map_or(0, |s| columns.len(s));
                cursor.row = match cursor.row {
                    None if len > 0 => Some(0),
                    Some(row) if row + 1 < len => Some(row + 1),
                    other => other,
                };
            }
            _ => return None,
        }
        Some(Action::Hover(self.drop_target(columns)))
    }

    fn clamp_row(&mut self, columns: &BoardColumns<'_>) {
        let len = TaskStatus::from_column(self.selected_column).map_or(0, |s| columns.len(s));
        self.selected_row = self.selected_row.min(len.saturating_sub(1));
    }

    // -- chat input --

    fn handle_input_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Esc | KeyCode::Tab => {
                self.focus = PanelFocus::Board;
                None
            }
            KeyCode::Enter => {
                if self.input.trim().is_empty() {
                    return None;
                }
                Some(Action::SendChat(std::mem::take(&mut self.input)))
            }
            KeyCode::Char(c) => {
                let was_empty = self.input.is_empty();
                self.input.push(c);
                was_empty.then_some(Action::Typing(true))
            }
            KeyCode::Backspace => {
                if self.input.pop().is_some() && self.input.is_empty() {
                    Some(Action::Typing(false))
                } else {
                    None
                }
            }
            KeyCode::PageUp => Some(Action::ScrollChat { up: true }),
            KeyCode::PageDown => Some(Action::ScrollChat { up: false }),
            _ => None,
        }
    }

    // -- filter --

    fn handle_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Tab => self.focus = PanelFocus::Board,
            KeyCode::Char(c) => self.filter.query.push(c),
            KeyCode::Backspace => {
                self.filter.query.pop();
            }
            _ => {}
        }
        self.selected_row = 0;
    }
}

/// Cycle: all → low → medium → high → urgent → all.
const fn next_priority_filter(current: Option<TaskPriority>) -> Option<TaskPriority> {
    match current {
        None => Some(TaskPriority::Low),
        Some(TaskPriority::Low) => Some(TaskPriority::Medium),
        Some(TaskPriority::Medium) => Some(TaskPriority::High),
        Some(TaskPriority::High) => Some(TaskPriority::Urgent),
        Some(TaskPriority::Urgent) => None,
    }
}
