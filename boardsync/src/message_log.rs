//! Client-local chat history for the open board channel.
//!
//! Entries are appended in the order frames arrive and are never
//! reconciled against a server-side log. The whole log is discarded when
//! the channel is closed locally.

use boardsync_proto::frame::InboundFrame;
use boardsync_proto::time::Timestamp;

/// One line of the chat panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// A message written by a board member.
    Chat {
        /// Sender user id.
        user_id: String,
        /// Sender display name.
        username: String,
        /// Message text.
        text: String,
        /// Server receive time.
        timestamp: Timestamp,
    },
    /// A notice about the board (joins, leaves, task changes, welcome).
    System {
        /// Notice text.
        text: String,
        /// Server time.
        timestamp: Timestamp,
    },
}

impl LogEntry {
    /// Entry text without the sender.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Chat { text, .. } | Self::System { text, .. } => text,
        }
    }

    /// Entry time.
    #[must_use]
    pub const fn timestamp(&self) -> &Timestamp {
        match self {
            Self::Chat { timestamp, .. } | Self::System { timestamp, .. } => timestamp,
        }
    }
}

/// Build the log entry a frame produces, if any.
///
/// Typing indicators and unknown frames produce nothing.
#[must_use]
pub fn entry_for_frame(frame: &InboundFrame) -> Option<LogEntry> {
    match frame {
        InboundFrame::Chat {
            user_id,
            username,
            message,
            timestamp,
        } => Some(LogEntry::Chat {
            user_id: user_id.clone(),
            username: username.clone(),
            text: message.clone(),
            timestamp: timestamp.clone(),
        }),
        InboundFrame::System { message, timestamp } => Some(LogEntry::System {
            text: message.clone(),
            timestamp: timestamp.clone(),
        }),
        InboundFrame::UserJoined {
            username, timestamp, ..
        } => Some(LogEntry::System {
            text: format!("{username} joined the chat"),
            timestamp: timestamp.clone(),
        }),
        InboundFrame::UserLeft {
            username, timestamp, ..
        } => Some(LogEntry::System {
            text: format!("{username} left the chat"),
            timestamp: timestamp.clone(),
        }),
        InboundFrame::TaskUpdate {
            action,
            details,
            username,
            timestamp,
            ..
        } => {
            let action = if action.is_empty() { "changed" } else { action.as_str() };
            let mut text = format!("{username} {action} a task");
            if let Some(status) = details.status {
                text.push_str(&format!(" (moved to {})", status.label()));
            }
            Some(LogEntry::System {
                text,
                timestamp: timestamp.clone(),
            })
        }
        InboundFrame::Typing { .. } | InboundFrame::Unknown => None,
    }
}

/// Append-only message log with a tail-following scroll position.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<LogEntry>,
    /// Entries between the bottom of the view and the newest entry.
    offset: usize,
}

impl MessageLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    ///
    /// Keeps following the tail; if the user has scrolled up, the view
    /// stays on the entries they were reading.
    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push(entry);
        if self.offset > 0 {
            self.offset += 1;
        }
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.offset = 0;
    }

    /// Scroll one entry towards older messages.
    pub fn scroll_up(&mut self) {
        if self.offset + 1 < self.entries.len() {
            self.offset += 1;
        }
    }

    /// Scroll one entry towards the tail.
    pub const fn scroll_down(&mut self) {
        self.offset = self.offset.saturating_sub(1);
    }

    /// How far the view is from the tail, in entries.
    #[must_use]
    pub const fn scroll_offset(&self) -> usize {
        self.offset
    }

    /// Whether the view shows the newest entry.
    #[must_use]
    pub const fn is_following(&self) -> bool {
        self.offset == 0
    }

    /// Entries visible in a view of `height` rows, oldest first.
    #[must_use]
    pub fn visible(&self, height: usize) -> &[LogEntry] {
        let end = self.entries.len().saturating_sub(self.offset);
        let start = end.saturating_sub(height);
        &self.entries[start..end]
    }
}
