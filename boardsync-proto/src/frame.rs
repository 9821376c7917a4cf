//! Board channel frames.
//!
//! Every frame is a JSON object tagged by a `type` field. Inbound frames
//! are what the server pushes to a client; outbound frames are what a
//! client sends. Both are closed enums with an `Unknown` catch-all so that
//! a peer running a newer protocol never breaks an older reader.

use serde::{Deserialize, Deserializer, Serialize};

use crate::task::{TaskId, TaskStatus};
use crate::time::Timestamp;

/// Action name used when a task's fields change.
pub const ACTION_UPDATED: &str = "updated";

/// Extra information attached to a `task_update` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdateDetails {
    /// New status, when the update moved the task between columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

/// A frame pushed by the server over a board channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// A chat message from a board member (including ourselves).
    Chat {
        /// Sender user id.
        #[serde(default, deserialize_with = "null_as_default")]
        user_id: String,
        /// Sender display name.
        #[serde(default, deserialize_with = "null_as_default")]
        username: String,
        /// Message text.
        message: String,
        /// Server receive time.
        #[serde(default, deserialize_with = "null_as_default")]
        timestamp: Timestamp,
    },
    /// A server-originated notice, e.g. the welcome message.
    System {
        /// Notice text.
        message: String,
        /// Server time.
        #[serde(default, deserialize_with = "null_as_default")]
        timestamp: Timestamp,
    },
    /// A user connected to the board channel.
    UserJoined {
        /// User id, when provided.
        #[serde(default)]
        user_id: Option<String>,
        /// Display name.
        username: String,
        /// Server time.
        #[serde(default, deserialize_with = "null_as_default")]
        timestamp: Timestamp,
    },
    /// A user disconnected from the board channel.
    UserLeft {
        /// User id, when provided.
        #[serde(default)]
        user_id: Option<String>,
        /// Display name.
        username: String,
        /// Server time.
        #[serde(default, deserialize_with = "null_as_default")]
        timestamp: Timestamp,
    },
    /// A board member changed a task.
    TaskUpdate {
        /// Changed task, if the sender named one.
        #[serde(default)]
        task_id: Option<TaskId>,
        /// What happened (`created`, `updated`, `deleted`).
        #[serde(default, deserialize_with = "null_as_default")]
        action: String,
        /// Action-specific details.
        #[serde(default, deserialize_with = "null_as_default")]
        details: TaskUpdateDetails,
        /// Actor display name.
        #[serde(default, deserialize_with = "null_as_default")]
        username: String,
        /// Actor user id.
        #[serde(default)]
        user_id: Option<String>,
        /// Server time.
        #[serde(default, deserialize_with = "null_as_default")]
        timestamp: Timestamp,
    },
    /// Typing indicator from another member.
    Typing {
        /// User id, when provided.
        #[serde(default)]
        user_id: Option<String>,
        /// Display name.
        username: String,
        /// Whether the user is currently typing.
        #[serde(default, deserialize_with = "null_as_default")]
        is_typing: bool,
    },
    /// Any frame type this client does not understand.
    #[serde(other)]
    Unknown,
}

/// A frame sent by a client over its board channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// User-authored chat text.
    Chat {
        /// Message text.
        message: String,
    },
    /// Notification that this client changed a task.
    TaskUpdate {
        /// Changed task.
        task_id: TaskId,
        /// What happened.
        #[serde(default, deserialize_with = "null_as_default")]
        action: String,
        /// Action-specific details.
        #[serde(default, deserialize_with = "null_as_default")]
        details: TaskUpdateDetails,
    },
    /// Typing indicator.
    Typing {
        /// Whether the local user is typing.
        is_typing: bool,
    },
    /// Any frame type the receiver does not understand.
    #[serde(other)]
    Unknown,
}

impl OutboundFrame {
    /// Builds the notification sent after a successful status change.
    #[must_use]
    pub fn status_changed(task_id: TaskId, status: TaskStatus) -> Self {
        Self::TaskUpdate {
            task_id,
            action: ACTION_UPDATED.to_string(),
            details: TaskUpdateDetails {
                status: Some(status),
            },
        }
    }
}

/// Reads an explicit `null` as the field's default.
///
/// Servers relay client fields verbatim, so a field a peer left out can
/// arrive as `null` instead of being absent.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
