//! Online-user snapshot types.

use serde::{Deserialize, Serialize};

/// A user currently connected to a board channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserSummary {
    /// User identifier.
    pub id: String,
    /// Display name, when the server includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl UserSummary {
    /// Summary carrying only an id.
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
        }
    }

    /// Name to show for this user (username, falling back to id).
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.id)
    }
}

/// One entry of the online-users list.
///
/// Servers either send bare user ids or `{id, username}` objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum OnlineUserEntry {
    Id(String),
    Summary(UserSummary),
}

impl From<OnlineUserEntry> for UserSummary {
    fn from(entry: OnlineUserEntry) -> Self {
        match entry {
            OnlineUserEntry::Id(id) => Self::from_id(id),
            OnlineUserEntry::Summary(summary) => summary,
        }
    }
}

/// Response of the online-users endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUsers {
    /// Board the snapshot belongs to.
    pub board_id: String,
    /// Users connected at snapshot time.
    #[serde(deserialize_with = "deserialize_entries")]
    pub online_users: Vec<UserSummary>,
    /// Server-reported count.
    #[serde(default)]
    pub count: usize,
}

fn deserialize_entries<'de, D>(deserializer: D) -> Result<Vec<UserSummary>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let entries = Vec::<OnlineUserEntry>::deserialize(deserializer)?;
    Ok(entries.into_iter().map(UserSummary::from).collect())
}
