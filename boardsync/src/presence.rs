//! Presence tracking for a board channel.
//!
//! The online set is never edited incrementally. Join and leave frames only
//! trigger a fresh snapshot fetch, and each snapshot replaces the set
//! wholesale. Snapshots carry a [`PresenceTicket`] so a slow response
//! cannot overwrite a newer one. Typing indicators are tracked alongside,
//! keyed by username.

use std::collections::BTreeSet;

use boardsync_proto::presence::UserSummary;

use crate::api::{ApiError, BoardApi};

/// Sequence number identifying one presence fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PresenceTicket(u64);

/// Best-effort set of users connected to the board channel.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    users: Vec<UserSummary>,
    issued: u64,
    applied: u64,
    typing: BTreeSet<String>,
}

impl PresenceTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the ticket for a fetch about to be issued.
    pub fn begin_refresh(&mut self) -> PresenceTicket {
        self.issued += 1;
        PresenceTicket(self.issued)
    }

    /// Replace the set with the snapshot fetched under `ticket`.
    ///
    /// Entries are de-duplicated by id; a later duplicate only fills in a
    /// missing username. Returns `false` if a newer snapshot already won.
    pub fn apply_snapshot(&mut self, ticket: PresenceTicket, users: Vec<UserSummary>) -> bool {
        if ticket.0 <= self.applied {
            tracing::debug!(ticket = ticket.0, applied = self.applied, "dropping stale presence snapshot");
            return false;
        }
        let mut deduped: Vec<UserSummary> = Vec::with_capacity(users.len());
        for user in users {
            if let Some(existing) = deduped.iter_mut().find(|u| u.id == user.id) {
                if existing.username.is_none() {
                    existing.username = user.username;
                }
            } else {
                deduped.push(user);
            }
        }
        self.users = deduped;
        self.applied = ticket.0;
        true
    }

    /// Fetch a fresh snapshot for `board_id` and apply it.
    ///
    /// # Errors
    ///
    /// Returns the API error; the current set is kept in that case.
    pub async fn refresh<A: BoardApi>(
        &mut self,
        api: &A,
        board_id: &str,
    ) -> Result<Vec<UserSummary>, ApiError> {
        let ticket = self.begin_refresh();
        let snapshot = api.fetch_online_users(board_id).await?;
        self.apply_snapshot(ticket, snapshot.online_users);
        Ok(self.users.clone())
    }

    /// Forget everyone (the channel closed).
    ///
    /// Any fetch still in flight is invalidated too.
    pub fn clear(&mut self) {
        self.users.clear();
        self.typing.clear();
        self.applied = self.issued;
    }

    /// Users in the last applied snapshot.
    #[must_use]
    pub fn users(&self) -> &[UserSummary] {
        &self.users
    }

    /// Number of online users.
    #[must_use]
    pub fn count(&self) -> usize {
        self.users.len()
    }

    /// Whether `user_id` is in the set.
    #[must_use]
    pub fn contains(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u.id == user_id)
    }

    /// Record a typing indicator.
    pub fn set_typing(&mut self, username: &str, is_typing: bool) {
        if is_typing {
            self.typing.insert(username.to_string());
        } else {
            self.typing.remove(username);
        }
    }

    /// Usernames currently typing, sorted.
    pub fn typing(&self) -> impl Iterator<Item = &str> {
        self.typing.iter().map(String::as_str)
    }
}
