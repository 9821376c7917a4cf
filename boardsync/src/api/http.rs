//! HTTP implementation of [`BoardApi`] backed by `reqwest`.
//!
//! Every request carries the access token as a bearer credential. Error
//! responses are expected as `{"detail": ...}` and surfaced through
//! [`ApiError::Status`].

use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

use boardsync_proto::board::Board;
use boardsync_proto::presence::OnlineUsers;
use boardsync_proto::task::{StatusUpdate, StatusUpdated, Task, TaskId, TaskStatus};

use super::{ApiError, BoardApi};

/// Error body returned by the board server.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Board server client speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBoardApi {
    client: reqwest::Client,
    base: Url,
    token: String,
}

impl HttpBoardApi {
    /// Create a client for the API rooted at `api_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(api_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base = Url::parse(api_url)
            .map_err(|e| ApiError::Transport(format!("invalid API URL {api_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::Transport(format!(
                "API URL cannot carry a path: {api_url}"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base,
            token: token.into(),
        })
    }

    /// The API root this client talks to.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request and return the body of a success response.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !status.is_success() {
            let detail = error_detail(&body)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "request failed".to_string());
            tracing::debug!(status = status.as_u16(), detail = %detail, "board server rejected request");
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        Ok(body.to_vec())
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self.send(request).await?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Extract the `detail` text from an error body, if it has one.
fn error_detail(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail {
        serde_json::Value::String(text) => Some(text),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

impl BoardApi for HttpBoardApi {
    async fn fetch_board(&self, board_id: &str) -> Result<Board, ApiError> {
        let url = self.endpoint(&["tasks", "boards", board_id]);
        self.execute(self.client.get(url)).await
    }

    async fn fetch_board_tasks(&self, board_id: &str) -> Result<Vec<Task>, ApiError> {
        let url = self.endpoint(&["tasks", "boards", board_id, "tasks"]);
        self.execute(self.client.get(url)).await
    }

    async fn patch_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&["tasks", "tasks", task_id.as_str(), "status"]);
        let body = self.send(self.client.put(url).json(&StatusUpdate { status })).await?;
        // Any 2xx is an acknowledgement; the body is informational.
        match serde_json::from_slice::<StatusUpdated>(&body) {
            Ok(ack) => tracing::debug!(task_id = %task_id, message = %ack.message, "status patch acknowledged"),
            Err(_) => tracing::debug!(task_id = %task_id, "status patch acknowledged without a message"),
        }
        Ok(())
    }

    async fn fetch_online_users(&self, board_id: &str) -> Result<OnlineUsers, ApiError> {
        let url = self.endpoint(&["chat", "boards", board_id, "online-users"]);
        self.execute(self.client.get(url)).await
    }
}
