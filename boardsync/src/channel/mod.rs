//! Board channel: the single real-time connection for one board.
//!
//! Defines the [`FrameTransport`] trait that carries text frames and the
//! [`ChannelConnector`] trait that opens one. Concrete implementations:
//! - [`ws::WsConnector`]: WebSocket connection to a board server
//! - [`loopback::LoopbackConnector`]: in-process channel pairs for testing
//!
//! [`BoardChannel`] sits on top of a transport and speaks typed frames.

pub mod loopback;
pub mod ws;

use std::fmt;

use url::Url;

use boardsync_proto::codec::{self, CodecError};
use boardsync_proto::frame::{InboundFrame, OutboundFrame};

/// Why a channel stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed by this client (navigation away or chat toggle).
    Local,
    /// The server sent a close frame.
    Server {
        /// WebSocket close code.
        code: u16,
        /// Close reason text (e.g. "Invalid token").
        reason: String,
    },
    /// The connection dropped or could not be established.
    Lost(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "closed"),
            Self::Server { code, reason } if reason.is_empty() => {
                write!(f, "closed by server ({code})")
            }
            Self::Server { code, reason } => write!(f, "{reason} ({code})"),
            Self::Lost(detail) => write!(f, "connection lost: {detail}"),
        }
    }
}

/// Lifecycle state of the board channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    /// A connection attempt is in flight (or scheduled).
    Connecting,
    /// Handshake accepted; frames flow.
    Open,
    /// No connection.
    Closed(CloseReason),
}

impl ChannelState {
    /// Whether frames can currently be sent.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Live"),
            Self::Closed(CloseReason::Local) => write!(f, "Offline"),
            Self::Closed(reason) => write!(f, "Offline ({reason})"),
        }
    }
}

/// Errors that can occur on a board channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The connection attempt timed out.
    #[error("connection timed out")]
    Timeout,

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The channel is closed.
    #[error("channel closed: {0}")]
    Closed(CloseReason),

    /// No channel is open for the board.
    #[error("chat is not connected")]
    NotOpen,

    /// The channel URL could not be built.
    #[error("invalid channel URL: {0}")]
    Url(#[from] url::ParseError),

    /// A frame could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Carries text frames for one board connection.
///
/// `recv_text` must be cancel-safe: dropping its future before completion
/// must not lose a frame.
pub trait FrameTransport: Send + Sync + 'static {
    /// Send one text frame.
    fn send_text(
        &self,
        text: String,
    ) -> impl std::future::Future<Output = Result<(), ChannelError>> + Send;

    /// Receive the next text frame.
    ///
    /// Returns [`ChannelError::Closed`] once the connection is gone.
    fn recv_text(&self) -> impl std::future::Future<Output = Result<String, ChannelError>> + Send;

    /// Close the connection, sending a close frame when possible.
    fn close(&self) -> impl std::future::Future<Output = ()> + Send;

    /// Whether the connection is still up.
    fn is_open(&self) -> bool;
}

/// Opens board connections.
pub trait ChannelConnector: Send + Sync + 'static {
    /// Transport produced by a successful connect.
    type Transport: FrameTransport;

    /// Connect to the channel of `board_id`.
    fn connect(
        &self,
        board_id: &str,
    ) -> impl std::future::Future<Output = Result<Self::Transport, ChannelError>> + Send;
}

/// What a board channel produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A decoded inbound frame.
    Frame(InboundFrame),
    /// The channel closed.
    Closed(CloseReason),
}

/// Typed view of one live board connection.
///
/// Dropping a `BoardChannel` drops its transport, which releases the
/// connection.
pub struct BoardChannel<T> {
    board_id: String,
    transport: T,
}

impl<T: FrameTransport> BoardChannel<T> {
    /// Wrap a connected transport.
    pub fn new(board_id: impl Into<String>, transport: T) -> Self {
        Self {
            board_id: board_id.into(),
            transport,
        }
    }

    /// Board this channel belongs to.
    #[must_use]
    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    /// Whether the underlying connection is up.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Encode and send one frame.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Codec`] if the frame cannot be encoded, or
    /// [`ChannelError::Closed`] if the connection is gone.
    pub async fn send(&self, frame: &OutboundFrame) -> Result<(), ChannelError> {
        let text = codec::encode_outbound(frame)?;
        self.transport.send_text(text).await
    }

    /// Wait for the next well-formed frame.
    ///
    /// Malformed frames are logged and skipped. Unknown frame types come
    /// back as [`InboundFrame::Unknown`]. Cancel-safe.
    pub async fn recv(&self) -> ChannelEvent {
        loop {
            match self.transport.recv_text().await {
                Ok(text) => match codec::decode_inbound(&text) {
                    Ok(frame) => return ChannelEvent::Frame(frame),
                    Err(e) => {
                        tracing::warn!(board_id = %self.board_id, err = %e, "malformed board frame, skipping");
                    }
                },
                Err(ChannelError::Closed(reason)) => return ChannelEvent::Closed(reason),
                Err(e) => return ChannelEvent::Closed(CloseReason::Lost(e.to_string())),
            }
        }
    }

    /// Close the connection.
    pub async fn close(self) {
        tracing::debug!(board_id = %self.board_id, "closing board channel");
        self.transport.close().await;
    }
}

/// Derive the WebSocket base from the API URL (`http→ws`, `https→wss`).
///
/// # Errors
///
/// Returns [`ChannelError::Url`] if `api_url` does not parse, or
/// [`ChannelError::Connect`] if its scheme is not HTTP(S) or WS(S).
pub fn ws_base_from_api(api_url: &str) -> Result<Url, ChannelError> {
    let mut url = Url::parse(api_url)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ChannelError::Connect(format!(
                "unsupported URL scheme: {other}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| ChannelError::Connect(format!("cannot use {scheme} for {api_url}")))?;
    Ok(url)
}

/// Build `{ws_base}/chat/ws/{board_id}?token={token}`.
///
/// # Errors
///
/// Returns [`ChannelError::Connect`] if `ws_base` cannot carry a path.
pub fn channel_url(ws_base: &Url, board_id: &str, token: &str) -> Result<Url, ChannelError> {
    let mut url = ws_base.clone();
    url.path_segments_mut()
        .map_err(|()| ChannelError::Connect(format!("URL cannot carry a path: {ws_base}")))?
        .pop_if_empty()
        .extend(["chat", "ws", board_id]);
    url.query_pairs_mut().clear().append_pair("token", token);
    Ok(url)
}
