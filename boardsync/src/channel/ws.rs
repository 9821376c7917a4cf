//! WebSocket board channel.
//!
//! Implements [`FrameTransport`] over a WebSocket connection to the board
//! server's chat endpoint. A background reader task forwards text frames
//! into an mpsc channel; the write half is shared behind a mutex so sends
//! from the session never contend with the reader.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::{ChannelConnector, ChannelError, CloseReason, FrameTransport, channel_url};

/// Type alias for the write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Default timeout for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the inbound frame buffer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// What the reader task hands to the transport.
#[derive(Debug)]
enum Inbound {
    Text(String),
    Closed(CloseReason),
}

/// Opens WebSocket board channels.
#[derive(Debug, Clone)]
pub struct WsConnector {
    ws_base: Url,
    token: String,
    connect_timeout: Duration,
    capacity: usize,
}

impl WsConnector {
    /// Create a connector for the server at `ws_base` authenticating with `token`.
    pub fn new(ws_base: Url, token: impl Into<String>) -> Self {
        Self {
            ws_base,
            token: token.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Set the handshake timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the inbound frame buffer capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

impl ChannelConnector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, board_id: &str) -> Result<WsTransport, ChannelError> {
        let url = channel_url(&self.ws_base, board_id, &self.token)?;
        WsTransport::connect(&url, self.connect_timeout, self.capacity).await
    }
}

/// WebSocket transport for one board channel.
pub struct WsTransport {
    /// Write half of the WebSocket connection.
    ws_sender: Arc<Mutex<WsSender>>,
    /// Frames received by the background reader task.
    incoming: Mutex<mpsc::Receiver<Inbound>>,
    /// Whether the connection is still up.
    connected: Arc<AtomicBool>,
    /// Background reader task, aborted on drop.
    reader_handle: tokio::task::JoinHandle<()>,
}

impl WsTransport {
    /// Connect to `url` and spawn the reader task.
    ///
    /// The board server accepts the handshake before it checks the token,
    /// so an authorization failure shows up as a close frame on the first
    /// read, not as a connect error.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Timeout`] if the handshake does not finish in time.
    /// - [`ChannelError::Connect`] if the server cannot be reached or rejects
    ///   the upgrade.
    pub async fn connect(
        url: &Url,
        connect_timeout: Duration,
        capacity: usize,
    ) -> Result<Self, ChannelError> {
        // The token is in the query string; keep it out of the logs.
        let endpoint = &url[..url::Position::AfterPath];

        let (ws_stream, _response) = tokio::time::timeout(connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| {
                tracing::warn!(url = %endpoint, "board channel connect timed out");
                ChannelError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(url = %endpoint, err = %e, "board channel connect failed");
                map_ws_connect_error(e)
            })?;

        let (ws_sender, ws_reader) = ws_stream.split();

        let (tx, rx) = mpsc::channel(capacity);
        let connected = Arc::new(AtomicBool::new(true));
        let reader_handle = tokio::spawn(reader_loop(ws_reader, tx, Arc::clone(&connected)));

        tracing::info!(url = %endpoint, "board channel connected");

        Ok(Self {
            ws_sender: Arc::new(Mutex::new(ws_sender)),
            incoming: Mutex::new(rx),
            connected,
            reader_handle,
        })
    }
}

impl FrameTransport for WsTransport {
    async fn send_text(&self, text: String) -> Result<(), ChannelError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(ChannelError::Closed(CloseReason::Lost(
                "connection is down".to_string(),
            )));
        }

        let mut sender = self.ws_sender.lock().await;
        sender.send(Message::Text(text.into())).await.map_err(|e| {
            tracing::warn!(err = %e, "board channel send failed");
            self.connected.store(false, Ordering::Relaxed);
            ChannelError::Closed(CloseReason::Lost(e.to_string()))
        })
    }

    async fn recv_text(&self) -> Result<String, ChannelError> {
        let mut rx = self.incoming.lock().await;
        match rx.recv().await {
            Some(Inbound::Text(text)) => Ok(text),
            Some(Inbound::Closed(reason)) => Err(ChannelError::Closed(reason)),
            None => Err(ChannelError::Closed(CloseReason::Lost(
                "reader stopped".to_string(),
            ))),
        }
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::Relaxed);
        let mut sender = self.ws_sender.lock().await;
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        if let Err(e) = sender.send(Message::Close(Some(frame))).await {
            tracing::debug!(err = %e, "close frame not sent");
        }
        self.reader_handle.abort();
    }

    fn is_open(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}

/// Background task that reads WebSocket messages and forwards text frames.
///
/// Ends on a close frame (forwarding its code and reason), a read error,
/// or when the transport is dropped. Sets `connected` to `false` on exit.
async fn reader_loop(mut ws_reader: WsReader, tx: mpsc::Sender<Inbound>, connected: Arc<AtomicBool>) {
    let reason = loop {
        match ws_reader.next().await {
            Some(Ok(Message::Text(text))) => {
                if tx.send(Inbound::Text(text.as_str().to_string())).await.is_err() {
                    // Transport dropped.
                    connected.store(false, Ordering::Relaxed);
                    return;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = frame.map_or(
                    CloseReason::Server {
                        code: u16::from(CloseCode::Normal),
                        reason: String::new(),
                    },
                    |f| CloseReason::Server {
                        code: u16::from(f.code),
                        reason: f.reason.as_str().to_string(),
                    },
                );
                tracing::info!(reason = %reason, "board channel closed by server");
                break reason;
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::debug!("ignoring binary frame on board channel");
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
            Some(Err(e)) => {
                tracing::warn!(err = %e, "board channel read error");
                break CloseReason::Lost(e.to_string());
            }
            None => break CloseReason::Lost("stream ended".to_string()),
        }
    };
    connected.store(false, Ordering::Relaxed);
    let _ = tx.send(Inbound::Closed(reason)).await;
    tracing::debug!("board channel reader exiting");
}

/// Map a `tokio_tungstenite` connection error to a [`ChannelError`].
fn map_ws_connect_error(err: tokio_tungstenite::tungstenite::Error) -> ChannelError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => ChannelError::Connect(io_err.to_string()),
        WsError::Tls(_) => ChannelError::Connect(format!("TLS error: {err}")),
        WsError::Http(response) => ChannelError::Connect(format!(
            "upgrade rejected: status {}",
            response.status()
        )),
        other => ChannelError::Connect(other.to_string()),
    }
}
