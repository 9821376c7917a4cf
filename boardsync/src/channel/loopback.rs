//! Loopback board channel for testing.
//!
//! Uses in-process [`tokio::sync::mpsc`] channels to stand in for a board
//! server. [`LoopbackTransport::create_pair`] returns the client end (a
//! [`FrameTransport`]) and a [`LoopbackServer`] handle that pushes inbound
//! frames and reads what the client sent.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, mpsc};

use boardsync_proto::codec;
use boardsync_proto::frame::{InboundFrame, OutboundFrame};

use super::{ChannelConnector, ChannelError, CloseReason, FrameTransport};

#[derive(Debug)]
enum ServerPush {
    Text(String),
    Close(CloseReason),
}

/// Client end of a loopback board channel.
pub struct LoopbackTransport {
    /// Text frames sent by the client (delivered to the server handle).
    tx: mpsc::Sender<String>,
    /// Frames pushed by the server handle.
    rx: Mutex<mpsc::Receiver<ServerPush>>,
    /// Cleared once either side closes.
    open: Arc<AtomicBool>,
}

/// Server end of a loopback board channel.
pub struct LoopbackServer {
    tx: mpsc::Sender<ServerPush>,
    rx: Mutex<mpsc::Receiver<String>>,
    open: Arc<AtomicBool>,
}

impl LoopbackTransport {
    /// Create a connected client/server pair.
    ///
    /// `buffer` is the channel capacity for each direction.
    #[must_use]
    pub fn create_pair(buffer: usize) -> (Self, LoopbackServer) {
        let (client_tx, server_rx) = mpsc::channel(buffer);
        let (server_tx, client_rx) = mpsc::channel(buffer);
        let open = Arc::new(AtomicBool::new(true));

        let client = Self {
            tx: client_tx,
            rx: Mutex::new(client_rx),
            open: Arc::clone(&open),
        };
        let server = LoopbackServer {
            tx: server_tx,
            rx: Mutex::new(server_rx),
            open,
        };
        (client, server)
    }
}

impl FrameTransport for LoopbackTransport {
    async fn send_text(&self, text: String) -> Result<(), ChannelError> {
        if !self.open.load(Ordering::Relaxed) {
            return Err(ChannelError::Closed(CloseReason::Local));
        }
        self.tx
            .send(text)
            .await
            .map_err(|_| ChannelError::Closed(CloseReason::Lost("server dropped".to_string())))
    }

    async fn recv_text(&self) -> Result<String, ChannelError> {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(ServerPush::Text(text)) => Ok(text),
            Some(ServerPush::Close(reason)) => {
                self.open.store(false, Ordering::Relaxed);
                Err(ChannelError::Closed(reason))
            }
            None => {
                self.open.store(false, Ordering::Relaxed);
                Err(ChannelError::Closed(CloseReason::Lost(
                    "server dropped".to_string(),
                )))
            }
        }
    }

    async fn close(&self) {
        self.open.store(false, Ordering::Relaxed);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed) && !self.tx.is_closed()
    }
}

impl LoopbackServer {
    /// Push a typed frame to the client.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Codec`] if the frame cannot be encoded, or
    /// [`ChannelError::Closed`] if the client end is gone.
    pub async fn push(&self, frame: &InboundFrame) -> Result<(), ChannelError> {
        let text = codec::encode(frame)?;
        self.push_raw(text).await
    }

    /// Push raw text to the client (may be malformed on purpose).
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] if the client end is gone.
    pub async fn push_raw(&self, text: impl Into<String>) -> Result<(), ChannelError> {
        self.tx
            .send(ServerPush::Text(text.into()))
            .await
            .map_err(|_| ChannelError::Closed(CloseReason::Local))
    }

    /// Close the channel from the server side with `reason`.
    pub async fn close(&self, reason: CloseReason) {
        let _ = self.tx.send(ServerPush::Close(reason)).await;
    }

    /// Next frame the client sent, decoded. `None` once the client is gone.
    pub async fn next_sent(&self) -> Option<OutboundFrame> {
        let mut rx = self.rx.lock().await;
        let text = rx.recv().await?;
        codec::decode(&text).ok()
    }

    /// Everything the client has sent so far, without waiting.
    pub async fn drain_sent(&self) -> Vec<OutboundFrame> {
        let mut rx = self.rx.lock().await;
        let mut frames = Vec::new();
        while let Ok(text) = rx.try_recv() {
            if let Ok(frame) = codec::decode(&text) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Whether the client end is still open.
    #[must_use]
    pub fn client_open(&self) -> bool {
        self.open.load(Ordering::Relaxed) && !self.tx.is_closed()
    }
}

/// Hands out pre-arranged loopback transports, one per connect.
///
/// Each [`expect_connection`](Self::expect_connection) queues a pair and
/// returns its server end; each [`expect_failure`](Self::expect_failure)
/// queues a failed attempt. A connect with nothing queued fails.
#[derive(Default)]
pub struct LoopbackConnector {
    queue: SyncMutex<VecDeque<Result<LoopbackTransport, String>>>,
    attempts: AtomicUsize,
}

impl LoopbackConnector {
    /// Create a connector with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful connection and return its server end.
    #[must_use]
    pub fn expect_connection(&self, buffer: usize) -> LoopbackServer {
        let (client, server) = LoopbackTransport::create_pair(buffer);
        self.queue.lock().push_back(Ok(client));
        server
    }

    /// Queue a failed connection attempt.
    pub fn expect_failure(&self, detail: impl Into<String>) {
        self.queue.lock().push_back(Err(detail.into()));
    }

    /// Number of connect calls made so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl ChannelConnector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(&self, board_id: &str) -> Result<LoopbackTransport, ChannelError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let next = self.queue.lock().pop_front();
        match next {
            Some(Ok(transport)) => Ok(transport),
            Some(Err(detail)) => Err(ChannelError::Connect(detail)),
            None => Err(ChannelError::Connect(format!(
                "no loopback endpoint for board {board_id}"
            ))),
        }
    }
}
