//! WebSocket connection lifecycle and state management.

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use lantern_session::{SessionId, SharedSession};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::handlers::{MessageResponse, handle_message};
use super::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;

/// Capacity of the per-connection outbound queue.
const OUTBOUND_CAPACITY: usize = 256;

/// Unique identifier for a WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a new unique connection ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Queue feeding the connection's writer task.
///
/// Cloned into stream tasks so they can send while the directive loop keeps
/// reading.
#[derive(Clone)]
pub struct Outbound {
    tx: mpsc::Sender<ServerMessage>,
}

impl Outbound {
    /// Queue a message. Returns false once the connection is gone.
    pub async fn send(&self, msg: ServerMessage) -> bool {
        self.tx.send(msg).await.is_ok()
    }
}

/// State for a WebSocket connection.
pub struct ConnectionState {
    /// Unique identifier for this connection.
    pub id: ConnectionId,
    /// The session owned by this connection.
    pub session_id: SessionId,
    pub session: SharedSession,
    /// Outbound message queue.
    pub outbound: Outbound,
    /// Task forwarding the active (or most recent) stream.
    pub stream_task: Option<JoinHandle<()>>,
    /// Cancelled when the connection closes; stops the writer task.
    pub cancellation: CancellationToken,
}

impl ConnectionState {
    pub fn new(session_id: SessionId, session: SharedSession, outbound: Outbound) -> Self {
        Self {
            id: ConnectionId::new(),
            session_id,
            session,
            outbound,
            stream_task: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Cancel the active stream and wait until it has recorded its output.
    pub async fn settle_stream(&mut self) {
        let cancelled = self.session.lock().await.cancel_stream();
        if let Some(task) = self.stream_task.take() {
            if let Err(e) = task.await {
                tracing::warn!(connection_id = %self.id, error = %e, "Stream task failed");
            }
        }
        if cancelled {
            tracing::debug!(connection_id = %self.id, "Previous stream settled");
        }
    }
}

impl Drop for ConnectionState {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

/// Decode one inbound frame into text, enforcing the size limit.
///
/// `Ok(None)` means the frame carries nothing to process.
fn frame_text(msg: Message, max_bytes: usize) -> Result<Option<String>, ServerMessage> {
    match msg {
        Message::Text(text) => {
            if text.as_str().len() > max_bytes {
                return Err(ServerMessage::error("message_too_large", "Message too large"));
            }
            Ok(Some(text.as_str().to_string()))
        }
        Message::Binary(data) => {
            if data.len() > max_bytes {
                return Err(ServerMessage::error("message_too_large", "Message too large"));
            }
            String::from_utf8(data.to_vec())
                .map(Some)
                .map_err(|_| ServerMessage::error("invalid_encoding", "Invalid encoding"))
        }
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) => Ok(None),
    }
}

/// Handle a WebSocket connection.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let (session_id, session) = state.sessions.create().await;
    let mut conn_state = ConnectionState::new(session_id, session, Outbound { tx });

    let writer = tokio::spawn(write_loop(sender, rx, conn_state.cancellation.clone()));

    tracing::debug!(
        connection_id = %conn_state.id,
        session_id = %session_id,
        "WebSocket connection established"
    );

    let max_bytes = state.config().max_ws_message_bytes;

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(Message::Close(_)) => break,
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("WebSocket error: {}", e);
                break;
            }
        };

        let raw = match frame_text(msg, max_bytes) {
            Ok(Some(raw)) => raw,
            Ok(None) => continue,
            Err(reply) => {
                conn_state.outbound.send(reply).await;
                continue;
            }
        };
        if raw.trim().is_empty() {
            continue;
        }

        let client_msg = match ClientMessage::parse(&raw) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(connection_id = %conn_state.id, error = %e, "Rejected directive");
                conn_state.outbound.send(e.into()).await;
                continue;
            }
        };

        match handle_message(client_msg, &mut conn_state, &state).await {
            MessageResponse::Single(msg) => {
                if !conn_state.outbound.send(msg).await {
                    break;
                }
            }
            MessageResponse::Stream(stream) => {
                let mut stream = std::pin::pin!(stream);
                while let Some(msg) = stream.next().await {
                    if !conn_state.outbound.send(msg).await {
                        break;
                    }
                }
            }
            MessageResponse::None => {}
        }
    }

    // Removing the session cancels any active stream.
    state.sessions.remove(&conn_state.session_id).await;
    let connection_id = conn_state.id;
    drop(conn_state);
    if let Err(e) = writer.await {
        tracing::warn!(connection_id = %connection_id, error = %e, "WebSocket writer failed");
    }

    tracing::debug!(connection_id = %connection_id, "WebSocket connection closed");
}

/// Drain the outbound queue into the socket until the connection closes.
async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<ServerMessage>,
    cancellation: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            msg = rx.recv() => msg,
            _ = cancellation.cancelled() => None,
        };
        let Some(msg) = msg else { break };
        if send_message(&mut sender, msg).await.is_err() {
            break;
        }
    }
    let _ = sender.close().await;
}

/// Send a message over the WebSocket.
pub async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(&msg).map_err(axum::Error::new)?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(axum::Error::new)
}
