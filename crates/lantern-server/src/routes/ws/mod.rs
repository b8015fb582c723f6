//! WebSocket handler for the chat protocol.
//!
//! ## Module Structure
//!
//! - `protocol` - Message types (ClientMessage, ServerMessage)
//! - `connection` - Connection lifecycle, frame checks and the writer task
//! - `handlers` - Directive dispatch, stop and batch summaries
//! - `chat` - Chat assembly and stream forwarding

mod chat;
mod connection;
mod handlers;
mod protocol;

use axum::{
    extract::{State, ws::WebSocketUpgrade},
    response::Response,
};

use crate::state::AppState;

pub use connection::ConnectionId;
pub use handlers::MessageResponse;
pub use protocol::{ClientMessage, HistoryEntry, ProtocolError, ServerMessage, history_messages};

/// GET /ws - WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| connection::handle_socket(socket, state))
}
