//! HTTP and WebSocket routes.

pub mod config;
pub mod conversations;
pub mod folder;
pub mod health;
pub mod upload;
pub mod ws;

pub use config::{get_config_handler, put_config_handler};
pub use conversations::{
    ConversationOkResponse, ListConversationsResponse, SaveConversationRequest,
    delete_conversation_handler, list_conversations_handler, save_conversation_handler,
};
pub use folder::{FolderSummaryRequest, folder_summary_handler};
pub use health::{HealthResponse, ModelsResponse, health_routes};
pub use upload::{UploadResponse, upload_handler};
pub use ws::{ClientMessage, ServerMessage, ws_handler};
