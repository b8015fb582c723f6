//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Default max size of one inbound WebSocket frame (512 KB).
pub const DEFAULT_MAX_WS_MESSAGE_BYTES: usize = 512 * 1024;

/// Default max length of an assembled chat message, in characters.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 50_000;

/// Default max upload size (50 MB).
pub const DEFAULT_UPLOAD_MAX_BYTES: usize = 50 * 1024 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Maximum WebSocket frame size in bytes.
    pub max_ws_message_bytes: usize,

    /// Maximum length of an assembled chat message, in characters.
    pub max_message_length: usize,

    /// Maximum upload size in bytes.
    pub upload_max_bytes: usize,

    /// Folders that folder summaries may read from. Empty allows any folder.
    pub allowed_folder_bases: Vec<PathBuf>,

    /// Directory holding `index.html` and static assets.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::LOCALHOST, 8000)),
            max_ws_message_bytes: DEFAULT_MAX_WS_MESSAGE_BYTES,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            upload_max_bytes: DEFAULT_UPLOAD_MAX_BYTES,
            allowed_folder_bases: Vec::new(),
            static_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    pub fn with_max_ws_message_bytes(mut self, size: usize) -> Self {
        self.max_ws_message_bytes = size;
        self
    }

    pub fn with_max_message_length(mut self, length: usize) -> Self {
        self.max_message_length = length;
        self
    }

    pub fn with_upload_max_bytes(mut self, size: usize) -> Self {
        self.upload_max_bytes = size;
        self
    }

    pub fn with_allowed_folder_bases(mut self, bases: Vec<PathBuf>) -> Self {
        self.allowed_folder_bases = bases;
        self
    }

    pub fn with_static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Upload limit rendered in whole megabytes, for error messages.
    pub fn upload_max_mb(&self) -> usize {
        self.upload_max_bytes / (1024 * 1024)
    }
}
