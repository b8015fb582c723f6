//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use lantern_llm::{InferenceClient, MockBackend};
use lantern_server::{AppState, Server, ServerConfig};

/// How long a test waits for any single server message.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A test server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client for this server.
    pub client: Client,
    /// The scripted backend behind the server.
    pub backend: Arc<MockBackend>,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
    /// Temporary directory for history files and test folders.
    pub temp_dir: TempDir,
}

impl TestServer {
    /// Start a new test server whose backend always answers "Test response".
    pub async fn start() -> Result<Self> {
        Self::start_with_backend(MockBackend::with_text("Test response")).await
    }

    /// Start a new test server with a scripted backend.
    pub async fn start_with_backend(backend: MockBackend) -> Result<Self> {
        Self::start_with(backend, |config| config).await
    }

    /// Start a new test server, adjusting the server configuration first.
    pub async fn start_with<F>(backend: MockBackend, configure: F) -> Result<Self>
    where
        F: FnOnce(ServerConfig) -> ServerConfig,
    {
        let temp_dir = TempDir::new()?;
        let addr = find_available_port().await?;

        let backend = Arc::new(backend);
        let client = InferenceClient::new(backend.clone());

        let config = configure(ServerConfig::new().with_bind_address(addr));
        let state = AppState::new(client, config, temp_dir.path().join("chat_history"));

        let server = Server::from_state(state);
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            backend,
            _handle: handle,
            temp_dir,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url(), path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url(), path))
    }

    pub fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.put(format!("{}{}", self.base_url(), path))
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(format!("{}{}", self.base_url(), path))
    }

    /// Check if server is healthy.
    pub async fn health(&self) -> Result<bool> {
        let resp = self.get("/health").send().await?;
        Ok(resp.status().is_success())
    }

    /// Upload a document and return its file id.
    pub async fn upload(&self, name: &str, content: &[u8]) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(content.to_vec()).file_name(name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let resp = self.post("/upload").multipart(form).send().await?;
        anyhow::ensure!(resp.status().is_success(), "upload failed: {}", resp.status());
        let body: serde_json::Value = resp.json().await?;
        body["file_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("missing file_id in {}", body))
    }

    /// Open a WebSocket connection to `/ws`.
    pub async fn connect_ws(&self) -> Result<WsClient> {
        let url = format!("ws://{}/ws", self.addr);
        let (stream, _) = tokio_tungstenite::connect_async(url).await?;
        Ok(WsClient { stream })
    }
}

/// A WebSocket client speaking JSON text frames.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn send_json(&mut self, value: serde_json::Value) -> Result<()> {
        self.send_raw(value.to_string()).await
    }

    pub async fn send_raw(&mut self, text: impl Into<String>) -> Result<()> {
        let text: String = text.into();
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    pub async fn send_binary(&mut self, data: Vec<u8>) -> Result<()> {
        self.stream.send(Message::Binary(data.into())).await?;
        Ok(())
    }

    /// Receive the next JSON message, failing after [`RECV_TIMEOUT`].
    pub async fn recv(&mut self) -> Result<serde_json::Value> {
        self.recv_within(RECV_TIMEOUT)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Timeout waiting for server message"))
    }

    /// Receive the next JSON message, or `None` if nothing arrives in time.
    pub async fn recv_within(&mut self, wait: Duration) -> Result<Option<serde_json::Value>> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let next = match tokio::time::timeout_at(deadline, self.stream.next()).await {
                Ok(next) => next,
                Err(_) => return Ok(None),
            };
            match next {
                Some(Ok(Message::Text(text))) => return Ok(Some(serde_json::from_str(text.as_str())?)),
                Some(Ok(Message::Close(_))) | None => anyhow::bail!("WebSocket closed"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Collect messages up to and including the first one of type `kind`.
    pub async fn recv_until(&mut self, kind: &str) -> Result<Vec<serde_json::Value>> {
        let mut messages = Vec::new();
        loop {
            let msg = self.recv().await?;
            let done = msg["type"] == kind;
            messages.push(msg);
            if done {
                return Ok(messages);
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// Concatenate the `token` contents of a message sequence.
pub fn tokens(messages: &[serde_json::Value]) -> String {
    messages
        .iter()
        .filter(|m| m["type"] == "token")
        .filter_map(|m| m["content"].as_str())
        .collect()
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
