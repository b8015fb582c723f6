//! Ollama chat backend.
//!
//! Talks to a local Ollama server over its native API:
//! `POST /api/chat` for completions (newline-delimited JSON when streaming)
//! and `GET /api/tags` for the installed model list.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::backend::{FragmentStream, InferenceBackend};
use crate::error::{LlmError, Result};
use crate::types::{ChatMessage, ChatRequest};

/// Default Ollama API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default per-call timeout. Large local models can take minutes to load.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default timeout for reachability checks.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

const LIST_MODELS_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL, without the `/api` suffix.
    pub base_url: String,
    /// Timeout applied to every chat call.
    pub timeout: Duration,
    /// Timeout applied to health checks.
    pub health_timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }
}

impl OllamaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire format
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: WireOptions,
}

#[derive(Serialize)]
struct WireOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: String,
}

/// One response object; a full response when not streaming, one NDJSON line otherwise.
#[derive(Debug, Deserialize)]
struct WireChunk {
    message: Option<WireMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Ollama backend using a blocking HTTP client.
///
/// The HTTP client is built lazily on first use so that it is always created
/// on a blocking worker thread.
pub struct OllamaBackend {
    config: OllamaConfig,
    client: Mutex<Option<reqwest::blocking::Client>>,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn client(&self) -> Result<reqwest::blocking::Client> {
        let mut slot = self.client.lock();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))?;
        *slot = Some(client.clone());
        Ok(client)
    }

    fn post_chat(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::blocking::Response> {
        let body = WireRequest {
            model: &request.model,
            messages: &request.messages,
            stream,
            options: WireOptions {
                temperature: request.options.temperature,
                num_predict: request.options.max_tokens,
            },
        };

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            stream,
            "Sending chat request to Ollama"
        );

        let response = self
            .client()?
            .post(self.config.endpoint("/api/chat"))
            .json(&body)
            .send()?;
        check_status(response)
    }
}

fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    tracing::warn!(status = status.as_u16(), error = %message, "Ollama returned an error status");
    Err(LlmError::Status {
        status: status.as_u16(),
        message,
    })
}

impl InferenceBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn complete(&self, request: &ChatRequest) -> Result<String> {
        let text = self.post_chat(request, false)?.text()?;
        let chunk: WireChunk = serde_json::from_str(&text)?;
        if let Some(error) = chunk.error {
            return Err(LlmError::Backend(error));
        }
        chunk
            .message
            .map(|m| m.content)
            .ok_or_else(|| LlmError::Protocol("response carried no message".to_string()))
    }

    fn open_stream(&self, request: &ChatRequest) -> Result<FragmentStream> {
        let response = self.post_chat(request, true)?;
        Ok(Box::new(NdjsonFragments::new(BufReader::new(response))))
    }

    fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client()?
            .get(self.config.endpoint("/api/tags"))
            .timeout(LIST_MODELS_TIMEOUT)
            .send()?;
        let tags: TagsResponse = check_status(response)?.json()?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn health_check(&self) -> Result<()> {
        let response = self
            .client()?
            .get(self.config.endpoint("/api/tags"))
            .timeout(self.config.health_timeout)
            .send()?;
        check_status(response).map(|_| ())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// NDJSON stream decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Decodes an Ollama NDJSON chat stream into content fragments.
///
/// Ends after a `done` line or end of input. A line carrying `error` or a line
/// that is not valid JSON yields one error and ends the stream.
pub struct NdjsonFragments<R> {
    reader: R,
    line: String,
    finished: bool,
}

impl<R: BufRead> NdjsonFragments<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            finished: false,
        }
    }

    fn fail(&mut self, err: LlmError) -> Option<Result<String>> {
        self.finished = true;
        Some(Err(err))
    }
}

impl<R: BufRead> Iterator for NdjsonFragments<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => {
                    self.finished = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => return self.fail(e.into()),
            }

            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }

            let chunk: WireChunk = match serde_json::from_str(line) {
                Ok(chunk) => chunk,
                Err(e) => {
                    return self.fail(LlmError::Protocol(format!(
                        "invalid stream line: {}",
                        e
                    )));
                }
            };
            if let Some(error) = chunk.error {
                return self.fail(LlmError::Backend(error));
            }
            if chunk.done {
                self.finished = true;
            }

            let content = chunk.message.map(|m| m.content).unwrap_or_default();
            if !content.is_empty() {
                return Some(Ok(content));
            }
        }
        None
    }
}
