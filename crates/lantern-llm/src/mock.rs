//! Scripted backend for tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::backend::{FragmentStream, InferenceBackend};
use crate::error::{LlmError, Result};
use crate::types::ChatRequest;

/// One scripted backend reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Full text; streamed as a single fragment.
    Text(String),
    /// Streamed fragments; concatenated for non-streaming calls.
    Fragments(Vec<String>),
    /// Streamed fragments followed by a connection failure.
    FragmentsThenFail(Vec<String>, String),
    /// The backend cannot be reached.
    Unavailable(String),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fragments(fragments.into_iter().map(Into::into).collect())
    }
}

/// A mock backend returning pre-configured replies in order.
///
/// Once the script is exhausted the fallback reply is used; without a
/// fallback an error is returned.
#[derive(Debug)]
pub struct MockBackend {
    replies: Mutex<VecDeque<MockReply>>,
    fallback: Option<MockReply>,
    request_log: Mutex<Vec<ChatRequest>>,
    models: Vec<String>,
    healthy: bool,
    fragment_delay: Duration,
    closed_streams: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            request_log: Mutex::new(Vec::new()),
            models: vec!["mock-model".to_string()],
            healthy: true,
            fragment_delay: Duration::ZERO,
            closed_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A backend that answers every call with the same text.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(Vec::new()).with_fallback(MockReply::Text(text.into()))
    }

    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Sleep before yielding each streamed fragment.
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = delay;
        self
    }

    /// All requests made to this backend.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.request_log.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.request_log.lock().len()
    }

    /// Number of streams that have been dropped by their reader.
    pub fn closed_streams(&self) -> usize {
        self.closed_streams.load(Ordering::SeqCst)
    }

    fn next_reply(&self, request: &ChatRequest) -> Result<MockReply> {
        self.request_log.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| LlmError::Backend("MockBackend: no more replies available".to_string()))
    }
}

impl InferenceBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete(&self, request: &ChatRequest) -> Result<String> {
        match self.next_reply(request)? {
            MockReply::Text(text) => Ok(text),
            MockReply::Fragments(fragments) => Ok(fragments.concat()),
            MockReply::FragmentsThenFail(_, error) | MockReply::Unavailable(error) => {
                Err(LlmError::Unavailable(error))
            }
        }
    }

    fn open_stream(&self, request: &ChatRequest) -> Result<FragmentStream> {
        let (fragments, failure) = match self.next_reply(request)? {
            MockReply::Text(text) => (vec![text], None),
            MockReply::Fragments(fragments) => (fragments, None),
            MockReply::FragmentsThenFail(fragments, error) => (fragments, Some(error)),
            MockReply::Unavailable(error) => return Err(LlmError::Unavailable(error)),
        };
        Ok(Box::new(MockFragments {
            fragments: fragments.into(),
            failure,
            delay: self.fragment_delay,
            closed: self.closed_streams.clone(),
        }))
    }

    fn list_models(&self) -> Result<Vec<String>> {
        if self.healthy {
            Ok(self.models.clone())
        } else {
            Err(LlmError::Unavailable("mock backend is down".to_string()))
        }
    }

    fn health_check(&self) -> Result<()> {
        self.list_models().map(|_| ())
    }
}

struct MockFragments {
    fragments: VecDeque<String>,
    failure: Option<String>,
    delay: Duration,
    closed: Arc<AtomicUsize>,
}

impl Iterator for MockFragments {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        match self.fragments.pop_front() {
            Some(fragment) => Some(Ok(fragment)),
            None => self.failure.take().map(|e| Err(LlmError::Unavailable(e))),
        }
    }
}

impl Drop for MockFragments {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
