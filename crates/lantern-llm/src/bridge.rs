//! Streaming bridge: blocking backend stream to a cancellable async token sequence.
//!
//! ```text
//!  blocking worker                       async consumer
//! ┌──────────────────┐  Fragment(..)   ┌──────────────────┐
//! │ open_stream()    │ ──────────────▶ │ TokenStream      │
//! │ for fragment {   │  End            │  .next().await   │
//! │   check cancel   │ ──────────────▶ │  polls with a    │
//! │   send           │  Failed(err)    │  short timeout   │
//! │ }                │ ──────────────▶ │                  │
//! └──────────────────┘                 └──────────────────┘
//!          ▲                                    │
//!          └──────── CancellationToken ─────────┘
//! ```
//!
//! The producer checks the cancellation token between fragments and drops the
//! backend stream (closing the connection) once it is set. The consumer checks
//! the same token before yielding anything, so no fragment is handed out after
//! cancellation even if it was already buffered.

use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::SharedBackend;
use crate::error::{LlmError, Result};
use crate::types::ChatRequest;

/// Default consumer poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default number of fragments buffered between producer and consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Items carried from the blocking producer to the consumer.
#[derive(Debug)]
enum Handoff {
    Fragment(String),
    End,
    Failed(LlmError),
}

/// Starts streaming backend calls on blocking workers.
#[derive(Clone)]
pub struct StreamingBridge {
    backend: SharedBackend,
    poll_interval: Duration,
    capacity: usize,
}

impl StreamingBridge {
    pub fn new(backend: SharedBackend) -> Self {
        Self {
            backend,
            poll_interval: DEFAULT_POLL_INTERVAL,
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Start a streaming call and return the consumer side.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, request: ChatRequest) -> TokenStream {
        let (tx, rx) = mpsc::channel(self.capacity);
        let cancel = CancellationToken::new();

        let backend = self.backend.clone();
        let producer_cancel = cancel.clone();
        tokio::task::spawn_blocking(move || produce(backend, request, tx, producer_cancel));

        TokenStream {
            rx,
            cancel,
            poll_interval: self.poll_interval,
            finished: false,
        }
    }
}

fn produce(
    backend: SharedBackend,
    request: ChatRequest,
    tx: mpsc::Sender<Handoff>,
    cancel: CancellationToken,
) {
    if cancel.is_cancelled() {
        let _ = tx.blocking_send(Handoff::End);
        return;
    }

    let fragments = match backend.open_stream(&request) {
        Ok(fragments) => fragments,
        Err(e) => {
            tracing::warn!(backend = backend.name(), model = %request.model, error = %e, "Failed to open stream");
            let _ = tx.blocking_send(Handoff::Failed(e));
            return;
        }
    };

    let mut sent = 0usize;
    for item in fragments {
        if cancel.is_cancelled() {
            tracing::debug!(model = %request.model, sent, "Stream cancelled, closing backend connection");
            break;
        }
        match item {
            Ok(fragment) => {
                if tx.blocking_send(Handoff::Fragment(fragment)).is_err() {
                    // Consumer is gone.
                    return;
                }
                sent += 1;
            }
            Err(e) => {
                tracing::warn!(model = %request.model, sent, error = %e, "Stream failed");
                let _ = tx.blocking_send(Handoff::Failed(e));
                return;
            }
        }
    }

    let _ = tx.blocking_send(Handoff::End);
}

/// Handle used to cancel a running stream from elsewhere.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    token: CancellationToken,
}

impl StreamHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Consumer side of a bridged stream.
///
/// Yields fragments in backend emission order, then `None` on end of stream
/// or cancellation. A backend failure is yielded once as `Some(Err(_))`,
/// after which the stream is finished. Dropping the stream cancels it.
pub struct TokenStream {
    rx: mpsc::Receiver<Handoff>,
    cancel: CancellationToken,
    poll_interval: Duration,
    finished: bool,
}

impl TokenStream {
    pub fn handle(&self) -> StreamHandle {
        StreamHandle {
            token: self.cancel.clone(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Next fragment, or `None` once the stream has ended or been cancelled.
    pub async fn next(&mut self) -> Option<Result<String>> {
        loop {
            if self.finished {
                return None;
            }
            if self.cancel.is_cancelled() {
                self.finish();
                return None;
            }

            let item = match tokio::time::timeout(self.poll_interval, self.rx.recv()).await {
                // Poll window elapsed; re-check cancellation.
                Err(_) => continue,
                Ok(item) => item,
            };

            match item {
                Some(Handoff::Fragment(fragment)) => {
                    if self.cancel.is_cancelled() {
                        self.finish();
                        return None;
                    }
                    return Some(Ok(fragment));
                }
                Some(Handoff::End) => {
                    self.finish();
                    return None;
                }
                Some(Handoff::Failed(e)) => {
                    self.finish();
                    return Some(Err(e));
                }
                None => {
                    self.finish();
                    return Some(Err(LlmError::Internal(
                        "stream worker exited without finishing".to_string(),
                    )));
                }
            }
        }
    }

    /// Adapt into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<String>> + Send {
        futures::stream::unfold(self, |mut tokens| async move {
            tokens.next().await.map(|item| (item, tokens))
        })
    }

    fn finish(&mut self) {
        self.finished = true;
        // Unblocks a producer waiting on a full channel.
        self.rx.close();
    }
}

impl Drop for TokenStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockReply};
    use crate::types::ChatMessage;
    use futures::StreamExt;
    use std::sync::Arc;
    use std::time::Instant;

    fn request() -> ChatRequest {
        ChatRequest::new("test-model", vec![ChatMessage::user("hi")])
    }

    async fn wait_for_closed(backend: &MockBackend, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while backend.closed_streams() < expected {
            assert!(Instant::now() < deadline, "backend stream was never closed");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_fragments_in_order() {
        let backend = Arc::new(MockBackend::new(vec![MockReply::fragments(["a", "b", "c"])]));
        let bridge = StreamingBridge::new(backend.clone());

        let mut stream = bridge.start(request());
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item.unwrap());
        }

        assert_eq!(out, vec!["a", "b", "c"]);
        assert!(stream.next().await.is_none());
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_error_raised_after_fragments() {
        let backend = Arc::new(MockBackend::new(vec![MockReply::FragmentsThenFail(
            vec!["one".to_string(), "two".to_string()],
            "connection reset".to_string(),
        )]));
        let bridge = StreamingBridge::new(backend);

        let mut stream = bridge.start(request());
        assert_eq!(stream.next().await.unwrap().unwrap(), "one");
        assert_eq!(stream.next().await.unwrap().unwrap(), "two");
        assert!(matches!(stream.next().await, Some(Err(LlmError::Unavailable(_)))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_open_failure_is_raised() {
        let backend = Arc::new(MockBackend::new(vec![MockReply::Unavailable(
            "refused".to_string(),
        )]));
        let bridge = StreamingBridge::new(backend);

        let mut stream = bridge.start(request());
        assert!(matches!(stream.next().await, Some(Err(LlmError::Unavailable(_)))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_no_fragment_after_cancel_even_if_buffered() {
        let fragments: Vec<String> = (0..100).map(|i| format!("t{} ", i)).collect();
        let backend = Arc::new(MockBackend::new(vec![MockReply::Fragments(fragments)]));
        let bridge = StreamingBridge::new(backend.clone());

        let mut stream = bridge.start(request());
        assert_eq!(stream.next().await.unwrap().unwrap(), "t0 ");

        // Let the producer fill the channel.
        tokio::time::sleep(Duration::from_millis(50)).await;
        stream.handle().cancel();

        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
        wait_for_closed(&backend, 1).await;
    }

    #[tokio::test]
    async fn test_cancel_closes_slow_backend_stream() {
        let backend = Arc::new(
            MockBackend::new(vec![MockReply::fragments(["x", "y", "z", "w"])])
                .with_fragment_delay(Duration::from_millis(100)),
        );
        let bridge = StreamingBridge::new(backend.clone());

        let mut stream = bridge.start(request());
        let handle = stream.handle();
        assert_eq!(stream.next().await.unwrap().unwrap(), "x");

        handle.cancel();
        assert!(stream.is_cancelled());
        assert!(stream.next().await.is_none());
        wait_for_closed(&backend, 1).await;
    }

    #[tokio::test]
    async fn test_drop_cancels_producer() {
        let backend = Arc::new(
            MockBackend::new(vec![MockReply::fragments(["x", "y", "z"])])
                .with_fragment_delay(Duration::from_millis(50)),
        );
        let bridge = StreamingBridge::new(backend.clone());

        let stream = bridge.start(request());
        let deadline = Instant::now() + Duration::from_secs(5);
        while backend.request_count() == 0 {
            assert!(Instant::now() < deadline, "stream was never opened");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        drop(stream);
        wait_for_closed(&backend, 1).await;
    }

    #[tokio::test]
    async fn test_into_stream_adapter() {
        let backend = Arc::new(MockBackend::new(vec![MockReply::fragments(["p", "q"])]));
        let bridge = StreamingBridge::new(backend).with_poll_interval(Duration::from_millis(10));

        let items: Vec<String> = bridge
            .start(request())
            .into_stream()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec!["p", "q"]);
    }
}
