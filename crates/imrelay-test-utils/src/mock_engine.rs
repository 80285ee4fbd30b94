// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock reasoning engine for deterministic testing.
//!
//! `MockEngine` implements `ReasoningEngine` with pre-configured replies, an
//! optional per-call delay, and bookkeeping of every request and of the peak
//! number of concurrent invocations.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use imrelay_core::{
    AdapterKind, EngineRequest, EngineResponse, HealthStatus, ReasoningEngine, RelayAdapter,
    RelayError,
};

/// Session id carried by the default reply.
pub const MOCK_SESSION_ID: &str = "mock-session";

/// A scripted engine outcome.
enum Reply {
    Response(EngineResponse),
    Failure(String),
}

/// A mock reasoning engine.
///
/// Replies are popped from a FIFO queue. When the queue is empty, a reply
/// with text `"mock response"` and session [`MOCK_SESSION_ID`] is returned.
#[derive(Clone, Default)]
pub struct MockEngine {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<EngineRequest>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
}

/// Decrements the active counter when an invocation ends, however it ends.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockEngine {
    /// Create a new mock engine with an empty reply queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock engine pre-loaded with the given replies.
    pub fn with_responses(responses: Vec<EngineResponse>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(
                responses.into_iter().map(Reply::Response).collect(),
            )),
            ..Self::default()
        }
    }

    /// Queue a reply.
    pub async fn push_response(&self, response: EngineResponse) {
        self.replies
            .lock()
            .await
            .push_back(Reply::Response(response));
    }

    /// Queue an engine failure with the given message.
    pub async fn push_failure(&self, message: &str) {
        self.replies
            .lock()
            .await
            .push_back(Reply::Failure(message.to_string()));
    }

    /// Make every subsequent invocation take `delay` before replying.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.lock().await = Some(delay);
    }

    /// All requests received so far, in arrival order.
    pub async fn requests(&self) -> Vec<EngineRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of invocations received so far.
    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Highest number of invocations that were in flight at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Number of invocations that ended through cancellation.
    pub fn cancelled_count(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn next_reply(&self) -> Reply {
        self.replies.lock().await.pop_front().unwrap_or_else(|| {
            Reply::Response(EngineResponse {
                result: "mock response".to_string(),
                session_id: Some(MOCK_SESSION_ID.to_string()),
                ..EngineResponse::default()
            })
        })
    }
}

#[async_trait]
impl RelayAdapter for MockEngine {
    fn name(&self) -> &str {
        "mock-engine"
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Engine
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ReasoningEngine for MockEngine {
    async fn invoke(
        &self,
        request: EngineRequest,
        cancel: CancellationToken,
    ) -> Result<EngineResponse, RelayError> {
        self.requests.lock().await.push(request);

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.cancelled.fetch_add(1, Ordering::SeqCst);
                    return Err(RelayError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        } else if cancel.is_cancelled() {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
            return Err(RelayError::Cancelled);
        }

        match self.next_reply().await {
            Reply::Response(response) => Ok(response),
            Reply::Failure(message) => Err(RelayError::Engine {
                message,
                source: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn request(prompt: &str) -> EngineRequest {
        EngineRequest {
            prompt: prompt.to_string(),
            working_directory: PathBuf::from("/tmp"),
            allowed_tools: vec![],
            max_turns: 1,
            resume_session: None,
        }
    }

    #[tokio::test]
    async fn returns_queued_then_default_replies() {
        let engine = MockEngine::with_responses(vec![EngineResponse::plain("first")]);

        let first = engine
            .invoke(request("a"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(first.result, "first");

        let second = engine
            .invoke(request("b"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(second.result, "mock response");
        assert_eq!(second.session_id.as_deref(), Some(MOCK_SESSION_ID));

        let prompts: Vec<String> = engine
            .requests()
            .await
            .into_iter()
            .map(|r| r.prompt)
            .collect();
        assert_eq!(prompts, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn queued_failure_is_an_engine_error() {
        let engine = MockEngine::new();
        engine.push_failure("boom").await;

        let err = engine
            .invoke(request("a"), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_delay() {
        let engine = MockEngine::new();
        engine.set_delay(Duration::from_secs(60)).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = engine.invoke(request("slow"), cancel).await.unwrap_err();
        assert!(matches!(err, RelayError::Cancelled));
        assert_eq!(engine.cancelled_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tracks_peak_concurrency() {
        let engine = MockEngine::new();
        engine.set_delay(Duration::from_millis(100)).await;

        let a = engine.invoke(request("a"), CancellationToken::new());
        let b = engine.invoke(request("b"), CancellationToken::new());
        let (ra, rb) = tokio::join!(a, b);
        assert!(ra.is_ok() && rb.is_ok());
        assert_eq!(engine.peak_concurrency(), 2);
    }
}
