// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for deterministic testing.
//!
//! `MockTransport` implements `MessageTransport` and captures every send for
//! assertion in tests. Sends can be made to fail on demand.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use imrelay_core::{AdapterKind, HealthStatus, MessageTransport, RelayAdapter, RelayError};

/// A single captured send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: String,
    pub text: String,
}

/// A mock transport that records sends instead of delivering them.
#[derive(Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    failing: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a new mock transport with no captured sends.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail (`true`) or succeed (`false`).
    /// Failed sends are not captured.
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All sends captured so far.
    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Texts of all captured sends, in order.
    pub async fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .map(|m| m.text.clone())
            .collect()
    }

    /// Clear all captured sends.
    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl RelayAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl MessageTransport for MockTransport {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), RelayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::Transport {
                message: "Failed to send iMessage: mock failure".to_string(),
                source: None,
            });
        }
        self.sent.lock().await.push(SentMessage {
            recipient: recipient.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}
