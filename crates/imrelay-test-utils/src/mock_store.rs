// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock message store for deterministic testing.
//!
//! `MockStore` implements `MessageStore` over in-memory chats and records so
//! tailer tests can append rows between polls.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use imrelay_core::{AdapterKind, HealthStatus, MessageStore, Record, RelayAdapter, RelayError};

#[derive(Default)]
struct State {
    chats: HashMap<String, i64>,
    /// `(chat_id, record)` pairs in insertion order.
    rows: Vec<(i64, Record)>,
    fail_next: Option<String>,
}

/// An in-memory message store.
///
/// Records are attached to chats by id; `records_after` applies the same
/// filtering a real store does (chat membership, watermark, self-authored,
/// ascending, distinct).
#[derive(Clone, Default)]
pub struct MockStore {
    state: Arc<Mutex<State>>,
    queries: Arc<AtomicUsize>,
}

impl MockStore {
    /// Create an empty store with no chats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a conversation identifier under `chat_id`.
    pub async fn add_chat(&self, identifier: &str, chat_id: i64) {
        self.state
            .lock()
            .await
            .chats
            .insert(identifier.to_string(), chat_id);
    }

    /// Attach a record to a chat.
    pub async fn push_record(&self, chat_id: i64, record: Record) {
        self.state.lock().await.rows.push((chat_id, record));
    }

    /// Attach a self-authored plain-text record to a chat.
    pub async fn push_text(&self, chat_id: i64, id: i64, text: &str) {
        self.push_record(
            chat_id,
            Record {
                id,
                text: Some(text.to_string()),
                is_from_me: true,
                ..Record::default()
            },
        )
        .await;
    }

    /// Make the next `records_after` call fail with `message`.
    pub async fn fail_next_query(&self, message: &str) {
        self.state.lock().await.fail_next = Some(message.to_string());
    }

    /// Number of `records_after` calls made so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct MockStoreError(String);

#[async_trait]
impl RelayAdapter for MockStore {
    fn name(&self) -> &str {
        "mock-store"
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl MessageStore for MockStore {
    async fn resolve_self_chats(&self, handles: &[String]) -> Result<Vec<i64>, RelayError> {
        let state = self.state.lock().await;
        let mut ids: Vec<i64> = handles
            .iter()
            .filter_map(|h| state.chats.get(h).copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn max_record_id(&self, chat_ids: &[i64]) -> Result<i64, RelayError> {
        let state = self.state.lock().await;
        Ok(state
            .rows
            .iter()
            .filter(|(chat, _)| chat_ids.contains(chat))
            .map(|(_, r)| r.id)
            .max()
            .unwrap_or(0))
    }

    async fn records_after(
        &self,
        chat_ids: &[i64],
        watermark: i64,
    ) -> Result<Vec<Record>, RelayError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if let Some(message) = state.fail_next.take() {
            return Err(RelayError::store(MockStoreError(message)));
        }

        let mut records: Vec<Record> = state
            .rows
            .iter()
            .filter(|(chat, r)| chat_ids.contains(chat) && r.id > watermark && r.is_from_me)
            .map(|(_, r)| r.clone())
            .collect();
        records.sort_by_key(|r| r.id);
        records.dedup_by_key(|r| r.id);
        Ok(records)
    }
}
