// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Polling tailer over the self-conversation.
//!
//! Each poll reads self-authored records past the watermark, decodes them,
//! drops the relay's own replies (recognised by the response prefix) and
//! suppresses repeats of the same text seen within the dedup window. Messages
//! sometimes land in `chat.db` twice within a few hundred milliseconds, which
//! is what the dedup table absorbs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use imrelay_config::model::IMessageConfig;
use imrelay_core::{MessageStore, NewMessage, RelayError, preview};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::decoder::decode_record;

/// Conversation identifiers tried for `handle`: as given, without a leading
/// `+`, and without a leading `+1`.
///
/// Only these literal forms are tried; other formattings of the same number
/// will not match.
pub fn handle_variants(handle: &str) -> Vec<String> {
    let mut variants = vec![handle.to_string()];
    for stripped in [handle.strip_prefix('+'), handle.strip_prefix("+1")]
        .into_iter()
        .flatten()
    {
        if !variants.iter().any(|v| v == stripped) {
            variants.push(stripped.to_string());
        }
    }
    variants
}

/// Recently seen message texts, keyed by trimmed text.
#[derive(Debug)]
pub struct DedupTable {
    entries: HashMap<String, Instant>,
    window: Duration,
    prune_after: Duration,
}

impl DedupTable {
    pub fn new(window: Duration, prune_after: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            window,
            prune_after,
        }
    }

    /// Drops entries last seen more than the prune window before `now`.
    pub fn prune(&mut self, now: Instant) {
        let prune_after = self.prune_after;
        self.entries
            .retain(|_, seen| now.saturating_duration_since(*seen) <= prune_after);
    }

    /// Returns `true` and records `text` if it was not seen within the
    /// window; returns `false` for a duplicate, leaving its timestamp as is.
    pub fn check_and_record(&mut self, text: &str, now: Instant) -> bool {
        let key = text.trim();
        if let Some(seen) = self.entries.get(key)
            && now.saturating_duration_since(*seen) < self.window
        {
            return false;
        }
        self.entries.insert(key.to_string(), now);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tails the self-conversation in a [`MessageStore`].
pub struct StoreTailer {
    store: Arc<dyn MessageStore>,
    chat_ids: Vec<i64>,
    watermark: i64,
    dedup: DedupTable,
    response_prefix: String,
    poll_interval: Duration,
}

impl StoreTailer {
    /// Resolves the self-conversation and positions the watermark at its
    /// newest record, so history is never replayed.
    pub async fn start(
        store: Arc<dyn MessageStore>,
        config: &IMessageConfig,
    ) -> Result<Self, RelayError> {
        let variants = handle_variants(&config.self_handle);
        let chat_ids = store.resolve_self_chats(&variants).await?;
        if chat_ids.is_empty() {
            return Err(RelayError::store(NoSelfChat(config.self_handle.clone())));
        }
        info!(chat_ids = ?chat_ids, "found self-chat");

        let watermark = store.max_record_id(&chat_ids).await?;
        info!(watermark, "starting from record id");

        Ok(Self {
            store,
            chat_ids,
            watermark,
            dedup: DedupTable::new(config.dedup_window(), config.dedup_prune()),
            response_prefix: config.response_prefix.clone(),
            poll_interval: config.poll_interval(),
        })
    }

    /// Highest record id processed so far.
    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    pub fn chat_ids(&self) -> &[i64] {
        &self.chat_ids
    }

    /// Runs one poll cycle and returns the messages to hand on, in record
    /// order. On error the watermark is left where it was.
    pub async fn poll(&mut self) -> Result<Vec<NewMessage>, RelayError> {
        let now = Instant::now();
        self.dedup.prune(now);

        let records = self
            .store
            .records_after(&self.chat_ids, self.watermark)
            .await?;

        let mut emitted = Vec::new();
        for record in records {
            self.watermark = record.id;

            let Some(text) = decode_record(&record) else {
                continue;
            };
            if text.starts_with(&self.response_prefix) {
                continue;
            }
            if !self.dedup.check_and_record(&text, now) {
                debug!(
                    record_id = record.id,
                    text = %preview(&text, 40),
                    "skipping duplicate"
                );
                continue;
            }

            debug!(record_id = record.id, text = %preview(&text, 80), "message");
            emitted.push(NewMessage {
                record_id: record.id,
                text,
            });
        }
        Ok(emitted)
    }

    /// Polls on the configured interval until `cancel` fires or `on_message`
    /// returns `false`. A failed poll is logged and the cycle skipped.
    pub async fn run<F>(mut self, mut on_message: F, cancel: CancellationToken)
    where
        F: FnMut(NewMessage) -> bool + Send,
    {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Skip the first immediate tick.
        interval.tick().await;
        info!(interval_ms = self.poll_interval.as_millis() as u64, "polling started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let messages = match self.poll().await {
                        Ok(messages) => messages,
                        Err(e) => {
                            error!(error = %e, "poll failed");
                            continue;
                        }
                    };
                    for message in messages {
                        if !on_message(message) {
                            info!("message consumer closed, tailer stopping");
                            return;
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("tailer shutting down");
                    return;
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error(
    "no self-chat found for handle \"{0}\"; send yourself a message in iMessage \
     and check that imessage.self_handle is correct"
)]
struct NoSelfChat(String);

#[cfg(test)]
mod tests {
    use super::*;
    use imrelay_core::Record;
    use imrelay_test_utils::MockStore;
    use tracing_test::traced_test;

    const HANDLE: &str = "+15551234567";

    fn config() -> IMessageConfig {
        IMessageConfig {
            self_handle: HANDLE.to_string(),
            ..IMessageConfig::default()
        }
    }

    async fn store_with_self_chat() -> MockStore {
        let store = MockStore::new();
        store.add_chat(HANDLE, 1).await;
        store
    }

    #[test]
    fn variants_cover_plus_and_country_code() {
        assert_eq!(
            handle_variants("+15551234567"),
            vec!["+15551234567", "15551234567", "5551234567"]
        );
        assert_eq!(handle_variants("me@icloud.com"), vec!["me@icloud.com"]);
        assert_eq!(handle_variants("+445551234"), vec!["+445551234", "445551234"]);
    }

    #[tokio::test(start_paused = true)]
    async fn dedup_window_suppresses_then_releases() {
        let mut table = DedupTable::new(Duration::from_secs(5), Duration::from_secs(10));
        let t0 = Instant::now();

        assert!(table.check_and_record("hello", t0));
        assert!(!table.check_and_record("hello", t0 + Duration::from_secs(3)));
        assert!(table.check_and_record("hello", t0 + Duration::from_secs(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn dedup_key_is_trimmed_text() {
        let mut table = DedupTable::new(Duration::from_secs(5), Duration::from_secs(10));
        let t0 = Instant::now();

        assert!(table.check_and_record("hello", t0));
        assert!(!table.check_and_record("  hello\n", t0));
    }

    #[tokio::test(start_paused = true)]
    async fn prune_drops_only_stale_entries() {
        let mut table = DedupTable::new(Duration::from_secs(5), Duration::from_secs(10));
        let t0 = Instant::now();
        table.check_and_record("old", t0);
        table.check_and_record("new", t0 + Duration::from_secs(8));

        table.prune(t0 + Duration::from_secs(11));
        assert_eq!(table.len(), 1);
        assert!(!table.check_and_record("new", t0 + Duration::from_secs(11)));
    }

    #[tokio::test]
    async fn start_fails_without_self_chat() {
        let store = MockStore::new();
        store.add_chat("someone-else@example.com", 9).await;

        let result = StoreTailer::start(Arc::new(store), &config()).await;
        let err = result.err().expect("start should fail");
        assert!(matches!(err, RelayError::Store { .. }));
        assert_eq!(
            err.to_string(),
            "store error: no self-chat found for handle \"+15551234567\"; send yourself \
             a message in iMessage and check that imessage.self_handle is correct"
        );
    }

    #[tokio::test]
    async fn start_matches_handle_without_plus() {
        let store = MockStore::new();
        store.add_chat("15551234567", 4).await;

        let tailer = StoreTailer::start(Arc::new(store), &config()).await.unwrap();
        assert_eq!(tailer.chat_ids(), &[4]);
    }

    #[tokio::test]
    async fn history_before_start_is_not_replayed() {
        let store = store_with_self_chat().await;
        store.push_text(1, 10, "old message").await;

        let mut tailer = StoreTailer::start(Arc::new(store.clone()), &config())
            .await
            .unwrap();
        assert_eq!(tailer.watermark(), 10);
        assert!(tailer.poll().await.unwrap().is_empty());

        store.push_text(1, 11, "new message").await;
        let messages = tailer.poll().await.unwrap();
        assert_eq!(
            messages,
            vec![NewMessage {
                record_id: 11,
                text: "new message".into()
            }]
        );
        assert_eq!(tailer.watermark(), 11);
    }

    #[tokio::test]
    async fn own_replies_are_skipped_but_advance_watermark() {
        let store = store_with_self_chat().await;
        let mut tailer = StoreTailer::start(Arc::new(store.clone()), &config())
            .await
            .unwrap();

        store.push_text(1, 1, "[Claude] Thinking...").await;
        store.push_text(1, 2, "a real question").await;
        store
            .push_record(
                1,
                Record {
                    id: 3,
                    is_from_me: true,
                    ..Record::default()
                },
            )
            .await;

        let messages = tailer.poll().await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "a real question");
        assert_eq!(tailer.watermark(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_rows_within_window_emit_once() {
        let store = store_with_self_chat().await;
        let mut tailer = StoreTailer::start(Arc::new(store.clone()), &config())
            .await
            .unwrap();

        store.push_text(1, 1, "hello").await;
        assert_eq!(tailer.poll().await.unwrap().len(), 1);

        tokio::time::advance(Duration::from_secs(3)).await;
        store.push_text(1, 2, "hello").await;
        assert!(tailer.poll().await.unwrap().is_empty());

        tokio::time::advance(Duration::from_secs(4)).await;
        store.push_text(1, 3, "hello").await;
        let messages = tailer.poll().await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].record_id, 3);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn skipped_duplicate_is_logged_with_preview() {
        let store = store_with_self_chat().await;
        let mut tailer = StoreTailer::start(Arc::new(store.clone()), &config())
            .await
            .unwrap();

        store.push_text(1, 1, "same words").await;
        store.push_text(1, 2, "same words").await;
        assert_eq!(tailer.poll().await.unwrap().len(), 1);

        assert!(logs_contain("skipping duplicate"));
        assert!(logs_contain("record_id=2"));
    }

    #[tokio::test]
    async fn failed_poll_keeps_watermark() {
        let store = store_with_self_chat().await;
        let mut tailer = StoreTailer::start(Arc::new(store.clone()), &config())
            .await
            .unwrap();

        store.push_text(1, 1, "queued").await;
        store.fail_next_query("database is locked").await;
        assert!(tailer.poll().await.is_err());
        assert_eq!(tailer.watermark(), 0);

        let messages = tailer.poll().await.unwrap();
        assert_eq!(messages[0].text, "queued");
    }

    #[tokio::test(start_paused = true)]
    async fn run_forwards_messages_and_survives_errors() {
        let store = store_with_self_chat().await;
        let tailer = StoreTailer::start(Arc::new(store.clone()), &config())
            .await
            .unwrap();

        store.fail_next_query("transient").await;
        store.push_text(1, 1, "first").await;
        store.push_text(1, 2, "second").await;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(tailer.run(move |m| tx.send(m).is_ok(), cancel.clone()));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!((first.text.as_str(), second.text.as_str()), ("first", "second"));
        assert!(store.query_count() >= 2);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_consumer_closes() {
        let store = store_with_self_chat().await;
        let tailer = StoreTailer::start(Arc::new(store.clone()), &config())
            .await
            .unwrap();
        store.push_text(1, 1, "only").await;

        let mut seen = Vec::new();
        tailer
            .run(
                |m| {
                    seen.push(m.text);
                    false
                },
                CancellationToken::new(),
            )
            .await;
        assert_eq!(seen, vec!["only"]);
    }
}
