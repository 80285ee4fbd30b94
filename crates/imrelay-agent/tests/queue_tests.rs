// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request queue ordering and shutdown behaviour under a running worker.

use std::sync::Arc;
use std::time::Duration;

use imrelay_agent::{QueueHandle, RequestQueue};
use imrelay_config::RelayConfig;
use imrelay_core::NewMessage;
use imrelay_test_utils::{MockEngine, MockTransport};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

fn config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.imessage.self_handle = "me@example.com".into();
    config.imessage.chunk_delay_ms = 10;
    config.engine.timeout_ms = 60_000;
    config
}

fn start(
    engine: &MockEngine,
    transport: &MockTransport,
) -> (QueueHandle, CancellationToken, JoinHandle<()>) {
    let (queue, handle) = RequestQueue::new(
        Arc::new(engine.clone()),
        Arc::new(transport.clone()),
        &config(),
    );
    let cancel = CancellationToken::new();
    let worker = tokio::spawn(queue.run(cancel.clone()));
    (handle, cancel, worker)
}

fn msg(id: i64, text: &str) -> NewMessage {
    NewMessage {
        record_id: id,
        text: text.to_string(),
    }
}

async fn wait_for_sends(transport: &MockTransport, count: usize) {
    while transport.sent_texts().await.len() < count {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn messages_are_processed_one_at_a_time_in_order() {
    let engine = MockEngine::new();
    engine.set_delay(Duration::from_millis(500)).await;
    let transport = MockTransport::new();
    let (handle, cancel, worker) = start(&engine, &transport);

    for (i, text) in ["a", "b", "c"].into_iter().enumerate() {
        handle.enqueue(msg(i as i64 + 1, text)).unwrap();
    }
    wait_for_sends(&transport, 6).await;

    assert_eq!(engine.peak_concurrency(), 1);
    let prompts: Vec<String> = engine
        .requests()
        .await
        .into_iter()
        .map(|r| r.prompt)
        .collect();
    assert_eq!(prompts, vec!["a", "b", "c"]);

    // Each ack is followed by its own reply before the next ack.
    assert_eq!(
        transport.sent_texts().await,
        vec![
            "[Claude] Thinking...",
            "[Claude] mock response",
            "[Claude] Thinking...",
            "[Claude] mock response",
            "[Claude] Thinking...",
            "[Claude] mock response",
        ]
    );

    cancel.cancel();
    worker.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn messages_queued_while_busy_run_afterwards() {
    let engine = MockEngine::new();
    engine.set_delay(Duration::from_secs(2)).await;
    let transport = MockTransport::new();
    let (handle, cancel, worker) = start(&engine, &transport);

    handle.enqueue(msg(1, "first")).unwrap();
    wait_for_sends(&transport, 1).await;
    assert!(handle.is_busy());

    handle.enqueue(msg(2, "second")).unwrap();
    assert_eq!(handle.pending(), 1);

    wait_for_sends(&transport, 4).await;
    assert_eq!(engine.call_count().await, 2);
    assert_eq!(engine.peak_concurrency(), 1);

    cancel.cancel();
    worker.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_finishes_in_flight_item() {
    let engine = MockEngine::new();
    engine.set_delay(Duration::from_secs(5)).await;
    let transport = MockTransport::new();
    let (handle, cancel, worker) = start(&engine, &transport);

    handle.enqueue(msg(1, "in flight")).unwrap();
    handle.enqueue(msg(2, "never started")).unwrap();
    wait_for_sends(&transport, 1).await;

    cancel.cancel();
    worker.await.unwrap();

    assert_eq!(engine.call_count().await, 1);
    assert_eq!(
        transport.sent_texts().await,
        vec!["[Claude] Thinking...", "[Claude] mock response"]
    );
}

#[tokio::test]
async fn worker_stops_when_handles_are_dropped() {
    let engine = MockEngine::new();
    let transport = MockTransport::new();
    let (handle, _cancel, worker) = start(&engine, &transport);

    handle.enqueue(msg(1, "/status")).unwrap();
    drop(handle);

    worker.await.unwrap();
    assert_eq!(
        transport.sent_texts().await,
        vec!["[Claude] No active session."]
    );
}
