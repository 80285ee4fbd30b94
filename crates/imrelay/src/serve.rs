// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `imrelay serve` command implementation.
//!
//! Checks the environment, then wires the chat.db tailer to the request
//! queue and runs both until SIGINT or SIGTERM.

use std::sync::Arc;

use imrelay_agent::{RequestQueue, install_signal_handler};
use imrelay_claude::ClaudeCli;
use imrelay_config::RelayConfig;
use imrelay_core::{MessageStore, RelayError};
use imrelay_imessage::{AppleScriptTransport, ChatDbStore, StoreTailer};
use tracing::{error, info, warn};

use crate::preflight::{self, CheckResult, CheckStatus};

/// Runs the `imrelay serve` command.
pub async fn run_serve(config: RelayConfig) -> Result<(), RelayError> {
    let store = preflight_checks(&config).await?;

    init_tracing(&config.agent.log_level);

    info!("starting imrelay serve");
    info!(handle = %config.imessage.self_handle, "self handle");
    info!(working_dir = %config.engine.working_directory, "engine working directory");
    info!(poll_interval_ms = config.imessage.poll_interval_ms, "poll interval");
    info!(
        session_timeout_secs = config.session.timeout().as_secs(),
        "session timeout"
    );

    let cancel = install_signal_handler();

    let store: Arc<dyn MessageStore> = Arc::new(store);
    let tailer = StoreTailer::start(store, &config.imessage).await?;

    let engine = Arc::new(ClaudeCli::from_config(&config.engine));
    let transport = Arc::new(AppleScriptTransport::new(config.imessage.send_timeout()));
    let (queue, handle) = RequestQueue::new(engine, transport, &config);

    let queue_task = tokio::spawn(queue.run(cancel.clone()));
    let tailer_task = tokio::spawn(tailer.run(
        move |message| handle.enqueue(message).is_ok(),
        cancel.clone(),
    ));
    info!("polling started, send yourself a message to begin");

    if let Err(e) = tailer_task.await {
        error!(error = %e, "tailer task failed");
        cancel.cancel();
    }
    if let Err(e) = queue_task.await {
        error!(error = %e, "request queue task failed");
    }

    info!("imrelay serve shutdown complete");
    Ok(())
}

/// Checks that must pass before relaying. Failures are printed with their
/// hints; the open store is returned on success.
async fn preflight_checks(config: &RelayConfig) -> Result<ChatDbStore, RelayError> {
    let (db_check, store) = preflight::check_chat_db(&config.imessage.chat_db_path).await;
    let engine_check = preflight::check_engine(&config.engine.command, false).await;

    let failures: Vec<&CheckResult> = [&db_check, &engine_check]
        .into_iter()
        .filter(|c| c.failed())
        .collect();
    for check in &failures {
        eprintln!("ERROR: {}", check.message);
        for line in &check.hint {
            eprintln!("  {line}");
        }
    }

    match store {
        Some(store) if failures.is_empty() => {
            let dir_check = preflight::check_working_dir(&config.engine.working_directory);
            if dir_check.status == CheckStatus::Warn {
                warn!(dir = %config.engine.working_directory, "engine working directory does not exist");
            }
            Ok(store)
        }
        _ => Err(RelayError::Config(format!(
            "{} preflight check(s) failed",
            failures.len().max(1)
        ))),
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("imrelay={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
