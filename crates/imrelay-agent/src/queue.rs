// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-flight request queue.
//!
//! Inbound messages are queued FIFO through a [`QueueHandle`] and processed
//! one at a time by the [`RequestQueue`] worker, which owns the session slot.
//! The worker takes `&mut self` for every item, so two engine invocations
//! can never overlap.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use imrelay_config::RelayConfig;
use imrelay_core::{
    EngineRequest, EngineResponse, MessageTransport, NewMessage, QueueItem, ReasoningEngine,
    RelayError, preview,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::commands::ControlCommand;
use crate::dispatch::Dispatcher;
use crate::session::SessionManager;

/// Sent before every engine invocation.
pub const ACK_TEXT: &str = "Thinking...";
/// Reply to a reset command.
pub const RESET_TEXT: &str = "Session reset. Next message starts fresh.";
/// Status reply when no session is active.
pub const NO_SESSION_TEXT: &str = "No active session.";

/// State shared between the worker and its handles.
#[derive(Debug, Default)]
struct Shared {
    next_position: AtomicU64,
    pending: AtomicUsize,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when processing ends, however it ends.
struct InFlight(Arc<Shared>);

impl InFlight {
    fn set(shared: &Arc<Shared>) -> Self {
        shared.in_flight.store(true, Ordering::SeqCst);
        Self(shared.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::SeqCst);
    }
}

/// Cloneable producer side of the queue.
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::UnboundedSender<QueueItem>,
    shared: Arc<Shared>,
}

impl QueueHandle {
    /// Appends a message and returns its arrival position.
    ///
    /// Fails only once the worker has gone away.
    pub fn enqueue(&self, message: NewMessage) -> Result<u64, RelayError> {
        let position = self.shared.next_position.fetch_add(1, Ordering::SeqCst);
        info!(
            record_id = message.record_id,
            position,
            text = %preview(&message.text, 80),
            "new message"
        );

        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        let item = QueueItem {
            text: message.text,
            record_id: message.record_id,
            position,
        };
        self.tx.send(item).map_err(|_| {
            self.shared.pending.fetch_sub(1, Ordering::SeqCst);
            RelayError::Internal("request queue is closed".to_string())
        })?;
        Ok(position)
    }

    /// Whether an item is being processed right now.
    pub fn is_busy(&self) -> bool {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Items waiting behind the one in flight.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }
}

/// Engine parameters applied to every request.
#[derive(Debug, Clone)]
struct EngineSettings {
    working_directory: PathBuf,
    allowed_tools: Vec<String>,
    max_turns: u32,
    timeout: Duration,
}

/// The queue worker.
pub struct RequestQueue {
    engine: Arc<dyn ReasoningEngine>,
    dispatcher: Dispatcher,
    sessions: SessionManager,
    settings: EngineSettings,
    rx: mpsc::UnboundedReceiver<QueueItem>,
    shared: Arc<Shared>,
}

impl RequestQueue {
    pub fn new(
        engine: Arc<dyn ReasoningEngine>,
        transport: Arc<dyn MessageTransport>,
        config: &RelayConfig,
    ) -> (Self, QueueHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());

        let queue = Self {
            engine,
            dispatcher: Dispatcher::new(transport, &config.imessage),
            sessions: SessionManager::new(config.session.timeout()),
            settings: EngineSettings {
                working_directory: PathBuf::from(&config.engine.working_directory),
                allowed_tools: config.engine.allowed_tools.clone(),
                max_turns: config.engine.max_turns,
                timeout: config.engine.timeout(),
            },
            rx,
            shared: shared.clone(),
        };
        (queue, QueueHandle { tx, shared })
    }

    /// The session slot, for inspection.
    pub fn sessions(&mut self) -> &mut SessionManager {
        &mut self.sessions
    }

    /// Processes the head of the queue if nothing is in flight.
    ///
    /// Returns `false` without doing anything when an item is already being
    /// processed or the queue is empty.
    pub async fn process_next(&mut self) -> bool {
        if self.shared.in_flight.load(Ordering::SeqCst) {
            return false;
        }
        match self.rx.try_recv() {
            Ok(item) => {
                self.process(item).await;
                true
            }
            Err(_) => false,
        }
    }

    /// Processes items as they arrive until `cancel` fires or every
    /// [`QueueHandle`] is dropped. An item already in flight is finished
    /// before returning.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let dropped = self.shared.pending.load(Ordering::SeqCst);
                    info!(dropped, "request queue shutting down");
                    return;
                }
                item = self.rx.recv() => item,
            };

            match item {
                Some(item) => self.process(item).await,
                None => {
                    debug!("all queue handles dropped");
                    return;
                }
            }
        }
    }

    async fn process(&mut self, item: QueueItem) {
        self.shared.pending.fetch_sub(1, Ordering::SeqCst);
        let _in_flight = InFlight::set(&self.shared);
        debug!(position = item.position, record_id = item.record_id, "processing");

        if let Err(e) = self.handle(&item.text).await {
            let message = match &e {
                RelayError::Timeout { .. } => format!("{} {e}", self.engine.name()),
                _ => e.to_string(),
            };
            error!(error = %message, record_id = item.record_id, "request failed");

            if let Err(send_err) = self.dispatcher.dispatch(&format!("Error: {message}")).await {
                error!(error = %send_err, "failed to send error reply");
            }
        }
    }

    async fn handle(&mut self, text: &str) -> Result<(), RelayError> {
        if let Some(command) = ControlCommand::parse(text) {
            let reply = self.control_reply(command);
            return self.dispatcher.dispatch(&reply).await;
        }

        let resume = self.sessions.get_session().map(|s| s.id.clone());
        match &resume {
            Some(id) => {
                let short: String = id.chars().take(8).collect();
                info!(session = %short, "invoking engine");
            }
            None => info!("invoking engine (new session)"),
        }

        self.dispatcher.dispatch(ACK_TEXT).await?;

        let request = EngineRequest {
            prompt: text.to_string(),
            working_directory: self.settings.working_directory.clone(),
            allowed_tools: self.settings.allowed_tools.clone(),
            max_turns: self.settings.max_turns,
            resume_session: resume.clone(),
        };
        let response = self.invoke_with_timeout(request).await?;

        if response.is_error {
            error!(result = %preview(&response.result, 200), "engine reported an error");
            return self
                .dispatcher
                .dispatch(&format!("Error: {}", response.result))
                .await;
        }

        self.record_reply(resume.is_some(), &response);
        self.dispatcher.dispatch(&response.result).await
    }

    fn control_reply(&mut self, command: ControlCommand) -> String {
        match command {
            ControlCommand::Reset => {
                self.sessions.end_session();
                RESET_TEXT.to_string()
            }
            ControlCommand::Status => {
                let now = Utc::now();
                match self.sessions.get_session_at(now) {
                    Some(session) => format!(
                        "Active session: {} messages, started {}s ago",
                        session.message_count,
                        session.age_secs_at(now)
                    ),
                    None => NO_SESSION_TEXT.to_string(),
                }
            }
        }
    }

    fn record_reply(&mut self, had_session: bool, response: &EngineResponse) {
        let id = response.session_id.as_deref().filter(|id| !id.is_empty());
        match (had_session, id) {
            (true, id) => self.sessions.update_session(id),
            (false, Some(id)) => self.sessions.start_session(id),
            (false, None) => debug!("engine returned no session id, not starting a session"),
        }

        match response.total_cost_usd {
            Some(cost) => info!(cost_usd = cost, "engine responded"),
            None => info!("engine responded"),
        }
    }

    /// Runs the engine under the configured timeout. The timer cancels the
    /// token handed to the engine, which stops the turn.
    async fn invoke_with_timeout(
        &self,
        request: EngineRequest,
    ) -> Result<EngineResponse, RelayError> {
        let timeout = self.settings.timeout;
        let cancel = CancellationToken::new();
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        };

        let result = self.engine.invoke(request, cancel.clone()).await;
        timer.abort();

        match result {
            Err(RelayError::Cancelled) if cancel.is_cancelled() => {
                warn!(timeout_ms = timeout.as_millis() as u64, "engine timed out");
                Err(RelayError::Timeout { duration: timeout })
            }
            other => other,
        }
    }
}
