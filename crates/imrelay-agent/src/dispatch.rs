// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply delivery: prefix, markup stripping, chunking and ordered sends.

use std::sync::Arc;
use std::time::Duration;

use imrelay_config::model::IMessageConfig;
use imrelay_core::{MessageTransport, RelayError};
use tracing::debug;

use crate::chunk::split_into_chunks;
use crate::markup::strip_markup;

/// Sends replies to the configured recipient through a [`MessageTransport`].
pub struct Dispatcher {
    transport: Arc<dyn MessageTransport>,
    recipient: String,
    prefix: String,
    max_chars: usize,
    chunk_delay: Duration,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn MessageTransport>, config: &IMessageConfig) -> Self {
        Self {
            transport,
            recipient: config.self_handle.clone(),
            prefix: config.response_prefix.clone(),
            max_chars: config.max_message_length,
            chunk_delay: config.chunk_delay(),
        }
    }

    /// The full text that would be sent for `text`, before chunking.
    ///
    /// Markup is stripped from `text` alone so the prefix always reaches
    /// the conversation verbatim; the tailer relies on it to skip replies.
    pub fn render(&self, text: &str) -> String {
        format!("{}{}", self.prefix, strip_markup(text))
    }

    /// Sends `text` as one or more messages, in order, pausing between them.
    /// Stops at the first failed send.
    pub async fn dispatch(&self, text: &str) -> Result<(), RelayError> {
        let chunks = split_into_chunks(&self.render(text), self.max_chars);
        let total = chunks.len();

        for (i, chunk) in chunks.iter().enumerate() {
            debug!(
                chunk = i + 1,
                total,
                chars = chunk.chars().count(),
                "sending chunk"
            );
            self.transport.send(&self.recipient, chunk).await?;

            if i + 1 < total {
                tokio::time::sleep(self.chunk_delay).await;
            }
        }
        Ok(())
    }
}
