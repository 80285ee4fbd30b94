// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound message transport trait.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::RelayAdapter;

/// Write-only delivery of text to a recipient.
#[async_trait]
pub trait MessageTransport: RelayAdapter {
    /// Sends `text` to `recipient`, resolving once the send completed or failed.
    async fn send(&self, recipient: &str, text: &str) -> Result<(), RelayError>;
}
