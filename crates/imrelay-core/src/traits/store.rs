// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only message store trait.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::RelayAdapter;
use crate::types::Record;

/// Read-only access to the local message database.
#[async_trait]
pub trait MessageStore: RelayAdapter {
    /// Returns the ids of conversations whose identifier matches any of the
    /// given handle variants.
    async fn resolve_self_chats(&self, handles: &[String]) -> Result<Vec<i64>, RelayError>;

    /// Returns the highest record id across the given conversations, or 0.
    async fn max_record_id(&self, chat_ids: &[i64]) -> Result<i64, RelayError>;

    /// Returns self-authored records in the given conversations with an id
    /// strictly greater than `watermark`, ascending and without duplicates.
    async fn records_after(
        &self,
        chat_ids: &[i64],
        watermark: i64,
    ) -> Result<Vec<Record>, RelayError>;
}
