// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait that every collaborator implements.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::types::{AdapterKind, HealthStatus};

/// The base trait for all relay collaborators.
///
/// Provides identity and a health check used by `imrelay doctor`.
#[async_trait]
pub trait RelayAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns which collaborator role this adapter fills.
    fn kind(&self) -> AdapterKind;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, RelayError>;
}
