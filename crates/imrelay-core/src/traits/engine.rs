// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reasoning engine trait.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;
use crate::traits::adapter::RelayAdapter;
use crate::types::{EngineRequest, EngineResponse};

/// Request/response access to the external reasoning engine.
#[async_trait]
pub trait ReasoningEngine: RelayAdapter {
    /// Runs one engine turn.
    ///
    /// When `cancel` fires before the turn completes, the implementation must
    /// terminate any work it started and return [`RelayError::Cancelled`].
    async fn invoke(
        &self,
        request: EngineRequest,
        cancel: CancellationToken,
    ) -> Result<EngineResponse, RelayError>;
}
