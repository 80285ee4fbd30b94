// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the imrelay message relay.

use thiserror::Error;

/// The primary error type used across all collaborator traits and the relay core.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration errors (missing handle, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Message store errors (database unreadable, locked, query failure).
    #[error("store error: {source}")]
    Store {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Reasoning engine errors (spawn failure, non-zero exit).
    #[error("{message}")]
    Engine {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Message transport errors (send script failed or timed out).
    #[error("{message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("timed out after {}s", .duration.as_secs_f64().round())]
    Timeout { duration: std::time::Duration },

    /// Operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Wraps any error as a store failure.
    pub fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        RelayError::Store {
            source: Box::new(err),
        }
    }
}
