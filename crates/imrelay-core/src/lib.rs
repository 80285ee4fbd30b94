// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the imrelay message relay.
//!
//! This crate provides the collaborator traits, error type, and common types
//! shared by the store, engine, transport and agent crates. Every adapter
//! implements one of the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::RelayError;
pub use types::{
    AdapterKind, EngineRequest, EngineResponse, HealthStatus, NewMessage, QueueItem, Record,
    preview,
};

// Re-export all adapter traits at crate root.
pub use traits::{MessageStore, MessageTransport, ReasoningEngine, RelayAdapter};
