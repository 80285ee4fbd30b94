// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits for the relay core.
//!
//! All collaborators extend the [`RelayAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod engine;
pub mod store;
pub mod transport;

pub use adapter::RelayAdapter;
pub use engine::ReasoningEngine;
pub use store::MessageStore;
pub use transport::MessageTransport;
