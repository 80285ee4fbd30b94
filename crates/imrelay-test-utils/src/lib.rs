// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for imrelay integration tests.
//!
//! Provides in-memory collaborators for fast, deterministic tests that need
//! neither Messages.app nor the `claude` CLI.
//!
//! # Components
//!
//! - [`MockStore`] - Message store with scripted chats and records
//! - [`MockEngine`] - Reasoning engine with queued replies and concurrency tracking
//! - [`MockTransport`] - Transport that captures every send

pub mod mock_engine;
pub mod mock_store;
pub mod mock_transport;

pub use mock_engine::MockEngine;
pub use mock_store::MockStore;
pub use mock_transport::{MockTransport, SentMessage};
