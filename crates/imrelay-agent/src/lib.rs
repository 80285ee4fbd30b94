// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request handling for the imrelay message relay.
//!
//! The [`RequestQueue`] is the central coordinator that:
//! - Receives decoded messages through a [`QueueHandle`]
//! - Answers control commands itself
//! - Invokes the reasoning engine one request at a time, under a timeout
//! - Tracks the engine session across messages
//! - Sends replies back through the [`Dispatcher`]

pub mod chunk;
pub mod commands;
pub mod dispatch;
pub mod markup;
pub mod queue;
pub mod session;
pub mod shutdown;

pub use chunk::split_into_chunks;
pub use commands::ControlCommand;
pub use dispatch::Dispatcher;
pub use markup::strip_markup;
pub use queue::{QueueHandle, RequestQueue};
pub use session::{Session, SessionManager};
pub use shutdown::install_signal_handler;
