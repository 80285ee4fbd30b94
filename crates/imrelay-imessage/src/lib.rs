// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! iMessage integration for imrelay.
//!
//! - [`decoder`] extracts text from archived `attributedBody` blobs
//! - [`store::ChatDbStore`] reads `chat.db` read-only through `tokio-rusqlite`
//! - [`tailer::StoreTailer`] polls the store and emits each new self-message once
//! - [`transport::AppleScriptTransport`] sends replies through Messages.app

pub mod decoder;
pub mod store;
pub mod tailer;
pub mod transport;

pub use decoder::{decode_record, parse_attributed_body, LengthPrefix};
pub use store::ChatDbStore;
pub use tailer::{handle_variants, DedupTable, StoreTailer};
pub use transport::AppleScriptTransport;
