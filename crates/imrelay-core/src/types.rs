// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types passed between the store, the relay core, and the engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A single row read from the message store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Monotonically increasing row identifier, used as the tailer watermark.
    pub id: i64,
    /// Plain-text body, when the store kept one.
    pub text: Option<String>,
    /// Archived rich-text body (`attributedBody`).
    pub attributed_body: Option<Vec<u8>>,
    /// Whether the record was authored by the local account.
    pub is_from_me: bool,
    /// Store timestamp, in the store's native epoch.
    pub date: i64,
}

/// A decoded, deduplicated inbound message emitted by the tailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub record_id: i64,
    pub text: String,
}

/// A unit of work waiting in the request queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub text: String,
    pub record_id: i64,
    /// Arrival position, starting at 0 for the first item enqueued.
    pub position: u64,
}

/// A single request to the reasoning engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    pub prompt: String,
    pub working_directory: PathBuf,
    pub allowed_tools: Vec<String>,
    pub max_turns: u32,
    /// Engine session to resume, if a conversation is already active.
    pub resume_session: Option<String>,
}

/// The engine's reply to a single request.
///
/// Deserializes directly from the engine's JSON output; unknown fields are
/// ignored since the engine reports more than the relay needs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineResponse {
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
}

impl EngineResponse {
    /// A plain-text reply with no session and no error flag.
    pub fn plain(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            ..Self::default()
        }
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies which collaborator an adapter fills.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterKind {
    Store,
    Engine,
    Transport,
}

/// First `max_chars` characters of `text` for log lines, with `...` appended
/// when anything was cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_response_parses_cli_json() {
        let json = r#"{
            "type": "result",
            "subtype": "success",
            "is_error": false,
            "result": "Hello there",
            "session_id": "0b6c7a4e-1111-2222-3333-444455556666",
            "total_cost_usd": 0.0123
        }"#;
        let resp: EngineResponse = serde_json::from_str(json).expect("should parse");
        assert_eq!(resp.result, "Hello there");
        assert_eq!(
            resp.session_id.as_deref(),
            Some("0b6c7a4e-1111-2222-3333-444455556666")
        );
        assert!(!resp.is_error);
        assert_eq!(resp.total_cost_usd, Some(0.0123));
    }

    #[test]
    fn engine_response_defaults_missing_fields() {
        let resp: EngineResponse = serde_json::from_str("{}").expect("should parse");
        assert_eq!(resp, EngineResponse::default());
    }

    #[test]
    fn plain_response_has_no_session() {
        let resp = EngineResponse::plain("raw output");
        assert_eq!(resp.result, "raw output");
        assert!(resp.session_id.is_none());
        assert!(!resp.is_error);
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("short", 80), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("ééé", 2), "éé...");
        assert_eq!(preview("abc", 3), "abc");
    }
}
