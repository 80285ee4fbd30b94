// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the imrelay message relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Top-level relay configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Process-level settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Message store, tailer and transport settings.
    #[serde(default)]
    pub imessage: IMessageConfig,

    /// Reasoning engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Conversation session settings.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Message store, tailer and outbound transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IMessageConfig {
    /// The operator's own handle (phone number like `+15551234567` or email).
    #[serde(default, deserialize_with = "deserialize_handle")]
    pub self_handle: String,

    /// Path to the message database.
    #[serde(default = "default_chat_db_path")]
    pub chat_db_path: String,

    /// Interval between store polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Identical text seen again within this window is dropped as a duplicate delivery.
    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,

    /// Dedup entries older than this are discarded at the start of each poll.
    #[serde(default = "default_dedup_prune_ms")]
    pub dedup_prune_ms: u64,

    /// Prefix prepended to every reply; inbound text starting with it is ignored.
    #[serde(default = "default_response_prefix")]
    pub response_prefix: String,

    /// Maximum characters per outbound message.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Pause between consecutive segments of one reply, in milliseconds.
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,

    /// Upper bound on a single transport send, in milliseconds.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl Default for IMessageConfig {
    fn default() -> Self {
        Self {
            self_handle: String::new(),
            chat_db_path: default_chat_db_path(),
            poll_interval_ms: default_poll_interval_ms(),
            dedup_window_ms: default_dedup_window_ms(),
            dedup_prune_ms: default_dedup_prune_ms(),
            response_prefix: default_response_prefix(),
            max_message_length: default_max_message_length(),
            chunk_delay_ms: default_chunk_delay_ms(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl IMessageConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    pub fn dedup_prune(&self) -> Duration {
        Duration::from_millis(self.dedup_prune_ms)
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

fn deserialize_handle<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Handle {
        Text(String),
        Number(i64),
    }

    Ok(match Handle::deserialize(deserializer)? {
        Handle::Text(s) => s.trim().to_string(),
        Handle::Number(n) => n.to_string(),
    })
}

fn default_chat_db_path() -> String {
    dirs::home_dir()
        .map(|p| p.join("Library").join("Messages").join("chat.db"))
        .unwrap_or_else(|| "chat.db".into())
        .display()
        .to_string()
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_dedup_window_ms() -> u64 {
    5_000
}

fn default_dedup_prune_ms() -> u64 {
    10_000
}

fn default_response_prefix() -> String {
    "[Claude] ".to_string()
}

fn default_max_message_length() -> usize {
    10_000
}

fn default_chunk_delay_ms() -> u64 {
    500
}

fn default_send_timeout_ms() -> u64 {
    15_000
}

/// Reasoning engine (CLI subprocess) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Executable to spawn for each turn.
    #[serde(default = "default_engine_command")]
    pub command: String,

    /// Working directory the engine runs in.
    #[serde(default = "default_working_directory")]
    pub working_directory: String,

    /// Hard timeout for a single turn, in milliseconds.
    #[serde(default = "default_engine_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum agent turns per invocation.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Tools the engine may use. Accepts a list or a comma-separated string.
    #[serde(
        default = "default_allowed_tools",
        deserialize_with = "deserialize_tool_list"
    )]
    pub allowed_tools: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: default_engine_command(),
            working_directory: default_working_directory(),
            timeout_ms: default_engine_timeout_ms(),
            max_turns: default_max_turns(),
            allowed_tools: default_allowed_tools(),
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_engine_command() -> String {
    "claude".to_string()
}

fn default_working_directory() -> String {
    std::env::current_dir()
        .map(|d| d.join("workspace"))
        .unwrap_or_else(|_| "workspace".into())
        .display()
        .to_string()
}

fn default_engine_timeout_ms() -> u64 {
    5 * 60 * 1000
}

fn default_max_turns() -> u32 {
    10
}

fn default_allowed_tools() -> Vec<String> {
    ["Read", "Grep", "Glob", "Bash", "Edit", "Write"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn deserialize_tool_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ToolList {
        Csv(String),
        List(Vec<String>),
    }

    let tools = match ToolList::deserialize(deserializer)? {
        ToolList::Csv(s) => s.split(',').map(String::from).collect::<Vec<_>>(),
        ToolList::List(v) => v,
    };
    Ok(tools
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

/// Conversation session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Idle time after which the engine session is dropped, in milliseconds.
    #[serde(default = "default_session_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_session_timeout_ms(),
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_session_timeout_ms() -> u64 {
    30 * 60 * 1000
}
