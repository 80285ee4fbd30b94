// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment checks shared by `imrelay serve` and `imrelay doctor`.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use imrelay_claude::ClaudeCli;
use imrelay_config::RelayConfig;
use imrelay_core::{HealthStatus, MessageStore, RelayAdapter};
use imrelay_imessage::{AppleScriptTransport, ChatDbStore, handle_variants};

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed successfully.
    Pass,
    /// Check passed with a warning.
    Warn,
    /// Check failed.
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the check.
    pub name: String,
    pub status: CheckStatus,
    /// Human-readable message.
    pub message: String,
    /// What to do about a failure, one line per step.
    pub hint: Vec<String>,
    /// Duration the check took.
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            hint: Vec::new(),
            duration: start.elapsed(),
        }
    }

    fn with_hint(mut self, lines: &[&str]) -> Self {
        self.hint = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn failed(&self) -> bool {
        self.status == CheckStatus::Fail
    }
}

const FULL_DISK_ACCESS_HINT: &[&str] = &[
    "Grant Full Disk Access to your terminal in:",
    "  System Settings > Privacy & Security > Full Disk Access",
];

/// Locates `command` the way a shell would: paths containing a separator are
/// checked directly, bare names are searched for in `path_var`.
pub fn find_in_path(command: &str, path_var: &OsStr) -> Option<PathBuf> {
    if command.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(command);
        return is_executable(&path).then_some(path);
    }
    std::env::split_paths(path_var)
        .map(|dir| dir.join(command))
        .find(|candidate| is_executable(candidate))
}

/// [`find_in_path`] against the process `PATH`.
pub fn find_on_path(command: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    find_in_path(command, &path_var)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// The self handle is set.
pub fn check_handle(config: &RelayConfig) -> CheckResult {
    let start = Instant::now();
    if imrelay_config::validate_for_serve(config).is_ok() {
        CheckResult::new("Self handle", CheckStatus::Pass, &config.imessage.self_handle, start)
    } else {
        CheckResult::new("Self handle", CheckStatus::Fail, "imessage.self_handle is not set", start)
            .with_hint(&["export IMRELAY_IMESSAGE_SELF_HANDLE=\"+15551234567\""])
    }
}

/// The message database opens read-only and answers a query. Returns the
/// open store on success so later checks can use it.
pub async fn check_chat_db(path: &str) -> (CheckResult, Option<ChatDbStore>) {
    let start = Instant::now();
    let name = "Message database";

    let store = match ChatDbStore::open(path).await {
        Ok(store) => store,
        Err(e) => {
            let result = CheckResult::new(
                name,
                CheckStatus::Fail,
                format!("cannot read {path}: {e}"),
                start,
            )
            .with_hint(FULL_DISK_ACCESS_HINT);
            return (result, None);
        }
    };

    match store.health_check().await {
        Ok(HealthStatus::Healthy) => (
            CheckResult::new(name, CheckStatus::Pass, path, start),
            Some(store),
        ),
        Ok(HealthStatus::Degraded(msg)) => (
            CheckResult::new(name, CheckStatus::Warn, msg, start),
            Some(store),
        ),
        Ok(HealthStatus::Unhealthy(msg)) => (
            CheckResult::new(name, CheckStatus::Fail, format!("cannot read {path}: {msg}"), start)
                .with_hint(FULL_DISK_ACCESS_HINT),
            None,
        ),
        Err(e) => (
            CheckResult::new(name, CheckStatus::Fail, format!("cannot read {path}: {e}"), start)
                .with_hint(FULL_DISK_ACCESS_HINT),
            None,
        ),
    }
}

/// The engine command is on `PATH`. With `ask_version`, it must also answer
/// `--version`.
pub async fn check_engine(command: &str, ask_version: bool) -> CheckResult {
    let start = Instant::now();
    let name = "Engine command";

    let Some(found) = find_on_path(command) else {
        return CheckResult::new(
            name,
            CheckStatus::Fail,
            format!("{command} not found in PATH"),
            start,
        )
        .with_hint(&["Install Claude Code: https://claude.ai/download"]);
    };
    let location = found.display().to_string();
    if !ask_version {
        return CheckResult::new(name, CheckStatus::Pass, location, start);
    }

    match ClaudeCli::new(command).health_check().await {
        Ok(HealthStatus::Healthy) => CheckResult::new(name, CheckStatus::Pass, location, start),
        Ok(HealthStatus::Degraded(msg)) => CheckResult::new(name, CheckStatus::Warn, msg, start),
        Ok(HealthStatus::Unhealthy(msg)) => CheckResult::new(name, CheckStatus::Fail, msg, start),
        Err(e) => CheckResult::new(name, CheckStatus::Fail, e.to_string(), start),
    }
}

/// The engine's working directory exists. A missing one is only a warning
/// since the directory may be created before the first message arrives.
pub fn check_working_dir(path: &str) -> CheckResult {
    let start = Instant::now();
    if Path::new(path).is_dir() {
        CheckResult::new("Working directory", CheckStatus::Pass, path, start)
    } else {
        CheckResult::new(
            "Working directory",
            CheckStatus::Warn,
            format!("{path} does not exist"),
            start,
        )
        .with_hint(&["Create it or set engine.working_directory"])
    }
}

/// The self-conversation can be found for the configured handle.
pub async fn check_self_chat(store: &dyn MessageStore, handle: &str) -> CheckResult {
    let start = Instant::now();
    let name = "Self-chat";

    match store.resolve_self_chats(&handle_variants(handle)).await {
        Ok(ids) if ids.is_empty() => CheckResult::new(
            name,
            CheckStatus::Fail,
            format!("no conversation found for {handle}"),
            start,
        )
        .with_hint(&[
            "Send yourself a message in iMessage, then check imessage.self_handle",
        ]),
        Ok(ids) => {
            let list: Vec<String> = ids.iter().map(i64::to_string).collect();
            CheckResult::new(name, CheckStatus::Pass, format!("chat {}", list.join(", ")), start)
        }
        Err(e) => CheckResult::new(name, CheckStatus::Fail, e.to_string(), start),
    }
}

/// Messages.app can be scripted on this platform.
pub async fn check_transport(transport: &AppleScriptTransport) -> CheckResult {
    let start = Instant::now();
    let name = "Messages transport";
    match transport.health_check().await {
        Ok(HealthStatus::Healthy) => CheckResult::new(name, CheckStatus::Pass, "osascript", start),
        Ok(HealthStatus::Degraded(msg)) => CheckResult::new(name, CheckStatus::Warn, msg, start),
        Ok(HealthStatus::Unhealthy(msg)) => CheckResult::new(name, CheckStatus::Fail, msg, start),
        Err(e) => CheckResult::new(name, CheckStatus::Fail, e.to_string(), start),
    }
}
