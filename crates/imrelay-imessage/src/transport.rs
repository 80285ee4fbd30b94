// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery through Messages.app via `osascript`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use imrelay_core::{AdapterKind, HealthStatus, MessageTransport, RelayAdapter, RelayError};
use tracing::debug;

const OSASCRIPT: &str = "osascript";

/// Escapes `text` for use inside an AppleScript string literal.
pub fn escape_applescript(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// AppleScript that sends `text` to `recipient` over the iMessage service.
pub fn build_send_script(recipient: &str, text: &str) -> String {
    format!(
        r#"tell application "Messages"
  set targetService to 1st service whose service type = iMessage
  set targetBuddy to buddy "{}" of targetService
  send "{}" to targetBuddy
end tell"#,
        escape_applescript(recipient),
        escape_applescript(text)
    )
}

/// [`MessageTransport`] that drives Messages.app with AppleScript.
pub struct AppleScriptTransport {
    program: String,
    timeout: Duration,
}

impl AppleScriptTransport {
    /// Each send is abandoned, and the script process killed, after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self::with_program(OSASCRIPT, timeout)
    }

    /// Uses `program` in place of `osascript`. It is invoked as
    /// `program -e <script>`.
    pub fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn send_error(detail: impl std::fmt::Display) -> RelayError {
        RelayError::Transport {
            message: format!("Failed to send iMessage: {detail}"),
            source: None,
        }
    }
}

#[async_trait]
impl RelayAdapter for AppleScriptTransport {
    fn name(&self) -> &str {
        "applescript"
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        if cfg!(target_os = "macos") {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded(
                "Messages.app is only available on macOS".to_string(),
            ))
        }
    }
}

#[async_trait]
impl MessageTransport for AppleScriptTransport {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), RelayError> {
        let script = build_send_script(recipient, text);
        let output = tokio::process::Command::new(&self.program)
            .arg("-e")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(RelayError::Transport {
                    message: format!("Failed to send iMessage: {e}"),
                    source: Some(Box::new(e)),
                });
            }
            Err(_) => {
                return Err(Self::send_error(format!(
                    "{} timed out after {}ms",
                    self.program,
                    self.timeout.as_millis()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code().unwrap_or(-1);
            return Err(Self::send_error(format!(
                "{} exited with code {code}: {}",
                self.program,
                stderr.trim()
            )));
        }

        debug!(chars = text.chars().count(), "message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_backslashes_and_whitespace() {
        assert_eq!(
            escape_applescript("say \"hi\"\\\n\tend\r"),
            "say \\\"hi\\\"\\\\\\n\\tend\\r"
        );
        assert_eq!(escape_applescript("plain ✓"), "plain ✓");
    }

    #[test]
    fn script_targets_buddy_on_imessage_service() {
        let script = build_send_script("+15551234567", "line one\nline \"two\"");
        assert!(script.starts_with("tell application \"Messages\""));
        assert!(script.contains("service type = iMessage"));
        assert!(script.contains("buddy \"+15551234567\" of targetService"));
        assert!(script.contains("send \"line one\\nline \\\"two\\\"\" to targetBuddy"));
        assert!(script.ends_with("end tell"));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &tempfile::TempDir, body: &str) -> String {
            let path = dir.path().join("fake-osascript");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        #[tokio::test]
        async fn successful_script_sends() {
            let dir = tempfile::tempdir().unwrap();
            let transport =
                AppleScriptTransport::with_program(script(&dir, "exit 0"), Duration::from_secs(5));
            transport.send("me", "hello").await.unwrap();
        }

        #[tokio::test]
        async fn failing_script_reports_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let transport = AppleScriptTransport::with_program(
                script(&dir, "echo 'buddy not found' >&2; exit 1"),
                Duration::from_secs(5),
            );
            let err = transport.send("me", "hello").await.unwrap_err();
            let msg = err.to_string();
            assert!(msg.starts_with("Failed to send iMessage:"), "{msg}");
            assert!(msg.contains("buddy not found"), "{msg}");
        }

        #[tokio::test]
        async fn slow_script_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let transport = AppleScriptTransport::with_program(
                script(&dir, "sleep 10"),
                Duration::from_millis(200),
            );
            let err = transport.send("me", "hello").await.unwrap_err();
            assert!(err.to_string().contains("timed out"), "{err}");
        }

        #[tokio::test]
        async fn missing_program_is_a_transport_error() {
            let transport = AppleScriptTransport::with_program(
                "/nonexistent/osascript",
                Duration::from_secs(1),
            );
            let err = transport.send("me", "hello").await.unwrap_err();
            assert!(matches!(err, RelayError::Transport { .. }));
        }
    }
}
