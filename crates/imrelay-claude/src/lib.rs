// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reasoning engine adapter backed by the `claude` CLI.
//!
//! Each invocation spawns `claude -p <prompt> --output-format json` in the
//! configured working directory and parses the JSON result. Conversations
//! continue across invocations through `--resume <session id>`.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use imrelay_config::model::EngineConfig;
use imrelay_core::{
    AdapterKind, EngineRequest, EngineResponse, HealthStatus, ReasoningEngine, RelayAdapter,
    RelayError,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long `claude --version` may take during a health check.
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Command-line arguments for one invocation, program name excluded.
pub fn build_args(request: &EngineRequest) -> Vec<String> {
    let mut args = vec![
        "-p".to_string(),
        request.prompt.clone(),
        "--output-format".to_string(),
        "json".to_string(),
        "--dangerously-skip-permissions".to_string(),
    ];

    if let Some(session) = &request.resume_session {
        args.push("--resume".to_string());
        args.push(session.clone());
    }
    if !request.allowed_tools.is_empty() {
        args.push("--allowedTools".to_string());
        args.push(request.allowed_tools.join(","));
    }
    if request.max_turns > 0 {
        args.push("--max-turns".to_string());
        args.push(request.max_turns.to_string());
    }
    args
}

/// Interprets the CLI's stdout. Output that is not the expected JSON object
/// becomes a plain reply carrying the trimmed text.
pub fn parse_output(stdout: &str) -> EngineResponse {
    match serde_json::from_str::<EngineResponse>(stdout) {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "engine output is not JSON, using raw text");
            EngineResponse::plain(stdout.trim())
        }
    }
}

enum Outcome {
    Finished(std::io::Result<ExitStatus>, Vec<u8>, Vec<u8>),
    Cancelled,
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader
        && let Err(e) = reader.read_to_end(&mut buf).await
    {
        warn!(error = %e, "failed to read engine output");
    }
    buf
}

/// [`ReasoningEngine`] that runs the `claude` CLI once per request.
pub struct ClaudeCli {
    command: String,
}

impl ClaudeCli {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.command.clone())
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn engine_error(message: String) -> RelayError {
        RelayError::Engine {
            message,
            source: None,
        }
    }
}

#[async_trait]
impl RelayAdapter for ClaudeCli {
    fn name(&self) -> &str {
        "claude"
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Engine
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        let version = tokio::process::Command::new(&self.command)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        Ok(match tokio::time::timeout(VERSION_CHECK_TIMEOUT, version).await {
            Ok(Ok(output)) if output.status.success() => HealthStatus::Healthy,
            Ok(Ok(output)) => HealthStatus::Unhealthy(format!(
                "{} --version exited with {}",
                self.command, output.status
            )),
            Ok(Err(e)) => HealthStatus::Unhealthy(format!("{} not runnable: {e}", self.command)),
            Err(_) => HealthStatus::Degraded(format!("{} --version timed out", self.command)),
        })
    }
}

#[async_trait]
impl ReasoningEngine for ClaudeCli {
    async fn invoke(
        &self,
        request: EngineRequest,
        cancel: CancellationToken,
    ) -> Result<EngineResponse, RelayError> {
        let args = build_args(&request);
        let cwd: PathBuf = request.working_directory;
        debug!(command = %self.command, cwd = %cwd.display(), args = ?args, "spawning engine");

        let mut child = tokio::process::Command::new(&self.command)
            .args(&args)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RelayError::Engine {
                message: format!("Failed to spawn {}: {e}", self.command),
                source: Some(Box::new(e)),
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let outcome = {
            let run = async {
                let (out, err, status) = tokio::join!(read_all(stdout), read_all(stderr), child.wait());
                Outcome::Finished(status, out, err)
            };
            tokio::select! {
                outcome = run => outcome,
                _ = cancel.cancelled() => Outcome::Cancelled,
            }
        };

        let (status, stdout, stderr) = match outcome {
            Outcome::Finished(status, out, err) => (status, out, err),
            Outcome::Cancelled => {
                warn!(command = %self.command, "killing cancelled engine process");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill engine process");
                }
                return Err(RelayError::Cancelled);
            }
        };

        let status = status.map_err(|e| RelayError::Engine {
            message: format!("Failed to wait for {}: {e}", self.command),
            source: Some(Box::new(e)),
        })?;
        let stdout = String::from_utf8_lossy(&stdout);

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            let code = status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(Self::engine_error(format!(
                "{} exited with code {code}: {detail}",
                self.command
            )));
        }

        Ok(parse_output(&stdout))
    }
}
