// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes:
//! non-zero intervals, ordered dedup windows, non-empty paths and commands.

use crate::diagnostic::ConfigError;
use crate::model::RelayConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let im = &config.imessage;

    let non_zero = [
        ("imessage.poll_interval_ms", im.poll_interval_ms),
        ("imessage.dedup_window_ms", im.dedup_window_ms),
        ("imessage.send_timeout_ms", im.send_timeout_ms),
        ("engine.timeout_ms", config.engine.timeout_ms),
        ("session.timeout_ms", config.session.timeout_ms),
    ];
    for (key, value) in non_zero {
        if value == 0 {
            errors.push(validation(format!("{key} must be greater than zero")));
        }
    }

    if im.max_message_length == 0 {
        errors.push(validation(
            "imessage.max_message_length must be greater than zero".to_string(),
        ));
    }

    if config.engine.max_turns == 0 {
        errors.push(validation(
            "engine.max_turns must be greater than zero".to_string(),
        ));
    }

    // Pruning sooner than the window would forget entries that should still suppress.
    if im.dedup_prune_ms < im.dedup_window_ms {
        errors.push(validation(format!(
            "imessage.dedup_prune_ms ({}) must be at least imessage.dedup_window_ms ({})",
            im.dedup_prune_ms, im.dedup_window_ms
        )));
    }

    if im.chat_db_path.trim().is_empty() {
        errors.push(validation(
            "imessage.chat_db_path must not be empty".to_string(),
        ));
    }

    if config.engine.command.trim().is_empty() {
        errors.push(validation("engine.command must not be empty".to_string()));
    }

    if config.engine.working_directory.trim().is_empty() {
        errors.push(validation(
            "engine.working_directory must not be empty".to_string(),
        ));
    }

    let level = config.agent.log_level.to_ascii_lowercase();
    if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
        errors.push(validation(format!(
            "agent.log_level `{}` must be one of trace, debug, info, warn, error",
            config.agent.log_level
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks that only matter when actually relaying: the handle must be set.
pub fn validate_for_serve(config: &RelayConfig) -> Result<(), Vec<ConfigError>> {
    if config.imessage.self_handle.trim().is_empty() {
        return Err(vec![ConfigError::MissingKey {
            key: "imessage.self_handle".to_string(),
        }]);
    }
    Ok(())
}

fn validation(message: String) -> ConfigError {
    ConfigError::Validation { message }
}
