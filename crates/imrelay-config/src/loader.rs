// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./imrelay.toml` > `~/.config/imrelay/imrelay.toml` > `/etc/imrelay/imrelay.toml`
//! with environment variable overrides via the `IMRELAY_` prefix. The bare
//! variable names used by earlier releases (`IMESSAGE_HANDLE`, `CLAUDE_TIMEOUT_MS`, ...)
//! are still read, below the TOML files and the prefixed variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    util::nest,
    value::Value,
    Figment,
};

use crate::diagnostic::env_var_for;
use crate::model::RelayConfig;

/// Bare environment variables and the config keys they map to.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("IMESSAGE_HANDLE", "imessage.self_handle"),
    ("CHAT_DB_PATH", "imessage.chat_db_path"),
    ("POLL_INTERVAL_MS", "imessage.poll_interval_ms"),
    ("RESPONSE_PREFIX", "imessage.response_prefix"),
    ("CLAUDE_WORKING_DIR", "engine.working_directory"),
    ("CLAUDE_TIMEOUT_MS", "engine.timeout_ms"),
    ("CLAUDE_MAX_TURNS", "engine.max_turns"),
    ("CLAUDE_ALLOWED_TOOLS", "engine.allowed_tools"),
    ("SESSION_TIMEOUT_MS", "session.timeout_ms"),
    ("LOG_LEVEL", "agent.log_level"),
];

/// Keys whose environment values are taken verbatim. Figment's `Env` parses
/// values, which turns `+15551234567` into a number and `[Bot] ` into an array.
const TEXT_KEYS: &[&str] = &[
    "agent.log_level",
    "imessage.self_handle",
    "imessage.chat_db_path",
    "imessage.response_prefix",
    "engine.command",
    "engine.working_directory",
    "engine.allowed_tools",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. Bare legacy environment variables
/// 3. `/etc/imrelay/imrelay.toml` (system-wide)
/// 4. `~/.config/imrelay/imrelay.toml` (user XDG config)
/// 5. `./imrelay.toml` (local directory)
/// 6. `IMRELAY_*` environment variables
pub fn load_config() -> Result<RelayConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<RelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(legacy_env_layer())
        .merge(Toml::file(path))
        .merge(env_provider())
        .merge(text_env_layer())
        .extract()
}

/// TOML files read by [`load_config`], lowest priority first.
pub fn config_file_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/imrelay/imrelay.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("imrelay").join("imrelay.toml"));
    }
    paths.push(
        std::env::current_dir()
            .map(|d| d.join("imrelay.toml"))
            .unwrap_or_else(|_| PathBuf::from("imrelay.toml")),
    );
    paths
}

/// The layered Figment behind [`load_config`].
pub fn build_figment() -> Figment {
    let files = config_file_paths()
        .into_iter()
        .fold(Figment::new(), |figment, path| figment.merge(Toml::file(path)));

    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(legacy_env_layer())
        .merge(files)
        .merge(env_provider())
        .merge(text_env_layer())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")`: `IMRELAY_IMESSAGE_SELF_HANDLE` must
/// map to `imessage.self_handle`, not `imessage.self.handle`.
fn env_provider() -> Env {
    Env::prefixed("IMRELAY_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("imessage_", "imessage.", 1)
            .replacen("engine_", "engine.", 1)
            .replacen("session_", "session.", 1);
        mapped.into()
    })
}

/// The bare variable names listed in [`LEGACY_ENV_KEYS`].
fn legacy_env_layer() -> Figment {
    env_layer(
        LEGACY_ENV_KEYS
            .iter()
            .filter_map(|(var, key)| Some((*key, std::env::var(var).ok()?))),
    )
}

/// `IMRELAY_*` values for [`TEXT_KEYS`], overriding what [`env_provider`]
/// parsed out of the same variables.
fn text_env_layer() -> Figment {
    env_layer(
        TEXT_KEYS
            .iter()
            .filter_map(|key| Some((*key, std::env::var(env_var_for(key)).ok()?))),
    )
}

fn env_layer<'a>(vars: impl Iterator<Item = (&'a str, String)>) -> Figment {
    vars.fold(Figment::new(), |figment, (key, raw)| {
        figment.merge(Serialized::defaults(nest(key, env_value(key, raw))))
    })
}

/// Text keys stay strings; anything else becomes a number when it parses as one.
fn env_value(key: &str, raw: String) -> Value {
    if TEXT_KEYS.contains(&key) {
        return Value::from(raw);
    }
    match raw.trim().parse::<u64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_env_maps_sections() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("IMRELAY_IMESSAGE_SELF_HANDLE", "+15551234567");
            jail.set_env("IMRELAY_ENGINE_MAX_TURNS", "4");
            jail.set_env("IMRELAY_SESSION_TIMEOUT_MS", "60000");

            let config = load_config()?;
            assert_eq!(config.imessage.self_handle, "+15551234567");
            assert_eq!(config.engine.max_turns, 4);
            assert_eq!(config.session.timeout_ms, 60_000);
            Ok(())
        });
    }

    #[test]
    fn legacy_env_names_are_honoured() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("IMESSAGE_HANDLE", "me@example.com");
            jail.set_env("CLAUDE_ALLOWED_TOOLS", "Read,Grep");
            jail.set_env("POLL_INTERVAL_MS", "750");

            let config = load_config()?;
            assert_eq!(config.imessage.self_handle, "me@example.com");
            assert_eq!(config.engine.allowed_tools, vec!["Read", "Grep"]);
            assert_eq!(config.imessage.poll_interval_ms, 750);
            Ok(())
        });
    }

    #[test]
    fn prefixed_env_beats_local_file_and_legacy_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "imrelay.toml",
                "[imessage]\nresponse_prefix = \"[file] \"\n",
            )?;
            jail.set_env("RESPONSE_PREFIX", "[legacy] ");
            jail.set_env("IMRELAY_IMESSAGE_RESPONSE_PREFIX", "[env] ");

            let config = load_config()?;
            assert_eq!(config.imessage.response_prefix, "[env] ");
            Ok(())
        });
    }

    #[test]
    fn local_file_beats_legacy_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("imrelay.toml", "[engine]\nmax_turns = 3\n")?;
            jail.set_env("CLAUDE_MAX_TURNS", "7");

            let config = load_config()?;
            assert_eq!(config.engine.max_turns, 3);
            Ok(())
        });
    }

    #[test]
    fn legacy_phone_handle_keeps_plus() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("IMESSAGE_HANDLE", "+15551234567");

            let config = load_config()?;
            assert_eq!(config.imessage.self_handle, "+15551234567");
            Ok(())
        });
    }

    #[test]
    fn bracketed_prefix_is_read_verbatim() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RESPONSE_PREFIX", "[Bot] ");
            assert_eq!(load_config()?.imessage.response_prefix, "[Bot] ");

            jail.set_env("IMRELAY_IMESSAGE_RESPONSE_PREFIX", "[Relay] ");
            assert_eq!(load_config()?.imessage.response_prefix, "[Relay] ");
            Ok(())
        });
    }

    #[test]
    fn numeric_legacy_values_still_parse() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CLAUDE_TIMEOUT_MS", "90000");
            jail.set_env("SESSION_TIMEOUT_MS", " 60000 ");

            let config = load_config()?;
            assert_eq!(config.engine.timeout_ms, 90_000);
            assert_eq!(config.session.timeout_ms, 60_000);
            Ok(())
        });
    }

    #[test]
    fn explicit_path_reads_text_env_verbatim() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("relay.toml", "[engine]\nmax_turns = 2\n")?;
            jail.set_env("IMRELAY_IMESSAGE_SELF_HANDLE", "+447700900123");

            let config = load_config_from_path(Path::new("relay.toml"))?;
            assert_eq!(config.imessage.self_handle, "+447700900123");
            assert_eq!(config.engine.max_turns, 2);
            Ok(())
        });
    }
}
