// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the imrelay message relay.
//!
//! Settings come from compiled defaults, `imrelay.toml` files and environment
//! variables, merged by [`loader`]. Unknown keys are rejected, values are
//! checked by [`validation`], and every problem is reported at once through
//! [`diagnostic`].
//!
//! ```no_run
//! use imrelay_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("Relaying for: {}", config.imessage.self_handle);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::{Path, PathBuf};

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::RelayConfig;
pub use validation::validate_for_serve;

/// Loads from the standard locations and validates.
pub fn load_and_validate() -> Result<RelayConfig, Vec<ConfigError>> {
    checked(loader::load_config(), || {
        read_sources(loader::config_file_paths())
    })
}

/// Loads from `path` (plus environment overrides) and validates.
pub fn load_and_validate_path(path: &Path) -> Result<RelayConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        read_sources([path.to_path_buf()])
    })
}

/// Loads from a TOML string alone and validates.
pub fn load_and_validate_str(toml_content: &str) -> Result<RelayConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Validates a loaded config, or turns a load failure into diagnostics.
/// `sources` is only read on failure, to attach spans.
fn checked(
    loaded: Result<RelayConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<RelayConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// `(path, content)` for each of `paths` that can be read.
fn read_sources(paths: impl IntoIterator<Item = PathBuf>) -> Vec<(String, String)> {
    paths
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            Some((path.display().to_string(), content))
        })
        .collect()
}
