// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! imrelay - text yourself on iMessage, get answers from a local agent.
//!
//! This is the binary entry point for the relay.

mod doctor;
mod preflight;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use imrelay_config::RelayConfig;

/// imrelay - relay iMessages sent to yourself to a local reasoning engine.
#[derive(Parser, Debug)]
#[command(name = "imrelay", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Commands {
    /// Start relaying (the default).
    Serve,
    /// Check the environment and report anything that would stop the relay.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> RelayConfig {
    let loaded = match path {
        Some(path) => imrelay_config::load_and_validate_path(path),
        None => imrelay_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            imrelay_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            if let Err(errors) = imrelay_config::validate_for_serve(&config) {
                imrelay_config::render_errors(&errors);
                eprintln!("  export IMRELAY_IMESSAGE_SELF_HANDLE=\"+15551234567\"   (your phone number or Apple ID)");
                std::process::exit(1);
            }
            serve::run_serve(config).await
        }
        Commands::Doctor { plain } => doctor::run_doctor(&config, plain).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
