// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `imrelay doctor` command implementation.
//!
//! Runs every preflight check and prints the results as a table, so a
//! broken setup can be diagnosed without starting the relay.

use std::io::IsTerminal;
use std::time::Instant;

use imrelay_config::RelayConfig;
use imrelay_core::RelayError;
use imrelay_imessage::AppleScriptTransport;

use crate::preflight::{self, CheckResult, CheckStatus};

/// Run the `imrelay doctor` command. With `plain`, disables colored output.
pub async fn run_doctor(config: &RelayConfig, plain: bool) -> Result<(), RelayError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let results = collect_checks(config).await;

    println!();
    println!("  imrelay doctor");
    println!("  {}", "-".repeat(50));

    for result in &results {
        println!("{}", format_line(result, use_color));
        if result.status != CheckStatus::Pass {
            for line in &result.hint {
                println!("           {line}");
            }
        }
    }
    println!();

    let issues = results
        .iter()
        .filter(|r| r.status != CheckStatus::Pass)
        .count();
    if issues > 0 {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    } else {
        println!("  All checks passed.");
    }
    println!();

    Ok(())
}

async fn collect_checks(config: &RelayConfig) -> Vec<CheckResult> {
    let mut results = vec![preflight::check_handle(config)];

    let (db_check, store) = preflight::check_chat_db(&config.imessage.chat_db_path).await;
    results.push(db_check);
    results.push(preflight::check_engine(&config.engine.command, true).await);
    results.push(preflight::check_working_dir(&config.engine.working_directory));

    let handle = config.imessage.self_handle.as_str();
    match store {
        Some(store) if !handle.is_empty() => {
            results.push(preflight::check_self_chat(&store, handle).await);
        }
        _ => results.push(CheckResult {
            name: "Self-chat".to_string(),
            status: CheckStatus::Warn,
            message: "skipped (needs a handle and a readable database)".to_string(),
            hint: Vec::new(),
            duration: Instant::now().elapsed(),
        }),
    }

    let transport = AppleScriptTransport::new(config.imessage.send_timeout());
    results.push(preflight::check_transport(&transport).await);
    results
}

fn format_line(result: &CheckResult, use_color: bool) -> String {
    use colored::Colorize;

    let duration_ms = result.duration.as_millis();
    let (symbol, tag, message) = match result.status {
        CheckStatus::Pass => ("✓".green().to_string(), "[OK]  ", result.message.normal()),
        CheckStatus::Warn => ("!".yellow().to_string(), "[WARN]", result.message.yellow()),
        CheckStatus::Fail => ("✗".red().to_string(), "[FAIL]", result.message.red()),
    };

    if use_color {
        format!(
            "    {symbol} {:<20} {message} ({duration_ms}ms)",
            result.name
        )
    } else {
        format!(
            "    {tag} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(status: CheckStatus) -> CheckResult {
        CheckResult {
            name: "Self handle".to_string(),
            status,
            message: "me@example.com".to_string(),
            hint: Vec::new(),
            duration: Duration::from_millis(3),
        }
    }

    #[test]
    fn plain_lines_use_text_tags() {
        assert_eq!(
            format_line(&result(CheckStatus::Pass), false),
            "    [OK]   Self handle          me@example.com (3ms)"
        );
        assert!(format_line(&result(CheckStatus::Warn), false).starts_with("    [WARN] "));
        assert!(format_line(&result(CheckStatus::Fail), false).starts_with("    [FAIL] "));
    }

    #[tokio::test]
    async fn unconfigured_relay_reports_handle_and_skips_self_chat() {
        let mut config = RelayConfig::default();
        config.imessage.chat_db_path = "/nonexistent/imrelay/chat.db".into();
        config.engine.command = "imrelay-no-such-engine-xyz".into();

        let results = collect_checks(&config).await;
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Self handle",
                "Message database",
                "Engine command",
                "Working directory",
                "Self-chat",
                "Messages transport",
            ]
        );
        assert!(results[0].failed());
        assert!(results[1].failed());
        assert!(results[2].failed());
        assert_eq!(results[4].status, CheckStatus::Warn);
    }
}
