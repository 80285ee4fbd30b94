// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control commands handled by the relay itself.

/// A message the relay answers without contacting the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// `!reset` or `/reset`: forget the current session.
    Reset,
    /// `!status` or `/status`: describe the current session.
    Status,
}

impl ControlCommand {
    /// Recognises a command, ignoring case and surrounding whitespace.
    /// Anything else, including commands with trailing words, is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "!reset" | "/reset" => Some(Self::Reset),
            "!status" | "/status" => Some(Self::Status),
            _ => None,
        }
    }
}
