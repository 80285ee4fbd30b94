// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Markdown removal for plain-text delivery.
//!
//! iMessage renders text verbatim, so engine replies lose their Markdown
//! syntax before sending. Code blocks and inline code lose their fences and
//! backticks but keep their content byte for byte: each span is swapped for
//! a placeholder while the prose rules run, then put back. The rules are
//! applied in order, repeated until the prose stops changing; every rule
//! strictly shortens the text when it matches, so the loop terminates.
//! Text without code spans is therefore stable under a second application.

use std::sync::LazyLock;

use regex::Regex;

/// Fenced blocks (with and without an info string) and inline code. Exactly
/// one of the three groups captures the code body.
static CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[^\n`]*\n(.*?)```|```(.*?)```|`([^`\n]+)`").unwrap()
});

/// `(pattern, replacement)` pairs applied to prose, in order.
static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        // Links become "label (url)".
        (Regex::new(r"\[([^\]\n]+)\]\(([^)\n]+)\)").unwrap(), "$1 ($2)"),
        // Horizontal rules, including the line break that ends them.
        (
            Regex::new(r"(?m)^[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t]*(?:\n|$)").unwrap(),
            "",
        ),
        // Bold, then italic.
        (Regex::new(r"\*\*([^\n]+?)\*\*").unwrap(), "$1"),
        (Regex::new(r"__([^\n]+?)__").unwrap(), "$1"),
        (Regex::new(r"\*([^*\n]+)\*").unwrap(), "$1"),
        (Regex::new(r"\b_([^_\n]+)_\b").unwrap(), "$1"),
        // Heading markers.
        (Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]+").unwrap(), ""),
        // Three or more newlines collapse to one blank line.
        (Regex::new(r"\n{3,}").unwrap(), "\n\n"),
    ]
});

fn apply_rules(text: &str) -> String {
    let mut out = text.to_string();
    for (pattern, replacement) in RULES.iter() {
        if pattern.is_match(&out) {
            out = pattern.replace_all(&out, *replacement).into_owned();
        }
    }
    out
}

/// Runs [`RULES`] over `text` until nothing changes.
fn strip_prose(text: &str) -> String {
    let mut current = apply_rules(text);
    loop {
        let next = apply_rules(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Stands in for a code span while the prose rules run. No rule matches,
/// removes or moves it.
const CODE_SLOT: char = '\u{E000}';

/// Strips Markdown presentation syntax from `text`.
pub fn strip_markup(text: &str) -> String {
    let mut masked = String::with_capacity(text.len());
    let mut bodies = Vec::new();
    let mut last = 0;

    for caps in CODE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        masked.extend(text[last..whole.start()].chars().filter(|&c| c != CODE_SLOT));
        masked.push(CODE_SLOT);
        bodies.push(
            caps.get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map_or("", |body| body.as_str()),
        );
        last = whole.end();
    }
    masked.extend(text[last..].chars().filter(|&c| c != CODE_SLOT));

    let stripped = strip_prose(&masked);
    let mut bodies = bodies.into_iter();
    let mut out = String::with_capacity(text.len());
    for (i, part) in stripped.split(CODE_SLOT).enumerate() {
        if i > 0
            && let Some(body) = bodies.next()
        {
            out.push_str(body);
        }
        out.push_str(part);
    }
    out
}
