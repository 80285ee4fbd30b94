// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Splitting long replies into transport-sized segments.

/// Byte offset of the `n`th character of `text`, or `text.len()` if it has
/// fewer characters.
fn byte_offset(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map_or(text.len(), |(i, _)| i)
}

/// Last occurrence of `sep` starting at or before character `max_chars`,
/// ignoring a match at the very start.
fn last_boundary(text: &str, sep: &str, max_chars: usize) -> Option<usize> {
    let end = byte_offset(text, max_chars + sep.chars().count());
    text[..end].rfind(sep).filter(|&pos| pos > 0)
}

/// Splits `text` into segments of at most `max_chars` characters.
///
/// Each cut prefers the last blank line, then the last newline, then the
/// last space within the limit, and falls back to a hard cut at exactly
/// `max_chars`. Newlines at the start of the remainder are dropped; a space
/// boundary stays at the start of the next segment.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.chars().count() <= max_chars {
            chunks.push(remaining.to_string());
            break;
        }

        let cut = last_boundary(remaining, "\n\n", max_chars)
            .or_else(|| last_boundary(remaining, "\n", max_chars))
            .or_else(|| last_boundary(remaining, " ", max_chars))
            .unwrap_or_else(|| byte_offset(remaining, max_chars));

        chunks.push(remaining[..cut].to_string());
        remaining = remaining[cut..].trim_start_matches('\n');
    }

    chunks
}
