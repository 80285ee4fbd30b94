// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text extraction from `chat.db` message rows.
//!
//! Recent macOS releases leave the `text` column empty and store the body as
//! an archived `NSAttributedString` in `attributedBody`. Rather than parse the
//! whole archive, the decoder scans forward to the embedded `NSString` object
//! and reads its length-prefixed UTF-8 payload.

use imrelay_core::Record;

/// Class name that precedes the string payload in the archive.
const MARKER: &[u8] = b"NSString";

/// Bytes between the end of [`MARKER`] and the length prefix.
const MARKER_PAYLOAD_GAP: usize = 5;

/// Length prefix of the archived string payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    /// Any byte other than the reserved tags is the length itself.
    Byte(u8),
    /// Tag `0x81`: two-byte little-endian length.
    U16(u16),
    /// Tag `0x82`: three-byte little-endian length.
    U24(u32),
    /// Tag `0x83`: four-byte little-endian length.
    U32(u32),
}

impl LengthPrefix {
    /// Parses the prefix at the start of `buf`. Returns `None` when the
    /// buffer ends inside the prefix.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let (&tag, rest) = buf.split_first()?;
        let prefix = match tag {
            0x81 => {
                let b = rest.get(..2)?;
                Self::U16(u16::from_le_bytes([b[0], b[1]]))
            }
            0x82 => {
                let b = rest.get(..3)?;
                Self::U24(u32::from_le_bytes([b[0], b[1], b[2], 0]) & 0x00FF_FFFF)
            }
            0x83 => {
                let b = rest.get(..4)?;
                Self::U32(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }
            n => Self::Byte(n),
        };
        Some(prefix)
    }

    /// Declared payload length in bytes.
    pub fn payload_len(self) -> usize {
        match self {
            Self::Byte(n) => n as usize,
            Self::U16(n) => n as usize,
            Self::U24(n) | Self::U32(n) => n as usize,
        }
    }

    /// Size of the prefix itself, tag included.
    pub fn header_len(self) -> usize {
        match self {
            Self::Byte(_) => 1,
            Self::U16(_) => 3,
            Self::U24(_) => 4,
            Self::U32(_) => 5,
        }
    }
}

/// Returns the text of a message row, or `None` if it carries none.
///
/// A non-blank `text` column wins and is returned as stored; otherwise the
/// archived body is decoded.
pub fn decode_record(record: &Record) -> Option<String> {
    if let Some(text) = &record.text
        && !text.trim().is_empty()
    {
        return Some(text.clone());
    }

    parse_attributed_body(record.attributed_body.as_deref()?)
}

/// Extracts the trimmed string payload from an archived `attributedBody`.
///
/// A declared length running past the end of the blob is clamped to the
/// bytes available, so truncated archives still yield their text.
pub fn parse_attributed_body(blob: &[u8]) -> Option<String> {
    let idx = blob
        .windows(MARKER.len())
        .position(|window| window == MARKER)?;

    let content = blob.get(idx + MARKER.len() + MARKER_PAYLOAD_GAP..)?;
    let prefix = LengthPrefix::parse(content)?;

    let start = prefix.header_len();
    let end = start.saturating_add(prefix.payload_len()).min(content.len());
    let payload = content.get(start..end)?;

    let text = String::from_utf8_lossy(payload);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
