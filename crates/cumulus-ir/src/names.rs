// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bidirectional encoding of source identifiers into platform-safe names.
//!
//! The platform restricts parameter and stage names to `[A-Za-z0-9_]`.
//! Source languages produce dotted namespace paths (`align.bam`) and, in
//! CWL, identifiers with dashes and slashes. Encoding joins path segments
//! with `___` and escapes a disallowed character as `_u{hex}_`; both are
//! rejected in raw segments, which keeps the mapping injective and lets
//! the runtime decode parameter names it receives back from the platform.

use crate::error::NameError;

/// Separator between namespace segments in an encoded name.
pub const NAMESPACE_SEPARATOR: &str = "___";

/// Encode a dotted source path into a platform-safe name.
pub fn encode(source: &str) -> Result<String, NameError> {
    let segments: Vec<&str> = source.split('.').collect();
    encode_segments(&segments).map_err(|err| match err {
        NameError::EmptySegment { .. } => NameError::EmptySegment {
            path: source.to_string(),
        },
        other => other,
    })
}

/// Encode namespace path segments into a platform-safe name.
pub fn encode_segments(segments: &[&str]) -> Result<String, NameError> {
    let mut encoded_segments = Vec::with_capacity(segments.len());
    for segment in segments {
        encoded_segments.push(encode_segment(segment)?);
    }
    Ok(encoded_segments.join(NAMESPACE_SEPARATOR))
}

/// Decode an encoded name back into its dotted source form.
pub fn decode(encoded: &str) -> Result<String, NameError> {
    let mut segments = Vec::new();
    for segment in encoded.split(NAMESPACE_SEPARATOR) {
        if segment.is_empty() {
            return Err(NameError::EmptySegment {
                path: encoded.to_string(),
            });
        }
        segments.push(decode_segment(segment));
    }
    Ok(segments.join("."))
}

fn encode_segment(segment: &str) -> Result<String, NameError> {
    if segment.is_empty() {
        return Err(NameError::EmptySegment {
            path: segment.to_string(),
        });
    }
    if contains_escape_form(segment) {
        return Err(NameError::AmbiguousSegment {
            segment: segment.to_string(),
        });
    }

    let mut encoded = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            encoded.push(c);
        } else {
            encoded.push_str(&format!("_u{:x}_", c as u32));
        }
    }

    if encoded.starts_with('_') || encoded.ends_with('_') {
        return Err(NameError::UnderscoreEdge {
            segment: segment.to_string(),
        });
    }
    if encoded.contains(NAMESPACE_SEPARATOR) {
        return Err(NameError::SeparatorCollision {
            segment: segment.to_string(),
        });
    }
    Ok(encoded)
}

fn decode_segment(segment: &str) -> String {
    let chars: Vec<char> = segment.chars().collect();
    let mut decoded = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        match parse_escape(&chars[i..]) {
            Some((c, consumed)) => {
                decoded.push(c);
                i += consumed;
            }
            None => {
                decoded.push(chars[i]);
                i += 1;
            }
        }
    }
    decoded
}

/// Try to parse `_u{hex}_` at the head of `chars`; returns the decoded
/// character and the number of chars consumed.
fn parse_escape(chars: &[char]) -> Option<(char, usize)> {
    if chars.len() < 4 || chars[0] != '_' || chars[1] != 'u' {
        return None;
    }
    let mut i = 2;
    while i < chars.len() && chars[i].is_ascii_hexdigit() {
        i += 1;
    }
    if i == 2 || chars.get(i) != Some(&'_') {
        return None;
    }
    let hex: String = chars[2..i].iter().collect();
    let code = u32::from_str_radix(&hex, 16).ok()?;
    char::from_u32(code).map(|c| (c, i + 1))
}

fn contains_escape_form(segment: &str) -> bool {
    let chars: Vec<char> = segment.chars().collect();
    (0..chars.len()).any(|i| parse_escape(&chars[i..]).is_some())
}
