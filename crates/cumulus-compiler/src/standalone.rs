// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Packing of stand-alone source for embedding in applet details.
//!
//! Every built applet carries the self-contained source of its callable so
//! the runtime executors can re-evaluate expressions without access to the
//! original document tree. The text is gzipped and base64-encoded; the
//! digest engine excludes it, so re-encoding never invalidates reuse.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

/// Gzip and base64-encode source text.
pub fn pack(source: &str) -> std::io::Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(source.as_bytes())?;
    let compressed = encoder.finish()?;
    Ok(STANDARD.encode(compressed))
}

/// Decode and gunzip packed source text.
pub fn unpack(packed: &str) -> std::io::Result<String> {
    let compressed = STANDARD
        .decode(packed)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut source = String::new();
    decoder.read_to_string(&mut source)?;
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let source = "task add {\n  input { Int a; Int b }\n  command { echo $((a + b)) }\n}";
        let packed = pack(source).unwrap();
        assert_eq!(unpack(&packed).unwrap(), source);
    }

    #[test]
    fn test_packed_form_is_base64() {
        let packed = pack("workflow w {}").unwrap();
        assert!(
            packed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
        );
    }

    #[test]
    fn test_unpack_rejects_garbage() {
        assert!(unpack("not base64 at all!!!").is_err());
    }

    #[test]
    fn test_large_source_compresses() {
        let source = "scatter (i in indexes) { call work { input: idx = i } }\n".repeat(500);
        let packed = pack(&source).unwrap();
        assert!(packed.len() < source.len());
        assert_eq!(unpack(&packed).unwrap(), source);
    }
}
