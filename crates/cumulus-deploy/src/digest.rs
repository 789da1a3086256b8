// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Canonical serialization and digesting of build requests.
//!
//! Two requests that would create semantically identical executables must
//! digest identically, so the canonical form:
//!
//! - sorts object keys lexicographically at every level,
//! - is whitespace-free,
//! - excludes the fields that merely position the executable
//!   (`project`, `folder`, `parents`),
//! - excludes the embedded source inside `details`, so re-encoding or
//!   re-compressing source never invalidates reuse.
//!
//! The digest is SHA-256 hex, embedded back into the request's `details`
//! together with the compiler version, and attached as the reserved
//! property the object directory queries by.

use serde_json::{Map, Value as JsonValue, json};
use sha2::{Digest, Sha256};

/// Reserved property key carrying the digest on built objects.
pub const CHECKSUM_PROPERTY: &str = "cumulus_checksum";

/// Details key carrying the digest.
pub const CHECKSUM_DETAIL: &str = "checksum";

/// Details key carrying the compiler version.
pub const VERSION_DETAIL: &str = "version";

/// Details key carrying the packed stand-alone source.
pub const SOURCE_DETAIL: &str = "sourceCode";

/// The compiler version embedded into built objects.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fields that merely reposition the executable; excluded from digests.
const RELOCATABLE_FIELDS: [&str; 3] = ["project", "folder", "parents"];

/// The canonical form of a build request: sorted keys, positioning fields
/// and embedded source removed.
pub fn canonicalize(request: &JsonValue) -> JsonValue {
    let stripped = strip_excluded(request);
    sort_keys(&stripped)
}

/// The canonical string form, whitespace-free.
pub fn canonical_string(request: &JsonValue) -> String {
    // serde_json object maps are ordered; serialization of the sorted
    // rebuild is the canonical text.
    canonicalize(request).to_string()
}

/// Digest a build request.
///
/// Returns the request with the digest and compiler version embedded
/// under `details` and the checksum property attached, plus the hex
/// digest itself.
pub fn digest_request(request: &JsonValue) -> (JsonValue, String) {
    let canonical = canonical_string(request);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    let mut stamped = request.clone();
    if let JsonValue::Object(fields) = &mut stamped {
        let details = fields
            .entry("details".to_string())
            .or_insert_with(|| json!({}));
        if let JsonValue::Object(details) = details {
            details.insert(CHECKSUM_DETAIL.to_string(), json!(digest));
            details.insert(VERSION_DETAIL.to_string(), json!(COMPILER_VERSION));
        }
        let properties = fields
            .entry("properties".to_string())
            .or_insert_with(|| json!({}));
        if let JsonValue::Object(properties) = properties {
            properties.insert(CHECKSUM_PROPERTY.to_string(), json!(digest));
        }
    }
    (stamped, digest)
}

fn strip_excluded(request: &JsonValue) -> JsonValue {
    let JsonValue::Object(fields) = request else {
        return request.clone();
    };
    let mut stripped = Map::new();
    for (key, value) in fields {
        if RELOCATABLE_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if key == "details" {
            if let JsonValue::Object(details) = value {
                let kept: Map<String, JsonValue> = details
                    .iter()
                    .filter(|(detail_key, _)| detail_key.as_str() != SOURCE_DETAIL)
                    .map(|(detail_key, detail)| (detail_key.clone(), detail.clone()))
                    .collect();
                stripped.insert(key.clone(), JsonValue::Object(kept));
                continue;
            }
        }
        stripped.insert(key.clone(), value.clone());
    }
    JsonValue::Object(stripped)
}

fn sort_keys(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(fields) => {
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&fields[key]));
            }
            JsonValue::Object(sorted)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable_under_key_order() {
        let a = json!({ "name": "t", "inputSpec": [], "runSpec": { "interpreter": "bash", "code": "x" } });
        let b = json!({ "runSpec": { "code": "x", "interpreter": "bash" }, "inputSpec": [], "name": "t" });
        assert_eq!(digest_request(&a).1, digest_request(&b).1);
    }

    #[test]
    fn test_digest_equals_digest_of_canonical_form() {
        let request = json!({ "name": "t", "folder": "/a", "details": { "sourceCode": "abc" } });
        let (_, digest) = digest_request(&request);
        let (_, canonical_digest) = digest_request(&canonicalize(&request));
        assert_eq!(digest, canonical_digest);
    }

    #[test]
    fn test_embedded_source_is_excluded() {
        let a = json!({ "name": "t", "details": { "sourceCode": "H4sIAAAA" } });
        let b = json!({ "name": "t", "details": { "sourceCode": "different-encoding" } });
        assert_eq!(digest_request(&a).1, digest_request(&b).1);
    }

    #[test]
    fn test_relocatable_fields_are_excluded() {
        let a = json!({ "name": "t", "project": "project-1", "folder": "/x" });
        let b = json!({ "name": "t", "project": "project-2", "folder": "/y", "parents": true });
        assert_eq!(digest_request(&a).1, digest_request(&b).1);
    }

    #[test]
    fn test_semantic_changes_change_the_digest() {
        let a = json!({ "name": "t", "inputSpec": [{ "name": "x", "class": "int" }] });
        let b = json!({ "name": "t", "inputSpec": [{ "name": "x", "class": "string" }] });
        assert_ne!(digest_request(&a).1, digest_request(&b).1);
    }

    #[test]
    fn test_digest_is_embedded_in_details_and_properties() {
        let (stamped, digest) = digest_request(&json!({ "name": "t" }));
        assert_eq!(
            stamped["details"][CHECKSUM_DETAIL].as_str().unwrap(),
            digest
        );
        assert_eq!(
            stamped["details"][VERSION_DETAIL].as_str().unwrap(),
            COMPILER_VERSION
        );
        assert_eq!(
            stamped["properties"][CHECKSUM_PROPERTY].as_str().unwrap(),
            digest
        );
    }

    #[test]
    fn test_digest_is_computed_before_stamping() {
        // The checksum/version details are not in the excluded set, so
        // digesting a stamped request gives a different value; the planner
        // must always digest the unstamped request.
        let request = json!({ "name": "t" });
        let (stamped, digest) = digest_request(&request);
        let (_, restamped_digest) = digest_request(&stamped);
        assert_ne!(digest, restamped_digest);
    }
}
