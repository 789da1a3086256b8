// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Language-neutral value model.
//!
//! Values are produced by constant-folding in the translators and consumed
//! by the build request renderer and the runtime executors. They mirror
//! [`crate::Type`] and are never mutated after construction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value in the language-neutral model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    /// The absent value.
    Null,
    /// True/false.
    Boolean(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string; also carries enum symbols.
    String(String),
    /// A file, by URI or platform ID, with optional metadata.
    File(FileValue),
    /// A directory addressed by URI.
    Folder {
        /// Source URI.
        uri: String,
        /// Basename override for localization.
        #[serde(skip_serializing_if = "Option::is_none")]
        basename: Option<String>,
    },
    /// A directory packed into an archive file.
    Archive {
        /// Archive file URI.
        uri: String,
        /// Basename override for localization.
        #[serde(skip_serializing_if = "Option::is_none")]
        basename: Option<String>,
    },
    /// A directory that exists only as a listing of its entries; it is
    /// materialized by the task executor at localization time.
    Listing {
        /// Directory basename.
        basename: String,
        /// Entries: files, folders, or nested listings.
        items: Vec<Value>,
    },
    /// Homogeneous array.
    Array(Vec<Value>),
    /// Ordered key/value record; the value form of schemas and hashes.
    Hash(Vec<(String, Value)>),
}

/// A file value with the metadata the runtime can carry for it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileValue {
    /// Source URI or platform file ID.
    pub uri: String,
    /// Basename override for localization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basename: Option<String>,
    /// Literal contents for files synthesized at compile time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    /// Content checksum, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Size in bytes, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Files that must travel alongside this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_files: Vec<Value>,
}

impl FileValue {
    /// A plain file value with only a URI.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }
}

impl Value {
    /// Shorthand for a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Shorthand for a plain file value.
    pub fn file(uri: impl Into<String>) -> Self {
        Value::File(FileValue::new(uri))
    }

    /// Look up a hash field by name.
    pub fn hash_field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Hash(pairs) => pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::File(file) => write!(f, "File({})", file.uri),
            Value::Folder { uri, .. } => write!(f, "Folder({})", uri),
            Value::Archive { uri, .. } => write!(f, "Archive({})", uri),
            Value::Listing { basename, items } => {
                write!(f, "Listing({}, {} items)", basename, items.len())
            }
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Hash(pairs) => {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}
