// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error kinds shared across the IR crate.

use thiserror::Error;

/// Broad classification an embedding CLI maps to process exit codes:
/// user/configuration problems to 1, platform/IO faults to 2, internal
/// invariant violations to 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The user's source or configuration is at fault.
    User,
    /// The platform or the network is at fault.
    Platform,
    /// The compiler violated one of its own invariants.
    Internal,
}

/// A value did not fit a type, or two types could not be reconciled.
#[derive(Debug, Clone, Error)]
pub enum TypeError {
    /// Null supplied where the target type does not admit absence.
    #[error("null is not allowed for non-optional type {target}")]
    NullNotAllowed {
        /// The non-optional target type.
        target: String,
    },

    /// A value's shape does not match the target type.
    #[error("value {value} does not fit type {target}")]
    Mismatch {
        /// Display form of the offending value.
        value: String,
        /// Display form of the target type.
        target: String,
    },

    /// An empty array supplied for a non-empty array type.
    #[error("empty array does not satisfy non-empty type {target}")]
    EmptyNonEmptyArray {
        /// The non-empty array type.
        target: String,
    },

    /// A hash key has no corresponding schema field.
    #[error("unknown field '{field}' for schema {schema}")]
    UnknownField {
        /// The offending key.
        field: String,
        /// The schema name (or `Hash` when anonymous).
        schema: String,
    },

    /// A required schema field is absent from the hash.
    #[error("missing required field '{field}' for schema {schema}")]
    MissingField {
        /// The absent field.
        field: String,
        /// The schema name.
        schema: String,
    },
}

/// A source identifier cannot be encoded into a platform-safe name, or an
/// encoded name cannot be decoded unambiguously.
#[derive(Debug, Clone, Error)]
pub enum NameError {
    /// A namespace path contained an empty segment.
    #[error("empty name segment in '{path}'")]
    EmptySegment {
        /// The offending dotted path.
        path: String,
    },

    /// A segment contains the namespace separator or would produce it.
    #[error("name segment '{segment}' collides with the namespace separator")]
    SeparatorCollision {
        /// The offending segment.
        segment: String,
    },

    /// A segment begins or ends with an underscore, which would make the
    /// joined form ambiguous to split.
    #[error("name segment '{segment}' must not begin or end with '_'")]
    UnderscoreEdge {
        /// The offending segment.
        segment: String,
    },

    /// A raw segment spells an escape sequence and would not round-trip.
    #[error("name segment '{segment}' is ambiguous: it matches an escape form")]
    AmbiguousSegment {
        /// The offending segment.
        segment: String,
    },
}

impl TypeError {
    /// Classification for exit-code mapping.
    pub fn class(&self) -> ErrorClass {
        ErrorClass::User
    }
}

impl NameError {
    /// Classification for exit-code mapping.
    pub fn class(&self) -> ErrorClass {
        ErrorClass::User
    }
}
