// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error surface of the translation half of the compiler.

use cumulus_ir::{BundleError, ConfigError, ErrorClass, NameError, TypeError};
use thiserror::Error;

/// Result type using CompileError.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Errors that can occur while translating a document into IR.
///
/// Every component surfaces only its own kinds: the translators do not
/// catch parser errors, and the build planner does not catch translator
/// errors. The embedding CLI maps [`CompileError::class`] to exit codes.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The parser front-end rejected the source; forwarded unchanged.
    #[error("parse error: {0}")]
    Parse(String),

    /// The type checker rejected the source, or an IR coercion failed.
    #[error("type error: {0}")]
    Type(#[from] TypeError),

    /// A source feature the core cannot lower.
    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),

    /// Conflicting types for the same free variable across a block.
    #[error("closure error: variable '{name}' is used as {first} and as {second}")]
    ClosureConflict {
        /// The encoded variable name.
        name: String,
        /// Display form of the first type seen.
        first: String,
        /// Display form of the conflicting type.
        second: String,
    },

    /// An identifier could not be resolved inside a workflow body.
    #[error("closure error: unresolved identifier '{name}' in workflow '{workflow}'")]
    UnresolvedIdentifier {
        /// The encoded identifier.
        name: String,
        /// The workflow being translated.
        workflow: String,
    },

    /// A call references a task or workflow the document does not define.
    #[error("call to unknown task or workflow '{callee}'")]
    UnknownCallee {
        /// The missing callee name.
        callee: String,
    },

    /// A block holds more than one call site; a block-builder invariant
    /// was violated upstream, so this is internal.
    #[error("block shape violation: {0}")]
    BlockShape(String),

    /// An identifier cannot be encoded into a platform-safe name.
    #[error(transparent)]
    Name(#[from] NameError),

    /// Incompatible option combinations.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// The translated callables do not form a valid bundle.
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// An invariant violation; never expected to escape in production.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CompileError {
    /// Classification for exit-code mapping.
    pub fn class(&self) -> ErrorClass {
        match self {
            CompileError::Parse(_)
            | CompileError::Type(_)
            | CompileError::UnsupportedConstruct(_)
            | CompileError::ClosureConflict { .. }
            | CompileError::UnresolvedIdentifier { .. }
            | CompileError::UnknownCallee { .. }
            | CompileError::Name(_)
            | CompileError::Configuration(_) => ErrorClass::User,
            CompileError::BlockShape(_) | CompileError::Bundle(_) | CompileError::Internal(_) => {
                ErrorClass::Internal
            }
        }
    }
}
