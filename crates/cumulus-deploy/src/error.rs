// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error surface of the build-planning half of the compiler.

use crate::platform::PlatformError;
use cumulus_ir::{ConfigError, ErrorClass};
use thiserror::Error;

/// Result type using DeployError.
pub type Result<T> = std::result::Result<T, DeployError>;

/// Errors that can occur while planning and building platform objects.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A platform API call failed after retries.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// The target folder holds a same-name executable with a different
    /// digest and the conflict policy is strict.
    #[error(
        "executable '{name}' already exists with a different digest \
         (found {existing}, want {digest}); use the archive or force policy to replace it"
    )]
    ExecutableConflict {
        /// The conflicting executable name.
        name: String,
        /// Number of existing objects under that name.
        existing: usize,
        /// The digest of the request being built.
        digest: String,
    },

    /// Incompatible option combinations.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// A callable could not be rendered into a build request.
    #[error("cannot render build request for '{name}': {reason}")]
    Render {
        /// The callable being rendered.
        name: String,
        /// Why rendering failed.
        reason: String,
    },

    /// JSON serialization failed while rendering.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An invariant violation; never expected to escape in production.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Classification for exit-code mapping.
    pub fn class(&self) -> ErrorClass {
        match self {
            DeployError::Platform(_) => ErrorClass::Platform,
            DeployError::ExecutableConflict { .. } | DeployError::Configuration(_) => {
                ErrorClass::User
            }
            DeployError::Render { .. } | DeployError::Json(_) | DeployError::Internal(_) => {
                ErrorClass::Internal
            }
        }
    }
}
