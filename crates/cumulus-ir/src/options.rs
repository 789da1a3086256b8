// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Compilation options.
//!
//! One plain struct shared by the translators (locked mode, reorg,
//! scatter chunking, runtime defaults) and the build planner (reuse scope,
//! conflict policy, destination). Options load from `CUMULUS_*`
//! environment variables or are set directly by the embedding CLI.

use crate::executable::RuntimeResources;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// What to do when the target folder already holds an executable with the
/// same name but a different digest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConflictPolicy {
    /// Move the old executables into an archive folder, then build.
    #[default]
    Archive,
    /// Delete the old executables, then build.
    Force,
    /// Fail the compilation without mutating anything.
    Strict,
}

/// Whether constant resource requirements resolve to an instance name at
/// compile time or at runtime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InstanceTypeSelection {
    /// Pick the instance at compile time when requirements are constant.
    #[default]
    Static,
    /// Always defer instance selection to the runtime.
    Dynamic,
}

/// A user-supplied reorg applet applied after the output stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomReorg {
    /// Platform ID of the user's reorg applet.
    pub applet_id: String,
    /// Optional configuration file passed to the applet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
}

/// Default resource requirements applied when a task specifies nothing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultRuntimeAttrs {
    /// Instance name used when a task has no requirements at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    /// Resource defaults merged under task-level hints.
    #[serde(flatten)]
    pub resources: RuntimeResources,
}

/// Options recognized by the compiler core. All have defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    /// Emit the top-level workflow in locked mode (explicit I/O).
    pub locked: bool,
    /// Skip the terminal `close` on newly built workflows.
    pub leave_workflows_open: bool,
    /// Append the built-in reorg applet as the final stage.
    pub reorg: bool,
    /// A user-supplied reorg applet; incompatible with `reorg`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_reorg: Option<CustomReorg>,
    /// Extend executable reuse lookup beyond the target folder.
    pub project_wide_reuse: bool,
    /// Conflict policy for same-name/different-digest executables.
    pub conflict_policy: ConflictPolicy,
    /// Maximum scatter jobs launched per fragment chunk.
    pub scatter_chunk_size: usize,
    /// Defaults applied when tasks specify no runtime requirements.
    pub default_runtime_attrs: DefaultRuntimeAttrs,
    /// Compile-time vs runtime instance selection for constant cases.
    pub instance_type_selection: InstanceTypeSelection,
    /// Destination project.
    pub project: String,
    /// Destination folder within the project.
    pub folder: String,
}

/// Upper bound the platform enforces on jobs launched from one fragment.
pub const DEFAULT_SCATTER_CHUNK_SIZE: usize = 1000;

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            locked: false,
            leave_workflows_open: false,
            reorg: false,
            custom_reorg: None,
            project_wide_reuse: false,
            conflict_policy: ConflictPolicy::default(),
            scatter_chunk_size: DEFAULT_SCATTER_CHUNK_SIZE,
            default_runtime_attrs: DefaultRuntimeAttrs::default(),
            instance_type_selection: InstanceTypeSelection::default(),
            project: String::new(),
            folder: "/".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),

    /// Two options cannot be combined.
    #[error("incompatible options: {0}")]
    Incompatible(&'static str),
}

impl CompileOptions {
    /// Load options from `CUMULUS_*` environment variables.
    ///
    /// Required:
    /// - `CUMULUS_PROJECT`: destination project
    ///
    /// Optional (with defaults):
    /// - `CUMULUS_FOLDER`: destination folder (default: `/`)
    /// - `CUMULUS_LOCKED`: `true`/`false` (default: `false`)
    /// - `CUMULUS_CONFLICT_POLICY`: `archive`/`force`/`strict`
    /// - `CUMULUS_SCATTER_CHUNK_SIZE`: positive integer
    pub fn from_env() -> Result<Self, ConfigError> {
        let project =
            std::env::var("CUMULUS_PROJECT").map_err(|_| ConfigError::Missing("CUMULUS_PROJECT"))?;

        let folder = std::env::var("CUMULUS_FOLDER").unwrap_or_else(|_| "/".to_string());

        let locked = match std::env::var("CUMULUS_LOCKED") {
            Ok(raw) => raw
                .parse::<bool>()
                .map_err(|_| ConfigError::Invalid("CUMULUS_LOCKED", "must be true or false"))?,
            Err(_) => false,
        };

        let conflict_policy = match std::env::var("CUMULUS_CONFLICT_POLICY") {
            Ok(raw) => raw.parse::<ConflictPolicy>().map_err(|_| {
                ConfigError::Invalid(
                    "CUMULUS_CONFLICT_POLICY",
                    "must be archive, force, or strict",
                )
            })?,
            Err(_) => ConflictPolicy::default(),
        };

        let scatter_chunk_size = match std::env::var("CUMULUS_SCATTER_CHUNK_SIZE") {
            Ok(raw) => {
                let parsed: usize = raw.parse().map_err(|_| {
                    ConfigError::Invalid("CUMULUS_SCATTER_CHUNK_SIZE", "must be a positive integer")
                })?;
                if parsed == 0 {
                    return Err(ConfigError::Invalid(
                        "CUMULUS_SCATTER_CHUNK_SIZE",
                        "must be a positive integer",
                    ));
                }
                parsed
            }
            Err(_) => DEFAULT_SCATTER_CHUNK_SIZE,
        };

        let options = Self {
            locked,
            conflict_policy,
            scatter_chunk_size,
            project,
            folder,
            ..Self::default()
        };
        options.validate()?;
        Ok(options)
    }

    /// Reject incompatible option combinations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reorg && self.custom_reorg.is_some() {
            return Err(ConfigError::Incompatible(
                "reorg cannot be combined with a custom reorg applet",
            ));
        }
        if self.scatter_chunk_size == 0 {
            return Err(ConfigError::Incompatible(
                "scatter chunk size must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompileOptions::default();
        assert!(!options.locked);
        assert_eq!(options.conflict_policy, ConflictPolicy::Archive);
        assert_eq!(options.scatter_chunk_size, DEFAULT_SCATTER_CHUNK_SIZE);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_conflict_policy_string_forms() {
        assert_eq!("archive".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Archive);
        assert_eq!("force".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Force);
        assert_eq!("strict".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Strict);
        assert_eq!(ConflictPolicy::Strict.to_string(), "strict");
        assert!("delete".parse::<ConflictPolicy>().is_err());
    }

    #[test]
    fn test_reorg_conflict_is_rejected() {
        let options = CompileOptions {
            reorg: true,
            custom_reorg: Some(CustomReorg {
                applet_id: "applet-123".to_string(),
                config_file: None,
            }),
            ..CompileOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::Incompatible(_))
        ));
    }

    #[test]
    fn test_custom_reorg_alone_is_fine() {
        let options = CompileOptions {
            custom_reorg: Some(CustomReorg {
                applet_id: "applet-123".to_string(),
                config_file: None,
            }),
            ..CompileOptions::default()
        };
        assert!(options.validate().is_ok());
    }
}
