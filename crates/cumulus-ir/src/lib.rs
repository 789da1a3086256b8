// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cumulus IR - Language-Neutral Intermediate Representation
//!
//! This crate holds everything the Cumulus workflow compiler shares between
//! its front half (translating WDL/CWL into IR) and its back half (planning
//! and building platform executables):
//!
//! - [`Type`] / [`Value`]: the language-neutral type and value model, with
//!   coercion rules used identically at compile time and at runtime.
//! - [`wire`]: serialization to and from the platform's JSON dialect,
//!   including the composite two-field parameter encoding.
//! - [`names`]: reversible encoding of source identifiers into
//!   platform-safe parameter names.
//! - [`Application`] / [`Workflow`] / [`Stage`]: the translated
//!   executables, referencing each other by name.
//! - [`Bundle`]: the sealed, dependency-ordered result of translation.
//! - [`CompileOptions`]: the knobs recognized by the compiler core.
//!
//! Types, values, and executables are purely functional: created during
//! translation, never mutated afterwards.

#![deny(missing_docs)]

pub mod bundle;
pub mod coercion;
pub mod error;
pub mod executable;
pub mod names;
pub mod options;
pub mod types;
pub mod value;
pub mod wire;

pub use bundle::{Bundle, BundleError};
pub use coercion::coerce_to;
pub use error::{ErrorClass, NameError, TypeError};
pub use executable::{
    AppKind, Application, Callable, CallableAttribute, ContainerImage, InstanceType, LanguageTag,
    NativeRef, Parameter, ParameterAttribute, Requirement, RuntimeResources, SourceCode, Stage,
    StageInput, Workflow, WorkflowLevel,
};
pub use options::{
    CompileOptions, ConfigError, ConflictPolicy, CustomReorg, DefaultRuntimeAttrs,
    InstanceTypeSelection,
};
pub use types::{SchemaType, Type, map_schema, pair_schema};
pub use value::{FileValue, Value};
