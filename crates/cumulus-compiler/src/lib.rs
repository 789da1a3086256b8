// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cumulus Compiler - Workflow Translation to IR
//!
//! This crate lowers typed workflow documents (WDL, CWL) into the
//! language-neutral IR of `cumulus-ir`. Parsers and type checkers are
//! external: they produce the [`frontend::Document`] model and hand
//! expressions over as opaque trees behind the [`frontend::Expression`]
//! trait.
//!
//! # Translation Pipeline
//!
//! ```text
//!     ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//!     │   Typed     │      │   Blocks    │      │   Bundle    │
//!     │  Document   │─────▶│  + Closures │─────▶│ (IR, topo-  │
//!     │ (frontend)  │      │ (fragments) │      │   sorted)   │
//!     └─────────────┘      └─────────────┘      └─────────────┘
//! ```
//!
//! 1. **Decompose**: each workflow body splits into blocks, the coarsest
//!    units executable as a single platform stage ([`blocks`]).
//! 2. **Close over**: every block's free variables and published values
//!    are computed, with types lifted through conditionals and scatters
//!    ([`closure`]).
//! 3. **Translate**: tasks become applets ([`task`]); workflows become
//!    stage DAGs with generated fragment/common/outputs/reorg applets,
//!    and complex nested bodies become locked sub-workflows
//!    ([`workflow`]).
//!
//! The result is a sealed [`cumulus_ir::Bundle`] the build planner in
//! `cumulus-deploy` turns into platform objects.
//!
//! # Modules
//!
//! - [`frontend`]: the parser seam (document model, expression trait)
//! - [`blocks`]: block decomposition and classification
//! - [`closure`]: input/output closure analysis
//! - [`task`]: task/tool translation
//! - [`workflow`]: workflow translation and auxiliary applet generation
//! - [`standalone`]: source packing for applet details

#![deny(missing_docs)]

pub mod blocks;
pub mod closure;
pub mod error;
pub mod frontend;
pub mod standalone;
pub mod task;
pub mod workflow;

pub use blocks::{Block, BlockInput, BlockKind, build_blocks, classify, split_into_blocks};
pub use closure::{BlockOutput, CalleeSignature, Closure, ClosureInput, SignatureMap, analyze};
pub use error::{CompileError, Result};
pub use frontend::{ConstResult, Document, Expr, Expression, RefKind, VarRef};
pub use task::translate_task;
pub use workflow::translate_document;
