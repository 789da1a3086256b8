// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The IR container produced by translation.
//!
//! A bundle holds every callable of one compilation, a primary entry
//! point, and a dependency ordering the build planner walks. The ordering
//! is a stable post-order: every callable appears exactly once, after all
//! of its transitive callees, and insertion order breaks ties so repeated
//! compilations produce identical plans.

use crate::executable::Callable;
use crate::types::SchemaType;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised while sealing a bundle.
#[derive(Debug, Clone, Error)]
pub enum BundleError {
    /// Two callables carry the same name.
    #[error("duplicate callable name '{name}'")]
    DuplicateCallable {
        /// The duplicated name.
        name: String,
    },

    /// The primary callable is not among the callables.
    #[error("primary callable '{name}' is not in the bundle")]
    PrimaryNotInCallables {
        /// The missing name.
        name: String,
    },

    /// A stage or fragment references a callable the bundle does not hold.
    #[error("callable '{caller}' references unknown callee '{callee}'")]
    MissingCallee {
        /// The referencing callable.
        caller: String,
        /// The missing callee name.
        callee: String,
    },

    /// Callables reference each other in a cycle.
    #[error("cyclic dependency: {}", path.join(" -> "))]
    CyclicDependency {
        /// The cycle, starting and ending at the same callable.
        path: Vec<String>,
    },
}

/// The language-neutral output of translation.
#[derive(Debug, Clone)]
pub struct Bundle {
    primary: Option<String>,
    callables: HashMap<String, Callable>,
    dependencies: Vec<String>,
    type_aliases: Vec<(String, SchemaType)>,
}

impl Bundle {
    /// Seal a bundle from translated callables.
    ///
    /// `callables` must be given in source order; the dependency order is
    /// derived here and is stable across runs. Fails on duplicate names,
    /// a primary not present in the callables, unknown callees, or
    /// dependency cycles.
    pub fn new(
        primary: Option<String>,
        callables: Vec<Callable>,
        type_aliases: Vec<(String, SchemaType)>,
    ) -> Result<Self, BundleError> {
        let mut by_name: HashMap<String, Callable> = HashMap::new();
        let insertion_order: Vec<String> = callables.iter().map(|c| c.name().to_string()).collect();
        for callable in callables {
            let name = callable.name().to_string();
            if by_name.insert(name.clone(), callable).is_some() {
                return Err(BundleError::DuplicateCallable { name });
            }
        }

        if let Some(primary_name) = &primary
            && !by_name.contains_key(primary_name)
        {
            return Err(BundleError::PrimaryNotInCallables {
                name: primary_name.clone(),
            });
        }

        let mut ordered = Vec::with_capacity(by_name.len());
        let mut done: HashSet<String> = HashSet::new();
        let mut path: Vec<String> = Vec::new();

        // The primary's subtree first, then anything unreachable from it,
        // both in insertion order for determinism.
        let mut roots: Vec<&String> = Vec::new();
        if let Some(primary_name) = &primary {
            roots.push(primary_name);
        }
        roots.extend(insertion_order.iter());

        for root in roots {
            visit(root, &by_name, &mut done, &mut path, &mut ordered)?;
        }

        Ok(Self {
            primary,
            callables: by_name,
            dependencies: ordered,
            type_aliases,
        })
    }

    /// The primary callable, when the document declared one.
    pub fn primary(&self) -> Option<&Callable> {
        self.primary.as_ref().and_then(|name| self.callables.get(name))
    }

    /// Name of the primary callable.
    pub fn primary_name(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    /// Look up a callable by name.
    pub fn callable(&self, name: &str) -> Option<&Callable> {
        self.callables.get(name)
    }

    /// All callable names in dependency order (callees before callers).
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Schema aliases declared by the source document.
    pub fn type_aliases(&self) -> &[(String, SchemaType)] {
        &self.type_aliases
    }

    /// Number of callables.
    pub fn len(&self) -> usize {
        self.callables.len()
    }

    /// Whether the bundle holds no callables.
    pub fn is_empty(&self) -> bool {
        self.callables.is_empty()
    }
}

/// Post-order DFS with cycle detection on the active path.
fn visit(
    name: &str,
    by_name: &HashMap<String, Callable>,
    done: &mut HashSet<String>,
    path: &mut Vec<String>,
    ordered: &mut Vec<String>,
) -> Result<(), BundleError> {
    if done.contains(name) {
        return Ok(());
    }
    if let Some(start) = path.iter().position(|p| p == name) {
        let mut cycle: Vec<String> = path[start..].to_vec();
        cycle.push(name.to_string());
        return Err(BundleError::CyclicDependency { path: cycle });
    }

    let callable = by_name.get(name).ok_or_else(|| BundleError::MissingCallee {
        caller: path.last().cloned().unwrap_or_else(|| name.to_string()),
        callee: name.to_string(),
    })?;

    path.push(name.to_string());
    for callee in callable.callee_names() {
        visit(&callee, by_name, done, path, ordered)?;
    }
    path.pop();

    done.insert(name.to_string());
    ordered.push(name.to_string());
    Ok(())
}
