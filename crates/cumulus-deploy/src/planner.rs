// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The build planner: content-addressed reuse against the target folder.
//!
//! Walks the bundle strictly in dependency order, so every callee's
//! platform ID is known before a caller is rendered. For each callable:
//!
//! 1. Native references resolve to existing platform executables.
//! 2. Everything else is rendered and digested.
//! 3. An exact name+digest match in the object directory is reused.
//! 4. Same-name/different-digest objects are handled by the conflict
//!    policy: archived, removed, or reported as a conflict.
//! 5. Otherwise the object is built, and new workflows are closed unless
//!    configured to stay open.
//!
//! The planner is single-threaded and deterministic: the same bundle and
//! directory state always produce the same plan. A failure at callable
//! *k* leaves callables before *k* built and reusable by the next run.

use crate::digest::digest_request;
use crate::directory::ObjectDirectory;
use crate::error::{DeployError, Result};
use crate::platform::{ObjectClass, ObjectId, PlatformApi, with_retries};
use crate::render::render_callable;
use cumulus_ir::{
    AppKind, Application, Bundle, Callable, CompileOptions, ConflictPolicy, NativeRef, Parameter,
};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One callable bound to its platform object.
#[derive(Debug, Clone)]
pub struct CompiledExecutable {
    /// The callable's name in the bundle.
    pub name: String,
    /// The platform object ID (built, reused, or resolved).
    pub id: ObjectId,
    /// The request digest; absent for native references.
    pub digest: Option<String>,
    /// Whether an existing object was reused instead of built.
    pub reused: bool,
    /// Callee name to platform ID, for reporting.
    pub dependency_links: Vec<(String, ObjectId)>,
    /// For workflows, the stage-to-executable tree, for reporting.
    pub execution_tree: Option<JsonValue>,
}

/// The result of one compilation run.
#[derive(Debug, Clone)]
pub struct CompileResult {
    /// Executables in dependency order.
    pub executables: Vec<CompiledExecutable>,
    /// Name of the primary executable, when the bundle declared one.
    pub primary: Option<String>,
}

impl CompileResult {
    /// The primary executable's record.
    pub fn primary_executable(&self) -> Option<&CompiledExecutable> {
        let name = self.primary.as_deref()?;
        self.executables.iter().find(|exe| exe.name == name)
    }
}

/// Plans and executes builds for one bundle.
pub struct BuildPlanner {
    platform: Arc<dyn PlatformApi>,
    options: CompileOptions,
    directory: ObjectDirectory,
    executables: HashMap<String, ObjectId>,
}

impl BuildPlanner {
    /// Create a planner over the target project/folder from the options.
    pub fn new(platform: Arc<dyn PlatformApi>, options: CompileOptions) -> Result<Self> {
        options.validate()?;
        let directory = ObjectDirectory::new(
            platform.clone(),
            options.project.clone(),
            options.folder.clone(),
            options.project_wide_reuse,
        );
        Ok(Self {
            platform,
            options,
            directory,
            executables: HashMap::new(),
        })
    }

    /// Build (or reuse) every callable of the bundle, in dependency
    /// order.
    pub async fn apply(&mut self, bundle: &Bundle) -> Result<CompileResult> {
        self.directory.ensure_populated().await?;

        let mut results = Vec::with_capacity(bundle.dependencies().len());
        for name in bundle.dependencies() {
            let callable = bundle.callable(name).ok_or_else(|| {
                DeployError::Internal(format!("dependency '{}' missing from bundle", name))
            })?;
            let executable = self.maybe_build(callable, bundle).await?;
            self.executables
                .insert(executable.name.clone(), executable.id.clone());
            results.push(executable);
        }

        info!(
            total = results.len(),
            built = results.iter().filter(|exe| !exe.reused).count(),
            reused = results.iter().filter(|exe| exe.reused).count(),
            "compilation plan applied"
        );
        Ok(CompileResult {
            executables: results,
            primary: bundle.primary_name().map(str::to_string),
        })
    }

    /// Decide what to do for one callable: resolve, reuse, or build.
    async fn maybe_build(
        &mut self,
        callable: &Callable,
        bundle: &Bundle,
    ) -> Result<CompiledExecutable> {
        let name = callable.name().to_string();

        if let Callable::Application(Application {
            kind: AppKind::Native { reference },
            ..
        }) = callable
        {
            let id = self.resolve_native(reference).await?;
            debug!(name = %name, id = %id, "resolved native reference");
            return Ok(CompiledExecutable {
                name,
                id,
                digest: None,
                reused: true,
                dependency_links: Vec::new(),
                execution_tree: None,
            });
        }

        let callee_params = |callee: &str| -> Option<Vec<Parameter>> {
            bundle
                .callable(callee)
                .map(|c| c.input_params().into_iter().cloned().collect())
        };
        let request = render_callable(callable, &callee_params, &self.executables, &self.options)?;
        let (request, digest) = digest_request(&request);

        let dependency_links: Vec<(String, ObjectId)> = callable
            .callee_names()
            .iter()
            .filter_map(|callee| {
                self.executables
                    .get(callee)
                    .map(|id| (callee.clone(), id.clone()))
            })
            .collect();

        let execution_tree = Self::execution_tree(callable, &self.executables);

        if let Some(record) = self.directory.lookup_in_project(&name, &digest) {
            info!(name = %name, id = %record.id, "reusing existing executable");
            return Ok(CompiledExecutable {
                name,
                id: record.id.clone(),
                digest: Some(digest),
                reused: true,
                dependency_links,
                execution_tree,
            });
        }

        let stale: Vec<_> = self
            .directory
            .lookup(&name)
            .iter()
            .filter(|record| record.digest.as_deref() != Some(digest.as_str()))
            .cloned()
            .collect();
        if !stale.is_empty() {
            match self.options.conflict_policy {
                ConflictPolicy::Archive => {
                    info!(name = %name, count = stale.len(), "archiving outdated executables");
                    self.directory.archive(&stale).await?;
                }
                ConflictPolicy::Force => {
                    info!(name = %name, count = stale.len(), "removing outdated executables");
                    self.directory.remove(&stale).await?;
                }
                ConflictPolicy::Strict => {
                    return Err(DeployError::ExecutableConflict {
                        name,
                        existing: stale.len(),
                        digest,
                    });
                }
            }
        }

        let (id, class) = self.build(callable, &request).await?;
        info!(name = %name, id = %id, "built executable");
        self.directory.insert(&name, id.clone(), &digest, class);
        Ok(CompiledExecutable {
            name,
            id,
            digest: Some(digest),
            reused: false,
            dependency_links,
            execution_tree,
        })
    }

    async fn build(
        &self,
        callable: &Callable,
        request: &JsonValue,
    ) -> Result<(ObjectId, ObjectClass)> {
        let platform = self.platform.clone();
        let project = self.options.project.clone();
        match callable {
            Callable::Application(_) => {
                let id = with_retries("applet-new", || {
                    let platform = platform.clone();
                    let project = project.clone();
                    async move { platform.applet_new(&project, request).await }
                })
                .await?;
                Ok((id, ObjectClass::Applet))
            }
            Callable::Workflow(_) => {
                let id = with_retries("workflow-new", || {
                    let platform = platform.clone();
                    let project = project.clone();
                    async move { platform.workflow_new(&project, request).await }
                })
                .await?;
                if !self.options.leave_workflows_open {
                    let close_id = id.clone();
                    with_retries("workflow-close", || {
                        let platform = platform.clone();
                        let close_id = close_id.clone();
                        async move { platform.close(&close_id).await }
                    })
                    .await?;
                }
                Ok((id, ObjectClass::Workflow))
            }
        }
    }

    /// The stage-to-executable tree of a workflow, for reporting.
    fn execution_tree(
        callable: &Callable,
        executables: &HashMap<String, ObjectId>,
    ) -> Option<JsonValue> {
        let Callable::Workflow(workflow) = callable else {
            return None;
        };
        let stages: Vec<JsonValue> = workflow
            .stages
            .iter()
            .map(|stage| {
                serde_json::json!({
                    "id": stage.id,
                    "callee": stage.callee,
                    "executable": executables.get(&stage.callee),
                })
            })
            .collect();
        Some(serde_json::json!({ "name": workflow.name, "stages": stages }))
    }

    async fn resolve_native(&self, reference: &NativeRef) -> Result<ObjectId> {
        match reference {
            NativeRef::Id(id) => {
                // Validate that the object exists before linking to it.
                let descriptor = self.platform.describe(id).await?;
                Ok(descriptor.id)
            }
            NativeRef::Path(path) => Ok(self
                .platform
                .resolve_path(&self.options.project, path)
                .await?),
            NativeRef::AppName(app_name) => Ok(self.platform.resolve_app(app_name).await?),
        }
    }
}
