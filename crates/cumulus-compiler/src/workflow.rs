// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Translation of workflows into Workflow IR plus auxiliary applets.
//!
//! The body is decomposed into blocks; each block becomes one stage. A
//! `CallDirect` block references the callee applet itself; every other
//! kind gets a generated *fragment* applet that evaluates the block's
//! expressions at runtime and launches its call site. Complex conditional
//! and scatter bodies are translated recursively as locked sub-workflows
//! the fragment invokes, which scales to arbitrary nesting.
//!
//! An unlocked workflow is bracketed by a *common* applet (evaluating
//! workflow-input expressions) and an *outputs* applet (evaluating
//! workflow-output expressions); a locked workflow gets them only when a
//! default or an output expression is non-trivial. A reorg applet can be
//! appended as the final stage, reading all workflow outputs.

use crate::blocks::{self, Block, BlockInput, BlockKind};
use crate::closure::{self, BlockOutput, CalleeSignature, ClosureInput, SignatureMap};
use crate::error::{CompileError, Result};
use crate::frontend::{ConstResult, Document, Expr, RefKind, WorkflowDef, WorkflowElement};
use crate::task::translate_task;
use cumulus_ir::{
    AppKind, Application, Bundle, Callable, CompileOptions, ContainerImage, InstanceType,
    LanguageTag, Parameter, SourceCode, Stage, StageInput, Type, Workflow, WorkflowLevel, names,
};
use std::collections::HashMap;
use tracing::{debug, info};

/// Stage ID of the common-inputs applet.
pub const COMMON_STAGE_ID: &str = "stage-common";

/// Stage ID of the outputs applet.
pub const OUTPUTS_STAGE_ID: &str = "stage-outputs";

/// Stage ID of the reorg applet.
pub const REORG_STAGE_ID: &str = "stage-reorg";

/// Translate a whole document into a sealed bundle.
pub fn translate_document(document: &Document, options: &CompileOptions) -> Result<Bundle> {
    options.validate()?;
    check_unique_names(document)?;

    let mut signatures = SignatureMap::new();
    for task in &document.tasks {
        signatures.insert(
            task.name.clone(),
            CalleeSignature {
                inputs: task
                    .inputs
                    .iter()
                    .map(|io| (io.name.clone(), io.ty.normalize()))
                    .collect(),
                outputs: task
                    .outputs
                    .iter()
                    .map(|io| (io.name.clone(), io.ty.normalize()))
                    .collect(),
            },
        );
    }
    for workflow in &document.workflows {
        signatures.insert(
            workflow.name.clone(),
            CalleeSignature {
                inputs: workflow
                    .inputs
                    .iter()
                    .map(|io| (io.name.clone(), io.ty.normalize()))
                    .collect(),
                outputs: workflow
                    .outputs
                    .iter()
                    .map(|out| (out.name.clone(), out.ty.normalize()))
                    .collect(),
            },
        );
    }

    let primary = match (&document.primary, document.workflows.as_slice()) {
        (Some(name), _) => Some(name.clone()),
        (None, [only]) => Some(only.name.clone()),
        (None, []) if document.tasks.len() == 1 => Some(document.tasks[0].name.clone()),
        (None, _) => None,
    };

    let mut callables: Vec<Callable> = Vec::new();
    for task in &document.tasks {
        callables.push(Callable::Application(translate_task(
            task,
            document.language,
            options,
        )?));
    }

    let mut translator = WorkflowTranslator {
        options,
        signatures: &signatures,
        language: document.language,
        generated: Vec::new(),
    };
    for def in &document.workflows {
        let is_primary = primary.as_deref() == Some(def.name.as_str());
        let locked = !is_primary || options.locked;
        let level = if is_primary {
            WorkflowLevel::Top
        } else {
            WorkflowLevel::Sub
        };
        let workflow = translator.translate_workflow(def, level, locked)?;
        callables.push(Callable::Workflow(workflow));
    }
    callables.extend(translator.generated);

    let primary_encoded = primary.as_deref().map(names::encode).transpose()?;
    let bundle = Bundle::new(primary_encoded, callables, document.type_aliases.clone())?;
    info!(
        callables = bundle.len(),
        primary = bundle.primary_name().unwrap_or("-"),
        "translated document"
    );
    Ok(bundle)
}

fn check_unique_names(document: &Document) -> Result<()> {
    let mut seen: Vec<&str> = Vec::new();
    for name in document
        .tasks
        .iter()
        .map(|t| t.name.as_str())
        .chain(document.workflows.iter().map(|w| w.name.as_str()))
    {
        if seen.contains(&name) {
            return Err(CompileError::UnsupportedConstruct(format!(
                "multiple tasks or workflows named '{}'",
                name
            )));
        }
        seen.push(name);
    }
    Ok(())
}

struct WorkflowTranslator<'a> {
    options: &'a CompileOptions,
    signatures: &'a SignatureMap,
    language: LanguageTag,
    generated: Vec<Callable>,
}

impl WorkflowTranslator<'_> {
    fn translate_workflow(
        &mut self,
        def: &WorkflowDef,
        level: WorkflowLevel,
        locked: bool,
    ) -> Result<Workflow> {
        let name = names::encode(&def.name)?;
        let inputs: Vec<BlockInput> = def
            .inputs
            .iter()
            .map(|io| {
                Ok(BlockInput::from_declaration(
                    names::encode(&io.name)?,
                    &io.ty,
                    io.default.as_ref(),
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let outputs: Vec<(String, Type, Option<Expr>)> = def
            .outputs
            .iter()
            .map(|out| {
                Ok((
                    names::encode(&out.name)?,
                    out.ty.normalize(),
                    Some(out.expr.clone()),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        self.translate_body(
            &name,
            &def.source,
            &def.body,
            inputs,
            outputs,
            level,
            locked,
            &[],
            &def.attributes,
        )
    }

    /// Translate a body (a user workflow or a generated sub-workflow) with
    /// already-encoded inputs and outputs.
    #[allow(clippy::too_many_arguments)]
    fn translate_body(
        &mut self,
        name: &str,
        source_text: &str,
        body: &[WorkflowElement],
        inputs: Vec<BlockInput>,
        outputs: Vec<(String, Type, Option<Expr>)>,
        level: WorkflowLevel,
        locked: bool,
        block_path: &[usize],
        attributes: &[cumulus_ir::CallableAttribute],
    ) -> Result<Workflow> {
        let source = SourceCode {
            language: self.language,
            text: source_text.to_string(),
        };
        let blocks = blocks::build_blocks(body, self.signatures)?;
        let mut env: HashMap<String, StageInput> = HashMap::new();
        let mut stages: Vec<Stage> = Vec::new();

        // Common applet: always for unlocked workflows, otherwise only
        // when some input default needs runtime evaluation.
        let needs_common = !locked
            || inputs
                .iter()
                .any(|input| matches!(input, BlockInput::DynamicDefault { .. }));
        if needs_common {
            let common = self.build_common_applet(name, &source, &inputs)?;
            let stage = Stage {
                id: COMMON_STAGE_ID.to_string(),
                description: "common inputs".to_string(),
                callee: common.name.clone(),
                inputs: common
                    .inputs
                    .iter()
                    .map(|param| {
                        if locked {
                            StageInput::WorkflowInput {
                                param: param.name.clone(),
                            }
                        } else {
                            StageInput::Empty
                        }
                    })
                    .collect(),
                outputs: common.outputs.clone(),
            };
            for output in &common.outputs {
                env.insert(
                    output.name.clone(),
                    StageInput::Link {
                        stage_id: stage.id.clone(),
                        param: output.name.clone(),
                    },
                );
            }
            self.generated.push(Callable::Application(common));
            stages.push(stage);
        } else {
            for input in &inputs {
                env.insert(
                    input.name().to_string(),
                    StageInput::WorkflowInput {
                        param: input.name().to_string(),
                    },
                );
            }
        }

        for (index, block) in blocks.iter().enumerate() {
            let stage = self.emit_block_stage(name, &source, block, index, block_path, &mut env)?;
            stages.push(stage);
        }

        // Outputs applet: always for unlocked workflows, otherwise only
        // when some output expression needs runtime evaluation.
        let needs_outputs_applet = !locked
            || outputs.iter().any(|(_, ty, expr)| match expr {
                None => false,
                Some(expr) => !expr.is_trivial() && expr.try_const_eval(ty).ok().is_none(),
            });

        let mut workflow_outputs: Vec<(Parameter, StageInput)> = Vec::new();
        if needs_outputs_applet && !outputs.is_empty() {
            let applet = self.build_outputs_applet(name, &source, &outputs)?;
            let stage_inputs = applet
                .inputs
                .iter()
                .map(|param| {
                    resolve_encoded(&env, &param.name).ok_or_else(|| {
                        CompileError::UnresolvedIdentifier {
                            name: param.name.clone(),
                            workflow: name.to_string(),
                        }
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let stage = Stage {
                id: OUTPUTS_STAGE_ID.to_string(),
                description: "workflow outputs".to_string(),
                callee: applet.name.clone(),
                inputs: stage_inputs,
                outputs: applet.outputs.clone(),
            };
            for (output_name, ty, _) in &outputs {
                workflow_outputs.push((
                    Parameter::new(output_name.clone(), ty.clone()),
                    StageInput::Link {
                        stage_id: stage.id.clone(),
                        param: output_name.clone(),
                    },
                ));
            }
            self.generated.push(Callable::Application(applet));
            stages.push(stage);
        } else {
            for (output_name, ty, expr) in &outputs {
                let wired = self.wire_output(name, output_name, ty, expr.as_ref(), &env)?;
                workflow_outputs.push((Parameter::new(output_name.clone(), ty.clone()), wired));
            }
        }

        if self.options.reorg || self.options.custom_reorg.is_some() {
            let stage = self.append_reorg(name, &source, &workflow_outputs)?;
            stages.push(stage);
        }

        let workflow_inputs: Vec<(Parameter, StageInput)> = inputs
            .iter()
            .map(|input| {
                let wiring = if locked {
                    StageInput::WorkflowInput {
                        param: input.name().to_string(),
                    }
                } else {
                    StageInput::Empty
                };
                (param_from_block_input(input), wiring)
            })
            .collect();

        debug!(
            workflow = %name,
            stages = stages.len(),
            locked,
            "translated workflow body"
        );

        Ok(Workflow {
            name: name.to_string(),
            inputs: workflow_inputs,
            outputs: workflow_outputs,
            stages,
            source,
            locked,
            level,
            attributes: attributes.to_vec(),
        })
    }

    /// Emit the stage for one block, updating the environment with the
    /// block's published outputs.
    fn emit_block_stage(
        &mut self,
        workflow_name: &str,
        source: &SourceCode,
        block: &Block,
        index: usize,
        block_path: &[usize],
        env: &mut HashMap<String, StageInput>,
    ) -> Result<Stage> {
        let stage_id = format!("stage-{}", index);

        if block.kind == BlockKind::CallDirect {
            let Some(WorkflowElement::Call(call)) = block.call_element() else {
                return Err(CompileError::BlockShape(
                    "direct-call block without a call".to_string(),
                ));
            };
            let signature =
                self.signatures
                    .get(&call.callee)
                    .ok_or_else(|| CompileError::UnknownCallee {
                        callee: call.callee.clone(),
                    })?;
            let mut stage_inputs = Vec::with_capacity(signature.inputs.len());
            for (input_name, input_type) in &signature.inputs {
                let wired = match call.inputs.iter().find(|(n, _)| n == input_name) {
                    None => StageInput::Empty,
                    Some((_, expr)) => {
                        self.wire_trivial(workflow_name, expr, input_type, env)?
                    }
                };
                stage_inputs.push(wired);
            }
            let stage_outputs: Vec<Parameter> = signature
                .outputs
                .iter()
                .map(|(output_name, output_type)| {
                    Ok(Parameter::new(
                        names::encode(output_name)?,
                        output_type.clone(),
                    ))
                })
                .collect::<Result<Vec<_>>>()?;

            let stage = Stage {
                id: stage_id.clone(),
                description: call.binding_name().to_string(),
                callee: names::encode(&call.callee)?,
                inputs: stage_inputs,
                outputs: stage_outputs,
            };
            publish_block_outputs(env, &stage_id, &block.closure.outputs, Some(call))?;
            return Ok(stage);
        }

        // Every other kind gets a fragment applet.
        let fragment = self.build_fragment(workflow_name, source, block, index, block_path)?;
        let stage_inputs = fragment
            .inputs
            .iter()
            .map(|param| match resolve_encoded(env, &param.name) {
                Some(wired) => Ok(wired),
                None if param.is_optional() => Ok(StageInput::Empty),
                None => Err(CompileError::UnresolvedIdentifier {
                    name: param.name.clone(),
                    workflow: workflow_name.to_string(),
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        let stage = Stage {
            id: stage_id.clone(),
            description: describe_block(block),
            callee: fragment.name.clone(),
            inputs: stage_inputs,
            outputs: fragment.outputs.clone(),
        };
        publish_block_outputs(env, &stage_id, &block.closure.outputs, None)?;
        self.generated.push(Callable::Application(fragment));
        Ok(stage)
    }

    /// Build the fragment applet for a non-direct block. Complex
    /// conditional/scatter bodies are first translated into a locked
    /// sub-workflow the fragment calls.
    fn build_fragment(
        &mut self,
        workflow_name: &str,
        source: &SourceCode,
        block: &Block,
        index: usize,
        block_path: &[usize],
    ) -> Result<Application> {
        let mut path = block_path.to_vec();
        path.push(index);

        let mut scatter_var: Option<String> = None;
        let mut scatter_chunk_size: Option<usize> = None;
        let mut call_names: Vec<String> = Vec::new();

        match (&block.kind, block.call_element()) {
            (BlockKind::ExpressionsOnly, _) => {}
            (
                BlockKind::CallWithSubexpressions | BlockKind::CallFragment,
                Some(WorkflowElement::Call(call)),
            ) => {
                call_names.push(names::encode(&call.callee)?);
            }
            (BlockKind::ConditionalOneCall, Some(WorkflowElement::Conditional(conditional))) => {
                if let [WorkflowElement::Call(call)] = conditional.body.as_slice() {
                    call_names.push(names::encode(&call.callee)?);
                }
            }
            (BlockKind::ScatterOneCall, Some(WorkflowElement::Scatter(scatter))) => {
                if let [WorkflowElement::Call(call)] = scatter.body.as_slice() {
                    call_names.push(names::encode(&call.callee)?);
                }
                scatter_var = Some(names::encode(&scatter.variable)?);
                scatter_chunk_size = Some(self.options.scatter_chunk_size);
            }
            (BlockKind::ConditionalComplex, Some(WorkflowElement::Conditional(conditional))) => {
                let sub_name =
                    self.translate_sub_workflow(workflow_name, source, &conditional.body, &path)?;
                call_names.push(sub_name);
            }
            (BlockKind::ScatterComplex, Some(WorkflowElement::Scatter(scatter))) => {
                let sub_name =
                    self.translate_sub_workflow(workflow_name, source, &scatter.body, &path)?;
                call_names.push(sub_name);
                scatter_var = Some(names::encode(&scatter.variable)?);
                scatter_chunk_size = Some(self.options.scatter_chunk_size);
            }
            _ => {
                return Err(CompileError::BlockShape(format!(
                    "block kind {:?} does not match its last element",
                    block.kind
                )));
            }
        }

        let inputs: Vec<Parameter> = block
            .closure
            .inputs
            .iter()
            .map(param_from_closure_input)
            .collect();
        let outputs: Vec<Parameter> = block
            .closure
            .outputs
            .iter()
            .map(|output| Parameter::new(output.name.clone(), output.ty.clone()))
            .collect();

        Ok(Application {
            name: fragment_name(workflow_name, &path),
            inputs,
            outputs,
            instance_type: InstanceType::Default,
            container: ContainerImage::NoImage,
            kind: AppKind::WorkflowFragment {
                call_names,
                block_path: path,
                scatter_var,
                scatter_chunk_size,
            },
            source: source.clone(),
            attributes: Vec::new(),
            requirements: Vec::new(),
            tags: Vec::new(),
            properties: Vec::new(),
        })
    }

    /// Translate a complex conditional/scatter body as a locked
    /// sub-workflow and return its name.
    fn translate_sub_workflow(
        &mut self,
        workflow_name: &str,
        source: &SourceCode,
        body: &[WorkflowElement],
        path: &[usize],
    ) -> Result<String> {
        let sub_name = format!(
            "{}_block_{}",
            workflow_name,
            path.iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join("_")
        );
        let body_closure = closure::analyze(body, self.signatures)?;
        let inputs: Vec<BlockInput> = body_closure
            .inputs
            .iter()
            .map(block_input_from_closure)
            .collect();
        let outputs: Vec<(String, Type, Option<Expr>)> = body_closure
            .outputs
            .iter()
            .map(|output| (output.name.clone(), output.ty.clone(), output.expr.clone()))
            .collect();
        let sub = self.translate_body(
            &sub_name,
            &source.text,
            body,
            inputs,
            outputs,
            WorkflowLevel::Sub,
            true,
            path,
            &[],
        )?;
        self.generated.push(Callable::Workflow(sub));
        Ok(sub_name)
    }

    /// The common applet evaluates workflow-input expressions: it takes
    /// the raw workflow inputs and republishes them with defaults applied.
    fn build_common_applet(
        &self,
        workflow_name: &str,
        source: &SourceCode,
        inputs: &[BlockInput],
    ) -> Result<Application> {
        let applet_inputs: Vec<Parameter> = inputs.iter().map(param_from_block_input).collect();
        let applet_outputs: Vec<Parameter> = inputs
            .iter()
            .map(|input| {
                let ty = match input {
                    BlockInput::Required { ty, .. } | BlockInput::StaticDefault { ty, .. } => {
                        ty.clone()
                    }
                    // The default fills absent values at runtime.
                    BlockInput::DynamicDefault { ty, .. } => ty.unwrap_optional().clone(),
                    BlockInput::Optional { ty, .. } => ty.clone().ensure_optional(),
                };
                Parameter::new(input.name().to_string(), ty)
            })
            .collect();
        Ok(Application {
            name: format!("{}_common", workflow_name),
            inputs: applet_inputs,
            outputs: applet_outputs,
            instance_type: InstanceType::Default,
            container: ContainerImage::NoImage,
            kind: AppKind::WorkflowCommonInputs,
            source: source.clone(),
            attributes: Vec::new(),
            requirements: Vec::new(),
            tags: Vec::new(),
            properties: Vec::new(),
        })
    }

    /// The outputs applet evaluates workflow-output expressions: its
    /// inputs are the closure of those expressions, its outputs are the
    /// workflow outputs.
    fn build_outputs_applet(
        &self,
        workflow_name: &str,
        source: &SourceCode,
        outputs: &[(String, Type, Option<Expr>)],
    ) -> Result<Application> {
        let mut applet_inputs: Vec<Parameter> = Vec::new();
        for (_, ty, expr) in outputs {
            let Some(expr) = expr else { continue };
            for var_ref in expr.free_variables(ty, false) {
                let encoded = names::encode_segments(
                    &var_ref.path.iter().map(String::as_str).collect::<Vec<_>>(),
                )?;
                if applet_inputs.iter().any(|param| param.name == encoded) {
                    continue;
                }
                applet_inputs.push(Parameter::new(encoded, var_ref.ty.normalize()));
            }
        }
        let applet_outputs: Vec<Parameter> = outputs
            .iter()
            .map(|(name, ty, _)| Parameter::new(name.clone(), ty.clone()))
            .collect();
        let kind = if self.options.custom_reorg.is_some() {
            AppKind::WorkflowCustomReorgOutputs
        } else {
            AppKind::WorkflowOutputs {
                block_path: Vec::new(),
            }
        };
        Ok(Application {
            name: format!("{}_outputs", workflow_name),
            inputs: applet_inputs,
            outputs: applet_outputs,
            instance_type: InstanceType::Default,
            container: ContainerImage::NoImage,
            kind,
            source: source.clone(),
            attributes: Vec::new(),
            requirements: Vec::new(),
            tags: Vec::new(),
            properties: Vec::new(),
        })
    }

    /// Append the reorg applet as the final stage, reading all workflow
    /// outputs.
    fn append_reorg(
        &mut self,
        workflow_name: &str,
        source: &SourceCode,
        workflow_outputs: &[(Parameter, StageInput)],
    ) -> Result<Stage> {
        let mut inputs: Vec<Parameter> = workflow_outputs
            .iter()
            .map(|(param, _)| {
                Parameter::new(param.name.clone(), param.ty.clone().ensure_optional())
            })
            .collect();
        let mut stage_inputs: Vec<StageInput> = workflow_outputs
            .iter()
            .map(|(_, wiring)| wiring.clone())
            .collect();

        let kind = match &self.options.custom_reorg {
            Some(custom) => {
                inputs.push(Parameter::new(
                    "reorg_conf".to_string(),
                    Type::Optional(Box::new(Type::File)),
                ));
                stage_inputs.push(match &custom.config_file {
                    Some(uri) => StageInput::Static {
                        value: cumulus_ir::Value::file(uri.clone()),
                    },
                    None => StageInput::Empty,
                });
                AppKind::WorkflowCustomReorg {
                    applet_id: custom.applet_id.clone(),
                }
            }
            None => AppKind::WorkflowOutputReorg,
        };

        let applet = Application {
            name: format!("{}_reorg", workflow_name),
            inputs,
            outputs: Vec::new(),
            instance_type: InstanceType::Default,
            container: ContainerImage::NoImage,
            kind,
            source: source.clone(),
            attributes: Vec::new(),
            requirements: Vec::new(),
            tags: Vec::new(),
            properties: Vec::new(),
        };
        let stage = Stage {
            id: REORG_STAGE_ID.to_string(),
            description: "output reorganization".to_string(),
            callee: applet.name.clone(),
            inputs: stage_inputs,
            outputs: Vec::new(),
        };
        self.generated.push(Callable::Application(applet));
        Ok(stage)
    }

    /// Wire a trivial expression into a stage input: a constant becomes
    /// `Static`, a reference links to whatever the environment binds.
    fn wire_trivial(
        &self,
        workflow_name: &str,
        expr: &Expr,
        target: &Type,
        env: &HashMap<String, StageInput>,
    ) -> Result<StageInput> {
        if let Some(path) = expr.as_reference() {
            let encoded =
                names::encode_segments(&path.iter().map(String::as_str).collect::<Vec<_>>())?;
            return resolve_encoded(env, &encoded).ok_or_else(|| {
                CompileError::UnresolvedIdentifier {
                    name: encoded,
                    workflow: workflow_name.to_string(),
                }
            });
        }
        match expr.try_const_eval(target) {
            ConstResult::Const(value) => Ok(StageInput::Static { value }),
            ConstResult::NonConstant(reason) => Err(CompileError::Internal(format!(
                "non-trivial expression '{}' wired directly: {}",
                expr, reason
            ))),
        }
    }

    /// Wire one workflow output without an outputs applet.
    fn wire_output(
        &self,
        workflow_name: &str,
        output_name: &str,
        ty: &Type,
        expr: Option<&Expr>,
        env: &HashMap<String, StageInput>,
    ) -> Result<StageInput> {
        let Some(expr) = expr else {
            return Ok(StageInput::Empty);
        };
        match expr.try_const_eval(ty) {
            ConstResult::Const(value) => Ok(StageInput::Static { value }),
            ConstResult::NonConstant(_) => {
                let Some(path) = expr.as_reference() else {
                    return Err(CompileError::Internal(format!(
                        "non-trivial output '{}' wired without an outputs applet",
                        output_name
                    )));
                };
                let encoded =
                    names::encode_segments(&path.iter().map(String::as_str).collect::<Vec<_>>())?;
                resolve_encoded(env, &encoded).ok_or_else(|| CompileError::UnresolvedIdentifier {
                    name: encoded,
                    workflow: workflow_name.to_string(),
                })
            }
        }
    }
}

/// Deterministic fragment applet name from the workflow and block path.
fn fragment_name(workflow_name: &str, path: &[usize]) -> String {
    format!(
        "{}_frag_stage_{}",
        workflow_name,
        path.iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join("_")
    )
}

fn describe_block(block: &Block) -> String {
    match block.kind {
        BlockKind::ExpressionsOnly => "expressions".to_string(),
        BlockKind::CallDirect | BlockKind::CallWithSubexpressions | BlockKind::CallFragment => {
            match block.call_element() {
                Some(WorkflowElement::Call(call)) => call.binding_name().to_string(),
                _ => "call".to_string(),
            }
        }
        BlockKind::ConditionalOneCall | BlockKind::ConditionalComplex => "conditional".to_string(),
        BlockKind::ScatterOneCall | BlockKind::ScatterComplex => "scatter".to_string(),
    }
}

/// Record a block's published outputs in the environment as links to the
/// stage just emitted. For a direct call the stage's parameter names are
/// the bare callee output names; for fragments they are the full encoded
/// closure names.
fn publish_block_outputs(
    env: &mut HashMap<String, StageInput>,
    stage_id: &str,
    outputs: &[BlockOutput],
    direct_call: Option<&crate::frontend::CallSite>,
) -> Result<()> {
    for output in outputs {
        let param = match direct_call {
            Some(call) => {
                let binding_prefix = format!(
                    "{}{}",
                    names::encode(call.binding_name())?,
                    names::NAMESPACE_SEPARATOR
                );
                output
                    .name
                    .strip_prefix(&binding_prefix)
                    .unwrap_or(&output.name)
                    .to_string()
            }
            None => output.name.clone(),
        };
        env.insert(
            output.name.clone(),
            StageInput::Link {
                stage_id: stage_id.to_string(),
                param,
            },
        );
    }
    Ok(())
}

fn resolve_encoded(env: &HashMap<String, StageInput>, encoded: &str) -> Option<StageInput> {
    env.get(encoded).cloned()
}

fn param_from_block_input(input: &BlockInput) -> Parameter {
    match input {
        BlockInput::Required { name, ty } => Parameter::new(name.clone(), ty.clone()),
        BlockInput::StaticDefault { name, ty, default } => Parameter {
            name: name.clone(),
            ty: ty.clone(),
            default: Some(default.clone()),
            attributes: Vec::new(),
        },
        BlockInput::DynamicDefault { name, ty, .. } => Parameter::new(name.clone(), ty.clone()),
        BlockInput::Optional { name, ty } => {
            Parameter::new(name.clone(), ty.clone().ensure_optional())
        }
    }
}

fn param_from_closure_input(input: &ClosureInput) -> Parameter {
    let ty = match input.kind {
        RefKind::Required => input.ty.clone(),
        // Optional references tolerate absence; computed values are
        // supplied by the fragment executor, not wired statically.
        RefKind::Optional | RefKind::Computed => input.ty.clone().ensure_optional(),
    };
    Parameter::new(input.name.clone(), ty)
}

fn block_input_from_closure(input: &ClosureInput) -> BlockInput {
    match input.kind {
        RefKind::Required => BlockInput::Required {
            name: input.name.clone(),
            ty: input.ty.clone(),
        },
        RefKind::Optional | RefKind::Computed => BlockInput::Optional {
            name: input.name.clone(),
            ty: input.ty.clone().ensure_optional(),
        },
    }
}
