// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Closure analysis: what a group of workflow elements reads and publishes.
//!
//! For a block (or a whole workflow body) the analyzer computes two sets:
//!
//! - **Outputs**: every declaration, plus one entry per callee output of
//!   every call, named `alias.output`. Outputs are computed first and in
//!   source order. A conditional lifts its body's output types into
//!   `Optional`; a scatter lifts them into `Array` (non-empty when the
//!   scattered collection is) and drops the loop variable.
//! - **Inputs**: every identifier referenced by any contained expression
//!   whose binding site is outside the group. An identifier referenced
//!   under several kinds takes the minimum of
//!   `Required < Optional < Computed`; conflicting types are fatal.
//!   References that resolve to the group's own outputs are filtered,
//!   which also takes care of forward references.

use crate::error::{CompileError, Result};
use crate::frontend::{CallSite, Expr, RefKind, VarRef, WorkflowElement, simple};
use cumulus_ir::{Type, names};
use std::collections::HashMap;

/// The typed interface of a callable, as seen from a call site.
#[derive(Debug, Clone)]
pub struct CalleeSignature {
    /// Input names and types, in declaration order.
    pub inputs: Vec<(String, Type)>,
    /// Output names and types, in declaration order.
    pub outputs: Vec<(String, Type)>,
}

/// Callee signatures by callable name.
pub type SignatureMap = HashMap<String, CalleeSignature>;

/// One value a group of elements publishes.
#[derive(Debug, Clone)]
pub struct BlockOutput {
    /// Encoded name (`z`, `align___bam`).
    pub name: String,
    /// The published type, after lifting.
    pub ty: Type,
    /// The defining expression, when one exists at this level.
    pub expr: Option<Expr>,
}

/// One value a group of elements reads from outside itself.
#[derive(Debug, Clone)]
pub struct ClosureInput {
    /// Encoded name.
    pub name: String,
    /// The referenced type.
    pub ty: Type,
    /// Effective kind after merging all references.
    pub kind: RefKind,
}

/// The closure of one group of elements.
#[derive(Debug, Clone)]
pub struct Closure {
    /// Values read from outside.
    pub inputs: Vec<ClosureInput>,
    /// Values published.
    pub outputs: Vec<BlockOutput>,
}

/// Compute the closure of a group of elements.
pub fn analyze(elements: &[WorkflowElement], callees: &SignatureMap) -> Result<Closure> {
    let outputs = element_outputs(elements, callees)?;
    let inputs = element_inputs(elements, &outputs)?;
    Ok(Closure { inputs, outputs })
}

/// Everything `elements` publishes, in source order.
pub fn element_outputs(
    elements: &[WorkflowElement],
    callees: &SignatureMap,
) -> Result<Vec<BlockOutput>> {
    let mut outputs: Vec<BlockOutput> = Vec::new();
    for element in elements {
        match element {
            WorkflowElement::Declaration(decl) => {
                push_output(
                    &mut outputs,
                    BlockOutput {
                        name: names::encode(&decl.name)?,
                        ty: decl.ty.normalize(),
                        expr: decl.expr.clone(),
                    },
                )?;
            }
            WorkflowElement::Call(call) => {
                for output in call_outputs(call, callees)? {
                    push_output(&mut outputs, output)?;
                }
            }
            WorkflowElement::Conditional(conditional) => {
                for inner in element_outputs(&conditional.body, callees)? {
                    push_output(
                        &mut outputs,
                        BlockOutput {
                            name: inner.name,
                            ty: inner.ty.ensure_optional(),
                            expr: inner.expr,
                        },
                    )?;
                }
            }
            WorkflowElement::Scatter(scatter) => {
                let loop_var = names::encode(&scatter.variable)?;
                for inner in element_outputs(&scatter.body, callees)? {
                    if inner.name == loop_var {
                        continue;
                    }
                    push_output(
                        &mut outputs,
                        BlockOutput {
                            name: inner.name,
                            ty: Type::Array {
                                item: Box::new(inner.ty),
                                non_empty: scatter.non_empty(),
                            }
                            .normalize(),
                            expr: inner.expr,
                        },
                    )?;
                }
            }
        }
    }
    Ok(outputs)
}

/// The outputs a single call publishes: one per callee output, named
/// `alias.output` and typed as the callee declares.
pub fn call_outputs(call: &CallSite, callees: &SignatureMap) -> Result<Vec<BlockOutput>> {
    let signature = callees
        .get(&call.callee)
        .ok_or_else(|| CompileError::UnknownCallee {
            callee: call.callee.clone(),
        })?;
    let binding = call.binding_name();
    signature
        .outputs
        .iter()
        .map(|(output_name, output_type)| {
            Ok(BlockOutput {
                name: names::encode_segments(&[binding, output_name])?,
                ty: output_type.normalize(),
                expr: Some(simple::var(
                    &format!("{}.{}", binding, output_name),
                    output_type.clone(),
                )),
            })
        })
        .collect()
}

/// Everything `elements` reads that `outputs` does not provide.
pub fn element_inputs(
    elements: &[WorkflowElement],
    outputs: &[BlockOutput],
) -> Result<Vec<ClosureInput>> {
    let mut refs: Vec<VarRef> = Vec::new();
    collect_refs(elements, &mut refs);

    let mut ordered: Vec<ClosureInput> = Vec::new();
    for var_ref in refs {
        let name = names::encode_segments(
            &var_ref.path.iter().map(String::as_str).collect::<Vec<_>>(),
        )?;
        if outputs.iter().any(|output| output.name == name) {
            continue;
        }
        let ty = var_ref.ty.normalize();
        match ordered.iter_mut().find(|input| input.name == name) {
            Some(existing) => {
                if existing.ty != ty {
                    return Err(CompileError::ClosureConflict {
                        name,
                        first: existing.ty.to_string(),
                        second: ty.to_string(),
                    });
                }
                existing.kind = existing.kind.min(var_ref.kind);
            }
            None => ordered.push(ClosureInput {
                name,
                ty,
                kind: var_ref.kind,
            }),
        }
    }
    Ok(ordered)
}

/// Collect every free-variable reference under `elements`, in source
/// order. Scatter loop variables are rewritten to `Computed` references
/// so the fragment executor knows to supply them.
fn collect_refs(elements: &[WorkflowElement], refs: &mut Vec<VarRef>) {
    for element in elements {
        match element {
            WorkflowElement::Declaration(decl) => {
                if let Some(expr) = &decl.expr {
                    refs.extend(expr.free_variables(&decl.ty, false));
                }
            }
            WorkflowElement::Call(call) => {
                for (_, expr) in &call.inputs {
                    refs.extend(expr.free_variables(&Type::Any, false));
                }
            }
            WorkflowElement::Conditional(conditional) => {
                refs.extend(conditional.condition.free_variables(&Type::Boolean, false));
                collect_refs(&conditional.body, refs);
            }
            WorkflowElement::Scatter(scatter) => {
                refs.extend(
                    scatter
                        .collection
                        .free_variables(&scatter.collection_type, false),
                );
                let mut body_refs = Vec::new();
                collect_refs(&scatter.body, &mut body_refs);
                for mut body_ref in body_refs {
                    if body_ref.path.first().map(String::as_str) == Some(scatter.variable.as_str())
                    {
                        body_ref.kind = RefKind::Computed;
                    }
                    refs.push(body_ref);
                }
            }
        }
    }
}

fn push_output(outputs: &mut Vec<BlockOutput>, output: BlockOutput) -> Result<()> {
    if let Some(existing) = outputs.iter().find(|o| o.name == output.name) {
        if existing.ty != output.ty {
            return Err(CompileError::ClosureConflict {
                name: output.name,
                first: existing.ty.to_string(),
                second: output.ty.to_string(),
            });
        }
        return Ok(());
    }
    outputs.push(output);
    Ok(())
}
