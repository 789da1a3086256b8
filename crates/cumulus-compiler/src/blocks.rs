// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Block decomposition of workflow bodies.
//!
//! A block is a maximal contiguous group of workflow elements executable
//! as a single platform stage: it contains at most one stage-addressable
//! call site, and that call site is its last element. The walk is
//! left-to-right: declarations and call-free conditionals/scatters join
//! the open block; a call, or a conditional/scatter that transitively
//! contains one, seals it. Empty blocks are dropped after the walk.

use crate::closure::{self, Closure, SignatureMap};
use crate::error::{CompileError, Result};
use crate::frontend::{ConstResult, Expr, WorkflowElement};
use cumulus_ir::{Type, Value};

/// How a block executes on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Declarations only; no call anywhere.
    ExpressionsOnly,
    /// A single call whose inputs are all trivial: the stage references
    /// the callee applet directly, no fragment needed.
    CallDirect,
    /// A single call with at least one non-trivial input.
    CallWithSubexpressions,
    /// Declarations followed by a call.
    CallFragment,
    /// A conditional whose body is a single simple call.
    ConditionalOneCall,
    /// A conditional with anything else inside.
    ConditionalComplex,
    /// A scatter whose body is a single simple call.
    ScatterOneCall,
    /// A scatter with anything else inside.
    ScatterComplex,
}

impl BlockKind {
    /// Whether a block of this kind needs a runtime fragment applet.
    pub fn needs_fragment(&self) -> bool {
        !matches!(self, BlockKind::CallDirect)
    }
}

/// How one block input is supplied.
#[derive(Debug, Clone)]
pub enum BlockInput {
    /// The caller must provide a value.
    Required {
        /// Encoded name.
        name: String,
        /// Declared type.
        ty: Type,
    },
    /// A constant default applies when the caller omits the value.
    StaticDefault {
        /// Encoded name.
        name: String,
        /// Declared type.
        ty: Type,
        /// The folded default.
        default: Value,
    },
    /// The default expression did not fold; the parameter is demoted to
    /// optional and the fragment executor evaluates the expression at
    /// runtime when the caller omits the value.
    DynamicDefault {
        /// Encoded name.
        name: String,
        /// Declared type, wrapped optional.
        ty: Type,
        /// The unfolded default expression.
        expr: Expr,
    },
    /// The caller may omit the value.
    Optional {
        /// Encoded name.
        name: String,
        /// Declared type.
        ty: Type,
    },
}

impl BlockInput {
    /// The encoded parameter name.
    pub fn name(&self) -> &str {
        match self {
            BlockInput::Required { name, .. }
            | BlockInput::StaticDefault { name, .. }
            | BlockInput::DynamicDefault { name, .. }
            | BlockInput::Optional { name, .. } => name,
        }
    }

    /// The parameter type.
    pub fn ty(&self) -> &Type {
        match self {
            BlockInput::Required { ty, .. }
            | BlockInput::StaticDefault { ty, .. }
            | BlockInput::DynamicDefault { ty, .. }
            | BlockInput::Optional { ty, .. } => ty,
        }
    }

    /// Build a block input from a declared name, type, and optional
    /// default expression, demoting unfoldable defaults to optional.
    pub fn from_declaration(name: String, ty: &Type, default: Option<&Expr>) -> Self {
        let ty = ty.normalize();
        match default {
            None if ty.is_optional() => BlockInput::Optional { name, ty },
            None => BlockInput::Required { name, ty },
            Some(expr) => match expr.try_const_eval(&ty) {
                ConstResult::Const(value) => BlockInput::StaticDefault {
                    name,
                    ty,
                    default: value,
                },
                ConstResult::NonConstant(_) => BlockInput::DynamicDefault {
                    name,
                    ty: ty.ensure_optional(),
                    expr: expr.clone(),
                },
            },
        }
    }
}

/// A decomposed block with its closure.
#[derive(Debug, Clone)]
pub struct Block {
    /// The elements, in source order; the call-carrying element is last.
    pub elements: Vec<WorkflowElement>,
    /// The block's closure (inputs read, outputs published).
    pub closure: Closure,
    /// How the block executes.
    pub kind: BlockKind,
}

impl Block {
    /// The call-carrying last element, when there is one.
    pub fn call_element(&self) -> Option<&WorkflowElement> {
        match self.kind {
            BlockKind::ExpressionsOnly => None,
            _ => self.elements.last(),
        }
    }
}

/// Partition `elements` into block element groups.
pub fn split_into_blocks(elements: &[WorkflowElement]) -> Vec<Vec<WorkflowElement>> {
    let mut partitions: Vec<Vec<WorkflowElement>> = Vec::new();
    let mut open: Vec<WorkflowElement> = Vec::new();
    for element in elements {
        let seals = element.contains_call();
        open.push(element.clone());
        if seals {
            partitions.push(std::mem::take(&mut open));
        }
    }
    if !open.is_empty() {
        partitions.push(open);
    }
    partitions.retain(|partition| !partition.is_empty());
    partitions
}

/// Classify one block's elements.
///
/// Fails with an internal error when the one-call-and-last invariant does
/// not hold; [`split_into_blocks`] never produces such a group.
pub fn classify(elements: &[WorkflowElement]) -> Result<BlockKind> {
    let call_carriers = elements
        .iter()
        .filter(|element| element.contains_call())
        .count();
    if call_carriers == 0 {
        return Ok(BlockKind::ExpressionsOnly);
    }
    if call_carriers > 1 {
        return Err(CompileError::BlockShape(format!(
            "{} call-carrying elements in one block",
            call_carriers
        )));
    }
    let last = elements.last().expect("non-empty block");
    if !last.contains_call() {
        return Err(CompileError::BlockShape(
            "call-carrying element is not last".to_string(),
        ));
    }

    Ok(match last {
        WorkflowElement::Call(call) if elements.len() == 1 && call.all_inputs_trivial() => {
            BlockKind::CallDirect
        }
        WorkflowElement::Call(_) if elements.len() == 1 => BlockKind::CallWithSubexpressions,
        WorkflowElement::Call(_) => BlockKind::CallFragment,
        WorkflowElement::Conditional(conditional) => {
            if is_single_simple_call(&conditional.body) {
                BlockKind::ConditionalOneCall
            } else {
                BlockKind::ConditionalComplex
            }
        }
        WorkflowElement::Scatter(scatter) => {
            if is_single_simple_call(&scatter.body) {
                BlockKind::ScatterOneCall
            } else {
                BlockKind::ScatterComplex
            }
        }
        WorkflowElement::Declaration(_) => {
            return Err(CompileError::BlockShape(
                "declaration reported as call-carrying".to_string(),
            ));
        }
    })
}

fn is_single_simple_call(body: &[WorkflowElement]) -> bool {
    match body {
        [WorkflowElement::Call(call)] => call.all_inputs_trivial(),
        _ => false,
    }
}

/// Decompose a workflow body into blocks with closures.
pub fn build_blocks(
    elements: &[WorkflowElement],
    callees: &SignatureMap,
) -> Result<Vec<Block>> {
    split_into_blocks(elements)
        .into_iter()
        .map(|group| {
            let kind = classify(&group)?;
            let closure = closure::analyze(&group, callees)?;
            Ok(Block {
                elements: group,
                closure,
                kind,
            })
        })
        .collect()
}
