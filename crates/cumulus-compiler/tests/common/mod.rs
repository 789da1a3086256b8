// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared fixtures for translation tests: a tiny arithmetic task library
//! and document builders over the simple expression front-end.

use cumulus_compiler::frontend::{
    CallSite, Document, Expr, IoDecl, OutputDecl, RuntimeHints, TaskDef, WorkflowDef,
    WorkflowElement,
};
use cumulus_ir::{LanguageTag, Type};

/// A task taking `Int` inputs and producing `Int result`.
pub fn int_task(name: &str, inputs: &[&str]) -> TaskDef {
    TaskDef {
        name: name.to_string(),
        inputs: inputs
            .iter()
            .map(|input| IoDecl::new(*input, Type::Int))
            .collect(),
        outputs: vec![IoDecl::new("result", Type::Int)],
        runtime: RuntimeHints::default(),
        container: None,
        source: format!("task {} {{ }}", name),
        attributes: vec![],
    }
}

/// A call element with named arguments.
pub fn call(callee: &str, inputs: Vec<(&str, Expr)>) -> WorkflowElement {
    WorkflowElement::Call(CallSite {
        callee: callee.to_string(),
        alias: None,
        inputs: inputs
            .into_iter()
            .map(|(name, expr)| (name.to_string(), expr))
            .collect(),
    })
}

/// A workflow with `Int` inputs and the given body and outputs.
pub fn workflow(
    name: &str,
    inputs: &[&str],
    body: Vec<WorkflowElement>,
    outputs: Vec<(&str, Type, Expr)>,
) -> WorkflowDef {
    WorkflowDef {
        name: name.to_string(),
        inputs: inputs
            .iter()
            .map(|input| IoDecl::new(*input, Type::Int))
            .collect(),
        outputs: outputs
            .into_iter()
            .map(|(output_name, ty, expr)| OutputDecl {
                name: output_name.to_string(),
                ty,
                expr,
            })
            .collect(),
        body,
        source: format!("workflow {} {{ }}", name),
        attributes: vec![],
    }
}

/// A document holding the given tasks and one workflow.
pub fn document(tasks: Vec<TaskDef>, workflows: Vec<WorkflowDef>) -> Document {
    Document {
        language: LanguageTag::Wdl,
        tasks,
        workflows,
        primary: None,
        type_aliases: vec![],
    }
}
