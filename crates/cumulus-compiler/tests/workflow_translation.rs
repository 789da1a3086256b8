// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end translation tests: documents through block decomposition,
//! closure analysis, and workflow translation into sealed bundles.

mod common;

use common::{call, document, int_task, workflow};
use cumulus_compiler::frontend::{Conditional, Declaration, Scatter, WorkflowElement, simple};
use cumulus_compiler::translate_document;
use cumulus_ir::{
    AppKind, Callable, CompileOptions, StageInput, Type, Value, WorkflowLevel,
};

fn linear_document() -> cumulus_compiler::frontend::Document {
    // workflow linear(Int x, Int y):
    //   call add(a=x, b=y)
    //   call mul(a=add.result, b=2)
    //   call inc(a=mul.result)
    //   output Int r = inc.result
    document(
        vec![
            int_task("add", &["a", "b"]),
            int_task("mul", &["a", "b"]),
            int_task("inc", &["a"]),
        ],
        vec![workflow(
            "linear",
            &["x", "y"],
            vec![
                call(
                    "add",
                    vec![
                        ("a", simple::var("x", Type::Int)),
                        ("b", simple::var("y", Type::Int)),
                    ],
                ),
                call(
                    "mul",
                    vec![
                        ("a", simple::var("add.result", Type::Int)),
                        ("b", simple::int(2)),
                    ],
                ),
                call("inc", vec![("a", simple::var("mul.result", Type::Int))]),
            ],
            vec![("r", Type::Int, simple::var("inc.result", Type::Int))],
        )],
    )
}

#[test]
fn test_trivial_linear_workflow_locked() {
    let options = CompileOptions {
        locked: true,
        ..CompileOptions::default()
    };
    let bundle = translate_document(&linear_document(), &options).unwrap();

    assert_eq!(bundle.dependencies(), &["add", "mul", "inc", "linear"]);

    let Some(Callable::Workflow(wf)) = bundle.callable("linear") else {
        panic!("missing linear workflow");
    };
    assert!(wf.locked);
    assert_eq!(wf.level, WorkflowLevel::Top);
    // Three direct stages, no common/outputs applets, no fragments.
    assert_eq!(wf.stages.len(), 3);
    assert_eq!(wf.stages[0].callee, "add");
    assert_eq!(wf.stages[1].callee, "mul");
    assert_eq!(wf.stages[2].callee, "inc");
    for name in bundle.dependencies() {
        if let Some(Callable::Application(app)) = bundle.callable(name) {
            assert!(matches!(app.kind, AppKind::Applet), "unexpected {name}");
        }
    }
}

#[test]
fn test_linear_workflow_stage_wiring() {
    let options = CompileOptions {
        locked: true,
        ..CompileOptions::default()
    };
    let bundle = translate_document(&linear_document(), &options).unwrap();
    let Some(Callable::Workflow(wf)) = bundle.callable("linear") else {
        panic!("missing linear workflow");
    };

    // add reads both workflow inputs.
    assert_eq!(
        wf.stages[0].inputs,
        vec![
            StageInput::WorkflowInput {
                param: "x".to_string()
            },
            StageInput::WorkflowInput {
                param: "y".to_string()
            },
        ]
    );
    // mul links to add and carries the constant.
    assert_eq!(
        wf.stages[1].inputs,
        vec![
            StageInput::Link {
                stage_id: "stage-0".to_string(),
                param: "result".to_string()
            },
            StageInput::Static {
                value: Value::Int(2)
            },
        ]
    );
    // The workflow output links to the last evaluating stage.
    assert_eq!(wf.outputs.len(), 1);
    assert_eq!(wf.outputs[0].0.name, "r");
    assert_eq!(
        wf.outputs[0].1,
        StageInput::Link {
            stage_id: "stage-2".to_string(),
            param: "result".to_string()
        }
    );
}

#[test]
fn test_trivial_linear_workflow_unlocked() {
    let bundle = translate_document(&linear_document(), &CompileOptions::default()).unwrap();
    let Some(Callable::Workflow(wf)) = bundle.callable("linear") else {
        panic!("missing linear workflow");
    };
    assert!(!wf.locked);

    // Common applet first, outputs applet last, three calls between.
    assert_eq!(wf.stages.len(), 5);
    assert_eq!(wf.stages[0].id, "stage-common");
    assert_eq!(wf.stages.last().unwrap().id, "stage-outputs");

    let Some(Callable::Application(common)) = bundle.callable("linear_common") else {
        panic!("missing common applet");
    };
    assert!(matches!(common.kind, AppKind::WorkflowCommonInputs));

    let Some(Callable::Application(outputs)) = bundle.callable("linear_outputs") else {
        panic!("missing outputs applet");
    };
    assert!(matches!(outputs.kind, AppKind::WorkflowOutputs { .. }));

    // Unlocked workflow inputs are not wired at the workflow level.
    assert!(wf.inputs.iter().all(|(_, wiring)| *wiring == StageInput::Empty));
}

#[test]
fn test_fragment_with_expression_closure() {
    // call add(a=x, b=y); Int z = add.result + 1; call mul(a=z, b=5)
    let doc = document(
        vec![int_task("add", &["a", "b"]), int_task("mul", &["a", "b"])],
        vec![workflow(
            "calc",
            &["x", "y"],
            vec![
                call(
                    "add",
                    vec![
                        ("a", simple::var("x", Type::Int)),
                        ("b", simple::var("y", Type::Int)),
                    ],
                ),
                WorkflowElement::Declaration(Declaration {
                    name: "z".to_string(),
                    ty: Type::Int,
                    expr: Some(simple::add(
                        simple::var("add.result", Type::Int),
                        simple::int(1),
                    )),
                }),
                call(
                    "mul",
                    vec![("a", simple::var("z", Type::Int)), ("b", simple::int(5))],
                ),
            ],
            vec![("r", Type::Int, simple::var("mul.result", Type::Int))],
        )],
    );
    let options = CompileOptions {
        locked: true,
        ..CompileOptions::default()
    };
    let bundle = translate_document(&doc, &options).unwrap();

    let Some(Callable::Workflow(wf)) = bundle.callable("calc") else {
        panic!("missing workflow");
    };
    assert_eq!(wf.stages.len(), 2);
    assert_eq!(wf.stages[0].callee, "add");

    let Some(Callable::Application(fragment)) = bundle.callable(&wf.stages[1].callee) else {
        panic!("missing fragment applet");
    };
    let AppKind::WorkflowFragment {
        call_names,
        scatter_var,
        ..
    } = &fragment.kind
    else {
        panic!("second stage is not a fragment");
    };
    assert_eq!(call_names, &["mul"]);
    assert_eq!(*scatter_var, None);

    // Closure inputs: only the add result; closure outputs: z and the
    // call result.
    let input_names: Vec<&str> = fragment.inputs.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(input_names, vec!["add___result"]);
    assert_eq!(fragment.inputs[0].ty, Type::Int);

    let output_names: Vec<&str> = fragment.outputs.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(output_names, vec!["z", "mul___result"]);

    // The fragment stage links its input to the add stage.
    assert_eq!(
        wf.stages[1].inputs,
        vec![StageInput::Link {
            stage_id: "stage-0".to_string(),
            param: "result".to_string()
        }]
    );
}

#[test]
fn test_conditional_around_single_call() {
    // if (flag) { call inc(a=x) }
    let mut doc = document(
        vec![int_task("inc", &["a"])],
        vec![workflow(
            "maybe",
            &["x"],
            vec![WorkflowElement::Conditional(Conditional {
                condition: simple::var("flag", Type::Boolean),
                body: vec![call("inc", vec![("a", simple::var("x", Type::Int))])],
            })],
            vec![(
                "r",
                Type::Optional(Box::new(Type::Int)),
                simple::var("inc.result", Type::Optional(Box::new(Type::Int))),
            )],
        )],
    );
    doc.workflows[0]
        .inputs
        .push(cumulus_compiler::frontend::IoDecl::new("flag", Type::Boolean));

    let options = CompileOptions {
        locked: true,
        ..CompileOptions::default()
    };
    let bundle = translate_document(&doc, &options).unwrap();
    let Some(Callable::Workflow(wf)) = bundle.callable("maybe") else {
        panic!("missing workflow");
    };
    assert_eq!(wf.stages.len(), 1);

    let Some(Callable::Application(fragment)) = bundle.callable(&wf.stages[0].callee) else {
        panic!("missing fragment");
    };
    let AppKind::WorkflowFragment { call_names, .. } = &fragment.kind else {
        panic!("expected fragment kind");
    };
    assert_eq!(call_names, &["inc"]);

    // The conditional lifts the call output to optional.
    let result = fragment
        .outputs
        .iter()
        .find(|p| p.name == "inc___result")
        .expect("lifted output");
    assert_eq!(result.ty, Type::Optional(Box::new(Type::Int)));
}

#[test]
fn test_scatter_over_non_empty_array() {
    // scatter (i in [1, 2, 3]) { call sq(a=i) }
    let items = Type::Array {
        item: Box::new(Type::Int),
        non_empty: true,
    };
    let doc = document(
        vec![int_task("sq", &["a"])],
        vec![workflow(
            "squares",
            &[],
            vec![WorkflowElement::Scatter(Scatter {
                variable: "i".to_string(),
                collection: simple::array(
                    vec![simple::int(1), simple::int(2), simple::int(3)],
                    Type::Int,
                ),
                collection_type: items.clone(),
                body: vec![call("sq", vec![("a", simple::var("i", Type::Int))])],
            })],
            vec![(
                "r",
                items.clone(),
                simple::var("sq.result", items.clone()),
            )],
        )],
    );
    let options = CompileOptions {
        locked: true,
        scatter_chunk_size: 500,
        ..CompileOptions::default()
    };
    let bundle = translate_document(&doc, &options).unwrap();
    let Some(Callable::Workflow(wf)) = bundle.callable("squares") else {
        panic!("missing workflow");
    };
    let Some(Callable::Application(fragment)) = bundle.callable(&wf.stages[0].callee) else {
        panic!("missing fragment");
    };
    let AppKind::WorkflowFragment {
        call_names,
        scatter_var,
        scatter_chunk_size,
        ..
    } = &fragment.kind
    else {
        panic!("expected fragment kind");
    };
    assert_eq!(call_names, &["sq"]);
    assert_eq!(scatter_var.as_deref(), Some("i"));
    assert_eq!(*scatter_chunk_size, Some(500));

    // The scatter lifts the call output to a non-empty array.
    let result = fragment
        .outputs
        .iter()
        .find(|p| p.name == "sq___result")
        .expect("lifted output");
    assert_eq!(result.ty, items);
}

#[test]
fn test_complex_conditional_becomes_sub_workflow() {
    // if (flag) { call add(a=x, b=1); call mul(a=add.result, b=2) }
    let mut doc = document(
        vec![int_task("add", &["a", "b"]), int_task("mul", &["a", "b"])],
        vec![workflow(
            "branchy",
            &["x"],
            vec![WorkflowElement::Conditional(Conditional {
                condition: simple::var("flag", Type::Boolean),
                body: vec![
                    call(
                        "add",
                        vec![("a", simple::var("x", Type::Int)), ("b", simple::int(1))],
                    ),
                    call(
                        "mul",
                        vec![
                            ("a", simple::var("add.result", Type::Int)),
                            ("b", simple::int(2)),
                        ],
                    ),
                ],
            })],
            vec![(
                "r",
                Type::Optional(Box::new(Type::Int)),
                simple::var("mul.result", Type::Optional(Box::new(Type::Int))),
            )],
        )],
    );
    doc.workflows[0]
        .inputs
        .push(cumulus_compiler::frontend::IoDecl::new("flag", Type::Boolean));

    let options = CompileOptions {
        locked: true,
        ..CompileOptions::default()
    };
    let bundle = translate_document(&doc, &options).unwrap();

    // A locked sub-workflow was generated for the body, and the fragment
    // calls it rather than the tasks directly.
    let Some(Callable::Workflow(sub)) = bundle.callable("branchy_block_0") else {
        panic!("missing generated sub-workflow");
    };
    assert!(sub.locked);
    assert_eq!(sub.level, WorkflowLevel::Sub);
    assert_eq!(sub.stages.len(), 2);

    let Some(Callable::Workflow(wf)) = bundle.callable("branchy") else {
        panic!("missing workflow");
    };
    let Some(Callable::Application(fragment)) = bundle.callable(&wf.stages[0].callee) else {
        panic!("missing fragment");
    };
    let AppKind::WorkflowFragment { call_names, .. } = &fragment.kind else {
        panic!("expected fragment kind");
    };
    assert_eq!(call_names, &["branchy_block_0"]);

    // Dependency order: tasks, then the sub-workflow, then the fragment,
    // then the top workflow.
    let index = |name: &str| {
        bundle
            .dependencies()
            .iter()
            .position(|n| n == name)
            .unwrap_or_else(|| panic!("{name} not in dependencies"))
    };
    assert!(index("add") < index("branchy_block_0"));
    assert!(index("mul") < index("branchy_block_0"));
    assert!(index("branchy_block_0") < index(&wf.stages[0].callee));
    assert!(index(&wf.stages[0].callee) < index("branchy"));
}

#[test]
fn test_reorg_applet_is_appended_last() {
    let options = CompileOptions {
        locked: true,
        reorg: true,
        ..CompileOptions::default()
    };
    let bundle = translate_document(&linear_document(), &options).unwrap();
    let Some(Callable::Workflow(wf)) = bundle.callable("linear") else {
        panic!("missing workflow");
    };
    let last = wf.stages.last().unwrap();
    assert_eq!(last.id, "stage-reorg");

    let Some(Callable::Application(reorg)) = bundle.callable(&last.callee) else {
        panic!("missing reorg applet");
    };
    assert!(matches!(reorg.kind, AppKind::WorkflowOutputReorg));
    // The reorg stage reads every workflow output.
    assert_eq!(last.inputs.len(), wf.outputs.len());
}

#[test]
fn test_dynamic_default_generates_common_applet_in_locked_mode() {
    let mut doc = linear_document();
    // Give y a default that cannot fold: y = x + 1.
    doc.workflows[0].inputs[1].default = Some(simple::add(
        simple::var("x", Type::Int),
        simple::int(1),
    ));
    let options = CompileOptions {
        locked: true,
        ..CompileOptions::default()
    };
    let bundle = translate_document(&doc, &options).unwrap();
    let Some(Callable::Workflow(wf)) = bundle.callable("linear") else {
        panic!("missing workflow");
    };
    assert_eq!(wf.stages[0].id, "stage-common");

    // The demoted input is optional on the workflow surface.
    let y = wf.inputs.iter().find(|(p, _)| p.name == "y").unwrap();
    assert_eq!(y.0.ty, Type::Optional(Box::new(Type::Int)));
}

#[test]
fn test_duplicate_workflow_names_are_rejected() {
    let doc = document(
        vec![int_task("add", &["a", "b"])],
        vec![
            workflow("dup", &[], vec![], vec![]),
            workflow("dup", &[], vec![], vec![]),
        ],
    );
    let err = translate_document(&doc, &CompileOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        cumulus_compiler::CompileError::UnsupportedConstruct(_)
    ));
}
