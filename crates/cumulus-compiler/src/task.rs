// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Translation of a single task or tool into an Application.

use crate::error::Result;
use crate::frontend::{ConstResult, Expr, IoDecl, RuntimeHints, TaskDef};
use cumulus_ir::{
    Application, AppKind, CompileOptions, ContainerImage, InstanceType, InstanceTypeSelection,
    LanguageTag, Parameter, RuntimeResources, SourceCode, Type, Value, names,
    wire::PLATFORM_URI_PREFIX,
};
use tracing::debug;

/// Translate one task/tool into an applet Application.
pub fn translate_task(
    task: &TaskDef,
    language: LanguageTag,
    options: &CompileOptions,
) -> Result<Application> {
    let inputs = task
        .inputs
        .iter()
        .map(build_input_parameter)
        .collect::<Result<Vec<_>>>()?;
    let outputs = task
        .outputs
        .iter()
        .map(build_output_parameter)
        .collect::<Result<Vec<_>>>()?;

    let instance_type = resolve_instance_type(&task.runtime, options);
    let container = resolve_container(task.container.as_ref());

    debug!(
        task = %task.name,
        instance_type = ?instance_type,
        container = ?container,
        "translated task"
    );

    Ok(Application {
        name: names::encode(&task.name)?,
        inputs,
        outputs,
        instance_type,
        container,
        kind: AppKind::Applet,
        source: SourceCode {
            language,
            text: task.source.clone(),
        },
        attributes: task.attributes.clone(),
        requirements: Vec::new(),
        tags: Vec::new(),
        properties: Vec::new(),
    })
}

/// Build one input parameter. A default that folds to a constant (and is
/// not a local path, which only exists on the submitting machine) is
/// attached; any other default demotes the parameter to optional and is
/// re-evaluated at runtime.
fn build_input_parameter(io: &IoDecl) -> Result<Parameter> {
    let ty = io.ty.normalize();
    let (ty, default) = match &io.default {
        None => (ty, None),
        Some(expr) => match expr.try_const_eval(&ty) {
            ConstResult::Const(value) if !is_local_path(&value) => (ty, Some(value)),
            _ => (ty.ensure_optional(), None),
        },
    };
    Ok(Parameter {
        name: names::encode(&io.name)?,
        ty,
        default,
        attributes: io.attributes.clone(),
    })
}

/// Build one output parameter. Output expressions are always evaluated by
/// the task executor after the command finishes, so no default attaches.
fn build_output_parameter(io: &IoDecl) -> Result<Parameter> {
    Ok(Parameter {
        name: names::encode(&io.name)?,
        ty: io.ty.normalize(),
        default: None,
        attributes: io.attributes.clone(),
    })
}

/// A file value whose URI has no scheme refers to the submitting machine
/// and cannot be a compile-time default.
fn is_local_path(value: &Value) -> bool {
    match value {
        Value::File(file) => !file.uri.contains("://") && !file.uri.starts_with("file-"),
        Value::Folder { uri, .. } => !uri.contains("://"),
        Value::Array(items) => items.iter().any(is_local_path),
        _ => false,
    }
}

/// Resolve the instance type from a task's resource hints:
///
/// - a hard-coded instance name that folds wins outright;
/// - all hints (after filling holes from the configured defaults)
///   constant, and selection mode static, resolves at compile time;
/// - any unfoldable hint, or dynamic selection mode, defers to runtime;
/// - nothing specified anywhere means the platform default.
fn resolve_instance_type(hints: &RuntimeHints, options: &CompileOptions) -> InstanceType {
    if let Some(name_expr) = &hints.instance_name {
        return match name_expr.try_const_eval(&Type::String) {
            ConstResult::Const(Value::String(name)) => InstanceType::StaticName(name),
            _ => InstanceType::Dynamic,
        };
    }

    let defaults = &options.default_runtime_attrs;
    if hints.is_empty() {
        if let Some(name) = &defaults.instance_type {
            return InstanceType::StaticName(name.clone());
        }
        if defaults.resources.is_empty() {
            return InstanceType::Default;
        }
    }

    let cpu = match fold_resource(hints.cpu.as_ref(), &Type::Float) {
        Folded::Absent => None,
        Folded::Constant(Value::Float(x)) => Some(x),
        Folded::Constant(_) | Folded::Runtime => return InstanceType::Dynamic,
    };
    let memory_mb = match fold_resource(hints.memory_mb.as_ref(), &Type::Int) {
        Folded::Absent => None,
        Folded::Constant(Value::Int(i)) => Some(i),
        Folded::Constant(_) | Folded::Runtime => return InstanceType::Dynamic,
    };
    let disk_gb = match fold_resource(hints.disk_gb.as_ref(), &Type::Int) {
        Folded::Absent => None,
        Folded::Constant(Value::Int(i)) => Some(i),
        Folded::Constant(_) | Folded::Runtime => return InstanceType::Dynamic,
    };

    let resources = RuntimeResources {
        cpu,
        memory_mb,
        disk_gb,
    }
    .or_defaults(&defaults.resources);

    match options.instance_type_selection {
        InstanceTypeSelection::Static => InstanceType::StaticResources(resources),
        InstanceTypeSelection::Dynamic => InstanceType::Dynamic,
    }
}

enum Folded {
    Absent,
    Constant(Value),
    Runtime,
}

fn fold_resource(expr: Option<&Expr>, target: &Type) -> Folded {
    match expr {
        None => Folded::Absent,
        Some(expr) => match expr.try_const_eval(target) {
            ConstResult::Const(value) => Folded::Constant(value),
            ConstResult::NonConstant(_) => Folded::Runtime,
        },
    }
}

/// Classify the container image:
///
/// - none declared runs directly on the instance;
/// - a constant platform URI (`dx://project:file`) is a platform file the
///   compiler guarantees is accessible at runtime;
/// - any other constant is a network registry reference;
/// - an unfoldable expression is resolved by the executor at launch, and
///   rendered here in its pretty-printed form.
fn resolve_container(container: Option<&Expr>) -> ContainerImage {
    let Some(expr) = container else {
        return ContainerImage::NoImage;
    };
    match expr.try_const_eval(&Type::String) {
        ConstResult::Const(Value::String(image)) => {
            if image.starts_with(PLATFORM_URI_PREFIX) {
                ContainerImage::PlatformFile(image)
            } else {
                ContainerImage::Network(image)
            }
        }
        _ => ContainerImage::Network(expr.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::simple;
    use cumulus_ir::{DefaultRuntimeAttrs, FileValue};

    fn task(inputs: Vec<IoDecl>, runtime: RuntimeHints, container: Option<Expr>) -> TaskDef {
        TaskDef {
            name: "align".to_string(),
            inputs,
            outputs: vec![IoDecl::new("bam", Type::File)],
            runtime,
            container,
            source: "task align { }".to_string(),
            attributes: vec![],
        }
    }

    fn translate(task: &TaskDef, options: &CompileOptions) -> Application {
        translate_task(task, LanguageTag::Wdl, options).unwrap()
    }

    #[test]
    fn test_constant_default_attaches() {
        let mut io = IoDecl::new("threads", Type::Int);
        io.default = Some(simple::int(4));
        let app = translate(
            &task(vec![io], RuntimeHints::default(), None),
            &CompileOptions::default(),
        );
        assert_eq!(app.inputs[0].default, Some(Value::Int(4)));
        assert_eq!(app.inputs[0].ty, Type::Int);
    }

    #[test]
    fn test_dynamic_default_demotes_to_optional() {
        let mut io = IoDecl::new("threads", Type::Int);
        io.default = Some(simple::add(simple::var("n", Type::Int), simple::int(1)));
        let app = translate(
            &task(vec![io], RuntimeHints::default(), None),
            &CompileOptions::default(),
        );
        assert_eq!(app.inputs[0].default, None);
        assert_eq!(app.inputs[0].ty, Type::Optional(Box::new(Type::Int)));
    }

    #[test]
    fn test_local_path_default_is_not_attached() {
        let mut io = IoDecl::new("reference", Type::File);
        io.default = Some(simple::lit(Value::File(FileValue::new("/home/user/ref.fa"))));
        let app = translate(
            &task(vec![io], RuntimeHints::default(), None),
            &CompileOptions::default(),
        );
        assert_eq!(app.inputs[0].default, None);
        assert!(app.inputs[0].ty.is_optional());
    }

    #[test]
    fn test_platform_uri_default_is_attached() {
        let mut io = IoDecl::new("reference", Type::File);
        io.default = Some(simple::lit(Value::file("dx://project-1:file-2")));
        let app = translate(
            &task(vec![io], RuntimeHints::default(), None),
            &CompileOptions::default(),
        );
        assert!(app.inputs[0].default.is_some());
    }

    #[test]
    fn test_hard_coded_instance_name() {
        let runtime = RuntimeHints {
            instance_name: Some(simple::string("mem2_ssd1_v2_x16")),
            ..RuntimeHints::default()
        };
        let app = translate(&task(vec![], runtime, None), &CompileOptions::default());
        assert_eq!(
            app.instance_type,
            InstanceType::StaticName("mem2_ssd1_v2_x16".to_string())
        );
    }

    #[test]
    fn test_constant_resources_resolve_statically() {
        let runtime = RuntimeHints {
            cpu: Some(simple::int(8)),
            memory_mb: Some(simple::int(16384)),
            ..RuntimeHints::default()
        };
        let app = translate(&task(vec![], runtime, None), &CompileOptions::default());
        assert_eq!(
            app.instance_type,
            InstanceType::StaticResources(RuntimeResources {
                cpu: Some(8.0),
                memory_mb: Some(16384),
                disk_gb: None,
            })
        );
    }

    #[test]
    fn test_unfoldable_resource_goes_dynamic() {
        let runtime = RuntimeHints {
            cpu: Some(simple::int(8)),
            memory_mb: Some(simple::add(
                simple::var("input_gb", Type::Int),
                simple::int(1024),
            )),
            ..RuntimeHints::default()
        };
        let app = translate(&task(vec![], runtime, None), &CompileOptions::default());
        assert_eq!(app.instance_type, InstanceType::Dynamic);
    }

    #[test]
    fn test_dynamic_selection_overrides_constants() {
        let runtime = RuntimeHints {
            cpu: Some(simple::int(2)),
            ..RuntimeHints::default()
        };
        let options = CompileOptions {
            instance_type_selection: InstanceTypeSelection::Dynamic,
            ..CompileOptions::default()
        };
        let app = translate(&task(vec![], runtime, None), &options);
        assert_eq!(app.instance_type, InstanceType::Dynamic);
    }

    #[test]
    fn test_nothing_specified_means_default() {
        let app = translate(
            &task(vec![], RuntimeHints::default(), None),
            &CompileOptions::default(),
        );
        assert_eq!(app.instance_type, InstanceType::Default);
    }

    #[test]
    fn test_default_runtime_attrs_fill_holes() {
        let runtime = RuntimeHints {
            cpu: Some(simple::int(4)),
            ..RuntimeHints::default()
        };
        let options = CompileOptions {
            default_runtime_attrs: DefaultRuntimeAttrs {
                instance_type: None,
                resources: RuntimeResources {
                    cpu: None,
                    memory_mb: Some(4096),
                    disk_gb: Some(100),
                },
            },
            ..CompileOptions::default()
        };
        let app = translate(&task(vec![], runtime, None), &options);
        assert_eq!(
            app.instance_type,
            InstanceType::StaticResources(RuntimeResources {
                cpu: Some(4.0),
                memory_mb: Some(4096),
                disk_gb: Some(100),
            })
        );
    }

    #[test]
    fn test_default_instance_name_when_task_is_silent() {
        let options = CompileOptions {
            default_runtime_attrs: DefaultRuntimeAttrs {
                instance_type: Some("mem1_ssd1_v2_x4".to_string()),
                resources: RuntimeResources::default(),
            },
            ..CompileOptions::default()
        };
        let app = translate(&task(vec![], RuntimeHints::default(), None), &options);
        assert_eq!(
            app.instance_type,
            InstanceType::StaticName("mem1_ssd1_v2_x4".to_string())
        );
    }

    #[test]
    fn test_container_classification() {
        let no_image = translate(
            &task(vec![], RuntimeHints::default(), None),
            &CompileOptions::default(),
        );
        assert_eq!(no_image.container, ContainerImage::NoImage);

        let platform = translate(
            &task(
                vec![],
                RuntimeHints::default(),
                Some(simple::string("dx://project-1:file-9")),
            ),
            &CompileOptions::default(),
        );
        assert_eq!(
            platform.container,
            ContainerImage::PlatformFile("dx://project-1:file-9".to_string())
        );

        let network = translate(
            &task(
                vec![],
                RuntimeHints::default(),
                Some(simple::string("quay.io/biocontainers/bwa:0.7.17")),
            ),
            &CompileOptions::default(),
        );
        assert_eq!(
            network.container,
            ContainerImage::Network("quay.io/biocontainers/bwa:0.7.17".to_string())
        );
    }

    #[test]
    fn test_unfoldable_container_renders_its_expression() {
        let app = translate(
            &task(
                vec![],
                RuntimeHints::default(),
                Some(simple::var("docker_image", Type::String)),
            ),
            &CompileOptions::default(),
        );
        assert_eq!(
            app.container,
            ContainerImage::Network("docker_image".to_string())
        );
    }
}
