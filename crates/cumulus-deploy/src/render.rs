// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Rendering IR executables into platform build requests.
//!
//! An [`Application`] becomes the JSON body of `applet-new`, a
//! [`Workflow`] the body of `workflow-new`. Parameter specs use the
//! composite two-field encoding for non-native types; the packed
//! stand-alone source, the source language, and the executable kind land
//! under `details` so the runtime executors can recover them.

use crate::error::{DeployError, Result};
use crate::platform::ObjectId;
use cumulus_compiler::standalone;
use cumulus_ir::{
    AppKind, Application, Callable, CompileOptions, ContainerImage, InstanceType, Parameter,
    Requirement, StageInput, Type, wire,
};
use serde_json::{Map, Value as JsonValue, json};
use std::collections::HashMap;

/// Details key carrying the executable kind for the runtime executors.
pub const EXEC_KIND_DETAIL: &str = "execKind";

/// Details key carrying the source language.
pub const LANGUAGE_DETAIL: &str = "language";

/// Details key carrying the container image file link.
pub const DOCKER_IMAGE_DETAIL: &str = "dockerImage";

/// Details key carrying constant resource requirements for dynamic
/// instance selection at runtime.
pub const RUNTIME_RESOURCES_DETAIL: &str = "runtimeResources";

/// Render an application into an `applet-new` request.
///
/// Native references are not built by this compiler and cannot be
/// rendered; the planner resolves them instead.
pub fn render_application(app: &Application, options: &CompileOptions) -> Result<JsonValue> {
    if let AppKind::Native { .. } = app.kind {
        return Err(DeployError::Render {
            name: app.name.clone(),
            reason: "native references are resolved, not built".to_string(),
        });
    }

    let mut request = Map::new();
    request.insert("name".to_string(), json!(app.name));
    request.insert("project".to_string(), json!(options.project));
    request.insert("folder".to_string(), json!(options.folder));
    request.insert("parents".to_string(), json!(true));
    request.insert("dxapi".to_string(), json!("1.0.0"));
    request.insert(
        "inputSpec".to_string(),
        JsonValue::Array(parameter_specs(&app.inputs)?),
    );
    request.insert(
        "outputSpec".to_string(),
        JsonValue::Array(parameter_specs(&app.outputs)?),
    );
    request.insert("runSpec".to_string(), run_spec(app)?);
    if !matches!(app.kind, AppKind::Applet) {
        request.insert("hidden".to_string(), json!(true));
    }
    if !app.tags.is_empty() {
        request.insert("tags".to_string(), json!(app.tags));
    }
    let mut properties = Map::new();
    for (key, value) in &app.properties {
        properties.insert(key.clone(), json!(value));
    }
    request.insert("properties".to_string(), JsonValue::Object(properties));

    let mut details = Map::new();
    details.insert(
        crate::digest::SOURCE_DETAIL.to_string(),
        json!(standalone::pack(&app.source.text).map_err(|err| DeployError::Render {
            name: app.name.clone(),
            reason: format!("cannot pack source: {}", err),
        })?),
    );
    details.insert(
        LANGUAGE_DETAIL.to_string(),
        serde_json::to_value(app.source.language)?,
    );
    details.insert(EXEC_KIND_DETAIL.to_string(), serde_json::to_value(&app.kind)?);
    if let ContainerImage::PlatformFile(uri) = &app.container {
        details.insert(DOCKER_IMAGE_DETAIL.to_string(), wire::file_link(uri));
    }
    if let InstanceType::StaticResources(resources) = &app.instance_type {
        details.insert(
            RUNTIME_RESOURCES_DETAIL.to_string(),
            serde_json::to_value(resources)?,
        );
    }
    request.insert("details".to_string(), JsonValue::Object(details));

    for requirement in &app.requirements {
        if let Requirement::IgnoreReuse = requirement {
            request.insert("ignoreReuse".to_string(), json!(true));
        }
    }

    Ok(JsonValue::Object(request))
}

fn run_spec(app: &Application) -> Result<JsonValue> {
    let mut run_spec = Map::new();
    run_spec.insert("interpreter".to_string(), json!("bash"));
    // The executable entry point is supplied by the runtime executor
    // image; the applet body only carries data.
    run_spec.insert("code".to_string(), json!(""));
    run_spec.insert("distribution".to_string(), json!("Ubuntu"));
    run_spec.insert("release".to_string(), json!("24.04"));

    if let InstanceType::StaticName(name) = &app.instance_type {
        run_spec.insert(
            "systemRequirements".to_string(),
            json!({ "*": { "instanceType": name } }),
        );
    }
    if let ContainerImage::Network(image) = &app.container {
        run_spec.insert("container".to_string(), json!(image));
    }
    for requirement in &app.requirements {
        if let Requirement::TimeoutHours(hours) = requirement {
            run_spec.insert(
                "timeoutPolicy".to_string(),
                json!({ "*": { "hours": hours } }),
            );
        }
    }
    Ok(JsonValue::Object(run_spec))
}

/// Render a workflow into a `workflow-new` request.
///
/// `executables` maps callee names to their platform IDs; every callee
/// must already be built (the planner walks in dependency order).
pub fn render_workflow(
    workflow: &cumulus_ir::Workflow,
    callee_params: &dyn Fn(&str) -> Option<Vec<Parameter>>,
    executables: &HashMap<String, ObjectId>,
    options: &CompileOptions,
) -> Result<JsonValue> {
    let mut request = Map::new();
    request.insert("name".to_string(), json!(workflow.name));
    request.insert("project".to_string(), json!(options.project));
    request.insert("folder".to_string(), json!(options.folder));
    request.insert("parents".to_string(), json!(true));

    let mut stages = Vec::with_capacity(workflow.stages.len());
    for stage in &workflow.stages {
        let executable =
            executables
                .get(&stage.callee)
                .ok_or_else(|| DeployError::Render {
                    name: workflow.name.clone(),
                    reason: format!("callee '{}' has not been built", stage.callee),
                })?;
        let params = callee_params(&stage.callee).ok_or_else(|| DeployError::Render {
            name: workflow.name.clone(),
            reason: format!("callee '{}' is unknown", stage.callee),
        })?;
        if params.len() != stage.inputs.len() {
            return Err(DeployError::Render {
                name: workflow.name.clone(),
                reason: format!(
                    "stage '{}' wires {} inputs but callee '{}' declares {}",
                    stage.id,
                    stage.inputs.len(),
                    stage.callee,
                    params.len()
                ),
            });
        }

        let mut input_object = Map::new();
        for (param, wiring) in params.iter().zip(&stage.inputs) {
            for (field_name, field_value) in stage_input_fields(param, wiring)? {
                input_object.insert(field_name, field_value);
            }
        }
        stages.push(json!({
            "id": stage.id,
            "name": stage.description,
            "executable": executable,
            "input": input_object,
        }));
    }
    request.insert("stages".to_string(), JsonValue::Array(stages));

    if workflow.locked {
        let input_params: Vec<Parameter> =
            workflow.inputs.iter().map(|(param, _)| param.clone()).collect();
        request.insert(
            "inputs".to_string(),
            JsonValue::Array(parameter_specs(&input_params)?),
        );

        let mut output_specs = Vec::new();
        for (param, wiring) in &workflow.outputs {
            for (spec, source) in
                parameter_specs(std::slice::from_ref(param))?
                    .into_iter()
                    .zip(output_sources(param, wiring)?)
            {
                let mut spec = spec;
                if let JsonValue::Object(fields) = &mut spec
                    && let Some(source) = source
                {
                    fields.insert("outputSource".to_string(), source);
                }
                output_specs.push(spec);
            }
        }
        request.insert("outputs".to_string(), JsonValue::Array(output_specs));
    }

    let mut details = Map::new();
    details.insert(
        crate::digest::SOURCE_DETAIL.to_string(),
        json!(
            standalone::pack(&workflow.source.text).map_err(|err| DeployError::Render {
                name: workflow.name.clone(),
                reason: format!("cannot pack source: {}", err),
            })?
        ),
    );
    details.insert(
        LANGUAGE_DETAIL.to_string(),
        serde_json::to_value(workflow.source.language)?,
    );
    request.insert("details".to_string(), JsonValue::Object(details));

    Ok(JsonValue::Object(request))
}

/// Render a callable through the matching endpoint shape.
pub fn render_callable(
    callable: &Callable,
    callee_params: &dyn Fn(&str) -> Option<Vec<Parameter>>,
    executables: &HashMap<String, ObjectId>,
    options: &CompileOptions,
) -> Result<JsonValue> {
    match callable {
        Callable::Application(app) => render_application(app, options),
        Callable::Workflow(workflow) => {
            render_workflow(workflow, callee_params, executables, options)
        }
    }
}

/// The platform class string of a native type.
fn native_class(ty: &Type) -> Result<String> {
    Ok(match ty {
        Type::Boolean => "boolean".to_string(),
        Type::Int => "int".to_string(),
        Type::Float => "float".to_string(),
        Type::String | Type::Directory => "string".to_string(),
        Type::File => "file".to_string(),
        Type::Optional(inner) => native_class(inner)?,
        Type::Array { item, .. } => format!("array:{}", native_class(item)?),
        other => {
            return Err(DeployError::Internal(format!(
                "type {} has no native platform class",
                other
            )));
        }
    })
}

/// Render parameter specs, expanding composite parameters into the
/// wrapped hash plus the flat-files sibling.
fn parameter_specs(params: &[Parameter]) -> Result<Vec<JsonValue>> {
    let mut specs = Vec::new();
    for param in params {
        if param.ty.is_native() {
            let mut spec = Map::new();
            spec.insert("name".to_string(), json!(param.name));
            spec.insert("class".to_string(), json!(native_class(&param.ty)?));
            if param.is_optional() {
                spec.insert("optional".to_string(), json!(true));
            }
            if let Some(default) = &param.default {
                spec.insert(
                    "default".to_string(),
                    wire::value_to_wire(default, &param.ty).map_err(|err| {
                        DeployError::Render {
                            name: param.name.clone(),
                            reason: err.to_string(),
                        }
                    })?,
                );
            }
            specs.push(JsonValue::Object(spec));
        } else {
            let mut spec = Map::new();
            spec.insert("name".to_string(), json!(param.name));
            spec.insert("class".to_string(), json!("hash"));
            if param.is_optional() {
                spec.insert("optional".to_string(), json!(true));
            }
            specs.push(JsonValue::Object(spec));
            specs.push(json!({
                "name": format!("{}{}", param.name, wire::FLAT_FILES_SUFFIX),
                "class": "array:file",
                "optional": true,
            }));
        }
    }
    Ok(specs)
}

/// Render one stage input wiring as its platform field(s).
fn stage_input_fields(
    param: &Parameter,
    wiring: &StageInput,
) -> Result<Vec<(String, JsonValue)>> {
    let fields = match wiring {
        StageInput::Empty => Vec::new(),
        StageInput::Static { value } => wire::parameter_fields(&param.name, value, &param.ty)
            .map_err(|err| DeployError::Render {
                name: param.name.clone(),
                reason: err.to_string(),
            })?,
        StageInput::Link { stage_id, param: output } => {
            let mut fields = vec![(
                param.name.clone(),
                json!({ wire::LINK_KEY: { "stage": stage_id, "outputField": output } }),
            )];
            if !param.ty.is_native() {
                fields.push((
                    format!("{}{}", param.name, wire::FLAT_FILES_SUFFIX),
                    json!({ wire::LINK_KEY: {
                        "stage": stage_id,
                        "outputField": format!("{}{}", output, wire::FLAT_FILES_SUFFIX),
                    } }),
                ));
            }
            fields
        }
        StageInput::WorkflowInput { param: input } => {
            let mut fields = vec![(
                param.name.clone(),
                json!({ wire::LINK_KEY: { "workflowInputField": input } }),
            )];
            if !param.ty.is_native() {
                fields.push((
                    format!("{}{}", param.name, wire::FLAT_FILES_SUFFIX),
                    json!({ wire::LINK_KEY: {
                        "workflowInputField": format!("{}{}", input, wire::FLAT_FILES_SUFFIX),
                    } }),
                ));
            }
            fields
        }
        StageInput::ArrayLink(sources) => {
            let mut items = Vec::with_capacity(sources.len());
            for source in sources {
                let rendered = stage_input_fields(param, source)?;
                if let Some((_, value)) = rendered.into_iter().next() {
                    items.push(value);
                }
            }
            vec![(param.name.clone(), JsonValue::Array(items))]
        }
    };
    Ok(fields)
}

/// The `outputSource` wiring of one workflow output, aligned with its
/// spec fields (None for the flat-files sibling of composites).
fn output_sources(
    param: &Parameter,
    wiring: &StageInput,
) -> Result<Vec<Option<JsonValue>>> {
    let source = match wiring {
        StageInput::Empty => None,
        StageInput::Static { value } => Some(
            wire::value_to_wire(value, &param.ty).map_err(|err| DeployError::Render {
                name: param.name.clone(),
                reason: err.to_string(),
            })?,
        ),
        StageInput::Link { stage_id, param: output } => Some(json!({
            wire::LINK_KEY: { "stage": stage_id, "outputField": output }
        })),
        StageInput::WorkflowInput { param: input } => Some(json!({
            wire::LINK_KEY: { "workflowInputField": input }
        })),
        StageInput::ArrayLink(_) => None,
    };
    if param.ty.is_native() {
        Ok(vec![source])
    } else {
        Ok(vec![source, None])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cumulus_ir::{LanguageTag, SchemaType, SourceCode, Stage, Value, Workflow, WorkflowLevel};

    fn applet(name: &str, inputs: Vec<Parameter>) -> Application {
        Application {
            name: name.to_string(),
            inputs,
            outputs: vec![Parameter::new("result", Type::Int)],
            instance_type: InstanceType::Default,
            container: ContainerImage::NoImage,
            kind: AppKind::Applet,
            source: SourceCode {
                language: LanguageTag::Wdl,
                text: "task t {}".to_string(),
            },
            attributes: vec![],
            requirements: vec![],
            tags: vec![],
            properties: vec![],
        }
    }

    #[test]
    fn test_native_parameter_spec() {
        let request = render_application(
            &applet("t", vec![Parameter::new("x", Type::Int)]),
            &CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(
            request["inputSpec"],
            json!([{ "name": "x", "class": "int" }])
        );
        assert_eq!(
            request["outputSpec"],
            json!([{ "name": "result", "class": "int" }])
        );
    }

    #[test]
    fn test_optional_and_default_parameter_spec() {
        let param = Parameter {
            name: "n".to_string(),
            ty: Type::Int,
            default: Some(Value::Int(3)),
            attributes: vec![],
        };
        let request =
            render_application(&applet("t", vec![param]), &CompileOptions::default()).unwrap();
        assert_eq!(
            request["inputSpec"],
            json!([{ "name": "n", "class": "int", "optional": true, "default": 3 }])
        );
    }

    #[test]
    fn test_composite_parameter_expands_to_two_fields() {
        let schema = Type::Schema(SchemaType {
            name: "Sample".to_string(),
            fields: vec![("reads".to_string(), Type::File)],
        });
        let request = render_application(
            &applet("t", vec![Parameter::new("sample", schema)]),
            &CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(
            request["inputSpec"],
            json!([
                { "name": "sample", "class": "hash" },
                { "name": "sample___dxfiles", "class": "array:file", "optional": true },
            ])
        );
    }

    #[test]
    fn test_instance_name_lands_in_system_requirements() {
        let mut app = applet("t", vec![]);
        app.instance_type = InstanceType::StaticName("mem2_ssd1_v2_x16".to_string());
        let request = render_application(&app, &CompileOptions::default()).unwrap();
        assert_eq!(
            request["runSpec"]["systemRequirements"],
            json!({ "*": { "instanceType": "mem2_ssd1_v2_x16" } })
        );
    }

    #[test]
    fn test_platform_container_lands_in_details() {
        let mut app = applet("t", vec![]);
        app.container = ContainerImage::PlatformFile("dx://project-1:file-2".to_string());
        let request = render_application(&app, &CompileOptions::default()).unwrap();
        assert_eq!(
            request["details"][DOCKER_IMAGE_DETAIL],
            json!({ wire::LINK_KEY: { "project": "project-1", "id": "file-2" } })
        );
    }

    #[test]
    fn test_source_is_packed_and_recoverable() {
        let request =
            render_application(&applet("t", vec![]), &CompileOptions::default()).unwrap();
        let packed = request["details"][crate::digest::SOURCE_DETAIL]
            .as_str()
            .unwrap();
        assert_eq!(standalone::unpack(packed).unwrap(), "task t {}");
    }

    #[test]
    fn test_fragment_applets_are_hidden() {
        let mut app = applet("frag", vec![]);
        app.kind = AppKind::WorkflowFragment {
            call_names: vec!["t".to_string()],
            block_path: vec![0],
            scatter_var: None,
            scatter_chunk_size: None,
        };
        let request = render_application(&app, &CompileOptions::default()).unwrap();
        assert_eq!(request["hidden"], json!(true));
    }

    #[test]
    fn test_native_reference_cannot_be_rendered() {
        let mut app = applet("ext", vec![]);
        app.kind = AppKind::Native {
            reference: cumulus_ir::NativeRef::Id("applet-123".to_string()),
        };
        assert!(render_application(&app, &CompileOptions::default()).is_err());
    }

    #[test]
    fn test_workflow_stages_and_links() {
        let workflow = Workflow {
            name: "wf".to_string(),
            inputs: vec![(
                Parameter::new("x", Type::Int),
                StageInput::WorkflowInput {
                    param: "x".to_string(),
                },
            )],
            outputs: vec![(
                Parameter::new("r", Type::Int),
                StageInput::Link {
                    stage_id: "stage-0".to_string(),
                    param: "result".to_string(),
                },
            )],
            stages: vec![Stage {
                id: "stage-0".to_string(),
                description: "t".to_string(),
                callee: "t".to_string(),
                inputs: vec![StageInput::WorkflowInput {
                    param: "x".to_string(),
                }],
                outputs: vec![Parameter::new("result", Type::Int)],
            }],
            source: SourceCode {
                language: LanguageTag::Wdl,
                text: "workflow wf {}".to_string(),
            },
            locked: true,
            level: WorkflowLevel::Top,
            attributes: vec![],
        };
        let mut executables = HashMap::new();
        executables.insert("t".to_string(), "applet-0001".to_string());
        let callee_params =
            |name: &str| (name == "t").then(|| vec![Parameter::new("x", Type::Int)]);

        let request = render_workflow(
            &workflow,
            &callee_params,
            &executables,
            &CompileOptions::default(),
        )
        .unwrap();

        assert_eq!(request["stages"][0]["executable"], json!("applet-0001"));
        assert_eq!(
            request["stages"][0]["input"]["x"],
            json!({ wire::LINK_KEY: { "workflowInputField": "x" } })
        );
        assert_eq!(
            request["outputs"][0]["outputSource"],
            json!({ wire::LINK_KEY: { "stage": "stage-0", "outputField": "result" } })
        );
    }
}
