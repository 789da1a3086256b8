// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! IR executables: applications, workflows, stages.
//!
//! These are the language-neutral results of translation. Workflows
//! reference their callees by *name*, never by object reference; the
//! [`crate::Bundle`] map is the single source of truth, and the build
//! planner fills in platform object IDs after the fact.

use crate::types::Type;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// The source language a document was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageTag {
    /// The statically-typed workflow language.
    Wdl,
    /// The JSON/YAML-based workflow language.
    Cwl,
}

impl LanguageTag {
    /// Infer the language from a file extension. Language detection is an
    /// explicit tag, never parse-and-catch.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "wdl" => Some(LanguageTag::Wdl),
            "cwl" | "cwl.json" | "json" | "yaml" | "yml" => Some(LanguageTag::Cwl),
            _ => None,
        }
    }
}

/// Stand-alone source for one callable: the extracted, self-contained text
/// (including every schema it references) that the runtime executors can
/// re-evaluate without further context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCode {
    /// The language the text is written in.
    pub language: LanguageTag,
    /// The self-contained source text.
    pub text: String,
}

/// Presentation attributes attached to a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterAttribute {
    /// Short human-readable label.
    Label(String),
    /// Longer help text.
    Help(String),
    /// UI grouping.
    Group(String),
    /// Allowed values.
    Choices(Vec<Value>),
}

/// One typed input or output of an executable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    /// Platform-safe (encoded) name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: Type,
    /// Constant default, when one could be folded at compile time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Presentation attributes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<ParameterAttribute>,
}

impl Parameter {
    /// A plain parameter with no default and no attributes.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            attributes: Vec::new(),
        }
    }

    /// Whether a caller may omit this parameter.
    pub fn is_optional(&self) -> bool {
        self.ty.is_optional() || self.default.is_some()
    }
}

/// How the instance type of an application is selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstanceType {
    /// Platform default instance.
    Default,
    /// A hard-coded platform instance name.
    StaticName(String),
    /// Constant resource requirements resolved at compile time.
    StaticResources(RuntimeResources),
    /// Resource expressions evaluated at runtime; the job re-launches
    /// itself on the selected instance.
    Dynamic,
}

/// Constant resource requirements.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeResources {
    /// CPU cores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
    /// Memory in MiB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<i64>,
    /// Disk in GiB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_gb: Option<i64>,
}

impl RuntimeResources {
    /// Whether no requirement is set at all.
    pub fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.memory_mb.is_none() && self.disk_gb.is_none()
    }

    /// Fill unset requirements from `defaults`.
    pub fn or_defaults(mut self, defaults: &RuntimeResources) -> Self {
        self.cpu = self.cpu.or(defaults.cpu);
        self.memory_mb = self.memory_mb.or(defaults.memory_mb);
        self.disk_gb = self.disk_gb.or(defaults.disk_gb);
        self
    }
}

/// The container an application's command runs in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContainerImage {
    /// Run directly on the instance.
    NoImage,
    /// An image stored as a platform file (`dx://project:file`); the
    /// compiler guarantees the file is accessible at runtime.
    PlatformFile(String),
    /// An image pulled from a network registry.
    Network(String),
}

/// A reference to a pre-built platform executable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NativeRef {
    /// By object ID (`applet-xxxx` / `app-xxxx`).
    Id(String),
    /// By project-relative folder path.
    Path(String),
    /// By published app name.
    AppName(String),
}

/// What an application is, from the runtime's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum AppKind {
    /// A user task/tool compiled to a single applet.
    Applet,
    /// A reference to an executable not built by this compiler.
    Native {
        /// How to find the executable.
        reference: NativeRef,
    },
    /// Auxiliary applet evaluating workflow-input expressions for an
    /// unlocked workflow.
    WorkflowCommonInputs,
    /// Auxiliary applet evaluating a block's expressions at runtime and
    /// launching its call site.
    WorkflowFragment {
        /// Names of the callables the fragment may invoke.
        call_names: Vec<String>,
        /// Path of block indices from the workflow body root.
        block_path: Vec<usize>,
        /// Loop variable, for scatter fragments.
        #[serde(skip_serializing_if = "Option::is_none")]
        scatter_var: Option<String>,
        /// Maximum scatter jobs launched per chunk.
        #[serde(skip_serializing_if = "Option::is_none")]
        scatter_chunk_size: Option<usize>,
    },
    /// Auxiliary applet evaluating workflow-output expressions.
    WorkflowOutputs {
        /// Path of block indices from the workflow body root.
        block_path: Vec<usize>,
    },
    /// Variant of the outputs applet used when a custom reorg follows.
    WorkflowCustomReorgOutputs,
    /// The built-in output reorganization applet.
    WorkflowOutputReorg,
    /// A user-supplied reorg applet referenced by ID.
    WorkflowCustomReorg {
        /// Platform ID of the user's applet.
        applet_id: String,
    },
}

impl AppKind {
    /// Names of the callables this application depends on.
    pub fn call_names(&self) -> &[String] {
        match self {
            AppKind::WorkflowFragment { call_names, .. } => call_names.as_slice(),
            _ => &[],
        }
    }
}

/// Special runtime requirements carried into the run specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Requirement {
    /// Skip platform-level job reuse for this executable.
    IgnoreReuse,
    /// Kill the job after this many hours.
    TimeoutHours(i64),
    /// Network access patterns the job needs.
    NetworkAccess(Vec<String>),
}

/// Title/description metadata carried onto built objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallableAttribute {
    /// Human-readable title.
    Title(String),
    /// Longer description.
    Description(String),
    /// Short summary line.
    Summary(String),
    /// Semantic version of the source document.
    Version(String),
}

/// A single-executable unit: one command, one set of typed I/O.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Unique name within the bundle.
    pub name: String,
    /// Typed inputs.
    pub inputs: Vec<Parameter>,
    /// Typed outputs.
    pub outputs: Vec<Parameter>,
    /// Instance selection.
    pub instance_type: InstanceType,
    /// Container image.
    pub container: ContainerImage,
    /// What this application is.
    pub kind: AppKind,
    /// Stand-alone source the runtime executor re-evaluates.
    pub source: SourceCode,
    /// Title/description metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<CallableAttribute>,
    /// Special runtime requirements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Requirement>,
    /// Tags applied to the built object.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Properties applied to the built object.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<(String, String)>,
}

/// Where one stage input comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StageInput {
    /// Not wired; the parameter must be optional or supplied at run time.
    Empty,
    /// A constant.
    Static {
        /// The constant value.
        value: Value,
    },
    /// The output of another stage.
    Link {
        /// Source stage ID.
        stage_id: String,
        /// Source output parameter name.
        param: String,
    },
    /// A workflow-level input.
    WorkflowInput {
        /// Workflow input parameter name.
        param: String,
    },
    /// An array assembled from several sources.
    ArrayLink(Vec<StageInput>),
}

/// One node in a workflow DAG, bound to a callee and a set of inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    /// Deterministic stage ID (assigned from block order).
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Name of the callee applet or sub-workflow.
    pub callee: String,
    /// One input source per callee input parameter, in callee order.
    pub inputs: Vec<StageInput>,
    /// The callee's outputs, cached for link resolution.
    pub outputs: Vec<Parameter>,
}

/// Whether a workflow is the compilation entry point or generated for a
/// nested block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowLevel {
    /// The top-level workflow the user compiled.
    Top,
    /// A generated sub-workflow for a nested block.
    Sub,
}

/// A DAG of stages referencing applets or sub-workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Unique name within the bundle.
    pub name: String,
    /// Workflow inputs with their wiring.
    pub inputs: Vec<(Parameter, StageInput)>,
    /// Workflow outputs with their wiring.
    pub outputs: Vec<(Parameter, StageInput)>,
    /// Stages in topological order, preserving source appearance.
    pub stages: Vec<Stage>,
    /// Stand-alone source of the workflow.
    pub source: SourceCode,
    /// Whether inputs/outputs are declared explicitly (locked) or flow
    /// through common/output applets (unlocked).
    pub locked: bool,
    /// Entry point or generated sub-workflow.
    pub level: WorkflowLevel,
    /// Title/description metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<CallableAttribute>,
}

/// A translated callable: an application or a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "class")]
pub enum Callable {
    /// An application.
    Application(Application),
    /// A workflow.
    Workflow(Workflow),
}

impl Callable {
    /// The callable's unique name.
    pub fn name(&self) -> &str {
        match self {
            Callable::Application(app) => &app.name,
            Callable::Workflow(wf) => &wf.name,
        }
    }

    /// Input parameters, in declaration order.
    pub fn input_params(&self) -> Vec<&Parameter> {
        match self {
            Callable::Application(app) => app.inputs.iter().collect(),
            Callable::Workflow(wf) => wf.inputs.iter().map(|(param, _)| param).collect(),
        }
    }

    /// Output parameters, in declaration order.
    pub fn output_params(&self) -> Vec<&Parameter> {
        match self {
            Callable::Application(app) => app.outputs.iter().collect(),
            Callable::Workflow(wf) => wf.outputs.iter().map(|(param, _)| param).collect(),
        }
    }

    /// Names of the callables this one invokes.
    pub fn callee_names(&self) -> Vec<String> {
        match self {
            Callable::Application(app) => app.kind.call_names().to_vec(),
            Callable::Workflow(wf) => {
                let mut names = Vec::new();
                for stage in &wf.stages {
                    if !names.contains(&stage.callee) {
                        names.push(stage.callee.clone());
                    }
                }
                names
            }
        }
    }
}
