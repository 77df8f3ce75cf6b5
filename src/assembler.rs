//! Declarative pipeline assembly.
//!
//! A [`PipelineSpec`] is the serialized form of a pipeline: a list of stages
//! and a list of links between them. [`assemble`] walks the spec against a
//! [`NodeRegistry`], creating and configuring every stage and connecting
//! every link. Specs typically arrive as TOML and deserialize straight into
//! these types.

use serde::{Deserialize, Serialize};
use sonoflow_core::{
    FlowGraph, GraphError, InputDevice, NodeError, NodeRegistry, OutputDevice, Params,
    ProcessNode, RegistryError,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Serialized description of a whole pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSpec {
    pub stages: Vec<StageSpec>,
    pub links: Vec<LinkSpec>,
}

/// One stage of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    /// Graph-unique node id.
    pub id: String,
    /// Registered type name to construct.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Which registry table the type lives in.
    pub role: StageRole,
    /// Output port count, input stages only.
    #[serde(default = "default_ports")]
    pub ports: usize,
    /// Queueing flag, process and output stages only.
    #[serde(default)]
    pub queueing: bool,
    /// Settings pushed through `configure` after construction.
    /// Only process stages accept them.
    #[serde(default)]
    pub params: Params,
}

fn default_ports() -> usize {
    1
}

/// Role of a stage within the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageRole {
    Input,
    Process,
    Output,
}

/// A directed connection between two stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSpec {
    pub from: String,
    #[serde(default)]
    pub from_port: usize,
    pub to: String,
    #[serde(default)]
    pub to_port: usize,
}

/// Errors aborting pipeline assembly.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Failed to create stage '{id}': {source}")]
    Stage {
        id: String,
        #[source]
        source: RegistryError,
    },

    #[error("Failed to configure stage '{id}': {source}")]
    Configure {
        id: String,
        #[source]
        source: NodeError,
    },

    #[error("Failed to link '{from}' to '{to}': {source}")]
    Link {
        from: String,
        to: String,
        #[source]
        source: GraphError,
    },
}

/// A fully assembled pipeline: the graph plus role-sorted stage handles.
pub struct Assembly {
    pub graph: Arc<FlowGraph>,
    pub inputs: Vec<Arc<dyn InputDevice>>,
    pub processors: Vec<Arc<dyn ProcessNode>>,
    pub outputs: Vec<Arc<dyn OutputDevice>>,
}

impl fmt::Debug for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembly")
            .field("inputs", &self.inputs.len())
            .field("processors", &self.processors.len())
            .field("outputs", &self.outputs.len())
            .field("edges", &self.graph.edges().len())
            .finish()
    }
}

/// Build a pipeline from its serialized description.
///
/// Stages are created in spec order, then links are connected. The first
/// failure aborts assembly: an unregistered type name, a rejected parameter
/// map or a bad link all surface as [`AssemblyError`] naming the stage.
pub fn assemble(registry: &NodeRegistry, spec: &PipelineSpec) -> Result<Assembly, AssemblyError> {
    let graph = registry.create_graph();
    let mut inputs = Vec::new();
    let mut processors = Vec::new();
    let mut outputs = Vec::new();

    for stage in &spec.stages {
        match stage.role {
            StageRole::Input => {
                reject_params(stage)?;
                let device = registry
                    .create_input_device(&graph, &stage.id, &stage.type_name, stage.ports)
                    .map_err(|source| AssemblyError::Stage {
                        id: stage.id.clone(),
                        source,
                    })?;
                inputs.push(device);
            }
            StageRole::Process => {
                let node = registry
                    .create_node(&graph, &stage.id, &stage.type_name, stage.queueing)
                    .map_err(|source| AssemblyError::Stage {
                        id: stage.id.clone(),
                        source,
                    })?;
                node.configure(&stage.params)
                    .map_err(|source| AssemblyError::Configure {
                        id: stage.id.clone(),
                        source,
                    })?;
                processors.push(node);
            }
            StageRole::Output => {
                reject_params(stage)?;
                let device = registry
                    .create_output_device(&graph, &stage.id, &stage.type_name, stage.queueing)
                    .map_err(|source| AssemblyError::Stage {
                        id: stage.id.clone(),
                        source,
                    })?;
                outputs.push(device);
            }
        }
    }

    for link in &spec.links {
        graph
            .connect(&link.from, link.from_port, &link.to, link.to_port)
            .map_err(|source| AssemblyError::Link {
                from: link.from.clone(),
                to: link.to.clone(),
                source,
            })?;
    }

    info!(
        "Assembled pipeline: {} stages, {} links",
        spec.stages.len(),
        spec.links.len()
    );

    Ok(Assembly {
        graph,
        inputs,
        processors,
        outputs,
    })
}

// Devices have no configure surface, so params on them are a spec mistake.
fn reject_params(stage: &StageSpec) -> Result<(), AssemblyError> {
    match stage.params.keys().next() {
        Some(key) => Err(AssemblyError::Configure {
            id: stage.id.clone(),
            source: NodeError::UnknownParameter(key.clone()),
        }),
        None => Ok(()),
    }
}
