//! # Sonoflow - Real-time Tensor Pipeline
//!
//! Typed tensor pipelines built from modular subsystems.
//!
//! ## Architecture
//!
//! Sonoflow is an umbrella crate that coordinates:
//! - **sonoflow-core** - Tensor frames, axis layouts, node traits, flow
//!   graph and the node registry
//! - **sonoflow-inference** - Model inference stage: sessions, expression
//!   scripts, dtype/layout conversion (framework-agnostic)
//! - **sonoflow-tract** - Tract-based ONNX model runtime
//!
//! The umbrella adds the pipeline assembler: a serializable [`PipelineSpec`]
//! plus [`assemble`], which drives the registry to build a whole graph from
//! a declarative stage list.
//!
//! ## Quick Start
//!
//! ```ignore
//! use sonoflow::prelude::*;
//!
//! // Registry with the builtin node set and a tract-backed inference stage
//! let registry = sonoflow::tract_registry()?;
//!
//! let spec: PipelineSpec = toml::from_str(
//!     r#"
//!     [[stages]]
//!     id = "camera"
//!     type = "ramp_source"
//!     role = "input"
//!
//!     [[stages]]
//!     id = "denoise"
//!     type = "inference"
//!     role = "process"
//!     params = { model = "denoise.onnx", normalize = "a / 255.0" }
//!
//!     [[stages]]
//!     id = "display"
//!     type = "trace_sink"
//!     role = "output"
//!
//!     [[links]]
//!     from = "camera"
//!     to = "denoise"
//!
//!     [[links]]
//!     from = "denoise"
//!     to = "display"
//!     "#,
//! )?;
//!
//! let assembly = assemble(&registry, &spec)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Core pipeline plus the tract runtime
//! - `tract` - Tract ONNX model runtime (disable for BYO-runtime builds)

use std::sync::Arc;

/// Re-export of sonoflow-core for direct access
pub use sonoflow_core as core;

// Error aggregate
pub use sonoflow_core::{Error, Result};

// Tensor data model
pub use sonoflow_core::{AxisLayout, LayoutError, ScalarKind, Tensor, TensorData, TensorError};

// Node traits and parameters
pub use sonoflow_core::{
    params, InputDevice, NodeError, OutputDevice, ParamValue, Params, ProcessNode,
};

// Graph and registry
pub use sonoflow_core::{
    Edge, FlowGraph, GraphError, NodeHandle, NodeRegistry, NodeRole, RegistryError,
};

// Builtin utility nodes
pub use sonoflow_core::{NullSink, Passthrough, RampSource, TraceSink};

/// Re-export of sonoflow-inference for direct access
pub use sonoflow_inference as inference;

pub use sonoflow_inference::{
    register_inference, rhai_compiler, ArtifactState, ExprCompiler, ExprProgram, InferenceNode,
    InferenceSession, InferenceSettings, LoadedModel, ModelRuntime, NullRuntime, RuntimeError,
};

// Tract ONNX runtime
#[cfg(feature = "tract")]
pub use sonoflow_tract as tract;

#[cfg(feature = "tract")]
pub use sonoflow_tract::{tract_runtime, TractRuntime};

mod assembler;

pub use assembler::{
    assemble, Assembly, AssemblyError, LinkSpec, PipelineSpec, StageRole, StageSpec,
};

/// Build the standard registry.
///
/// Installs the builtin utility nodes plus the `inference` node wired to
/// the given model runtime and the rhai expression compiler.
pub fn default_registry(runtime: Arc<dyn ModelRuntime>) -> Result<NodeRegistry> {
    let registry = NodeRegistry::with_builtins();
    register_inference(&registry, runtime, rhai_compiler())?;
    Ok(registry)
}

/// [`default_registry`] with the tract ONNX runtime wired in.
#[cfg(feature = "tract")]
pub fn tract_registry() -> Result<NodeRegistry> {
    default_registry(sonoflow_tract::tract_runtime())
}

/// Convenience prelude for common imports
pub mod prelude {
    // Assembler
    pub use crate::{assemble, Assembly, PipelineSpec, StageRole};

    // Essential types
    pub use crate::core::{
        AxisLayout, FlowGraph, InputDevice, NodeRegistry, OutputDevice, ProcessNode, ScalarKind,
        Tensor,
    };

    // Inference
    pub use crate::inference::{InferenceSettings, ModelRuntime};

    pub use crate::default_registry;

    #[cfg(feature = "tract")]
    pub use crate::{tract_registry, tract_runtime};
}
