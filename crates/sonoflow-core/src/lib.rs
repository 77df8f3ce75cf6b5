//! # sonoflow-core
//!
//! Core building blocks for sonoflow tensor pipelines:
//!
//! - **Tensor frames** - row-major shape plus one typed buffer, shared
//!   between nodes as `Arc<Tensor>` ([`tensor`]).
//! - **Axis layouts** - validated four-character descriptors such as
//!   `NCHW` ([`layout`]).
//! - **Node traits** - the [`ProcessNode`], [`InputDevice`] and
//!   [`OutputDevice`] capability surfaces the engine schedules against
//!   ([`node`]).
//! - **Flow graph** - the shared context nodes are bound to ([`graph`]).
//! - **Node registry** - string-keyed constructors for building pipelines
//!   from serialized descriptions ([`registry`]), plus a handful of
//!   built-in utility types ([`nodes`]).
//!
//! The scheduling engine that drives frames through a graph lives outside
//! this crate; everything here is the data model and factory layer it runs
//! against.

pub mod error;
pub mod graph;
pub mod layout;
pub mod node;
pub mod nodes;
pub mod registry;
pub mod tensor;

pub use error::{Error, Result};
pub use graph::{Edge, FlowGraph, GraphError, NodeHandle, NodeRole};
pub use layout::{AxisLayout, LayoutError};
pub use node::{InputDevice, NodeError, OutputDevice, ParamValue, Params, ProcessNode};
pub use nodes::{register_builtin_nodes, NullSink, Passthrough, RampSource, TraceSink};
pub use registry::{
    InputConstructor, NodeRegistry, OutputConstructor, ProcessConstructor, RegistryError,
};
pub use tensor::{ScalarKind, Tensor, TensorData, TensorError};
