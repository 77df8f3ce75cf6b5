//! Node registry for constructing pipeline nodes from type names.
//!
//! The registry maps string type names to constructors so pipelines can be
//! assembled from serialized descriptions. Registration is append-only:
//! subsystems install their types at startup and workers only ever take the
//! read lock afterwards, so concurrent `create_*` calls never contend.

use crate::graph::{FlowGraph, GraphError, NodeHandle};
use crate::node::{InputDevice, OutputDevice, ProcessNode};
use crate::nodes::register_builtin_nodes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Constructor for a processing node: graph, node id, queueing flag.
pub type ProcessConstructor = Arc<
    dyn Fn(&Arc<FlowGraph>, &str, bool) -> Result<Arc<dyn ProcessNode>, RegistryError>
        + Send
        + Sync,
>;

/// Constructor for an input device: graph, node id, port count.
pub type InputConstructor = Arc<
    dyn Fn(&Arc<FlowGraph>, &str, usize) -> Result<Arc<dyn InputDevice>, RegistryError>
        + Send
        + Sync,
>;

/// Constructor for an output device: graph, node id, queueing flag.
pub type OutputConstructor = Arc<
    dyn Fn(&Arc<FlowGraph>, &str, bool) -> Result<Arc<dyn OutputDevice>, RegistryError>
        + Send
        + Sync,
>;

#[derive(Default)]
struct Tables {
    process: HashMap<String, ProcessConstructor>,
    input: HashMap<String, InputConstructor>,
    output: HashMap<String, OutputConstructor>,
    // Registration order across all three roles, for node_types().
    order: Vec<String>,
}

impl Tables {
    fn contains(&self, name: &str) -> bool {
        self.process.contains_key(name)
            || self.input.contains_key(name)
            || self.output.contains_key(name)
    }
}

/// Registry of node constructors.
pub struct NodeRegistry {
    tables: Arc<RwLock<Tables>>,
}

impl NodeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }

    /// Create a registry with the built-in utility types installed.
    pub fn with_builtins() -> Self {
        Self::default()
    }

    /// Register a processing-node constructor.
    ///
    /// # Example
    /// ```ignore
    /// registry.register_node("passthrough", |_graph, id, queueing| {
    ///     Ok(Arc::new(Passthrough::new(id, queueing)) as Arc<dyn ProcessNode>)
    /// })?;
    /// ```
    pub fn register_node<F>(&self, name: impl Into<String>, constructor: F) -> Result<(), RegistryError>
    where
        F: Fn(&Arc<FlowGraph>, &str, bool) -> Result<Arc<dyn ProcessNode>, RegistryError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let mut tables = self.tables.write();
        if tables.contains(&name) {
            return Err(RegistryError::DuplicateType(name));
        }
        debug!("Registered node type '{}'", name);
        tables.order.push(name.clone());
        tables.process.insert(name, Arc::new(constructor));
        Ok(())
    }

    /// Register an input-device constructor.
    pub fn register_input<F>(&self, name: impl Into<String>, constructor: F) -> Result<(), RegistryError>
    where
        F: Fn(&Arc<FlowGraph>, &str, usize) -> Result<Arc<dyn InputDevice>, RegistryError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let mut tables = self.tables.write();
        if tables.contains(&name) {
            return Err(RegistryError::DuplicateType(name));
        }
        debug!("Registered input device type '{}'", name);
        tables.order.push(name.clone());
        tables.input.insert(name, Arc::new(constructor));
        Ok(())
    }

    /// Register an output-device constructor.
    pub fn register_output<F>(&self, name: impl Into<String>, constructor: F) -> Result<(), RegistryError>
    where
        F: Fn(&Arc<FlowGraph>, &str, bool) -> Result<Arc<dyn OutputDevice>, RegistryError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let mut tables = self.tables.write();
        if tables.contains(&name) {
            return Err(RegistryError::DuplicateType(name));
        }
        debug!("Registered output device type '{}'", name);
        tables.order.push(name.clone());
        tables.output.insert(name, Arc::new(constructor));
        Ok(())
    }

    /// Create an empty graph for nodes built by this registry.
    pub fn create_graph(&self) -> Arc<FlowGraph> {
        FlowGraph::new()
    }

    /// Create a processing node and bind it to the graph.
    ///
    /// An unknown type name fails before anything touches the graph.
    pub fn create_node(
        &self,
        graph: &Arc<FlowGraph>,
        node_id: &str,
        type_name: &str,
        queueing: bool,
    ) -> Result<Arc<dyn ProcessNode>, RegistryError> {
        let constructor = {
            let tables = self.tables.read();
            tables
                .process
                .get(type_name)
                .cloned()
                .ok_or_else(|| RegistryError::UnknownNodeType(type_name.to_string()))?
        };
        let node = constructor(graph, node_id, queueing)?;
        graph.insert(NodeHandle::Process(Arc::clone(&node)))?;
        debug!("Created '{}' node '{}'", type_name, node_id);
        Ok(node)
    }

    /// Create an input device and bind it to the graph.
    pub fn create_input_device(
        &self,
        graph: &Arc<FlowGraph>,
        node_id: &str,
        type_name: &str,
        num_ports: usize,
    ) -> Result<Arc<dyn InputDevice>, RegistryError> {
        let constructor = {
            let tables = self.tables.read();
            tables
                .input
                .get(type_name)
                .cloned()
                .ok_or_else(|| RegistryError::UnknownNodeType(type_name.to_string()))?
        };
        let device = constructor(graph, node_id, num_ports)?;
        graph.insert(NodeHandle::Input(Arc::clone(&device)))?;
        debug!("Created '{}' input device '{}'", type_name, node_id);
        Ok(device)
    }

    /// Create an output device and bind it to the graph.
    pub fn create_output_device(
        &self,
        graph: &Arc<FlowGraph>,
        node_id: &str,
        type_name: &str,
        queueing: bool,
    ) -> Result<Arc<dyn OutputDevice>, RegistryError> {
        let constructor = {
            let tables = self.tables.read();
            tables
                .output
                .get(type_name)
                .cloned()
                .ok_or_else(|| RegistryError::UnknownNodeType(type_name.to_string()))?
        };
        let device = constructor(graph, node_id, queueing)?;
        graph.insert(NodeHandle::Output(Arc::clone(&device)))?;
        debug!("Created '{}' output device '{}'", type_name, node_id);
        Ok(device)
    }

    /// All registered type names, in registration order.
    pub fn node_types(&self) -> Vec<String> {
        self.tables.read().order.clone()
    }

    /// Check if a type is registered under any role.
    pub fn has_type(&self, name: &str) -> bool {
        self.tables.read().contains(name)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        let registry = Self::new();
        if let Err(err) = register_builtin_nodes(&registry) {
            // Only reachable if a builtin name collides with itself.
            error!("Failed to register builtin node types: {}", err);
        }
        registry
    }
}

impl Clone for NodeRegistry {
    fn clone(&self) -> Self {
        Self {
            tables: Arc::clone(&self.tables),
        }
    }
}

/// Errors that can occur when using the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Node type '{0}' is already registered")]
    DuplicateType(String),

    #[error("Construction failed: {0}")]
    ConstructionFailed(String),

    #[error(transparent)]
    Graph(#[from] GraphError),
}
