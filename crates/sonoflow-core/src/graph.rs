//! Shared flow-graph context.
//!
//! A [`FlowGraph`] is the binding surface between the factory layer and the
//! scheduling engine: nodes become part of a pipeline the moment they are
//! inserted, and edges describe where frames travel. The graph itself never
//! schedules anything; it is a concurrently readable table of handles plus
//! an edge list.

use crate::node::{InputDevice, OutputDevice, ProcessNode};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// A shared handle to any node bound to a graph.
#[derive(Clone)]
pub enum NodeHandle {
    Input(Arc<dyn InputDevice>),
    Process(Arc<dyn ProcessNode>),
    Output(Arc<dyn OutputDevice>),
}

impl NodeHandle {
    pub fn id(&self) -> &str {
        match self {
            Self::Input(n) => n.id(),
            Self::Process(n) => n.id(),
            Self::Output(n) => n.id(),
        }
    }

    pub fn role(&self) -> NodeRole {
        match self {
            Self::Input(_) => NodeRole::Input,
            Self::Process(_) => NodeRole::Process,
            Self::Output(_) => NodeRole::Output,
        }
    }

    pub fn as_input(&self) -> Option<&Arc<dyn InputDevice>> {
        match self {
            Self::Input(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_process(&self) -> Option<&Arc<dyn ProcessNode>> {
        match self {
            Self::Process(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_output(&self) -> Option<&Arc<dyn OutputDevice>> {
        match self {
            Self::Output(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("id", &self.id())
            .field("role", &self.role())
            .finish()
    }
}

/// What a node can do within a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Input,
    Process,
    Output,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Input => "input",
            Self::Process => "process",
            Self::Output => "output",
        };
        f.write_str(name)
    }
}

/// A directed connection between two node ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub from_port: usize,
    pub to: String,
    pub to_port: usize,
}

/// Errors from graph mutation.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("A node with id '{0}' already exists in the graph")]
    DuplicateNode(String),

    #[error("No node with id '{0}' exists in the graph")]
    NoSuchNode(String),

    #[error("Node '{id}' cannot be used as a {end} endpoint")]
    InvalidEndpoint { id: String, end: &'static str },
}

/// The shared pipeline context.
///
/// Handed to node constructors as `Arc<FlowGraph>`; the node table is a
/// [`DashMap`] so engine threads resolve handles without blocking the
/// control thread.
pub struct FlowGraph {
    nodes: DashMap<String, NodeHandle>,
    order: Mutex<Vec<String>>,
    edges: Mutex<Vec<Edge>>,
}

impl FlowGraph {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            nodes: DashMap::new(),
            order: Mutex::new(Vec::new()),
            edges: Mutex::new(Vec::new()),
        })
    }

    /// Bind a node to the graph. Fails if the id is already taken.
    pub fn insert(&self, handle: NodeHandle) -> Result<(), GraphError> {
        let id = handle.id().to_string();
        let role = handle.role();
        match self.nodes.entry(id.clone()) {
            Entry::Occupied(_) => Err(GraphError::DuplicateNode(id)),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                self.order.lock().push(id.clone());
                debug!("Bound {} node '{}' to the graph", role, id);
                Ok(())
            }
        }
    }

    /// Connect two bound nodes.
    ///
    /// Both endpoints must exist; an output device cannot feed anything and
    /// an input device cannot be fed.
    pub fn connect(
        &self,
        from: &str,
        from_port: usize,
        to: &str,
        to_port: usize,
    ) -> Result<(), GraphError> {
        let from_role = self
            .nodes
            .get(from)
            .map(|handle| handle.role())
            .ok_or_else(|| GraphError::NoSuchNode(from.to_string()))?;
        let to_role = self
            .nodes
            .get(to)
            .map(|handle| handle.role())
            .ok_or_else(|| GraphError::NoSuchNode(to.to_string()))?;

        if from_role == NodeRole::Output {
            return Err(GraphError::InvalidEndpoint {
                id: from.to_string(),
                end: "source",
            });
        }
        if to_role == NodeRole::Input {
            return Err(GraphError::InvalidEndpoint {
                id: to.to_string(),
                end: "sink",
            });
        }

        self.edges.lock().push(Edge {
            from: from.to_string(),
            from_port,
            to: to.to_string(),
            to_port,
        });
        debug!("Connected '{}':{} -> '{}':{}", from, from_port, to, to_port);
        Ok(())
    }

    /// Look up a node handle by id.
    pub fn node(&self, id: &str) -> Option<NodeHandle> {
        self.nodes.get(id).map(|entry| entry.value().clone())
    }

    /// All node ids in insertion order.
    pub fn node_ids(&self) -> Vec<String> {
        self.order.lock().clone()
    }

    /// Snapshot of the edge list.
    pub fn edges(&self) -> Vec<Edge> {
        self.edges.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Debug for FlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowGraph")
            .field("nodes", &self.len())
            .field("edges", &self.edges.lock().len())
            .finish()
    }
}
