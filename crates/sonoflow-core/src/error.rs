//! Error types for sonoflow-core.

use thiserror::Error;

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Aggregate error type for core operations.
///
/// Each subsystem keeps its own error enum next to its module; this wrapper
/// exists so callers that cross subsystem boundaries can use one `?`-friendly
/// type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Tensor(#[from] crate::tensor::TensorError),

    #[error(transparent)]
    Layout(#[from] crate::layout::LayoutError),

    #[error(transparent)]
    Graph(#[from] crate::graph::GraphError),

    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),

    #[error(transparent)]
    Node(#[from] crate::node::NodeError),
}
