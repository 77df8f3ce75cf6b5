//! Node capability traits and the shared parameter map.
//!
//! The engine only ever sees nodes through the three traits below. They are
//! object safe and `Send + Sync` so handles can be shared between the
//! control thread (which configures nodes) and worker threads (which push
//! frames through them); implementations keep any mutable state behind
//! interior mutability.

use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Create a `Params` map with key-value pairs.
///
/// # Example
/// ```ignore
/// let params = params! {
///     "model" => "/models/denoise.onnx",
///     "model_kind" => "float",
/// };
/// ```
#[macro_export]
macro_rules! params {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut map = $crate::Params::new();
        $(
            map.insert($key.to_string(), $value.into());
        )*
        map
    }};
}

/// Node parameters (simple key-value map).
pub type Params = HashMap<String, ParamValue>;

/// Parameter value types.
///
/// Variant order matters for serde: untagged deserialization tries `Int`
/// before `Float` so whole numbers stay integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl ParamValue {
    /// Convert to f64 if possible.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Convert to f32 if possible.
    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|f| f as f32)
    }

    /// Convert to i64 if possible.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Convert to bool if possible.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert to string slice if possible.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<f32> for ParamValue {
    fn from(f: f32) -> Self {
        Self::Float(f as f64)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for ParamValue {
    fn from(i: i32) -> Self {
        Self::Int(i as i64)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// Errors raised by node implementations.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Invalid value for parameter '{0}': {1}")]
    InvalidParameter(String, String),

    #[error("Node '{0}' failed to process a frame: {1}")]
    Process(String, String),

    #[error("Output '{0}' rejected a frame: {1}")]
    Consume(String, String),
}

/// A processing stage: one frame in, one frame out.
pub trait ProcessNode: Send + Sync {
    /// Graph-unique identifier.
    fn id(&self) -> &str;

    /// Whether the engine should queue frames for this node instead of
    /// dropping stale ones when the node falls behind.
    fn queueing(&self) -> bool;

    /// Transform one frame. Called from a worker thread.
    fn process(&self, frame: Arc<Tensor>) -> Result<Arc<Tensor>, NodeError>;

    /// Apply settings after construction.
    ///
    /// The default implementation accepts an empty map and rejects
    /// everything else, so nodes without parameters need no override.
    fn configure(&self, params: &Params) -> Result<(), NodeError> {
        match params.keys().next() {
            Some(key) => Err(NodeError::UnknownParameter(key.clone())),
            None => Ok(()),
        }
    }
}

/// A frame source feeding the graph.
pub trait InputDevice: Send + Sync {
    /// Graph-unique identifier.
    fn id(&self) -> &str;

    /// Number of output ports the device exposes.
    fn ports(&self) -> usize;

    /// Produce the next frame, or `None` once the source is exhausted.
    fn produce(&self) -> Option<Arc<Tensor>>;
}

/// A frame sink terminating a graph branch.
pub trait OutputDevice: Send + Sync {
    /// Graph-unique identifier.
    fn id(&self) -> &str;

    /// Whether the engine should queue frames for this sink.
    fn queueing(&self) -> bool;

    /// Accept one frame. Called from a worker thread.
    fn consume(&self, frame: Arc<Tensor>) -> Result<(), NodeError>;
}
