//! Opaque model-runtime boundary.
//!
//! The inference layer never links an ML framework directly. It talks to a
//! [`ModelRuntime`] that can turn a file on disk into a [`LoadedModel`], and
//! to the loaded model that can execute forward passes. Concrete runtimes
//! (such as the tract backend crate) implement these traits; anything else,
//! including tests, can substitute its own.

use sonoflow_core::Tensor;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Error from a model runtime.
///
/// Runtimes wrap their framework's failures into a top-level `message` plus
/// an optional `detail` carrying the framework's own diagnostic stack. The
/// caller logs both; nothing here propagates past the load/run boundary.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RuntimeError {
    message: String,
    detail: Option<String>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

/// A model loaded onto its runtime, ready to execute.
pub trait LoadedModel: Send + Sync {
    /// Run one forward pass.
    fn run(&self, input: &Tensor) -> Result<Tensor, RuntimeError>;
}

impl fmt::Debug for dyn LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel").finish_non_exhaustive()
    }
}

/// Capability to load model artifacts from disk.
///
/// Implementations own parsing, optimization and device placement. The
/// session layer only ever observes success or a [`RuntimeError`].
pub trait ModelRuntime: Send + Sync {
    fn load_model(&self, path: &Path) -> Result<Box<dyn LoadedModel>, RuntimeError>;
}

/// Placeholder runtime that fails every load.
///
/// Used when a pipeline is assembled without a real backend: sessions built
/// on it degrade to pass-through, which is the documented behavior for a
/// missing model.
#[derive(Debug, Default)]
pub struct NullRuntime;

impl NullRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl ModelRuntime for NullRuntime {
    fn load_model(&self, path: &Path) -> Result<Box<dyn LoadedModel>, RuntimeError> {
        Err(RuntimeError::new(format!(
            "No model runtime is configured; cannot load '{}'",
            path.display()
        )))
    }
}
