//! Expression program boundary.
//!
//! Normalization and denormalization are single arithmetic expressions over
//! the variable `a`, compiled once and applied element-wise to whole frames.
//! The compiler trait keeps the scripting engine swappable; the rhai-backed
//! implementation lives in [`crate::script`].

use sonoflow_core::{Tensor, TensorError};
use std::fmt;
use thiserror::Error;

/// Expression applied when a configured script is empty.
///
/// `a` evaluates to the input element itself, so the program is a no-op.
pub const IDENTITY_EXPR: &str = "a";

#[derive(Debug, Error)]
pub enum ExprError {
    #[error("Failed to compile expression '{expression}': {message}")]
    Compile { expression: String, message: String },
    #[error("Expression evaluation failed: {0}")]
    Eval(String),
    #[error("Expression produced a non-numeric value of type {0}")]
    NonNumeric(&'static str),
    #[error(transparent)]
    Tensor(#[from] TensorError),
}

/// A compiled element-wise expression.
pub trait ExprProgram: Send + Sync {
    /// Evaluate the expression for every element of `input`.
    ///
    /// The result keeps the input's shape. Element type follows the engine's
    /// numeric tower: integer inputs stay integer unless the expression
    /// produces a float, float inputs keep their own width.
    fn apply(&self, input: &Tensor) -> Result<Tensor, ExprError>;
}

impl fmt::Debug for dyn ExprProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExprProgram").finish_non_exhaustive()
    }
}

/// Capability to compile expression source into a runnable program.
pub trait ExprCompiler: Send + Sync {
    fn compile(&self, expression: &str) -> Result<Box<dyn ExprProgram>, ExprError>;
}
