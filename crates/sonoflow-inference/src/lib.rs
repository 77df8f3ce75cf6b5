//! Model inference for tensor pipelines, independent of any ML framework.
//!
//! A session loads one model plus two element-wise expression scripts and
//! runs every frame through the same pipeline: normalize, convert to the
//! model's element kind and axis layout, execute, convert back, denormalize.
//! Loading never aborts: each artifact tracks its own state, and a session
//! with missing pieces degrades gracefully down to plain pass-through.
//!
//! This crate contains NO ML framework dependencies. Backends implement
//! [`ModelRuntime`]; use `sonoflow-tract` for a tract-based ONNX backend,
//! or bring your own.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sonoflow_inference::{rhai_compiler, InferenceSession, InferenceSettings};
//!
//! let settings = InferenceSettings {
//!     model_path: "denoise.onnx".into(),
//!     normalize: "a / 255.0".to_string(),
//!     denormalize: "a * 255.0".to_string(),
//!     ..Default::default()
//! };
//! let session = InferenceSession::new(settings, runtime, rhai_compiler());
//! let output = session.infer(&frame);
//! ```

// Runtime boundary
mod runtime;
pub use runtime::{LoadedModel, ModelRuntime, NullRuntime, RuntimeError};

// Expression programs
mod expr;
pub use expr::{ExprCompiler, ExprError, ExprProgram, IDENTITY_EXPR};

mod script;
pub use script::{rhai_compiler, RhaiExprCompiler, RhaiProgram};

// Frame conversion between pipeline and model formats
mod convert;
pub use convert::{change_layout, convert_scalar_kind, layout_permutation};

// Artifact lifecycle
mod artifact;
pub use artifact::{Artifact, ArtifactState};

// Session and its pipeline node
mod session;
pub use session::{InferenceSession, InferenceSettings};

mod node;
pub use node::{register_inference, InferenceNode};
