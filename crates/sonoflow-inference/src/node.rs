//! Pipeline node wrapping an [`InferenceSession`].
//!
//! The node owns its session behind a mutex: frames lock it for the
//! duration of one forward pass, and `configure` locks it to swap settings
//! and reload. Reconfiguration therefore never races an in-flight frame.

use crate::artifact::ArtifactState;
use crate::expr::ExprCompiler;
use crate::runtime::ModelRuntime;
use crate::session::{InferenceSession, InferenceSettings};
use parking_lot::Mutex;
use sonoflow_core::{
    AxisLayout, LayoutError, NodeError, NodeRegistry, ParamValue, Params, ProcessNode,
    RegistryError, ScalarKind, Tensor, TensorError,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Processing node that runs frames through a model.
pub struct InferenceNode {
    id: String,
    queueing: bool,
    session: Mutex<InferenceSession>,
}

impl InferenceNode {
    pub fn new(
        id: impl Into<String>,
        queueing: bool,
        settings: InferenceSettings,
        runtime: Arc<dyn ModelRuntime>,
        compiler: Arc<dyn ExprCompiler>,
    ) -> Self {
        Self {
            id: id.into(),
            queueing,
            session: Mutex::new(InferenceSession::new(settings, runtime, compiler)),
        }
    }

    /// Node with default settings: no model, identity expressions.
    pub fn with_defaults(
        id: impl Into<String>,
        queueing: bool,
        runtime: Arc<dyn ModelRuntime>,
        compiler: Arc<dyn ExprCompiler>,
    ) -> Self {
        Self::new(id, queueing, InferenceSettings::default(), runtime, compiler)
    }

    pub fn settings(&self) -> InferenceSettings {
        self.session.lock().settings().clone()
    }

    pub fn model_state(&self) -> ArtifactState {
        self.session.lock().model_state()
    }

    pub fn normalize_state(&self) -> ArtifactState {
        self.session.lock().normalize_state()
    }

    pub fn denormalize_state(&self) -> ArtifactState {
        self.session.lock().denormalize_state()
    }
}

impl ProcessNode for InferenceNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn queueing(&self) -> bool {
        self.queueing
    }

    fn process(&self, frame: Arc<Tensor>) -> Result<Arc<Tensor>, NodeError> {
        Ok(self.session.lock().infer(&frame))
    }

    /// Update session settings from a parameter map.
    ///
    /// All parameters are validated before anything is applied, so a bad
    /// map leaves the session exactly as it was.
    fn configure(&self, params: &Params) -> Result<(), NodeError> {
        let mut session = self.session.lock();
        let mut settings = session.settings().clone();
        for (key, value) in params {
            match key.as_str() {
                "model" => settings.model_path = PathBuf::from(require_str(key, value)?),
                "normalize" => settings.normalize = require_str(key, value)?.to_string(),
                "denormalize" => settings.denormalize = require_str(key, value)?.to_string(),
                "frame_layout" => settings.frame_layout = parse_layout(key, value)?,
                "model_layout" => settings.model_layout = parse_layout(key, value)?,
                "model_kind" => settings.model_kind = parse_kind(key, value)?,
                "output_kind" => settings.output_kind = Some(parse_kind(key, value)?),
                other => return Err(NodeError::UnknownParameter(other.to_string())),
            }
        }
        session.reconfigure(settings);
        Ok(())
    }
}

fn require_str<'a>(key: &str, value: &'a ParamValue) -> Result<&'a str, NodeError> {
    value.as_str().ok_or_else(|| {
        NodeError::InvalidParameter(key.to_string(), "expected a string".to_string())
    })
}

fn parse_layout(key: &str, value: &ParamValue) -> Result<AxisLayout, NodeError> {
    require_str(key, value)?
        .parse()
        .map_err(|err: LayoutError| NodeError::InvalidParameter(key.to_string(), err.to_string()))
}

fn parse_kind(key: &str, value: &ParamValue) -> Result<ScalarKind, NodeError> {
    require_str(key, value)?
        .parse()
        .map_err(|err: TensorError| NodeError::InvalidParameter(key.to_string(), err.to_string()))
}

/// Register the `inference` node type.
///
/// Every created node shares the given runtime and compiler; each gets its
/// own session, configured through node parameters after construction.
pub fn register_inference(
    registry: &NodeRegistry,
    runtime: Arc<dyn ModelRuntime>,
    compiler: Arc<dyn ExprCompiler>,
) -> Result<(), RegistryError> {
    registry.register_node("inference", move |_graph, id, queueing| {
        Ok(Arc::new(InferenceNode::with_defaults(
            id,
            queueing,
            Arc::clone(&runtime),
            Arc::clone(&compiler),
        )) as Arc<dyn ProcessNode>)
    })
}
