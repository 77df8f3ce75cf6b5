//! Inference session: settings, artifact loading and the frame pipeline.
//!
//! A session owns one model and two expression programs and runs every frame
//! through the same sequence: normalize, convert to the model's element kind
//! and axis layout, execute, convert back, denormalize. Loading is never a
//! hard failure. Each artifact records its own state and a session with
//! missing pieces degrades to whatever subset of the pipeline still works,
//! down to plain pass-through when no model is loaded.

use crate::artifact::{Artifact, ArtifactState};
use crate::convert::{change_layout, convert_scalar_kind};
use crate::expr::{ExprCompiler, ExprProgram, IDENTITY_EXPR};
use crate::runtime::{LoadedModel, ModelRuntime};
use serde::{Deserialize, Serialize};
use sonoflow_core::{AxisLayout, ScalarKind, Tensor};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Everything a session needs to load its artifacts and shape its pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// Model file to load. An empty path means "no model configured".
    pub model_path: PathBuf,
    /// Expression applied to each element before the model runs.
    pub normalize: String,
    /// Expression applied to each element after the model output is
    /// converted back to the frame format.
    pub denormalize: String,
    /// Axis layout of the frames arriving from the pipeline.
    pub frame_layout: AxisLayout,
    /// Axis layout the model expects.
    pub model_layout: AxisLayout,
    /// Element kind the model expects.
    pub model_kind: ScalarKind,
    /// Element kind of the emitted frames. `None` keeps the input's kind.
    pub output_kind: Option<ScalarKind>,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            normalize: IDENTITY_EXPR.to_string(),
            denormalize: IDENTITY_EXPR.to_string(),
            frame_layout: AxisLayout::default(),
            model_layout: AxisLayout::default(),
            model_kind: ScalarKind::Float,
            output_kind: None,
        }
    }
}

impl InferenceSettings {
    /// Substitute the identity expression for empty scripts.
    fn sanitize(&mut self) {
        if self.normalize.is_empty() {
            error!(
                "Empty normalization expression configured. Falling back to '{}'.",
                IDENTITY_EXPR
            );
            self.normalize = IDENTITY_EXPR.to_string();
        }
        if self.denormalize.is_empty() {
            error!(
                "Empty denormalization expression configured. Falling back to '{}'.",
                IDENTITY_EXPR
            );
            self.denormalize = IDENTITY_EXPR.to_string();
        }
    }
}

/// One configured model plus its expression programs.
pub struct InferenceSession {
    settings: InferenceSettings,
    runtime: Arc<dyn ModelRuntime>,
    compiler: Arc<dyn ExprCompiler>,
    model: Artifact<Box<dyn LoadedModel>>,
    normalize: Artifact<Box<dyn ExprProgram>>,
    denormalize: Artifact<Box<dyn ExprProgram>>,
}

impl InferenceSession {
    /// Build a session and immediately attempt to load its artifacts.
    pub fn new(
        mut settings: InferenceSettings,
        runtime: Arc<dyn ModelRuntime>,
        compiler: Arc<dyn ExprCompiler>,
    ) -> Self {
        settings.sanitize();
        let mut session = Self {
            settings,
            runtime,
            compiler,
            model: Artifact::Unloaded,
            normalize: Artifact::Unloaded,
            denormalize: Artifact::Unloaded,
        };
        session.load();
        session
    }

    /// Replace the settings and reload every artifact.
    pub fn reconfigure(&mut self, mut settings: InferenceSettings) {
        settings.sanitize();
        self.settings = settings;
        self.load();
    }

    /// Load the model and compile both expressions.
    ///
    /// Every artifact is attempted regardless of earlier failures; each
    /// records its own outcome. An empty model path skips the model load
    /// entirely and leaves that slot unloaded.
    pub fn load(&mut self) {
        self.model = Artifact::Unloaded;
        self.normalize = Artifact::Unloaded;
        self.denormalize = Artifact::Unloaded;

        let path = self.settings.model_path.clone();
        if path.as_os_str().is_empty() {
            error!("No model path configured.");
        } else if !path.exists() {
            error!("Model file '{}' does not exist.", path.display());
            self.model = Artifact::Failed;
        } else {
            match self.runtime.load_model(&path) {
                Ok(model) => {
                    info!("Loaded model '{}'.", path.display());
                    self.model = Artifact::Loaded(model);
                }
                Err(err) => {
                    error!(
                        "Failed to load model '{}': {}",
                        path.display(),
                        err.message()
                    );
                    if let Some(detail) = err.detail() {
                        error!("{}", detail);
                    }
                    self.model = Artifact::Failed;
                }
            }
        }

        self.normalize = compile_artifact(&*self.compiler, &self.settings.normalize);
        self.denormalize = compile_artifact(&*self.compiler, &self.settings.denormalize);
    }

    /// Run one frame through the pipeline.
    ///
    /// Without a loaded model the frame is returned untouched. A failing
    /// forward pass also returns the original frame; expression or
    /// conversion problems degrade to the unmodified intermediate value.
    pub fn infer(&self, input: &Arc<Tensor>) -> Arc<Tensor> {
        let Some(model) = self.model.get() else {
            error!("No model loaded. Passing the frame through unmodified.");
            return Arc::clone(input);
        };

        let normalized = self.apply_expr(&self.normalize, input);
        let converted = convert_scalar_kind(&normalized, self.settings.model_kind);
        let model_input = change_layout(
            &converted,
            &self.settings.frame_layout,
            &self.settings.model_layout,
        );

        let raw = match model.run(&model_input) {
            Ok(output) => output,
            Err(err) => {
                error!("Model execution failed: {}", err.message());
                if let Some(detail) = err.detail() {
                    error!("{}", detail);
                }
                return Arc::clone(input);
            }
        };

        let restored = change_layout(
            &raw,
            &self.settings.model_layout,
            &self.settings.frame_layout,
        );
        let output_kind = self.settings.output_kind.unwrap_or(input.kind());
        let converted = convert_scalar_kind(&restored, output_kind);
        Arc::new(self.apply_expr(&self.denormalize, &converted))
    }

    fn apply_expr(&self, program: &Artifact<Box<dyn ExprProgram>>, input: &Tensor) -> Tensor {
        let Some(program) = program.get() else {
            return input.clone();
        };
        match program.apply(input) {
            Ok(output) => output,
            Err(err) => {
                error!("{}", err);
                input.clone()
            }
        }
    }

    pub fn settings(&self) -> &InferenceSettings {
        &self.settings
    }

    pub fn model_state(&self) -> ArtifactState {
        self.model.state()
    }

    pub fn normalize_state(&self) -> ArtifactState {
        self.normalize.state()
    }

    pub fn denormalize_state(&self) -> ArtifactState {
        self.denormalize.state()
    }
}

fn compile_artifact(
    compiler: &dyn ExprCompiler,
    expression: &str,
) -> Artifact<Box<dyn ExprProgram>> {
    match compiler.compile(expression) {
        Ok(program) => Artifact::Loaded(program),
        Err(err) => {
            error!("{}", err);
            Artifact::Failed
        }
    }
}
