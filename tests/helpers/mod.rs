//! Test helpers and fixtures for Sonoflow integration tests
//!
//! Provides stub model runtimes (element-wise closures instead of real
//! model files), deterministic tensor builders, a frame-capturing sink,
//! and comparison assertions with detailed failure messages.
//!
//! ## Tolerances
//!
//! - `EXACT_EPSILON` (1e-6): passthrough, identity expressions, staging
//! - `EXPR_EPSILON` (1e-4): expression arithmetic routed through f64

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use sonoflow::{
    InputDevice, LoadedModel, ModelRuntime, NodeError, OutputDevice, RuntimeError, ScalarKind,
    Tensor, TensorData,
};
use tempfile::NamedTempFile;

/// Tolerance for operations that must preserve values bit-for-bit in f32.
pub const EXACT_EPSILON: f64 = 1e-6;

/// Tolerance for expression arithmetic, which routes through f64 and back.
pub const EXPR_EPSILON: f64 = 1e-4;

/// Standard 4-axis frame shape for tests (batch, channel, height, width).
pub const TEST_SHAPE: [usize; 4] = [1, 1, 2, 3];

// =============================================================================
// Stub Model Runtimes
// =============================================================================

/// Model applying a fixed element-wise function, emitting f32 frames.
struct FnModel {
    op: Arc<dyn Fn(f64) -> f64 + Send + Sync>,
}

impl LoadedModel for FnModel {
    fn run(&self, input: &Tensor) -> Result<Tensor, RuntimeError> {
        let values: Vec<f32> = input.as_f64_vec().iter().map(|&v| (self.op)(v) as f32).collect();
        Tensor::from_f32(input.shape(), values)
            .map_err(|err| RuntimeError::new(format!("Stub model broke the frame: {}", err)))
    }
}

/// Runtime whose models apply a fixed element-wise function.
///
/// `load_model` never inspects the file contents, so any existing file
/// (see [`stub_model_file`]) stands in for a real model.
pub struct FnRuntime {
    op: Arc<dyn Fn(f64) -> f64 + Send + Sync>,
}

impl FnRuntime {
    pub fn new<F>(op: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self { op: Arc::new(op) }
    }
}

impl ModelRuntime for FnRuntime {
    fn load_model(&self, _path: &std::path::Path) -> Result<Box<dyn LoadedModel>, RuntimeError> {
        Ok(Box::new(FnModel {
            op: Arc::clone(&self.op),
        }))
    }
}

/// Runtime whose models double every element.
pub fn doubling_runtime() -> Arc<dyn ModelRuntime> {
    Arc::new(FnRuntime::new(|v| v * 2.0))
}

/// Runtime whose models return every element unchanged.
pub fn identity_runtime() -> Arc<dyn ModelRuntime> {
    Arc::new(FnRuntime::new(|v| v))
}

/// Runtime that refuses to load any model.
pub struct FailingRuntime {
    message: String,
}

impl FailingRuntime {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl ModelRuntime for FailingRuntime {
    fn load_model(&self, _path: &std::path::Path) -> Result<Box<dyn LoadedModel>, RuntimeError> {
        Err(RuntimeError::new(self.message.clone()))
    }
}

pub fn failing_runtime(message: &str) -> Arc<dyn ModelRuntime> {
    Arc::new(FailingRuntime::new(message))
}

/// Runtime whose models echo the input and log every frame they see.
///
/// Returns the runtime plus the shared log, so tests can assert on the
/// exact shape and element kind the model received.
pub fn recording_runtime() -> (Arc<dyn ModelRuntime>, Arc<Mutex<Vec<Tensor>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let runtime = Arc::new(RecordingRuntime {
        seen: Arc::clone(&log),
    });
    (runtime, log)
}

struct RecordingRuntime {
    seen: Arc<Mutex<Vec<Tensor>>>,
}

impl ModelRuntime for RecordingRuntime {
    fn load_model(&self, _path: &std::path::Path) -> Result<Box<dyn LoadedModel>, RuntimeError> {
        Ok(Box::new(RecordingModel {
            seen: Arc::clone(&self.seen),
        }))
    }
}

struct RecordingModel {
    seen: Arc<Mutex<Vec<Tensor>>>,
}

impl LoadedModel for RecordingModel {
    fn run(&self, input: &Tensor) -> Result<Tensor, RuntimeError> {
        self.seen.lock().unwrap().push(input.clone());
        Ok(input.clone())
    }
}

/// Create an empty temp file standing in for a model on disk.
///
/// The stub runtimes never parse the file; it only has to exist so the
/// loader's path check passes. Keep the handle alive for the test's
/// duration or the file disappears.
pub fn stub_model_file() -> NamedTempFile {
    NamedTempFile::new().expect("Failed to create stub model file")
}

pub fn stub_model_path(file: &NamedTempFile) -> PathBuf {
    file.path().to_path_buf()
}

// =============================================================================
// Frame Builders
// =============================================================================

/// Build an f32 frame with the standard test shape and ascending values.
pub fn staircase_frame() -> Arc<Tensor> {
    let len: usize = TEST_SHAPE.iter().product();
    let values: Vec<f32> = (0..len).map(|i| i as f32).collect();
    Arc::new(Tensor::from_f32(&TEST_SHAPE, values).expect("Frame shape mismatch"))
}

/// Build an f32 frame with an explicit shape and values.
pub fn f32_frame(shape: &[usize], values: Vec<f32>) -> Arc<Tensor> {
    Arc::new(Tensor::from_f32(shape, values).expect("Frame shape mismatch"))
}

/// Build a u8 frame with an explicit shape and values.
pub fn u8_frame(shape: &[usize], values: Vec<u8>) -> Arc<Tensor> {
    Arc::new(Tensor::from_u8(shape, values).expect("Frame shape mismatch"))
}

// =============================================================================
// Capturing Devices
// =============================================================================

/// Output device that stores every consumed frame for later inspection.
pub struct CaptureSink {
    id: String,
    frames: Arc<Mutex<Vec<Arc<Tensor>>>>,
}

impl CaptureSink {
    pub fn new(id: impl Into<String>) -> (Self, Arc<Mutex<Vec<Arc<Tensor>>>>) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Self::with_store(id, Arc::clone(&frames));
        (sink, frames)
    }

    /// Variant writing into an existing store. Lets registry constructor
    /// closures hand the capture buffer back out to the test.
    pub fn with_store(id: impl Into<String>, frames: Arc<Mutex<Vec<Arc<Tensor>>>>) -> Self {
        Self {
            id: id.into(),
            frames,
        }
    }
}

impl OutputDevice for CaptureSink {
    fn id(&self) -> &str {
        &self.id
    }

    fn queueing(&self) -> bool {
        true
    }

    fn consume(&self, frame: Arc<Tensor>) -> Result<(), NodeError> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }
}

/// Input device replaying a fixed list of frames, then reporting exhaustion.
pub struct ReplaySource {
    id: String,
    frames: Vec<Arc<Tensor>>,
    cursor: AtomicU64,
}

impl ReplaySource {
    pub fn new(id: impl Into<String>, frames: Vec<Arc<Tensor>>) -> Self {
        Self {
            id: id.into(),
            frames,
            cursor: AtomicU64::new(0),
        }
    }
}

impl InputDevice for ReplaySource {
    fn id(&self) -> &str {
        &self.id
    }

    fn ports(&self) -> usize {
        1
    }

    fn produce(&self) -> Option<Arc<Tensor>> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) as usize;
        self.frames.get(index).map(Arc::clone)
    }
}

// =============================================================================
// Assertions
// =============================================================================

/// Assert two frames hold the same values within tolerance, with a
/// detailed message naming the first differing element.
pub fn assert_frames_close(actual: &Tensor, expected: &Tensor, epsilon: f64, context: &str) {
    assert_eq!(
        actual.shape(),
        expected.shape(),
        "{}: Shape mismatch: got {:?}, expected {:?}",
        context,
        actual.shape(),
        expected.shape()
    );
    let a = actual.as_f64_vec();
    let b = expected.as_f64_vec();
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        assert!(
            (x - y).abs() <= epsilon,
            "{}: Element {} differs: got {}, expected {} (diff={})",
            context,
            i,
            x,
            y,
            (x - y).abs()
        );
    }
}

/// Assert a frame holds exactly the given values (within [`EXACT_EPSILON`]).
pub fn assert_frame_values(actual: &Tensor, expected: &[f64], context: &str) {
    let values = actual.as_f64_vec();
    assert_eq!(
        values.len(),
        expected.len(),
        "{}: Length mismatch: got {}, expected {}",
        context,
        values.len(),
        expected.len()
    );
    for (i, (x, y)) in values.iter().zip(expected.iter()).enumerate() {
        assert!(
            (x - y).abs() <= EXACT_EPSILON,
            "{}: Element {} differs: got {}, expected {}",
            context,
            i,
            x,
            y
        );
    }
}

/// Assert a frame's element kind.
pub fn assert_frame_kind(actual: &Tensor, expected: ScalarKind, context: &str) {
    assert_eq!(
        actual.kind(),
        expected,
        "{}: Kind mismatch: got {}, expected {}",
        context,
        actual.kind(),
        expected
    );
}

/// Extract a frame's data as i64, panicking on float frames.
pub fn frame_i64(tensor: &Tensor) -> Vec<i64> {
    match tensor.data() {
        TensorData::I8(v) => v.iter().map(|&x| x as i64).collect(),
        TensorData::U8(v) => v.iter().map(|&x| x as i64).collect(),
        TensorData::I16(v) => v.iter().map(|&x| x as i64).collect(),
        TensorData::U16(v) => v.iter().map(|&x| x as i64).collect(),
        TensorData::I32(v) => v.iter().map(|&x| x as i64).collect(),
        TensorData::U32(v) => v.iter().map(|&x| x as i64).collect(),
        TensorData::I64(v) => v.clone(),
        TensorData::U64(v) => v.iter().map(|&x| x as i64).collect(),
        other => panic!("Expected an integer frame, got {}", other.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staircase_frame_values() {
        let frame = staircase_frame();
        assert_eq!(frame.shape(), &TEST_SHAPE);
        assert_frame_values(&frame, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0], "staircase");
    }

    #[test]
    fn test_fn_runtime_applies_op() {
        let runtime = doubling_runtime();
        let stub = stub_model_file();
        let model = runtime.load_model(stub.path()).unwrap();
        let output = model.run(&staircase_frame()).unwrap();
        assert_frame_values(&output, &[0.0, 2.0, 4.0, 6.0, 8.0, 10.0], "doubled staircase");
    }

    #[test]
    fn test_replay_source_exhausts() {
        let source = ReplaySource::new("replay", vec![staircase_frame(), staircase_frame()]);
        assert!(source.produce().is_some());
        assert!(source.produce().is_some());
        assert!(source.produce().is_none());
    }

    #[test]
    fn test_capture_sink_stores_frames() {
        let (sink, frames) = CaptureSink::new("capture");
        sink.consume(staircase_frame()).unwrap();
        sink.consume(staircase_frame()).unwrap();
        assert_eq!(frames.lock().unwrap().len(), 2);
    }
}
