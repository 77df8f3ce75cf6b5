//! Built-in utility nodes.
//!
//! Trivial sources, sinks and stages used for wiring up pipelines and for
//! testing without any real processing subsystem attached.

use crate::node::{InputDevice, NodeError, OutputDevice, ProcessNode};
use crate::registry::{NodeRegistry, RegistryError};
use crate::tensor::{ScalarKind, Tensor, TensorData};
use half::f16;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Identity stage: every frame passes through unchanged.
pub struct Passthrough {
    id: String,
    queueing: bool,
}

impl Passthrough {
    pub fn new(id: impl Into<String>, queueing: bool) -> Self {
        Self {
            id: id.into(),
            queueing,
        }
    }
}

impl ProcessNode for Passthrough {
    fn id(&self) -> &str {
        &self.id
    }

    fn queueing(&self) -> bool {
        self.queueing
    }

    fn process(&self, frame: Arc<Tensor>) -> Result<Arc<Tensor>, NodeError> {
        Ok(frame)
    }
}

/// Deterministic frame source producing staircase data.
///
/// Frame `n` holds the values `n*len .. (n+1)*len` cast to the configured
/// element kind, so tests can verify exactly which frame reached a sink.
pub struct RampSource {
    id: String,
    ports: usize,
    shape: Vec<usize>,
    kind: ScalarKind,
    limit: Option<u64>,
    cursor: AtomicU64,
}

impl RampSource {
    pub fn new(id: impl Into<String>, ports: usize) -> Self {
        Self {
            id: id.into(),
            ports,
            shape: vec![1, 1, 8, 8],
            kind: ScalarKind::Float,
            limit: None,
            cursor: AtomicU64::new(0),
        }
    }

    /// Override the frame shape.
    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = shape;
        self
    }

    /// Override the element kind.
    pub fn with_kind(mut self, kind: ScalarKind) -> Self {
        self.kind = kind;
        self
    }

    /// Stop producing after `limit` frames.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl InputDevice for RampSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn ports(&self) -> usize {
        self.ports
    }

    fn produce(&self) -> Option<Arc<Tensor>> {
        let frame = self.cursor.fetch_add(1, Ordering::Relaxed);
        if let Some(limit) = self.limit {
            if frame >= limit {
                return None;
            }
        }
        let len: usize = self.shape.iter().product();
        let offset = frame.saturating_mul(len as u64);
        Tensor::new(self.shape.clone(), ramp_data(self.kind, offset, len))
            .ok()
            .map(Arc::new)
    }
}

fn ramp_data(kind: ScalarKind, offset: u64, len: usize) -> TensorData {
    let values = (0..len as u64).map(|i| offset + i);
    match kind {
        ScalarKind::Int8 => TensorData::I8(values.map(|v| v as i8).collect()),
        ScalarKind::Uint8 => TensorData::U8(values.map(|v| v as u8).collect()),
        ScalarKind::Int16 => TensorData::I16(values.map(|v| v as i16).collect()),
        ScalarKind::Uint16 => TensorData::U16(values.map(|v| v as u16).collect()),
        ScalarKind::Int32 => TensorData::I32(values.map(|v| v as i32).collect()),
        ScalarKind::Uint32 => TensorData::U32(values.map(|v| v as u32).collect()),
        ScalarKind::Int64 => TensorData::I64(values.map(|v| v as i64).collect()),
        ScalarKind::Uint64 => TensorData::U64(values.collect()),
        ScalarKind::Half => TensorData::F16(values.map(|v| f16::from_f32(v as f32)).collect()),
        ScalarKind::Float => TensorData::F32(values.map(|v| v as f32).collect()),
        ScalarKind::Double => TensorData::F64(values.map(|v| v as f64).collect()),
    }
}

/// Output device that logs each frame's shape and kind, then drops it.
pub struct TraceSink {
    id: String,
    queueing: bool,
    consumed: AtomicU64,
}

impl TraceSink {
    pub fn new(id: impl Into<String>, queueing: bool) -> Self {
        Self {
            id: id.into(),
            queueing,
            consumed: AtomicU64::new(0),
        }
    }

    /// Number of frames consumed so far.
    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }
}

impl OutputDevice for TraceSink {
    fn id(&self) -> &str {
        &self.id
    }

    fn queueing(&self) -> bool {
        self.queueing
    }

    fn consume(&self, frame: Arc<Tensor>) -> Result<(), NodeError> {
        let n = self.consumed.fetch_add(1, Ordering::Relaxed);
        info!(
            "[{}] frame {}: {} {:?}, {} elements",
            self.id,
            n,
            frame.kind(),
            frame.shape(),
            frame.len()
        );
        Ok(())
    }
}

/// Output device that silently discards every frame.
pub struct NullSink {
    id: String,
    queueing: bool,
}

impl NullSink {
    pub fn new(id: impl Into<String>, queueing: bool) -> Self {
        Self {
            id: id.into(),
            queueing,
        }
    }
}

impl OutputDevice for NullSink {
    fn id(&self) -> &str {
        &self.id
    }

    fn queueing(&self) -> bool {
        self.queueing
    }

    fn consume(&self, _frame: Arc<Tensor>) -> Result<(), NodeError> {
        Ok(())
    }
}

/// Register the built-in node types.
pub fn register_builtin_nodes(registry: &NodeRegistry) -> Result<(), RegistryError> {
    registry.register_node("passthrough", |_graph, id, queueing| {
        Ok(Arc::new(Passthrough::new(id, queueing)) as Arc<dyn ProcessNode>)
    })?;

    registry.register_input("ramp_source", |_graph, id, ports| {
        Ok(Arc::new(RampSource::new(id, ports)) as Arc<dyn InputDevice>)
    })?;

    registry.register_output("trace_sink", |_graph, id, queueing| {
        Ok(Arc::new(TraceSink::new(id, queueing)) as Arc<dyn OutputDevice>)
    })?;

    registry.register_output("null_sink", |_graph, id, queueing| {
        Ok(Arc::new(NullSink::new(id, queueing)) as Arc<dyn OutputDevice>)
    })?;

    Ok(())
}
