//! Tract ONNX backend for sonoflow inference.
//!
//! Implements [`ModelRuntime`] on top of [tract](https://github.com/sonos/tract):
//! ONNX files are parsed, optimized and compiled into an execution plan once
//! at load time, then every forward pass runs on the CPU.
//!
//! ```rust,ignore
//! let registry = sonoflow::default_registry(sonoflow_tract::tract_runtime())?;
//! ```

use half::f16;
use sonoflow_core::TensorData;
use sonoflow_inference::{LoadedModel, ModelRuntime, RuntimeError};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use tract_onnx::prelude::*;

/// Model runtime backed by tract's ONNX importer.
#[derive(Debug, Default)]
pub struct TractRuntime;

impl TractRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl ModelRuntime for TractRuntime {
    fn load_model(&self, path: &Path) -> Result<Box<dyn LoadedModel>, RuntimeError> {
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|err| tract_error("Could not parse the ONNX file", &err))?
            .into_optimized()
            .map_err(|err| tract_error("Could not optimize the model", &err))?
            .into_runnable()
            .map_err(|err| tract_error("Could not build an execution plan", &err))?;
        debug!("Compiled execution plan for '{}'", path.display());
        Ok(Box::new(TractModel { plan }))
    }
}

/// A compiled tract execution plan.
pub struct TractModel {
    plan: TypedSimplePlan<TypedModel>,
}

impl LoadedModel for TractModel {
    fn run(&self, input: &sonoflow_core::Tensor) -> Result<sonoflow_core::Tensor, RuntimeError> {
        let staged = to_tract(input)?;
        let outputs = self
            .plan
            .run(tvec![staged.into()])
            .map_err(|err| tract_error("Forward pass failed", &err))?;
        let first = outputs
            .first()
            .ok_or_else(|| RuntimeError::new("Model produced no outputs"))?;
        from_tract(first)
    }
}

/// Shared tract runtime handle in the shape the registry helpers expect.
pub fn tract_runtime() -> Arc<dyn ModelRuntime> {
    Arc::new(TractRuntime::new())
}

fn tract_error(message: &str, err: &TractError) -> RuntimeError {
    RuntimeError::with_detail(format!("{}: {}", message, err), format!("{:?}", err))
}

/// Stage a frame as a tract tensor.
///
/// Half frames are widened to `f32`; tract narrows again inside the graph
/// if the model wants `f16`.
fn to_tract(frame: &sonoflow_core::Tensor) -> Result<Tensor, RuntimeError> {
    let shape = frame.shape();
    let tensor = match frame.data() {
        TensorData::I8(v) => Tensor::from_shape(shape, v),
        TensorData::U8(v) => Tensor::from_shape(shape, v),
        TensorData::I16(v) => Tensor::from_shape(shape, v),
        TensorData::U16(v) => Tensor::from_shape(shape, v),
        TensorData::I32(v) => Tensor::from_shape(shape, v),
        TensorData::U32(v) => Tensor::from_shape(shape, v),
        TensorData::I64(v) => Tensor::from_shape(shape, v),
        TensorData::U64(v) => Tensor::from_shape(shape, v),
        TensorData::F16(v) => {
            let wide: Vec<f32> = v.iter().map(|x| x.to_f32()).collect();
            Tensor::from_shape(shape, &wide)
        }
        TensorData::F32(v) => Tensor::from_shape(shape, v),
        TensorData::F64(v) => Tensor::from_shape(shape, v),
    };
    tensor.map_err(|err| tract_error("Could not stage the input tensor", &err))
}

/// Read a tract tensor back into a frame.
fn from_tract(tensor: &Tensor) -> Result<sonoflow_core::Tensor, RuntimeError> {
    let shape = tensor.shape().to_vec();
    let data = match tensor.datum_type() {
        DatumType::I8 => TensorData::I8(slice_of::<i8>(tensor)?.to_vec()),
        DatumType::U8 => TensorData::U8(slice_of::<u8>(tensor)?.to_vec()),
        DatumType::I16 => TensorData::I16(slice_of::<i16>(tensor)?.to_vec()),
        DatumType::U16 => TensorData::U16(slice_of::<u16>(tensor)?.to_vec()),
        DatumType::I32 => TensorData::I32(slice_of::<i32>(tensor)?.to_vec()),
        DatumType::U32 => TensorData::U32(slice_of::<u32>(tensor)?.to_vec()),
        DatumType::I64 => TensorData::I64(slice_of::<i64>(tensor)?.to_vec()),
        DatumType::U64 => TensorData::U64(slice_of::<u64>(tensor)?.to_vec()),
        DatumType::F16 => {
            let wide = tensor
                .cast_to::<f32>()
                .map_err(|err| tract_error("Could not widen the output tensor", &err))?;
            TensorData::F16(
                slice_of::<f32>(&wide)?
                    .iter()
                    .map(|&x| f16::from_f32(x))
                    .collect(),
            )
        }
        DatumType::F32 => TensorData::F32(slice_of::<f32>(tensor)?.to_vec()),
        DatumType::F64 => TensorData::F64(slice_of::<f64>(tensor)?.to_vec()),
        other => {
            return Err(RuntimeError::new(format!(
                "Model produced unsupported element type {:?}",
                other
            )))
        }
    };
    sonoflow_core::Tensor::new(shape, data).map_err(|err| RuntimeError::new(err.to_string()))
}

fn slice_of<T: Datum>(tensor: &Tensor) -> Result<&[T], RuntimeError> {
    tensor
        .as_slice::<T>()
        .map_err(|err| tract_error("Could not read the output tensor", &err))
}
