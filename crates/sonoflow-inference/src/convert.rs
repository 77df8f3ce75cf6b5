//! Frame conversion between pipeline and model formats.
//!
//! Models rarely consume frames exactly as the pipeline carries them, so the
//! session converts on the way in and back on the way out: element kind
//! first, then axis layout. Both conversions are total. A conversion that
//! cannot be performed logs and hands the frame back unchanged, because a
//! misconfigured model must never take down the processing thread.

use half::f16;
use num_traits::AsPrimitive;
use sonoflow_core::{AxisLayout, ScalarKind, Tensor, TensorData};
use tracing::{error, warn};

/// Cast every element of a tensor buffer to one primitive type.
macro_rules! cast_all {
    ($tensor:expr, $prim:ty) => {
        match $tensor.data() {
            TensorData::I8(v) => v.iter().map(|&x| x.as_()).collect::<Vec<$prim>>(),
            TensorData::U8(v) => v.iter().map(|&x| x.as_()).collect::<Vec<$prim>>(),
            TensorData::I16(v) => v.iter().map(|&x| x.as_()).collect::<Vec<$prim>>(),
            TensorData::U16(v) => v.iter().map(|&x| x.as_()).collect::<Vec<$prim>>(),
            TensorData::I32(v) => v.iter().map(|&x| x.as_()).collect::<Vec<$prim>>(),
            TensorData::U32(v) => v.iter().map(|&x| x.as_()).collect::<Vec<$prim>>(),
            TensorData::I64(v) => v.iter().map(|&x| x.as_()).collect::<Vec<$prim>>(),
            TensorData::U64(v) => v.iter().map(|&x| x.as_()).collect::<Vec<$prim>>(),
            TensorData::F16(v) => v.iter().map(|x| x.to_f32().as_()).collect::<Vec<$prim>>(),
            TensorData::F32(v) => v.iter().map(|&x| x.as_()).collect::<Vec<$prim>>(),
            TensorData::F64(v) => v.iter().map(|&x| x.as_()).collect::<Vec<$prim>>(),
        }
    };
}

/// Convert a tensor to another element kind.
///
/// Casts follow `as` semantics: floats saturate into integer ranges and
/// integer narrowing truncates. `half` goes through `f32` in both
/// directions. Targets with no implemented conversion are logged and the
/// input is returned unchanged.
pub fn convert_scalar_kind(tensor: &Tensor, target: ScalarKind) -> Tensor {
    if tensor.kind() == target {
        return tensor.clone();
    }
    let data = match target {
        ScalarKind::Int8 => TensorData::I8(cast_all!(tensor, i8)),
        ScalarKind::Uint8 => TensorData::U8(cast_all!(tensor, u8)),
        ScalarKind::Int16 => TensorData::I16(cast_all!(tensor, i16)),
        ScalarKind::Int32 => TensorData::I32(cast_all!(tensor, i32)),
        ScalarKind::Int64 => TensorData::I64(cast_all!(tensor, i64)),
        ScalarKind::Half => TensorData::F16(
            cast_all!(tensor, f32).into_iter().map(f16::from_f32).collect(),
        ),
        ScalarKind::Float => TensorData::F32(cast_all!(tensor, f32)),
        ScalarKind::Double => TensorData::F64(cast_all!(tensor, f64)),
        other => {
            error!(
                "No conversion to element type {} implemented. Leaving the data unmodified.",
                other
            );
            return tensor.clone();
        }
    };
    match Tensor::new(tensor.shape().to_vec(), data) {
        Ok(converted) => converted,
        Err(err) => {
            error!("Conversion produced an inconsistent tensor: {}", err);
            tensor.clone()
        }
    }
}

/// Tensor axis carrying `label` under `layout`.
///
/// Axis 0 is reserved for the batch dimension, so labels resolve to
/// positions 1 through 3.
fn axis_of(layout: &AxisLayout, label: u8) -> usize {
    if layout.label_at(0) == label {
        1
    } else if layout.label_at(2) == label {
        2
    } else {
        3
    }
}

/// Axis mapping that takes a frame from layout `from` to layout `to`.
///
/// Entry `k` of the result names the source axis that lands at position `k`,
/// in the form [`Tensor::permute4`] consumes. The batch axis stays at 0.
pub fn layout_permutation(from: &AxisLayout, to: &AxisLayout) -> [usize; 4] {
    let mut perm = [0usize; 4];
    for label in [b'C', b'W', b'H'] {
        perm[axis_of(to, label)] = axis_of(from, label);
    }
    perm
}

/// Reorder a frame from one axis layout to another.
///
/// Equal layouts are returned as-is. Only rank-4 frames can be reordered;
/// anything else is logged and returned unchanged.
pub fn change_layout(tensor: &Tensor, from: &AxisLayout, to: &AxisLayout) -> Tensor {
    if from == to {
        return tensor.clone();
    }
    if tensor.rank() != 4 {
        warn!(
            "Cannot change the layout of a rank-{} tensor from {} to {}. Leaving the data unmodified.",
            tensor.rank(),
            from,
            to
        );
        return tensor.clone();
    }
    tensor.permute4(layout_permutation(from, to))
}
