//! Dense tensor frames exchanged between pipeline nodes.
//!
//! A [`Tensor`] is a row-major shape plus one typed buffer. Frames travel
//! through the graph as `Arc<Tensor>` so fan-out never copies element data;
//! nodes that change a frame build a new tensor instead of mutating in place.

use half::f16;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Element type of a tensor buffer.
///
/// Mirrors the wire-level sample formats the pipeline deals in. The
/// unsigned 16/32/64-bit kinds can be carried and inspected everywhere,
/// but not every subsystem can convert *into* them (see the conversion
/// helpers in the inference crate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Half,
    Float,
    Double,
}

impl ScalarKind {
    /// Width of one element in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 | Self::Half => 2,
            Self::Int32 | Self::Uint32 | Self::Float => 4,
            Self::Int64 | Self::Uint64 | Self::Double => 8,
        }
    }

    /// True for the floating-point kinds.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Half | Self::Float | Self::Double)
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Half => "half",
            Self::Float => "float",
            Self::Double => "double",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalarKind {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int8" => Ok(Self::Int8),
            "uint8" => Ok(Self::Uint8),
            "int16" => Ok(Self::Int16),
            "uint16" => Ok(Self::Uint16),
            "int32" => Ok(Self::Int32),
            "uint32" => Ok(Self::Uint32),
            "int64" => Ok(Self::Int64),
            "uint64" => Ok(Self::Uint64),
            "half" => Ok(Self::Half),
            "float" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            other => Err(TensorError::UnknownKind(other.to_string())),
        }
    }
}

/// Typed element storage, one variant per [`ScalarKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F16(Vec<f16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl TensorData {
    /// The element kind stored in this buffer.
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::I8(_) => ScalarKind::Int8,
            Self::U8(_) => ScalarKind::Uint8,
            Self::I16(_) => ScalarKind::Int16,
            Self::U16(_) => ScalarKind::Uint16,
            Self::I32(_) => ScalarKind::Int32,
            Self::U32(_) => ScalarKind::Uint32,
            Self::I64(_) => ScalarKind::Int64,
            Self::U64(_) => ScalarKind::Uint64,
            Self::F16(_) => ScalarKind::Half,
            Self::F32(_) => ScalarKind::Float,
            Self::F64(_) => ScalarKind::Double,
        }
    }

    /// Number of elements in the buffer.
    pub fn len(&self) -> usize {
        match self {
            Self::I8(v) => v.len(),
            Self::U8(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::U64(v) => v.len(),
            Self::F16(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn zeros(kind: ScalarKind, len: usize) -> Self {
        match kind {
            ScalarKind::Int8 => Self::I8(vec![0; len]),
            ScalarKind::Uint8 => Self::U8(vec![0; len]),
            ScalarKind::Int16 => Self::I16(vec![0; len]),
            ScalarKind::Uint16 => Self::U16(vec![0; len]),
            ScalarKind::Int32 => Self::I32(vec![0; len]),
            ScalarKind::Uint32 => Self::U32(vec![0; len]),
            ScalarKind::Int64 => Self::I64(vec![0; len]),
            ScalarKind::Uint64 => Self::U64(vec![0; len]),
            ScalarKind::Half => Self::F16(vec![f16::ZERO; len]),
            ScalarKind::Float => Self::F32(vec![0.0; len]),
            ScalarKind::Double => Self::F64(vec![0.0; len]),
        }
    }
}

/// Errors from tensor construction and parsing.
#[derive(Debug, Error)]
pub enum TensorError {
    #[error("Shape {shape:?} implies {expected} elements but the buffer holds {actual}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown scalar kind: {0}")]
    UnknownKind(String),
}

/// A dense row-major tensor.
///
/// Invariant: `data.len() == shape.iter().product()`. [`Tensor::new`]
/// enforces it, and every operation in this module preserves it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: TensorData,
}

impl Tensor {
    /// Build a tensor from a shape and a matching buffer.
    pub fn new(shape: Vec<usize>, data: TensorData) -> Result<Self, TensorError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TensorError::ShapeMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// All-zero tensor of the given shape and kind.
    pub fn zeros(shape: &[usize], kind: ScalarKind) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: TensorData::zeros(kind, len),
        }
    }

    pub fn from_f32(shape: &[usize], data: Vec<f32>) -> Result<Self, TensorError> {
        Self::new(shape.to_vec(), TensorData::F32(data))
    }

    pub fn from_f64(shape: &[usize], data: Vec<f64>) -> Result<Self, TensorError> {
        Self::new(shape.to_vec(), TensorData::F64(data))
    }

    pub fn from_i32(shape: &[usize], data: Vec<i32>) -> Result<Self, TensorError> {
        Self::new(shape.to_vec(), TensorData::I32(data))
    }

    pub fn from_i64(shape: &[usize], data: Vec<i64>) -> Result<Self, TensorError> {
        Self::new(shape.to_vec(), TensorData::I64(data))
    }

    pub fn from_u8(shape: &[usize], data: Vec<u8>) -> Result<Self, TensorError> {
        Self::new(shape.to_vec(), TensorData::U8(data))
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn kind(&self) -> ScalarKind {
        self.data.kind()
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read every element back as `f64`, in storage order.
    ///
    /// Lossy for `int64`/`uint64` values beyond 2^53; meant for assertions
    /// and diagnostics, not for round-tripping data.
    pub fn as_f64_vec(&self) -> Vec<f64> {
        match &self.data {
            TensorData::I8(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::U8(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::I16(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::U16(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::I32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::U32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::I64(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::U64(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::F16(v) => v.iter().map(|x| x.to_f64()).collect(),
            TensorData::F32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::F64(v) => v.clone(),
        }
    }

    /// Reorder the axes of a rank-4 tensor.
    ///
    /// Dimension `k` of the result is dimension `perm[k]` of the input, so
    /// `out.shape()[k] == self.shape()[perm[k]]` and
    /// `out[i] == self[j]` with `j[perm[k]] = i[k]`.
    ///
    /// The permutation vector is not required to be a bijection: source
    /// positions the vector never maps read index 0. That keeps the
    /// operation total so a bad axis mapping degrades the data instead of
    /// crashing the worker thread.
    pub fn permute4(&self, perm: [usize; 4]) -> Tensor {
        if self.shape.len() != 4 {
            warn!(
                "Cannot permute a rank-{} tensor with a 4-axis mapping. Leaving the data unmodified.",
                self.shape.len()
            );
            return self.clone();
        }
        if perm.iter().any(|&p| p >= 4) {
            warn!(
                "Axis mapping {:?} is out of range for a rank-4 tensor. Leaving the data unmodified.",
                perm
            );
            return self.clone();
        }

        let shape = [self.shape[0], self.shape[1], self.shape[2], self.shape[3]];
        let out_shape = vec![
            shape[perm[0]],
            shape[perm[1]],
            shape[perm[2]],
            shape[perm[3]],
        ];
        let data = match &self.data {
            TensorData::I8(v) => TensorData::I8(permute_buf(v, &shape, &perm)),
            TensorData::U8(v) => TensorData::U8(permute_buf(v, &shape, &perm)),
            TensorData::I16(v) => TensorData::I16(permute_buf(v, &shape, &perm)),
            TensorData::U16(v) => TensorData::U16(permute_buf(v, &shape, &perm)),
            TensorData::I32(v) => TensorData::I32(permute_buf(v, &shape, &perm)),
            TensorData::U32(v) => TensorData::U32(permute_buf(v, &shape, &perm)),
            TensorData::I64(v) => TensorData::I64(permute_buf(v, &shape, &perm)),
            TensorData::U64(v) => TensorData::U64(permute_buf(v, &shape, &perm)),
            TensorData::F16(v) => TensorData::F16(permute_buf(v, &shape, &perm)),
            TensorData::F32(v) => TensorData::F32(permute_buf(v, &shape, &perm)),
            TensorData::F64(v) => TensorData::F64(permute_buf(v, &shape, &perm)),
        };
        Tensor {
            shape: out_shape,
            data,
        }
    }
}

fn strides4(shape: &[usize; 4]) -> [usize; 4] {
    [shape[1] * shape[2] * shape[3], shape[2] * shape[3], shape[3], 1]
}

fn permute_buf<T: Copy>(data: &[T], shape: &[usize; 4], perm: &[usize; 4]) -> Vec<T> {
    let out_shape = [
        shape[perm[0]],
        shape[perm[1]],
        shape[perm[2]],
        shape[perm[3]],
    ];
    let strides = strides4(shape);
    let mut out = Vec::with_capacity(out_shape.iter().product());

    for i0 in 0..out_shape[0] {
        for i1 in 0..out_shape[1] {
            for i2 in 0..out_shape[2] {
                for i3 in 0..out_shape[3] {
                    let dst = [i0, i1, i2, i3];
                    // Unmapped source axes stay at 0.
                    let mut src = [0usize; 4];
                    for k in 0..4 {
                        src[perm[k]] = dst[k];
                    }
                    let flat = src[0] * strides[0]
                        + src[1] * strides[1]
                        + src[2] * strides[2]
                        + src[3] * strides[3];
                    out.push(data[flat]);
                }
            }
        }
    }
    out
}
