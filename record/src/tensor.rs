use std::fmt;

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use safetensors::Dtype;

use crate::{RecordErr, Result};

/// Element type of a record entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    F32,
    I64,
    U8,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F32 => "f32",
            DType::I64 => "i64",
            DType::U8 => "u8",
        };

        write!(f, "{s}")
    }
}

impl From<DType> for Dtype {
    fn from(value: DType) -> Self {
        match value {
            DType::F32 => Dtype::F32,
            DType::I64 => Dtype::I64,
            DType::U8 => Dtype::U8,
        }
    }
}

/// A dynamically shaped entry of a `Record`.
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    F32(ArrayD<f32>),
    I64(ArrayD<i64>),
    U8(ArrayD<u8>),
}

impl Tensor {
    /// Returns the full shape of the tensor, batch dimensions included.
    pub fn shape(&self) -> &[usize] {
        match self {
            Tensor::F32(a) => a.shape(),
            Tensor::I64(a) => a.shape(),
            Tensor::U8(a) => a.shape(),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Tensor::F32(_) => DType::F32,
            Tensor::I64(_) => DType::I64,
            Tensor::U8(_) => DType::U8,
        }
    }

    /// Creates a zero filled tensor of the given type and shape.
    pub fn zeros(dtype: DType, shape: &[usize]) -> Self {
        let dim = IxDyn(shape);
        match dtype {
            DType::F32 => Tensor::F32(ArrayD::zeros(dim)),
            DType::I64 => Tensor::I64(ArrayD::zeros(dim)),
            DType::U8 => Tensor::U8(ArrayD::zeros(dim)),
        }
    }

    /// Fills the whole tensor with zeros, keeping its shape.
    pub fn zero_(&mut self) {
        match self {
            Tensor::F32(a) => a.fill(0.),
            Tensor::I64(a) => a.fill(0),
            Tensor::U8(a) => a.fill(0),
        }
    }

    /// Stacks tensors of identical type and shape along a new leading axis.
    ///
    /// # Arguments
    /// * `key` - The record key the tensors belong to, used for error reporting.
    /// * `items` - The tensors to stack.
    ///
    /// # Returns
    /// The stacked tensor or an error if `items` is empty or not homogeneous.
    pub fn stack(key: &str, items: &[&Tensor]) -> Result<Tensor> {
        let first = items.first().ok_or(RecordErr::EmptyStack)?;

        for item in &items[1..] {
            if item.dtype() != first.dtype() {
                return Err(RecordErr::DtypeMismatch {
                    key: key.to_string(),
                    got: item.dtype(),
                    expected: first.dtype(),
                });
            }

            if item.shape() != first.shape() {
                return Err(RecordErr::ShapeMismatch {
                    key: key.to_string(),
                    got: item.shape().to_vec(),
                    expected: first.shape().to_vec(),
                });
            }
        }

        let stacked = match first {
            Tensor::F32(_) => Tensor::F32(stack_views(items.iter().filter_map(|t| t.as_f32()))?),
            Tensor::I64(_) => Tensor::I64(stack_views(items.iter().filter_map(|t| t.as_i64()))?),
            Tensor::U8(_) => Tensor::U8(stack_views(items.iter().filter_map(|t| t.as_u8()))?),
        };

        Ok(stacked)
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Tensor::F32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&ArrayD<i64>> {
        match self {
            Tensor::I64(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<&ArrayD<u8>> {
        match self {
            Tensor::U8(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_f32_mut(&mut self) -> Option<&mut ArrayD<f32>> {
        match self {
            Tensor::F32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_i64_mut(&mut self) -> Option<&mut ArrayD<i64>> {
        match self {
            Tensor::I64(a) => Some(a),
            _ => None,
        }
    }

    /// Serializes the elements in logical (row major) order as little endian bytes.
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        match self {
            Tensor::F32(a) => {
                let values: Vec<u32> = a.iter().map(|v| v.to_bits().to_le()).collect();
                bytemuck::cast_slice(&values).to_vec()
            }
            Tensor::I64(a) => {
                let values: Vec<i64> = a.iter().map(|v| v.to_le()).collect();
                bytemuck::cast_slice(&values).to_vec()
            }
            Tensor::U8(a) => a.iter().copied().collect(),
        }
    }

    /// Rebuilds a tensor from the raw little endian bytes of a safetensors entry.
    pub(crate) fn from_bytes(key: &str, dtype: Dtype, shape: &[usize], data: &[u8]) -> Result<Self> {
        let dim = IxDyn(shape);
        let tensor = match dtype {
            Dtype::F32 => {
                let values = data
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                Tensor::F32(ArrayD::from_shape_vec(dim, values)?)
            }
            Dtype::I64 => {
                let values = data
                    .chunks_exact(8)
                    .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect();
                Tensor::I64(ArrayD::from_shape_vec(dim, values)?)
            }
            Dtype::U8 => Tensor::U8(ArrayD::from_shape_vec(dim, data.to_vec())?),
            other => {
                return Err(RecordErr::Metadata(format!(
                    "unsupported dtype {other:?} for key {key:?}"
                )));
            }
        };

        Ok(tensor)
    }
}

fn stack_views<'a, T, I>(arrays: I) -> Result<ArrayD<T>>
where
    T: Clone + 'a,
    I: Iterator<Item = &'a ArrayD<T>>,
{
    let views: Vec<ArrayViewD<'a, T>> = arrays.map(|a| a.view()).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}

impl From<ArrayD<f32>> for Tensor {
    fn from(value: ArrayD<f32>) -> Self {
        Tensor::F32(value)
    }
}

impl From<ArrayD<i64>> for Tensor {
    fn from(value: ArrayD<i64>) -> Self {
        Tensor::I64(value)
    }
}

impl From<ArrayD<u8>> for Tensor {
    fn from(value: ArrayD<u8>) -> Self {
        Tensor::U8(value)
    }
}
