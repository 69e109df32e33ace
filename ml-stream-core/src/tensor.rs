//! Dense tensors for numeric record fields and stacked batch columns

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A dense, row-major multidimensional array of `f32`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseTensor {
    /// Shape of the tensor (dimensions)
    shape: Vec<usize>,

    /// Elements in row-major order
    data: Vec<f32>,
}

impl DenseTensor {
    /// Create a tensor from a vector and a shape
    pub fn from_vec(data: Vec<f32>, shape: Vec<usize>) -> Result<Self> {
        let expected_size: usize = shape.iter().product();
        if data.len() != expected_size {
            return Err(Error::InvalidArgument(format!(
                "Data length {} does not match shape product {}",
                data.len(),
                expected_size
            )));
        }

        Ok(Self { shape, data })
    }

    /// Create a one-dimensional tensor
    pub fn vector(data: Vec<f32>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Create a zero-dimensional tensor holding one value
    pub fn scalar(value: f32) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// Get the shape of this tensor
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the elements in row-major order
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Get the total number of elements in this tensor
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if this tensor has no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the number of dimensions in this tensor
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get the `index`-th slice along the leading dimension
    pub fn row(&self, index: usize) -> Result<DenseTensor> {
        let (&rows, inner_shape) = self.shape.split_first().ok_or(Error::IndexOutOfBounds)?;
        if index >= rows {
            return Err(Error::IndexOutOfBounds);
        }
        let inner: usize = inner_shape.iter().product();
        Ok(Self {
            shape: inner_shape.to_vec(),
            data: self.data[index * inner..(index + 1) * inner].to_vec(),
        })
    }

    /// Stack same-shape tensors along a new leading dimension
    ///
    /// Stacking `n` tensors of shape `[a, b]` yields one tensor of shape
    /// `[n, a, b]`. Fails with `ShapeMismatch` when any shape differs from
    /// the first, and with `InvalidArgument` when given nothing to stack.
    pub fn stack<'a, I>(tensors: I) -> Result<DenseTensor>
    where
        I: IntoIterator<Item = &'a DenseTensor>,
    {
        let mut tensors = tensors.into_iter();
        let first = tensors
            .next()
            .ok_or_else(|| {
                Error::InvalidArgument("Cannot stack an empty sequence of tensors".into())
            })?;

        let mut data = first.data.clone();
        let mut count = 1;
        for tensor in tensors {
            if tensor.shape != first.shape {
                return Err(Error::ShapeMismatch {
                    expected: first.shape.clone(),
                    actual: tensor.shape.clone(),
                });
            }
            data.extend_from_slice(&tensor.data);
            count += 1;
        }

        let mut shape = Vec::with_capacity(first.ndim() + 1);
        shape.push(count);
        shape.extend_from_slice(&first.shape);

        Ok(Self { shape, data })
    }
}

impl fmt::Display for DenseTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DenseTensor(shape={:?}, len={})", self.shape, self.data.len())
    }
}
