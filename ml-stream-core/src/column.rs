//! Stacked batch columns

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::Value;
use crate::tensor::DenseTensor;

/// The values of one field across the records of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    /// Numeric values stacked along a new leading dimension
    Tensor(DenseTensor),
    /// Non-numeric values in record order
    Opaque(Vec<serde_json::Value>),
}

impl Column {
    /// Stack the values of field `name`, in order, into one column
    ///
    /// Scalars become a vector, arrays of one shape become a tensor with a
    /// leading batch dimension, opaque values become a list. Mixing variants
    /// within a field is a `TypeMismatch`.
    pub fn stack(name: &str, values: &[&Value]) -> Result<Self> {
        let Some(first) = values.first() else {
            return Err(Error::InvalidArgument(format!("No values to stack for field '{name}'")));
        };

        let mismatch = |other: &Value| {
            Error::TypeMismatch(format!(
                "field '{name}' mixes {} and {} values",
                first.kind(),
                other.kind()
            ))
        };

        match first {
            Value::Scalar(_) => {
                let mut data = Vec::with_capacity(values.len());
                for value in values {
                    match value {
                        Value::Scalar(v) => data.push(*v),
                        other => return Err(mismatch(*other)),
                    }
                }
                Ok(Self::Tensor(DenseTensor::vector(data)))
            }
            Value::Array(_) => {
                let mut tensors = Vec::with_capacity(values.len());
                for value in values {
                    match value {
                        Value::Array(t) => tensors.push(t),
                        other => return Err(mismatch(*other)),
                    }
                }
                Ok(Self::Tensor(DenseTensor::stack(tensors)?))
            }
            Value::Opaque(_) => {
                let mut items = Vec::with_capacity(values.len());
                for value in values {
                    match value {
                        Value::Opaque(v) => items.push(v.clone()),
                        other => return Err(mismatch(*other)),
                    }
                }
                Ok(Self::Opaque(items))
            }
        }
    }

    /// Number of records stacked into this column
    pub fn len(&self) -> usize {
        match self {
            Self::Tensor(t) => t.shape().first().copied().unwrap_or(0),
            Self::Opaque(items) => items.len(),
        }
    }

    /// Check if the column holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the stacked tensor, if this is a numeric column
    pub fn as_tensor(&self) -> Option<&DenseTensor> {
        match self {
            Self::Tensor(t) => Some(t),
            Self::Opaque(_) => None,
        }
    }

    /// Get the opaque values, if this is a non-numeric column
    pub fn as_opaque(&self) -> Option<&[serde_json::Value]> {
        match self {
            Self::Opaque(items) => Some(items),
            Self::Tensor(_) => None,
        }
    }
}
