//! Host-backed tensor used for literals, readback, and tests.

use std::mem::{size_of, ManuallyDrop};
use std::sync::Arc;

use anyhow::{bail, ensure, Result};

use super::{complex::Complex, dtype::DType, shape::Shape, spec_utils};
use crate::backend::spec::{Dimension, TensorLiteral, TensorSpec};

/// Dense host tensor with byte-backed storage.
///
/// Boolean elements are stored one byte each, zero for false.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    dtype: DType,
    data: Vec<u8>,
}

macro_rules! typed_constructor {
    ($name:ident, $elem:ty, $dtype:expr) => {
        /// Builds a tensor from raw values, validating length against shape.
        pub fn $name(shape: Shape, data: Vec<$elem>) -> Result<Self> {
            if data.len() != shape.num_elements() {
                bail!(
                    "tensor data length ({}) does not match shape {:?}",
                    data.len(),
                    shape.dims()
                );
            }
            Ok(Tensor {
                shape,
                dtype: $dtype,
                data: vec_into_bytes(data),
            })
        }
    };
}

impl Tensor {
    typed_constructor!(from_vec, f32, DType::F32);
    typed_constructor!(from_f64, f64, DType::F64);
    typed_constructor!(from_i32, i32, DType::I32);
    typed_constructor!(from_cf32, Complex<f32>, DType::Cf32);
    typed_constructor!(from_cf64, Complex<f64>, DType::Cf64);

    /// Builds a boolean tensor; each element is stored as one byte.
    pub fn from_bool(shape: Shape, data: Vec<bool>) -> Result<Self> {
        if data.len() != shape.num_elements() {
            bail!(
                "tensor data length ({}) does not match shape {:?}",
                data.len(),
                shape.dims()
            );
        }
        Ok(Tensor {
            shape,
            dtype: DType::Bool,
            data: data.into_iter().map(u8::from).collect(),
        })
    }

    /// Returns a zero-initialized tensor of the requested shape and dtype.
    pub fn zeros(shape: Shape, dtype: DType) -> Self {
        let len = shape.num_elements() * dtype.size_in_bytes();
        Tensor {
            shape,
            dtype,
            data: vec![0u8; len],
        }
    }

    pub fn len(&self) -> usize {
        self.shape.num_elements()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Borrows the underlying `f32` data slice, panicking if the dtype differs.
    pub fn data(&self) -> &[f32] {
        match self.dtype {
            DType::F32 => bytes_as_slice::<f32>(&self.data),
            _ => panic!("tensor data is not stored as f32"),
        }
    }

    pub fn data_f64(&self) -> &[f64] {
        match self.dtype {
            DType::F64 => bytes_as_slice::<f64>(&self.data),
            _ => panic!("tensor data is not stored as f64"),
        }
    }

    pub fn data_i32(&self) -> &[i32] {
        match self.dtype {
            DType::I32 => bytes_as_slice::<i32>(&self.data),
            _ => panic!("tensor data is not stored as i32"),
        }
    }

    /// Borrows boolean data as raw bytes, one per element, nonzero for true.
    pub fn data_bool(&self) -> &[u8] {
        match self.dtype {
            DType::Bool => &self.data,
            _ => panic!("tensor data is not stored as bool"),
        }
    }

    pub fn data_cf32(&self) -> &[Complex<f32>] {
        match self.dtype {
            DType::Cf32 => bytes_as_slice::<Complex<f32>>(&self.data),
            _ => panic!("tensor data is not stored as complex f32"),
        }
    }

    pub fn data_cf64(&self) -> &[Complex<f64>] {
        match self.dtype {
            DType::Cf64 => bytes_as_slice::<Complex<f64>>(&self.data),
            _ => panic!("tensor data is not stored as complex f64"),
        }
    }

    /// Collects boolean data into a `Vec<bool>`.
    pub fn to_bool_vec(&self) -> Vec<bool> {
        self.data_bool().iter().map(|&b| b != 0).collect()
    }

    /// Wraps the tensor in a backend-neutral literal for graph initialization.
    pub fn to_literal(&self) -> TensorLiteral {
        let spec = TensorSpec::new(
            spec_utils::backend_dtype(self.dtype),
            spec_utils::backend_shape_from_shape(&self.shape),
        );
        TensorLiteral::new(spec, Arc::from(self.data.clone().into_boxed_slice()))
    }

    /// Reconstructs a host tensor from a backend literal.
    pub fn from_literal(literal: &TensorLiteral) -> Result<Self> {
        let dtype = spec_utils::frontend_dtype(literal.spec.dtype)?;
        let dims: Vec<usize> = literal
            .spec
            .shape
            .dims()
            .iter()
            .map(|d| match d {
                Dimension::Static(value) => Ok(*value),
                Dimension::Dynamic(symbol) => {
                    bail!("backend produced dynamic dimension {:?}", symbol)
                }
            })
            .collect::<Result<_>>()?;
        let shape = Shape::new(dims);
        let expected_bytes = shape.num_elements() * dtype.size_in_bytes();
        ensure!(
            literal.byte_len() == expected_bytes,
            "literal byte length {} does not match expected {}",
            literal.byte_len(),
            expected_bytes
        );
        Ok(Tensor {
            shape,
            dtype,
            data: literal.bytes.as_ref().to_vec(),
        })
    }
}

/// Converts an owned vector into a raw byte buffer without copying.
fn vec_into_bytes<T>(data: Vec<T>) -> Vec<u8> {
    let mut data = ManuallyDrop::new(data);
    let ptr = data.as_mut_ptr() as *mut u8;
    let len = data.len() * size_of::<T>();
    let cap = data.capacity() * size_of::<T>();
    unsafe { Vec::from_raw_parts(ptr, len, cap) }
}

/// Views a byte slice as a typed slice, asserting that the layout matches.
fn bytes_as_slice<T>(bytes: &[u8]) -> &[T] {
    assert_eq!(
        bytes.len() % size_of::<T>(),
        0,
        "byte length {} is not a multiple of element size {}",
        bytes.len(),
        size_of::<T>()
    );
    unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const T, bytes.len() / size_of::<T>()) }
}
