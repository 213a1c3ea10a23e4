//! Boolean-valued elementwise predicates.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{apply_unary, UnaryElementwise, UnaryOpOptions, UnaryPolicy};
use crate::backend::spec::{ElementwiseUnaryOp, PortableBackend};
use crate::tensor::{DType, DeviceTensor};

/// Descriptor for the real-element test.
///
/// The output dtype is always boolean; a `dtype` request in the options is
/// ignored rather than rejected. The stored error policy is a snapshot of
/// the process-wide default unless the caller supplied one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsReal {
    policy: UnaryPolicy,
}

impl IsReal {
    pub fn new() -> Self {
        Self::with_options(UnaryOpOptions::default())
    }

    pub fn with_options(options: UnaryOpOptions) -> Self {
        IsReal {
            policy: UnaryPolicy::from_options(&options),
        }
    }

    pub fn apply<B: PortableBackend + 'static>(
        &self,
        input: &DeviceTensor<B>,
    ) -> Result<DeviceTensor<B>> {
        apply_unary(self, input)
    }
}

impl Default for IsReal {
    fn default() -> Self {
        Self::new()
    }
}

impl UnaryElementwise for IsReal {
    fn kind(&self) -> ElementwiseUnaryOp {
        ElementwiseUnaryOp::IsReal
    }

    fn policy(&self) -> &UnaryPolicy {
        &self.policy
    }

    fn natural_result_dtype(&self, _input: DType) -> DType {
        DType::Bool
    }

    // Implicit zeros test real, so the output is dense even for sparse input.
    fn result_sparse(&self, _input_sparse: bool) -> bool {
        false
    }
}

/// Descriptor for the complex-element test, the complement of [`IsReal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsComplex {
    policy: UnaryPolicy,
}

impl IsComplex {
    pub fn new() -> Self {
        Self::with_options(UnaryOpOptions::default())
    }

    pub fn with_options(options: UnaryOpOptions) -> Self {
        IsComplex {
            policy: UnaryPolicy::from_options(&options),
        }
    }

    pub fn apply<B: PortableBackend + 'static>(
        &self,
        input: &DeviceTensor<B>,
    ) -> Result<DeviceTensor<B>> {
        apply_unary(self, input)
    }
}

impl Default for IsComplex {
    fn default() -> Self {
        Self::new()
    }
}

impl UnaryElementwise for IsComplex {
    fn kind(&self) -> ElementwiseUnaryOp {
        ElementwiseUnaryOp::IsComplex
    }

    fn policy(&self) -> &UnaryPolicy {
        &self.policy
    }

    fn natural_result_dtype(&self, _input: DType) -> DType {
        DType::Bool
    }

    fn result_sparse(&self, _input_sparse: bool) -> bool {
        false
    }
}

/// Tests elementwise whether each value is real.
///
/// For complex inputs an element is real when its imaginary part is zero;
/// for every other dtype the result is all true. Returns a lazy boolean
/// tensor of the same shape.
pub fn isreal<B: PortableBackend + 'static>(input: &DeviceTensor<B>) -> Result<DeviceTensor<B>> {
    IsReal::new().apply(input)
}

/// Tests elementwise whether each value has a nonzero imaginary part.
pub fn iscomplex<B: PortableBackend + 'static>(input: &DeviceTensor<B>) -> Result<DeviceTensor<B>> {
    IsComplex::new().apply(input)
}
