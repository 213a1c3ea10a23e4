//! Arithmetic unary operators.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{apply_unary, UnaryElementwise, UnaryOpOptions, UnaryPolicy};
use crate::backend::spec::{ElementwiseUnaryOp, PortableBackend};
use crate::tensor::{DType, DeviceTensor};

macro_rules! unary_descriptor {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            policy: UnaryPolicy,
            dtype: Option<DType>,
        }

        impl $name {
            pub fn new() -> Self {
                Self::with_options(UnaryOpOptions::default())
            }

            pub fn with_options(options: UnaryOpOptions) -> Self {
                $name {
                    policy: UnaryPolicy::from_options(&options),
                    dtype: options.dtype,
                }
            }

            pub fn apply<B: PortableBackend + 'static>(
                &self,
                input: &DeviceTensor<B>,
            ) -> Result<DeviceTensor<B>> {
                apply_unary(self, input)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

unary_descriptor!(
    /// Descriptor for elementwise negation. Preserves dtype and sparsity.
    Neg
);

impl UnaryElementwise for Neg {
    fn kind(&self) -> ElementwiseUnaryOp {
        ElementwiseUnaryOp::Neg
    }

    fn policy(&self) -> &UnaryPolicy {
        &self.policy
    }

    fn natural_result_dtype(&self, input: DType) -> DType {
        input
    }

    fn dtype_override(&self) -> Option<DType> {
        self.dtype
    }
}

unary_descriptor!(
    /// Descriptor for the elementwise absolute value.
    ///
    /// Complex inputs produce their modulus, so the natural output dtype
    /// drops to the matching real dtype.
    Abs
);

impl UnaryElementwise for Abs {
    fn kind(&self) -> ElementwiseUnaryOp {
        ElementwiseUnaryOp::Abs
    }

    fn policy(&self) -> &UnaryPolicy {
        &self.policy
    }

    fn natural_result_dtype(&self, input: DType) -> DType {
        match input {
            DType::Cf32 => DType::F32,
            DType::Cf64 => DType::F64,
            other => other,
        }
    }

    fn dtype_override(&self) -> Option<DType> {
        self.dtype
    }
}

unary_descriptor!(
    /// Descriptor for the elementwise reciprocal.
    ///
    /// Zero elements raise the divide condition of the frozen error policy
    /// at materialization time. The result is always dense.
    Reciprocal
);

impl UnaryElementwise for Reciprocal {
    fn kind(&self) -> ElementwiseUnaryOp {
        ElementwiseUnaryOp::Reciprocal
    }

    fn policy(&self) -> &UnaryPolicy {
        &self.policy
    }

    fn natural_result_dtype(&self, input: DType) -> DType {
        input
    }

    fn dtype_override(&self) -> Option<DType> {
        self.dtype
    }

    fn result_sparse(&self, _input_sparse: bool) -> bool {
        false
    }
}

/// Negates each element.
pub fn neg<B: PortableBackend + 'static>(input: &DeviceTensor<B>) -> Result<DeviceTensor<B>> {
    Neg::new().apply(input)
}

/// Takes the absolute value (modulus for complex dtypes) of each element.
pub fn abs<B: PortableBackend + 'static>(input: &DeviceTensor<B>) -> Result<DeviceTensor<B>> {
    Abs::new().apply(input)
}

/// Computes `1 / x` for each element.
pub fn reciprocal<B: PortableBackend + 'static>(
    input: &DeviceTensor<B>,
) -> Result<DeviceTensor<B>> {
    Reciprocal::new().apply(input)
}
