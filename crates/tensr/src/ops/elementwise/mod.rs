//! Elementwise operator descriptors and their lazy application.
//!
//! Each operator is a small serialisable descriptor that freezes its casting
//! rule and error policy at construction. Applying a descriptor records a
//! graph node and returns immediately; nothing executes and nothing is
//! validated until the result is materialised.

pub mod arithmetic;
pub mod predicates;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::backend::spec::{
    CastSpec, ElementwiseUnaryOp, ElementwiseUnarySpec, Operand, Operation, PortableBackend,
    TensorSpec,
};
use crate::ops::graph::GraphArena;
use crate::policy::{default_error_policy, CastingRule, ErrorPolicy};
use crate::tensor::{spec_utils, DType, DeviceTensor};

pub use arithmetic::{abs, neg, reciprocal, Abs, Neg, Reciprocal};
pub use predicates::{iscomplex, isreal, IsComplex, IsReal};

/// Caller-facing knobs accepted by every unary operator constructor.
///
/// `err` left as `None` snapshots the process-wide default policy at
/// construction time. `dtype` requests an output dtype; operators with a
/// fixed output dtype ignore it.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnaryOpOptions {
    pub casting: CastingRule,
    pub err: Option<ErrorPolicy>,
    pub dtype: Option<DType>,
}

/// Policy fields frozen into a descriptor at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnaryPolicy {
    pub casting: CastingRule,
    pub err: ErrorPolicy,
}

impl UnaryPolicy {
    pub(crate) fn from_options(options: &UnaryOpOptions) -> Self {
        UnaryPolicy {
            casting: options.casting,
            err: options.err.unwrap_or_else(default_error_policy),
        }
    }
}

impl Default for UnaryPolicy {
    fn default() -> Self {
        Self::from_options(&UnaryOpOptions::default())
    }
}

/// Contract implemented by unary operator descriptors.
pub trait UnaryElementwise {
    /// IR operation the descriptor lowers to.
    fn kind(&self) -> ElementwiseUnaryOp;

    /// Policy frozen at construction.
    fn policy(&self) -> &UnaryPolicy;

    /// Output dtype the IR operation naturally produces for an input dtype.
    fn natural_result_dtype(&self, input: DType) -> DType;

    /// Requested output dtype, honored by emitting a trailing cast.
    fn dtype_override(&self) -> Option<DType> {
        None
    }

    /// Sparsity of the result given the input's sparsity flag.
    fn result_sparse(&self, input_sparse: bool) -> bool {
        input_sparse
    }
}

/// Records a unary operator application as a lazy graph node.
pub(crate) fn apply_unary<B, Op>(op: &Op, input: &DeviceTensor<B>) -> Result<DeviceTensor<B>>
where
    B: PortableBackend + 'static,
    Op: UnaryElementwise,
{
    let graph = input
        .graph()
        .unwrap_or_else(|| GraphArena::new(input.backend()));
    let shape = input.shape().clone();

    let natural_dtype = op.natural_result_dtype(input.dtype());
    let final_dtype = op.dtype_override().unwrap_or(natural_dtype);

    let backend_shape = spec_utils::backend_shape_from_shape(&shape);
    let natural_spec = TensorSpec::new(spec_utils::backend_dtype(natural_dtype), backend_shape.clone());

    let value = graph.capture(|ctx| {
        let operand = ctx.import(input)?;
        let mut value = ctx.emit(
            Operation::ElementwiseUnary(ElementwiseUnarySpec {
                op: op.kind(),
                err: op.policy().err,
            }),
            vec![Operand::Value(operand)],
            natural_spec,
        );
        if final_dtype != natural_dtype {
            value = ctx.emit(
                Operation::Cast(CastSpec {
                    dtype: spec_utils::backend_dtype(final_dtype),
                    casting: op.policy().casting,
                }),
                vec![Operand::Value(value)],
                TensorSpec::new(spec_utils::backend_dtype(final_dtype), backend_shape),
            );
        }
        ctx.export(value);
        Ok(value)
    })?;

    DeviceTensor::from_lazy(
        graph,
        shape,
        final_dtype,
        op.result_sparse(input.is_sparse()),
        value,
    )
}

/// Records a dtype conversion as a lazy graph node.
///
/// The casting rule travels unvalidated; an incompatible conversion only
/// fails when the resulting tensor is materialised.
pub fn cast<B: PortableBackend + 'static>(
    input: &DeviceTensor<B>,
    dtype: DType,
    casting: CastingRule,
) -> Result<DeviceTensor<B>> {
    let graph = input
        .graph()
        .unwrap_or_else(|| GraphArena::new(input.backend()));
    let shape = input.shape().clone();
    let spec = TensorSpec::new(
        spec_utils::backend_dtype(dtype),
        spec_utils::backend_shape_from_shape(&shape),
    );

    let value = graph.capture(|ctx| {
        let operand = ctx.import(input)?;
        let value = ctx.emit(
            Operation::Cast(CastSpec {
                dtype: spec_utils::backend_dtype(dtype),
                casting,
            }),
            vec![Operand::Value(operand)],
            spec,
        );
        ctx.export(value);
        Ok(value)
    })?;

    DeviceTensor::from_lazy(graph, shape, dtype, input.is_sparse(), value)
}

/// Method-call sugar for the unary operators.
pub trait UnaryOps<B: PortableBackend + 'static> {
    fn isreal(&self) -> Result<DeviceTensor<B>>;
    fn iscomplex(&self) -> Result<DeviceTensor<B>>;
    fn neg(&self) -> Result<DeviceTensor<B>>;
    fn abs(&self) -> Result<DeviceTensor<B>>;
    fn reciprocal(&self) -> Result<DeviceTensor<B>>;
    fn cast(&self, dtype: DType, casting: CastingRule) -> Result<DeviceTensor<B>>;
}

impl<B: PortableBackend + 'static> UnaryOps<B> for DeviceTensor<B> {
    fn isreal(&self) -> Result<DeviceTensor<B>> {
        predicates::isreal(self)
    }

    fn iscomplex(&self) -> Result<DeviceTensor<B>> {
        predicates::iscomplex(self)
    }

    fn neg(&self) -> Result<DeviceTensor<B>> {
        arithmetic::neg(self)
    }

    fn abs(&self) -> Result<DeviceTensor<B>> {
        arithmetic::abs(self)
    }

    fn reciprocal(&self) -> Result<DeviceTensor<B>> {
        arithmetic::reciprocal(self)
    }

    fn cast(&self, dtype: DType, casting: CastingRule) -> Result<DeviceTensor<B>> {
        cast(self, dtype, casting)
    }
}
