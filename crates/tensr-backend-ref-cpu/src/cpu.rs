//! Reference CPU evaluation of tensor-expression programs.
//!
//! Everything is stored densely and executed instruction by instruction. The
//! backend favors clarity over speed and exists to pin down semantics,
//! including casting checks and numeric error policy enforcement.

use std::collections::HashMap;
use std::sync::Arc;

use tensr::backend::spec::{
    BackendError, BackendResult, CastSpec, DType, Dimension, ElementwiseUnaryOp,
    ElementwiseUnarySpec, Instruction, Operand, Operation, PortableBackend, Program, Shape,
    TensorInit, TensorLiteral, TensorSpec, ValueId,
};
use tensr::policy::{can_cast, ErrAction, ErrorPolicy, FpCondition};
use tensr::tensor::Complex;

#[derive(Clone)]
pub struct CpuTensor {
    pub spec: TensorSpec,
    pub data: TensorData,
}

#[derive(Clone)]
pub enum TensorData {
    Bool(Arc<[u8]>),
    Si32(Arc<[i32]>),
    F32(Arc<[f32]>),
    F64(Arc<[f64]>),
    Cf32(Arc<[Complex<f32>]>),
    Cf64(Arc<[Complex<f64>]>),
}

#[derive(Clone, Copy, Default)]
pub struct RefCpuBackend;

impl RefCpuBackend {
    pub fn new() -> Self {
        RefCpuBackend
    }
}

impl PortableBackend for RefCpuBackend {
    type TensorHandle = CpuTensor;

    fn backend_name(&self) -> &str {
        "ref-cpu"
    }

    fn materialize(&self, init: TensorInit) -> BackendResult<Self::TensorHandle> {
        match init {
            TensorInit::Literal(lit) => literal_to_tensor(&lit),
            TensorInit::Zeroed(spec) => zeroed_tensor(&spec),
        }
    }

    fn to_literal(&self, tensor: &Self::TensorHandle) -> BackendResult<TensorLiteral> {
        tensor_to_literal(tensor)
    }

    fn execute_instruction(
        &self,
        instruction: &Instruction,
        inputs: &[Self::TensorHandle],
    ) -> BackendResult<Vec<Self::TensorHandle>> {
        execute_operation(instruction, inputs)
    }

    fn run_program(
        &self,
        program: &Program,
        entry_inputs: &[Self::TensorHandle],
    ) -> BackendResult<Vec<Self::TensorHandle>> {
        let function = program
            .functions
            .iter()
            .find(|f| f.name == program.entry)
            .ok_or_else(|| BackendError::execution("entry function not found"))?;

        if function.parameter_ids.len() != entry_inputs.len() {
            return Err(BackendError::execution("entry input arity mismatch"));
        }

        let mut values: HashMap<ValueId, CpuTensor> = HashMap::new();
        for (param_id, handle) in function.parameter_ids.iter().zip(entry_inputs.iter()) {
            values.insert(*param_id, handle.clone());
        }

        for instruction in &function.body {
            let mut inputs = Vec::with_capacity(instruction.operands.len());
            for operand in &instruction.operands {
                let tensor = match operand {
                    Operand::Value(id) => values
                        .get(id)
                        .cloned()
                        .ok_or_else(|| BackendError::execution("operand value missing"))?,
                    Operand::Literal(lit) => literal_to_tensor(lit)?,
                };
                inputs.push(tensor);
            }
            let mut outputs = execute_operation(instruction, &inputs)?;
            if outputs.len() != 1 {
                return Err(BackendError::execution(
                    "instructions must produce exactly one result",
                ));
            }
            values.insert(
                instruction.id,
                outputs
                    .pop()
                    .expect("single output guaranteed by length check"),
            );
        }

        let mut results = Vec::with_capacity(function.result_ids.len());
        for id in &function.result_ids {
            let value = values
                .get(id)
                .cloned()
                .ok_or_else(|| BackendError::execution("missing function result value"))?;
            results.push(value);
        }
        Ok(results)
    }
}

fn execute_operation(
    instruction: &Instruction,
    inputs: &[CpuTensor],
) -> BackendResult<Vec<CpuTensor>> {
    match &instruction.op {
        Operation::ElementwiseUnary(spec) => {
            if inputs.len() != 1 {
                return Err(BackendError::execution("unary op expects one operand"));
            }
            let output = elementwise_unary(spec, &inputs[0], &instruction.output)?;
            Ok(vec![output])
        }
        Operation::Cast(spec) => {
            if inputs.len() != 1 {
                return Err(BackendError::execution("cast expects one operand"));
            }
            let output = cast_tensor(spec, &inputs[0], &instruction.output)?;
            Ok(vec![output])
        }
    }
}

fn elementwise_unary(
    spec: &ElementwiseUnarySpec,
    input: &CpuTensor,
    output: &TensorSpec,
) -> BackendResult<CpuTensor> {
    match spec.op {
        ElementwiseUnaryOp::IsReal => is_real(input, output),
        ElementwiseUnaryOp::IsComplex => is_complex(input, output),
        ElementwiseUnaryOp::Neg => neg(input, output),
        ElementwiseUnaryOp::Abs => abs(input, output),
        ElementwiseUnaryOp::Reciprocal => reciprocal(input, output, &spec.err),
    }
}

fn is_real(input: &CpuTensor, output: &TensorSpec) -> BackendResult<CpuTensor> {
    let mask: Vec<u8> = match &input.data {
        // Every non-complex dtype is trivially real.
        TensorData::Bool(values) => vec![1; values.len()],
        TensorData::Si32(values) => vec![1; values.len()],
        TensorData::F32(values) => vec![1; values.len()],
        TensorData::F64(values) => vec![1; values.len()],
        TensorData::Cf32(values) => values.iter().map(|z| u8::from(z.im == 0.0)).collect(),
        TensorData::Cf64(values) => values.iter().map(|z| u8::from(z.im == 0.0)).collect(),
    };
    Ok(CpuTensor {
        spec: output.clone(),
        data: TensorData::Bool(Arc::from(mask)),
    })
}

fn is_complex(input: &CpuTensor, output: &TensorSpec) -> BackendResult<CpuTensor> {
    let mask: Vec<u8> = match &input.data {
        TensorData::Bool(values) => vec![0; values.len()],
        TensorData::Si32(values) => vec![0; values.len()],
        TensorData::F32(values) => vec![0; values.len()],
        TensorData::F64(values) => vec![0; values.len()],
        TensorData::Cf32(values) => values.iter().map(|z| u8::from(z.im != 0.0)).collect(),
        TensorData::Cf64(values) => values.iter().map(|z| u8::from(z.im != 0.0)).collect(),
    };
    Ok(CpuTensor {
        spec: output.clone(),
        data: TensorData::Bool(Arc::from(mask)),
    })
}

fn neg(input: &CpuTensor, output: &TensorSpec) -> BackendResult<CpuTensor> {
    let data = match &input.data {
        TensorData::Bool(_) => {
            return Err(BackendError::DTypeNotSupported {
                op: "neg",
                dtype: DType::I1,
            })
        }
        TensorData::Si32(values) => {
            TensorData::Si32(values.iter().map(|v| v.wrapping_neg()).collect())
        }
        TensorData::F32(values) => TensorData::F32(values.iter().map(|v| -v).collect()),
        TensorData::F64(values) => TensorData::F64(values.iter().map(|v| -v).collect()),
        TensorData::Cf32(values) => TensorData::Cf32(values.iter().map(|&z| -z).collect()),
        TensorData::Cf64(values) => TensorData::Cf64(values.iter().map(|&z| -z).collect()),
    };
    Ok(CpuTensor {
        spec: output.clone(),
        data,
    })
}

fn abs(input: &CpuTensor, output: &TensorSpec) -> BackendResult<CpuTensor> {
    let data = match &input.data {
        TensorData::Bool(_) => {
            return Err(BackendError::DTypeNotSupported {
                op: "abs",
                dtype: DType::I1,
            })
        }
        TensorData::Si32(values) => {
            TensorData::Si32(values.iter().map(|v| v.wrapping_abs()).collect())
        }
        TensorData::F32(values) => TensorData::F32(values.iter().map(|v| v.abs()).collect()),
        TensorData::F64(values) => TensorData::F64(values.iter().map(|v| v.abs()).collect()),
        // Complex modulus drops to the matching real dtype.
        TensorData::Cf32(values) => TensorData::F32(values.iter().map(|z| z.abs()).collect()),
        TensorData::Cf64(values) => TensorData::F64(values.iter().map(|z| z.abs()).collect()),
    };
    Ok(CpuTensor {
        spec: output.clone(),
        data,
    })
}

fn reciprocal(
    input: &CpuTensor,
    output: &TensorSpec,
    err: &ErrorPolicy,
) -> BackendResult<CpuTensor> {
    let mut conditions = ConditionSet::new();
    let data = match &input.data {
        TensorData::F32(values) => {
            let out: Vec<f32> = values
                .iter()
                .map(|&x| {
                    let y = x.recip();
                    note_real_recip(
                        &mut conditions,
                        x.is_finite(),
                        x == 0.0,
                        y.is_infinite(),
                        y.is_subnormal(),
                    );
                    y
                })
                .collect();
            TensorData::F32(Arc::from(out))
        }
        TensorData::F64(values) => {
            let out: Vec<f64> = values
                .iter()
                .map(|&x| {
                    let y = x.recip();
                    note_real_recip(
                        &mut conditions,
                        x.is_finite(),
                        x == 0.0,
                        y.is_infinite(),
                        y.is_subnormal(),
                    );
                    y
                })
                .collect();
            TensorData::F64(Arc::from(out))
        }
        TensorData::Cf32(values) => {
            let out: Vec<Complex<f32>> = values
                .iter()
                .map(|&z| {
                    if z.norm_sqr() == 0.0 {
                        conditions.note(FpCondition::DivideByZero);
                    }
                    z.recip()
                })
                .collect();
            TensorData::Cf32(Arc::from(out))
        }
        TensorData::Cf64(values) => {
            let out: Vec<Complex<f64>> = values
                .iter()
                .map(|&z| {
                    if z.norm_sqr() == 0.0 {
                        conditions.note(FpCondition::DivideByZero);
                    }
                    z.recip()
                })
                .collect();
            TensorData::Cf64(Arc::from(out))
        }
        TensorData::Bool(_) => {
            return Err(BackendError::DTypeNotSupported {
                op: "reciprocal",
                dtype: DType::I1,
            })
        }
        TensorData::Si32(_) => {
            return Err(BackendError::DTypeNotSupported {
                op: "reciprocal",
                dtype: DType::Si32,
            })
        }
    };
    conditions.enforce(err)?;
    Ok(CpuTensor {
        spec: output.clone(),
        data,
    })
}

fn note_real_recip(
    conditions: &mut ConditionSet,
    x_finite: bool,
    x_zero: bool,
    y_infinite: bool,
    y_subnormal: bool,
) {
    if x_zero {
        conditions.note(FpCondition::DivideByZero);
    } else if x_finite && y_infinite {
        conditions.note(FpCondition::Overflow);
    } else if x_finite && y_subnormal {
        conditions.note(FpCondition::Underflow);
    }
}

/// Deduplicated set of conditions raised by one kernel invocation.
struct ConditionSet {
    seen: Vec<FpCondition>,
}

impl ConditionSet {
    fn new() -> Self {
        ConditionSet { seen: Vec::new() }
    }

    fn note(&mut self, condition: FpCondition) {
        if !self.seen.contains(&condition) {
            self.seen.push(condition);
        }
    }

    /// Applies the policy action for every raised condition. `Raise` and
    /// `Call` abort the instruction; the other actions only report.
    fn enforce(&self, err: &ErrorPolicy) -> BackendResult<()> {
        for &condition in &self.seen {
            match err.action_for(condition) {
                ErrAction::Ignore => {}
                ErrAction::Warn => log::warn!("floating-point {condition} encountered"),
                ErrAction::Log => log::info!("floating-point {condition} encountered"),
                ErrAction::Print => eprintln!("floating-point {condition} encountered"),
                ErrAction::Raise | ErrAction::Call => {
                    return Err(BackendError::Numeric { condition });
                }
            }
        }
        Ok(())
    }
}

fn cast_tensor(spec: &CastSpec, input: &CpuTensor, output: &TensorSpec) -> BackendResult<CpuTensor> {
    let from = input.spec.dtype;
    let to = spec.dtype;
    if !can_cast(from, to, spec.casting) {
        return Err(BackendError::Cast {
            from,
            to,
            rule: spec.casting,
        });
    }

    if to.is_complex() {
        let values: Vec<Complex<f64>> = match &input.data {
            TensorData::Bool(v) => v.iter().map(|&b| Complex::<f64>::from_real(f64::from(b))).collect(),
            TensorData::Si32(v) => v.iter().map(|&x| Complex::<f64>::from_real(f64::from(x))).collect(),
            TensorData::F32(v) => v.iter().map(|&x| Complex::<f64>::from_real(f64::from(x))).collect(),
            TensorData::F64(v) => v.iter().map(|&x| Complex::<f64>::from_real(x)).collect(),
            TensorData::Cf32(v) => v
                .iter()
                .map(|z| Complex::new(f64::from(z.re), f64::from(z.im)))
                .collect(),
            TensorData::Cf64(v) => v.to_vec(),
        };
        let data = match to {
            DType::Cf32 => TensorData::Cf32(
                values
                    .iter()
                    .map(|z| Complex::new(z.re as f32, z.im as f32))
                    .collect(),
            ),
            DType::Cf64 => TensorData::Cf64(Arc::from(values)),
            _ => unreachable!("is_complex covers Cf32 and Cf64"),
        };
        return Ok(CpuTensor {
            spec: output.clone(),
            data,
        });
    }

    // Complex to real keeps the real part; can_cast only admits that route
    // under unsafe casting.
    let values: Vec<f64> = match &input.data {
        TensorData::Bool(v) => v.iter().map(|&b| f64::from(b)).collect(),
        TensorData::Si32(v) => v.iter().map(|&x| f64::from(x)).collect(),
        TensorData::F32(v) => v.iter().map(|&x| f64::from(x)).collect(),
        TensorData::F64(v) => v.to_vec(),
        TensorData::Cf32(v) => v.iter().map(|z| f64::from(z.re)).collect(),
        TensorData::Cf64(v) => v.iter().map(|z| z.re).collect(),
    };
    let data = match to {
        DType::I1 => TensorData::Bool(values.iter().map(|&x| u8::from(x != 0.0)).collect()),
        DType::Si32 => TensorData::Si32(values.iter().map(|&x| x as i32).collect()),
        DType::F32 => TensorData::F32(values.iter().map(|&x| x as f32).collect()),
        DType::F64 => TensorData::F64(Arc::from(values)),
        other => {
            return Err(BackendError::DTypeNotSupported {
                op: "cast",
                dtype: other,
            })
        }
    };
    Ok(CpuTensor {
        spec: output.clone(),
        data,
    })
}

fn literal_to_tensor(literal: &TensorLiteral) -> BackendResult<CpuTensor> {
    if let Some(expected) = literal.spec.byte_len() {
        if literal.byte_len() != expected {
            return Err(BackendError::execution(format!(
                "literal carries {} bytes, spec requires {expected}",
                literal.byte_len()
            )));
        }
    }
    let data = match literal.spec.dtype {
        DType::I1 => TensorData::Bool(Arc::from(literal.bytes.as_ref().to_vec())),
        DType::Si32 => TensorData::Si32(Arc::from(bytes_to_i32(&literal.bytes)?)),
        DType::F32 => TensorData::F32(Arc::from(bytes_to_f32(&literal.bytes)?)),
        DType::F64 => TensorData::F64(Arc::from(bytes_to_f64(&literal.bytes)?)),
        DType::Cf32 => {
            let parts = bytes_to_f32(&literal.bytes)?;
            TensorData::Cf32(pair_up(&parts, Complex::new)?)
        }
        DType::Cf64 => {
            let parts = bytes_to_f64(&literal.bytes)?;
            TensorData::Cf64(pair_up(&parts, Complex::new)?)
        }
        other => {
            return Err(BackendError::DTypeNotSupported {
                op: "literal",
                dtype: other,
            })
        }
    };
    Ok(CpuTensor {
        spec: literal.spec.clone(),
        data,
    })
}

fn zeroed_tensor(spec: &TensorSpec) -> BackendResult<CpuTensor> {
    let elem_count = element_count(&spec.shape)?;
    let data = match spec.dtype {
        DType::I1 => TensorData::Bool(Arc::from(vec![0u8; elem_count])),
        DType::Si32 => TensorData::Si32(Arc::from(vec![0i32; elem_count])),
        DType::F32 => TensorData::F32(Arc::from(vec![0f32; elem_count])),
        DType::F64 => TensorData::F64(Arc::from(vec![0f64; elem_count])),
        DType::Cf32 => TensorData::Cf32(Arc::from(vec![Complex::<f32>::ZERO; elem_count])),
        DType::Cf64 => TensorData::Cf64(Arc::from(vec![Complex::<f64>::ZERO; elem_count])),
        other => {
            return Err(BackendError::DTypeNotSupported {
                op: "zeroed",
                dtype: other,
            })
        }
    };
    Ok(CpuTensor {
        spec: spec.clone(),
        data,
    })
}

fn tensor_to_literal(tensor: &CpuTensor) -> BackendResult<TensorLiteral> {
    let bytes: Arc<[u8]> = match &tensor.data {
        TensorData::Bool(values) => Arc::clone(values),
        TensorData::Si32(values) => le_bytes(values.iter().map(|v| v.to_le_bytes())),
        TensorData::F32(values) => le_bytes(values.iter().map(|v| v.to_le_bytes())),
        TensorData::F64(values) => le_bytes(values.iter().map(|v| v.to_le_bytes())),
        TensorData::Cf32(values) => le_bytes(
            values
                .iter()
                .flat_map(|z| [z.re, z.im])
                .map(|v| v.to_le_bytes()),
        ),
        TensorData::Cf64(values) => le_bytes(
            values
                .iter()
                .flat_map(|z| [z.re, z.im])
                .map(|v| v.to_le_bytes()),
        ),
    };
    Ok(TensorLiteral::new(tensor.spec.clone(), bytes))
}

fn element_count(shape: &Shape) -> BackendResult<usize> {
    let mut count = 1usize;
    for dim in shape.dims() {
        match dim {
            Dimension::Static(value) => {
                count = count
                    .checked_mul(*value)
                    .ok_or_else(|| BackendError::execution("shape element count overflow"))?;
            }
            Dimension::Dynamic(_) => {
                return Err(BackendError::execution(
                    "dynamic dimensions are not supported by the reference backend",
                ));
            }
        }
    }
    Ok(count)
}

fn bytes_to_f32(bytes: &[u8]) -> BackendResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(BackendError::execution(
            "literal byte length mismatches f32",
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn bytes_to_f64(bytes: &[u8]) -> BackendResult<Vec<f64>> {
    if bytes.len() % 8 != 0 {
        return Err(BackendError::execution(
            "literal byte length mismatches f64",
        ));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            f64::from_le_bytes([
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ])
        })
        .collect())
}

fn bytes_to_i32(bytes: &[u8]) -> BackendResult<Vec<i32>> {
    if bytes.len() % 4 != 0 {
        return Err(BackendError::execution(
            "literal byte length mismatches i32",
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn pair_up<T: Copy, C>(parts: &[T], make: impl Fn(T, T) -> C) -> BackendResult<Arc<[C]>> {
    if parts.len() % 2 != 0 {
        return Err(BackendError::execution(
            "complex literal has an odd component count",
        ));
    }
    Ok(parts.chunks_exact(2).map(|pair| make(pair[0], pair[1])).collect())
}

fn le_bytes<const N: usize>(chunks: impl Iterator<Item = [u8; N]>) -> Arc<[u8]> {
    let mut bytes = Vec::new();
    for chunk in chunks {
        bytes.extend_from_slice(&chunk);
    }
    Arc::from(bytes.into_boxed_slice())
}
