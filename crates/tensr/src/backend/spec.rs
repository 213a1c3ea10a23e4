use std::{fmt, fs, io, path::Path, sync::Arc};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use thiserror::Error;

use crate::policy::{CastingRule, ErrorPolicy, FpCondition};

/// Frozen tensor-expression IR version enforced by this interface.
pub const SPEC_VERSION: &str = "texpr.v0.1";

fn default_spec_version() -> String {
    SPEC_VERSION.to_string()
}

/// Enumerates scalar element types supported by the backend contract.
///
/// The IR admits more dtypes than the portable frontend exposes; backends may
/// reject the ones they do not store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    I1,
    Si8,
    Si32,
    Si64,
    Bf16,
    F16,
    F32,
    F64,
    Cf32,
    Cf64,
}

impl DType {
    /// Returns `true` when the dtype is a signed integer.
    pub fn is_integer(self) -> bool {
        matches!(self, DType::Si8 | DType::Si32 | DType::Si64)
    }

    /// Returns `true` when the dtype is a real floating-point representation.
    pub fn is_float(self) -> bool {
        matches!(self, DType::Bf16 | DType::F16 | DType::F32 | DType::F64)
    }

    /// Returns `true` when the dtype is complex.
    pub fn is_complex(self) -> bool {
        matches!(self, DType::Cf32 | DType::Cf64)
    }

    /// Returns the storage size in bytes of one scalar.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::I1 | DType::Si8 => 1,
            DType::Bf16 | DType::F16 => 2,
            DType::Si32 | DType::F32 => 4,
            DType::Si64 | DType::F64 | DType::Cf32 => 8,
            DType::Cf64 => 16,
        }
    }
}

/// Names a symbolic dynamic dimension (e.g. `?N`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DimSymbol(Arc<str>);

impl DimSymbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::<str>::from(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for DimSymbol {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DimSymbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(DimSymbol::new(name))
    }
}

/// Represents a single axis extent in a tensor shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Static(usize),
    Dynamic(DimSymbol),
}

/// Logical tensor shape as an ordered list of dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<Dimension>,
}

impl Shape {
    pub fn new(dims: impl Into<Vec<Dimension>>) -> Self {
        Self { dims: dims.into() }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    /// Returns static dimensions when all dims are static.
    pub fn static_dims(&self) -> Option<Vec<usize>> {
        let mut dims = Vec::with_capacity(self.dims.len());
        for dim in &self.dims {
            match dim {
                Dimension::Static(value) => dims.push(*value),
                Dimension::Dynamic(_) => return None,
            }
        }
        Some(dims)
    }

    /// Returns element count when all dims are static.
    pub fn element_count(&self) -> Option<usize> {
        let dims = self.static_dims()?;
        let mut count = 1usize;
        for dim in dims {
            count = count.checked_mul(dim)?;
        }
        Some(count)
    }
}

/// Tensor metadata coupling dtype and shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorSpec {
    pub dtype: DType,
    pub shape: Shape,
}

impl TensorSpec {
    pub fn new(dtype: DType, shape: Shape) -> Self {
        Self { dtype, shape }
    }

    /// Returns total element count when the shape is fully static.
    pub fn element_count(&self) -> Option<usize> {
        self.shape.element_count()
    }

    /// Returns total byte length when the shape is static.
    pub fn byte_len(&self) -> Option<usize> {
        self.element_count()?
            .checked_mul(self.dtype.size_in_bytes())
    }
}

/// Dense literal tensor payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorLiteral {
    pub spec: TensorSpec,
    pub bytes: Arc<[u8]>,
}

impl TensorLiteral {
    pub fn new(spec: TensorSpec, bytes: Arc<[u8]>) -> Self {
        Self { spec, bytes }
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

impl Serialize for TensorLiteral {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("TensorLiteral", 2)?;
        state.serialize_field("spec", &self.spec)?;
        state.serialize_field("bytes", &self.bytes.as_ref())?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for TensorLiteral {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct TensorLiteralHelper {
            spec: TensorSpec,
            bytes: Vec<u8>,
        }

        let helper = TensorLiteralHelper::deserialize(deserializer)?;
        Ok(TensorLiteral {
            spec: helper.spec,
            bytes: Arc::<[u8]>::from(helper.bytes),
        })
    }
}

/// Initialization payload when materialising tensors on a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TensorInit {
    Literal(TensorLiteral),
    Zeroed(TensorSpec),
}

/// Elementwise unary operations defined by the IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementwiseUnaryOp {
    IsReal,
    IsComplex,
    Neg,
    Abs,
    Reciprocal,
}

/// Attribute payload for elementwise unary instructions.
///
/// The error policy travels with the instruction so the backend enforces the
/// policy that was frozen into the operator descriptor, not whatever the
/// process-wide default happens to be at materialization time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementwiseUnarySpec {
    pub op: ElementwiseUnaryOp,
    pub err: ErrorPolicy,
}

/// Attribute payload for `cast`.
///
/// The casting rule is stored unvalidated; the backend checks it against the
/// operand dtype only when the instruction executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastSpec {
    pub dtype: DType,
    pub casting: CastingRule,
}

/// Unique identifier for SSA values in a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueId(pub u32);

/// Operand reference in an instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Value(ValueId),
    Literal(TensorLiteral),
}

/// Declarative form of IR operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    ElementwiseUnary(ElementwiseUnarySpec),
    Cast(CastSpec),
}

/// Single SSA instruction in the declarative program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: ValueId,
    pub op: Operation,
    pub operands: Vec<Operand>,
    pub output: TensorSpec,
}

/// IR function describing a reusable computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<TensorSpec>,
    pub parameter_ids: Vec<ValueId>,
    pub results: Vec<TensorSpec>,
    pub body: Vec<Instruction>,
    pub result_ids: Vec<ValueId>,
}

/// Complete IR module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default = "default_spec_version")]
    pub spec_version: String,
    pub entry: String,
    pub functions: Vec<Function>,
}

#[derive(Debug, Error)]
pub enum ProgramSerdeError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("program spec version '{found}' does not match expected '{expected}'")]
    SpecVersionMismatch {
        found: String,
        expected: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ProgramIoError {
    #[error(transparent)]
    Serialization(#[from] ProgramSerdeError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl Program {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            spec_version: SPEC_VERSION.to_string(),
            entry: entry.into(),
            functions: Vec::new(),
        }
    }

    pub fn with_functions(mut self, functions: Vec<Function>) -> Self {
        self.functions = functions;
        self
    }

    pub fn to_json_string(&self) -> Result<String, ProgramSerdeError> {
        serde_json::to_string_pretty(self).map_err(ProgramSerdeError::from)
    }

    pub fn from_json_str(src: &str) -> Result<Self, ProgramSerdeError> {
        let mut program: Program = serde_json::from_str(src).map_err(ProgramSerdeError::from)?;
        program.spec_version = normalize_spec_version(program.spec_version)?;
        Ok(program)
    }

    pub fn to_bincode_bytes(&self) -> Result<Vec<u8>, ProgramSerdeError> {
        bincode::serialize(self).map_err(ProgramSerdeError::from)
    }

    pub fn from_bincode_slice(bytes: &[u8]) -> Result<Self, ProgramSerdeError> {
        let mut program: Program = bincode::deserialize(bytes).map_err(ProgramSerdeError::from)?;
        program.spec_version = normalize_spec_version(program.spec_version)?;
        Ok(program)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ProgramIoError> {
        let contents = self.to_json_string()?;
        fs::write(path, contents).map_err(ProgramIoError::from)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ProgramIoError> {
        let contents = fs::read_to_string(path).map_err(ProgramIoError::from)?;
        Program::from_json_str(&contents).map_err(ProgramIoError::from)
    }

    pub fn to_text(&self) -> String {
        format!("{self}")
    }
}

fn normalize_spec_version(version: String) -> Result<String, ProgramSerdeError> {
    if version.is_empty() {
        return Ok(SPEC_VERSION.to_string());
    }
    if version == SPEC_VERSION {
        Ok(version)
    } else {
        Err(ProgramSerdeError::SpecVersionMismatch {
            found: version,
            expected: SPEC_VERSION,
        })
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_line(
            f,
            0,
            &format!(
                "program @{} (spec_version = {}) {{",
                self.entry, self.spec_version
            ),
        )?;
        for function in &self.functions {
            fmt_function(function, 1, f)?;
        }
        write_line(f, 0, "}")
    }
}

fn fmt_function(function: &Function, indent: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write_line(f, indent, &format!("func @{} {{", function.name))?;
    if !function.parameter_ids.is_empty() {
        write_line(f, indent + 1, "params:")?;
        for (value_id, spec) in function
            .parameter_ids
            .iter()
            .zip(function.parameters.iter())
        {
            write_line(
                f,
                indent + 2,
                &format!("%{} : {}", value_id.0, format_spec(spec)),
            )?;
        }
    }
    if !function.body.is_empty() {
        write_line(f, indent + 1, "body:")?;
        for instruction in &function.body {
            fmt_instruction(instruction, indent + 2, f)?;
        }
    }
    if !function.result_ids.is_empty() {
        write_line(f, indent + 1, "results:")?;
        for (value_id, spec) in function.result_ids.iter().zip(function.results.iter()) {
            write_line(
                f,
                indent + 2,
                &format!("%{} : {}", value_id.0, format_spec(spec)),
            )?;
        }
    }
    write_line(f, indent, "}")
}

fn fmt_instruction(
    instruction: &Instruction,
    indent: usize,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    let operands = instruction
        .operands
        .iter()
        .map(format_operand)
        .collect::<Vec<_>>()
        .join(", ");
    let line = if operands.is_empty() {
        format!(
            "%{} = {:?} -> {}",
            instruction.id.0,
            instruction.op,
            format_spec(&instruction.output)
        )
    } else {
        format!(
            "%{} = {:?}({}) -> {}",
            instruction.id.0,
            instruction.op,
            operands,
            format_spec(&instruction.output)
        )
    };
    write_line(f, indent, &line)
}

fn format_spec(spec: &TensorSpec) -> String {
    format!("tensor<{:?} x {}>", spec.dtype, format_shape(&spec.shape))
}

fn format_shape(shape: &Shape) -> String {
    let dims = shape
        .dims()
        .iter()
        .map(|dim| match dim {
            Dimension::Static(v) => v.to_string(),
            Dimension::Dynamic(sym) => format!("?{}", sym.as_str()),
        })
        .collect::<Vec<_>>();
    if dims.is_empty() {
        "[]".to_string()
    } else {
        dims.join("x")
    }
}

fn format_operand(operand: &Operand) -> String {
    match operand {
        Operand::Value(id) => format!("%{}", id.0),
        Operand::Literal(lit) => format!(
            "literal(dtype={:?}, shape={})",
            lit.spec.dtype,
            format_shape(&lit.spec.shape)
        ),
    }
}

fn write_line(f: &mut fmt::Formatter<'_>, indent: usize, line: &str) -> fmt::Result {
    for _ in 0..indent {
        f.write_str("  ")?;
    }
    writeln!(f, "{line}")
}

/// Lightweight builder for constructing IR functions programmatically.
#[derive(Default)]
pub struct ProgramBuilder {
    next_value_id: u32,
    parameters: Vec<(ValueId, TensorSpec)>,
    instructions: Vec<Instruction>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_parameter(&mut self, spec: TensorSpec) -> ValueId {
        let id = ValueId(self.next_value_id);
        self.next_value_id += 1;
        self.parameters.push((id, spec));
        id
    }

    pub fn emit_single(
        &mut self,
        op: Operation,
        operands: Vec<Operand>,
        output: TensorSpec,
    ) -> ValueId {
        let id = ValueId(self.next_value_id);
        self.next_value_id += 1;
        self.instructions.push(Instruction {
            id,
            op,
            operands,
            output,
        });
        id
    }

    pub fn finish(self, name: impl Into<String>, result_ids: Vec<ValueId>) -> Function {
        let mut results = Vec::with_capacity(result_ids.len());
        for id in &result_ids {
            let spec = self
                .parameters
                .iter()
                .find(|(param_id, _)| param_id == id)
                .map(|(_, spec)| spec.clone())
                .or_else(|| {
                    self.instructions
                        .iter()
                        .find(|instruction| instruction.id == *id)
                        .map(|instruction| instruction.output.clone())
                })
                .expect("result value id must have a recorded spec");
            results.push(spec);
        }
        let (parameter_ids, parameters): (Vec<_>, Vec<_>) = self.parameters.into_iter().unzip();
        Function {
            name: name.into(),
            parameters,
            parameter_ids,
            results,
            body: self.instructions,
            result_ids,
        }
    }
}

/// Backend error surfaced to higher layers.
///
/// Casting and numeric-policy failures get dedicated variants because the
/// frontend defers both checks to materialization and callers match on them.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("dtype {dtype:?} is not supported by {op}")]
    DTypeNotSupported { op: &'static str, dtype: DType },
    #[error("cannot cast {from:?} to {to:?} under {rule:?} casting")]
    Cast {
        from: DType,
        to: DType,
        rule: CastingRule,
    },
    #[error("floating-point {condition} encountered")]
    Numeric { condition: FpCondition },
    #[error("{op} is not implemented: {reason}")]
    Unimplemented { op: &'static str, reason: String },
    #[error("backend execution failure: {message}")]
    Execution { message: String },
}

impl BackendError {
    pub fn execution(message: impl Into<String>) -> Self {
        BackendError::Execution {
            message: message.into(),
        }
    }

    pub fn unimplemented(op: &'static str, reason: impl Into<String>) -> Self {
        BackendError::Unimplemented {
            op,
            reason: reason.into(),
        }
    }
}

/// Convenience alias for results returned by backend routines.
pub type BackendResult<T> = Result<T, BackendError>;

/// Portable backend trait that evaluates tensor-expression programs.
pub trait PortableBackend: Send + Sync {
    type TensorHandle: Clone + Send + Sync + 'static;

    /// Returns a human-readable backend identifier (e.g., `"ref-cpu"`).
    fn backend_name(&self) -> &str;

    /// Materialises a tensor handle from host initialisation data.
    fn materialize(&self, init: TensorInit) -> BackendResult<Self::TensorHandle>;

    /// Reads back a tensor handle into a dense literal.
    fn to_literal(&self, tensor: &Self::TensorHandle) -> BackendResult<TensorLiteral>;

    /// Executes a single instruction given already materialised operand handles.
    fn execute_instruction(
        &self,
        instruction: &Instruction,
        inputs: &[Self::TensorHandle],
    ) -> BackendResult<Vec<Self::TensorHandle>>;

    /// Executes an entire program starting from the entry function.
    fn run_program(
        &self,
        program: &Program,
        entry_inputs: &[Self::TensorHandle],
    ) -> BackendResult<Vec<Self::TensorHandle>>;
}
