use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tensr::backend::spec::{
    BackendResult, Instruction, PortableBackend, Program, TensorInit, TensorLiteral,
};
use tensr::tensor::{DeviceTensor, Shape, Tensor};
use tensr::UnaryOps;
use tensr_backend_ref_cpu::RefCpuBackend;

struct CountingBackend {
    inner: RefCpuBackend,
    runs: AtomicUsize,
}

impl CountingBackend {
    fn new() -> Self {
        CountingBackend {
            inner: RefCpuBackend::new(),
            runs: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl PortableBackend for CountingBackend {
    type TensorHandle = <RefCpuBackend as PortableBackend>::TensorHandle;

    fn backend_name(&self) -> &str {
        "ref-cpu-counting"
    }

    fn materialize(&self, init: TensorInit) -> BackendResult<Self::TensorHandle> {
        self.inner.materialize(init)
    }

    fn to_literal(&self, tensor: &Self::TensorHandle) -> BackendResult<TensorLiteral> {
        self.inner.to_literal(tensor)
    }

    fn execute_instruction(
        &self,
        instruction: &Instruction,
        inputs: &[Self::TensorHandle],
    ) -> BackendResult<Vec<Self::TensorHandle>> {
        self.inner.execute_instruction(instruction, inputs)
    }

    fn run_program(
        &self,
        program: &Program,
        entry_inputs: &[Self::TensorHandle],
    ) -> BackendResult<Vec<Self::TensorHandle>> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.inner.run_program(program, entry_inputs)
    }
}

fn tensor_from_data(
    backend: &Arc<CountingBackend>,
    data: &[f64],
) -> Result<DeviceTensor<CountingBackend>> {
    let host = Tensor::from_f64(Shape::new([data.len()]), data.to_vec())?;
    DeviceTensor::from_host(Arc::clone(backend), host)
}

#[test]
fn apply_records_without_executing() -> Result<()> {
    let backend = Arc::new(CountingBackend::new());

    let x = tensor_from_data(&backend, &[1.0, -2.0, 3.0])?;
    let y = x.neg()?;
    assert!(y.is_lazy());
    assert_eq!(backend.calls(), 0);

    let host = y.to_host()?;
    assert_eq!(backend.calls(), 1);
    assert_eq!(host.data_f64(), &[-1.0, 2.0, -3.0]);
    Ok(())
}

#[test]
fn incremental_flush_skips_executed_nodes() -> Result<()> {
    let backend = Arc::new(CountingBackend::new());

    let x = tensor_from_data(&backend, &[1.0, 2.0, 3.0])?;
    let y = x.neg()?;
    let z = y.neg()?;
    assert_eq!(backend.calls(), 0);

    let _ = z.materialize()?;
    assert_eq!(backend.calls(), 1);

    // Exported siblings materialised in the same flush.
    let _ = y.materialize()?;
    assert_eq!(backend.calls(), 1);

    // New node on the same arena only executes the new work.
    let w = z.abs()?;
    let host = w.to_host()?;
    assert_eq!(backend.calls(), 2);
    assert_eq!(host.data_f64(), &[1.0, 2.0, 3.0]);

    let _ = w.materialize()?;
    assert_eq!(backend.calls(), 2);
    Ok(())
}

#[test]
fn chained_unary_ops_share_one_program() -> Result<()> {
    let backend = Arc::new(CountingBackend::new());

    let x = tensor_from_data(&backend, &[4.0, -5.0])?;
    let result = x.neg()?.abs()?.neg()?;
    assert_eq!(backend.calls(), 0);

    let host = result.to_host()?;
    assert_eq!(backend.calls(), 1);
    assert_eq!(host.data_f64(), &[-4.0, -5.0]);
    Ok(())
}

#[test]
fn materialized_handles_re_enter_as_inputs() -> Result<()> {
    let backend = Arc::new(CountingBackend::new());

    let x = tensor_from_data(&backend, &[-1.0, 6.0])?;
    let handle = x.neg()?.materialize()?;
    assert_eq!(backend.calls(), 1);

    // Wrapping a backend handle starts a fresh lazy chain from it.
    let rewrapped = DeviceTensor::from_handle(
        Arc::clone(&backend),
        Shape::new([2]),
        tensr::DType::F64,
        handle,
    );
    assert!(!rewrapped.is_lazy());

    let host = rewrapped.abs()?.to_host()?;
    assert_eq!(backend.calls(), 2);
    assert_eq!(host.data_f64(), &[1.0, 6.0]);
    Ok(())
}

#[test]
fn materialize_of_input_tensor_is_free() -> Result<()> {
    let backend = Arc::new(CountingBackend::new());

    let x = tensor_from_data(&backend, &[1.5])?;
    assert!(!x.is_lazy());
    let _ = x.materialize()?;
    assert_eq!(backend.calls(), 0);
    Ok(())
}
