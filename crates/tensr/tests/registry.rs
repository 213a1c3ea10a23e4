use std::sync::Arc;

use anyhow::Result;
use tensr::backend::registry::{create_backend, get_typed_backend, has_backend, list_backends};
use tensr::tensor::{Complex, DeviceTensor, Shape, Tensor};
use tensr::{isreal, DType};
use tensr_backend_ref_cpu::{register_ref_cpu_backend, RefCpuBackend};

#[test]
fn reference_backend_registers_under_its_name() {
    register_ref_cpu_backend();
    assert!(has_backend("ref-cpu"));
    assert!(list_backends().contains(&"ref-cpu".to_string()));
    assert!(!has_backend("no-such-backend"));
    assert!(create_backend("no-such-backend").is_none());
}

#[test]
fn typed_backend_recovers_from_erased_handle() -> Result<()> {
    register_ref_cpu_backend();
    let erased = create_backend("ref-cpu").expect("backend should be registered");
    assert_eq!(erased.backend_name(), "ref-cpu");

    let backend: Arc<RefCpuBackend> =
        get_typed_backend(erased.as_ref()).expect("wrapper hides a RefCpuBackend");

    let host = Tensor::from_cf32(
        Shape::new([2]),
        vec![Complex::new(1.0, 0.0), Complex::new(1.0, 1.0)],
    )?;
    let input = DeviceTensor::from_host(backend, host)?;
    let result = isreal(&input)?;
    assert_eq!(result.dtype(), DType::Bool);
    assert_eq!(result.to_host()?.to_bool_vec(), vec![true, false]);
    Ok(())
}
