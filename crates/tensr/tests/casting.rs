use std::sync::Arc;

use anyhow::Result;
use tensr::backend::spec::BackendError;
use tensr::tensor::{Complex, DeviceTensor, Shape, Tensor};
use tensr::{CastingRule, DType, UnaryOps};
use tensr_backend_ref_cpu::RefCpuBackend;

fn device_f64(data: Vec<f64>) -> Result<DeviceTensor<RefCpuBackend>> {
    let backend = Arc::new(RefCpuBackend::new());
    let host = Tensor::from_f64(Shape::new([data.len()]), data)?;
    DeviceTensor::from_host(backend, host)
}

#[test]
fn incompatible_cast_fails_only_at_readback() -> Result<()> {
    let input = device_f64(vec![1.5, 2.5])?;

    // Building the node succeeds; float to int crosses kinds under same_kind.
    let lowered = input.cast(DType::I32, CastingRule::SameKind)?;
    assert!(lowered.is_lazy());
    assert_eq!(lowered.dtype(), DType::I32);

    let err = lowered.to_host().expect_err("cast should be rejected");
    match err.downcast_ref::<BackendError>() {
        Some(BackendError::Cast { rule, .. }) => {
            assert_eq!(*rule, CastingRule::SameKind);
        }
        other => panic!("expected a cast error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn unsafe_cast_truncates_float_to_int() -> Result<()> {
    let input = device_f64(vec![1.9, -2.9, 0.0])?;
    let host = input.cast(DType::I32, CastingRule::Unsafe)?.to_host()?;
    assert_eq!(host.data_i32(), &[1, -2, 0]);
    Ok(())
}

#[test]
fn safe_widening_cast_succeeds() -> Result<()> {
    let backend = Arc::new(RefCpuBackend::new());
    let host = Tensor::from_i32(Shape::new([2]), vec![3, -4])?;
    let input = DeviceTensor::from_host(backend, host)?;

    let widened = input.cast(DType::F64, CastingRule::Safe)?.to_host()?;
    assert_eq!(widened.data_f64(), &[3.0, -4.0]);
    Ok(())
}

#[test]
fn same_kind_allows_int_to_float() -> Result<()> {
    let backend = Arc::new(RefCpuBackend::new());
    let host = Tensor::from_i32(Shape::new([3]), vec![7, 0, -12])?;
    let input = DeviceTensor::from_host(backend, host)?;

    // Raising the kind is permitted under same_kind even when the cast can
    // lose precision, matching int32 to float32 promotion.
    let floated = input.cast(DType::F32, CastingRule::SameKind)?.to_host()?;
    assert_eq!(floated.data(), &[7.0f32, 0.0, -12.0]);
    Ok(())
}

#[test]
fn same_kind_allows_narrowing_within_kind() -> Result<()> {
    let input = device_f64(vec![0.5])?;
    let narrowed = input.cast(DType::F32, CastingRule::SameKind)?.to_host()?;
    assert_eq!(narrowed.data(), &[0.5f32]);
    Ok(())
}

#[test]
fn unsafe_complex_to_real_takes_the_real_part() -> Result<()> {
    let backend = Arc::new(RefCpuBackend::new());
    let host = Tensor::from_cf64(
        Shape::new([2]),
        vec![Complex::new(1.0, 9.0), Complex::new(-2.0, 0.5)],
    )?;
    let input = DeviceTensor::from_host(backend, host)?;

    assert!(input
        .cast(DType::F64, CastingRule::SameKind)?
        .to_host()
        .is_err());

    let real = input.cast(DType::F64, CastingRule::Unsafe)?.to_host()?;
    assert_eq!(real.data_f64(), &[1.0, -2.0]);
    Ok(())
}

#[test]
fn real_to_complex_sets_zero_imaginary() -> Result<()> {
    let input = device_f64(vec![2.0, -3.0])?;
    let complex = input.cast(DType::Cf64, CastingRule::Safe)?.to_host()?;
    assert_eq!(
        complex.data_cf64(),
        &[Complex::new(2.0, 0.0), Complex::new(-3.0, 0.0)]
    );
    Ok(())
}

#[test]
fn numeric_to_bool_is_nonzero_test() -> Result<()> {
    let input = device_f64(vec![0.0, 0.25, -7.0])?;
    let host = input.cast(DType::Bool, CastingRule::Unsafe)?.to_host()?;
    assert_eq!(host.to_bool_vec(), vec![false, true, true]);
    Ok(())
}
