use std::sync::Arc;

use anyhow::Result;
use tensr::backend::spec::BackendError;
use tensr::ops::elementwise::arithmetic::Reciprocal;
use tensr::tensor::{DeviceTensor, Shape, Tensor};
use tensr::{set_default_error_policy, ErrAction, ErrorPolicy, UnaryOpOptions};
use tensr_backend_ref_cpu::RefCpuBackend;

fn device_f64(data: Vec<f64>) -> Result<DeviceTensor<RefCpuBackend>> {
    let backend = Arc::new(RefCpuBackend::new());
    let host = Tensor::from_f64(Shape::new([data.len()]), data)?;
    DeviceTensor::from_host(backend, host)
}

const RAISE_ALL: ErrorPolicy = ErrorPolicy {
    divide: ErrAction::Raise,
    over: ErrAction::Raise,
    under: ErrAction::Raise,
    invalid: ErrAction::Raise,
};

#[test]
fn descriptor_freezes_default_policy_at_construction() -> Result<()> {
    let previous = set_default_error_policy(RAISE_ALL);
    let strict_op = Reciprocal::new();
    set_default_error_policy(ErrorPolicy::ignore_all());
    let lenient_op = Reciprocal::new();
    set_default_error_policy(previous);

    let input = device_f64(vec![0.0, 2.0])?;

    // Frozen at construction: the snapshot taken under RAISE_ALL still
    // raises even though the default has moved on.
    let strict = strict_op.apply(&input)?;
    let err = strict.to_host().expect_err("divide-by-zero should raise");
    assert!(matches!(
        err.downcast_ref::<BackendError>(),
        Some(BackendError::Numeric { .. })
    ));

    let lenient = lenient_op.apply(&input)?;
    let host = lenient.to_host()?;
    assert!(host.data_f64()[0].is_infinite());
    assert_eq!(host.data_f64()[1], 0.5);
    Ok(())
}

#[test]
fn apply_never_raises_synchronously() -> Result<()> {
    let op = Reciprocal::with_options(UnaryOpOptions {
        err: Some(RAISE_ALL),
        ..UnaryOpOptions::default()
    });
    let input = device_f64(vec![0.0])?;

    // Recording succeeds; the failure only surfaces at readback.
    let result = op.apply(&input)?;
    assert!(result.is_lazy());
    assert!(result.to_host().is_err());
    Ok(())
}

#[test]
fn explicit_ignore_policy_silences_divide() -> Result<()> {
    let op = Reciprocal::with_options(UnaryOpOptions {
        err: Some(ErrorPolicy::ignore_all()),
        ..UnaryOpOptions::default()
    });
    let input = device_f64(vec![0.0, -4.0])?;
    let host = op.apply(&input)?.to_host()?;
    assert!(host.data_f64()[0].is_infinite());
    assert_eq!(host.data_f64()[1], -0.25);
    Ok(())
}

#[test]
fn underflow_and_overflow_conditions_are_reported() -> Result<()> {
    let raise_over_under = ErrorPolicy {
        divide: ErrAction::Ignore,
        over: ErrAction::Raise,
        under: ErrAction::Raise,
        invalid: ErrAction::Ignore,
    };
    let op = Reciprocal::with_options(UnaryOpOptions {
        err: Some(raise_over_under),
        ..UnaryOpOptions::default()
    });

    // Reciprocal of a subnormal overflows to infinity.
    let tiny = device_f64(vec![5e-324])?;
    assert!(op.apply(&tiny)?.to_host().is_err());

    // Reciprocal of an enormous value underflows to a subnormal.
    let huge = device_f64(vec![f64::MAX])?;
    let host_err = op.apply(&huge)?.to_host();
    assert!(host_err.is_err());

    // The same inputs pass when both conditions are ignored.
    let lenient = Reciprocal::with_options(UnaryOpOptions {
        err: Some(ErrorPolicy::ignore_all()),
        ..UnaryOpOptions::default()
    });
    let host = lenient
        .apply(&device_f64(vec![5e-324, f64::MAX])?)?
        .to_host()?;
    assert!(host.data_f64()[0].is_infinite());
    Ok(())
}

#[test]
fn f32_underflow_is_detected_at_source_precision() -> Result<()> {
    let raise_under = ErrorPolicy {
        divide: ErrAction::Ignore,
        over: ErrAction::Ignore,
        under: ErrAction::Raise,
        invalid: ErrAction::Ignore,
    };
    let op = Reciprocal::with_options(UnaryOpOptions {
        err: Some(raise_under),
        ..UnaryOpOptions::default()
    });

    // 1 / f32::MAX is subnormal as an f32 but normal once widened to f64,
    // so the condition has to be classified before any widening.
    let backend = Arc::new(RefCpuBackend::new());
    let host = Tensor::from_vec(Shape::new([1]), vec![f32::MAX])?;
    let input = DeviceTensor::from_host(backend, host)?;

    let err = op.apply(&input)?.to_host().expect_err("underflow should raise");
    assert!(matches!(
        err.downcast_ref::<BackendError>(),
        Some(BackendError::Numeric { .. })
    ));
    Ok(())
}

#[test]
fn warn_policy_does_not_fail_materialization() -> Result<()> {
    // The conventional default warns on divide; warning is not an error.
    let op = Reciprocal::with_options(UnaryOpOptions {
        err: Some(ErrorPolicy::standard()),
        ..UnaryOpOptions::default()
    });
    let input = device_f64(vec![0.0, 1.0])?;
    let host = op.apply(&input)?.to_host()?;
    assert!(host.data_f64()[0].is_infinite());
    assert_eq!(host.data_f64()[1], 1.0);
    Ok(())
}
