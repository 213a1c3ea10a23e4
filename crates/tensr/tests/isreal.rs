use std::sync::Arc;

use anyhow::Result;
use tensr::ops::elementwise::predicates::IsReal;
use tensr::tensor::{Complex, DeviceTensor, Shape, Tensor};
use tensr::{iscomplex, isreal, CastingRule, DType, UnaryOpOptions, UnaryOps};
use tensr_backend_ref_cpu::RefCpuBackend;

fn device_cf64(data: Vec<Complex<f64>>) -> Result<DeviceTensor<RefCpuBackend>> {
    let backend = Arc::new(RefCpuBackend::new());
    let host = Tensor::from_cf64(Shape::new([data.len()]), data)?;
    DeviceTensor::from_host(backend, host)
}

#[test]
fn complex_vector_mixed_real_and_imaginary() -> Result<()> {
    let input = device_cf64(vec![
        Complex::new(1.0, 1.0),
        Complex::new(1.0, 0.0),
        Complex::new(4.5, 0.0),
        Complex::new(3.0, 0.0),
        Complex::new(2.0, 0.0),
        Complex::new(0.0, 2.0),
    ])?;

    let result = isreal(&input)?;
    assert_eq!(result.dtype(), DType::Bool);
    assert_eq!(result.shape().dims(), &[6]);

    let host = result.to_host()?;
    assert_eq!(
        host.to_bool_vec(),
        vec![false, true, true, true, true, false]
    );
    Ok(())
}

#[test]
fn real_dtypes_are_entirely_real() -> Result<()> {
    let backend = Arc::new(RefCpuBackend::new());
    let host = Tensor::from_f64(Shape::new([4]), vec![-1.0, 0.0, f64::NAN, f64::INFINITY])?;
    let input = DeviceTensor::from_host(backend, host)?;

    let host = isreal(&input)?.to_host()?;
    assert_eq!(host.to_bool_vec(), vec![true, true, true, true]);
    Ok(())
}

#[test]
fn zeroed_complex_tensor_is_entirely_real() -> Result<()> {
    let backend = Arc::new(RefCpuBackend::new());
    let host = Tensor::zeros(Shape::new([4]), DType::Cf64);
    let input = DeviceTensor::from_host(backend, host)?;

    let host = isreal(&input)?.to_host()?;
    assert_eq!(host.to_bool_vec(), vec![true; 4]);
    Ok(())
}

#[test]
fn integer_input_is_real() -> Result<()> {
    let backend = Arc::new(RefCpuBackend::new());
    let host = Tensor::from_i32(Shape::new([3]), vec![-7, 0, 7])?;
    let input = DeviceTensor::from_host(backend, host)?;

    let host = isreal(&input)?.to_host()?;
    assert_eq!(host.to_bool_vec(), vec![true, true, true]);
    Ok(())
}

#[test]
fn empty_input_yields_empty_boolean_output() -> Result<()> {
    let input = device_cf64(Vec::new())?;
    let result = isreal(&input)?;
    assert_eq!(result.dtype(), DType::Bool);

    let host = result.to_host()?;
    assert_eq!(host.len(), 0);
    assert!(host.to_bool_vec().is_empty());
    Ok(())
}

#[test]
fn output_dtype_is_boolean_regardless_of_options() -> Result<()> {
    let input = device_cf64(vec![Complex::new(2.0, 0.0), Complex::new(2.0, 3.0)])?;

    // Unsafe casting and an explicit dtype request must not change the output.
    let op = IsReal::with_options(UnaryOpOptions {
        casting: CastingRule::Unsafe,
        dtype: Some(DType::F64),
        ..UnaryOpOptions::default()
    });
    let result = op.apply(&input)?;
    assert_eq!(result.dtype(), DType::Bool);

    let host = result.to_host()?;
    assert_eq!(host.dtype(), DType::Bool);
    assert_eq!(host.to_bool_vec(), vec![true, false]);
    Ok(())
}

#[test]
fn result_is_never_sparse() -> Result<()> {
    let input = device_cf64(vec![Complex::new(1.0, 0.0)])?;
    let flagged = input.with_sparse(true);
    assert!(flagged.is_sparse());

    let result = isreal(&flagged)?;
    assert!(!result.is_sparse());

    // Negation propagates the flag; the predicate drops it.
    let negated = flagged.neg()?;
    assert!(negated.is_sparse());
    Ok(())
}

#[test]
fn applying_twice_gives_all_true() -> Result<()> {
    let input = device_cf64(vec![Complex::new(1.0, 1.0), Complex::new(1.0, 0.0)])?;
    let once = isreal(&input)?;
    let twice = isreal(&once)?;

    // Boolean inputs are trivially real.
    let host = twice.to_host()?;
    assert_eq!(host.to_bool_vec(), vec![true, true]);
    Ok(())
}

#[test]
fn iscomplex_is_the_complement() -> Result<()> {
    let input = device_cf64(vec![
        Complex::new(0.5, -0.5),
        Complex::new(0.5, 0.0),
        Complex::new(0.0, 0.0),
    ])?;

    let real = isreal(&input)?.to_host()?.to_bool_vec();
    let complex = iscomplex(&input)?.to_host()?.to_bool_vec();
    for (r, c) in real.iter().zip(complex.iter()) {
        assert_ne!(r, c);
    }
    Ok(())
}

#[test]
fn descriptor_round_trips_through_serde() -> Result<()> {
    let op = IsReal::with_options(UnaryOpOptions {
        casting: CastingRule::Safe,
        ..UnaryOpOptions::default()
    });
    let json = serde_json::to_string(&op)?;
    let restored: IsReal = serde_json::from_str(&json)?;
    assert_eq!(op, restored);
    Ok(())
}
