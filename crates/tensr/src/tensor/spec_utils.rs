//! Conversions between frontend tensor metadata and IR metadata.

use anyhow::{bail, Result};

use super::{dtype::DType, shape::Shape};
use crate::backend::spec::{self, Dimension};

pub fn backend_dtype(dtype: DType) -> spec::DType {
    match dtype {
        DType::Bool => spec::DType::I1,
        DType::I32 => spec::DType::Si32,
        DType::F32 => spec::DType::F32,
        DType::F64 => spec::DType::F64,
        DType::Cf32 => spec::DType::Cf32,
        DType::Cf64 => spec::DType::Cf64,
    }
}

pub fn frontend_dtype(dtype: spec::DType) -> Result<DType> {
    Ok(match dtype {
        spec::DType::I1 => DType::Bool,
        spec::DType::Si32 => DType::I32,
        spec::DType::F32 => DType::F32,
        spec::DType::F64 => DType::F64,
        spec::DType::Cf32 => DType::Cf32,
        spec::DType::Cf64 => DType::Cf64,
        other => bail!("backend dtype {:?} has no frontend counterpart", other),
    })
}

pub fn backend_shape_from_shape(shape: &Shape) -> spec::Shape {
    spec::Shape::new(
        shape
            .dims()
            .iter()
            .map(|&d| Dimension::Static(d))
            .collect::<Vec<_>>(),
    )
}

/// Recovers a static frontend shape, rejecting dynamic dimensions.
pub fn shape_from_spec(shape: &spec::Shape) -> Result<Shape> {
    let dims = shape
        .dims()
        .iter()
        .map(|d| match d {
            Dimension::Static(value) => Ok(*value),
            Dimension::Dynamic(symbol) => {
                bail!("dynamic dimension {:?} in a host-facing shape", symbol)
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Shape::new(dims))
}
