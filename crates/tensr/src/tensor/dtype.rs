use serde::{Deserialize, Serialize};

/// Element types exposed by the portable tensor frontend.
///
/// Smaller than the backend dtype set on purpose; the frontend only hands out
/// dtypes every backend is expected to store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Bool,
    I32,
    F32,
    F64,
    Cf32,
    Cf64,
}

impl DType {
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::Bool => 1,
            DType::I32 | DType::F32 => 4,
            DType::F64 | DType::Cf32 => 8,
            DType::Cf64 => 16,
        }
    }

    pub fn is_complex(self) -> bool {
        matches!(self, DType::Cf32 | DType::Cf64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}
