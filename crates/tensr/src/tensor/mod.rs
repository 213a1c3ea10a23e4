pub mod complex;
pub mod device_tensor;
pub mod dtype;
pub mod host_tensor;
pub(crate) mod lazy_tensor;
pub mod shape;
pub mod spec_utils;

pub use complex::Complex;
pub use device_tensor::DeviceTensor;
pub use dtype::DType;
pub use host_tensor::Tensor;
pub use shape::Shape;
