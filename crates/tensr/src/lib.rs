//! Lazy tensor expressions with pluggable evaluation backends.
//!
//! Operators are serialisable descriptors that freeze their casting rule and
//! numeric error policy when constructed. Applying one records a node in a
//! shared graph arena; the backend only runs when a result is read back, and
//! casting or numeric failures surface from that read, never from the apply.

pub mod backend;
mod env;
pub mod ops;
pub mod policy;
pub mod tensor;

pub use backend::spec::PortableBackend;
pub use ops::elementwise::{
    abs, cast, iscomplex, isreal, neg, reciprocal, UnaryOpOptions, UnaryOps,
};
pub use policy::{
    can_cast, default_error_policy, set_default_error_policy, CastingRule, ErrAction, ErrorPolicy,
};
pub use tensor::{Complex, DType, DeviceTensor, Shape, Tensor};
