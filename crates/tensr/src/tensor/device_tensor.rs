//! Device-side tensor wrapper that tracks backend handles and metadata.

use std::fmt;
use std::sync::{
    atomic::{AtomicU64, Ordering as AtomicOrdering},
    Arc,
};

use anyhow::{anyhow, Result};

use super::{lazy_tensor::LazyHandle, shape::Shape, DType, Tensor};
use crate::backend::spec::{PortableBackend, TensorInit, TensorSpec, ValueId};
use crate::ops::graph::GraphArena;
use crate::tensor::spec_utils;

static INPUT_HANDLE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_input_handle_id() -> u64 {
    INPUT_HANDLE_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed)
}

/// Device tensor that wraps a backend handle and retains shape, dtype, and
/// sparsity metadata.
///
/// The sparsity flag is advisory: operators consult it to decide whether their
/// result is sparse, but the reference backend stores everything densely.
pub struct DeviceTensor<B: PortableBackend + 'static> {
    backend: Arc<B>,
    shape: Shape,
    dtype: DType,
    sparse: bool,
    handle: Arc<LazyHandle<B>>,
}

impl<B: PortableBackend + 'static> Clone for DeviceTensor<B> {
    fn clone(&self) -> Self {
        DeviceTensor {
            backend: Arc::clone(&self.backend),
            shape: self.shape.clone(),
            dtype: self.dtype,
            sparse: self.sparse,
            handle: self.handle.clone(),
        }
    }
}

impl<B: PortableBackend + 'static> DeviceTensor<B> {
    /// Transfers a host tensor into backend memory.
    pub fn from_host(backend: Arc<B>, tensor: Tensor) -> Result<Self> {
        let shape = tensor.shape().clone();
        let dtype = tensor.dtype();
        let literal = tensor.to_literal();
        let handle = backend.materialize(TensorInit::Literal(literal))?;
        Ok(DeviceTensor {
            backend,
            shape,
            dtype,
            sparse: false,
            handle: Arc::new(LazyHandle::Input {
                id: next_input_handle_id(),
                tensor: handle,
            }),
        })
    }

    /// Wraps an existing backend handle with explicit metadata.
    pub fn from_handle(backend: Arc<B>, shape: Shape, dtype: DType, handle: B::TensorHandle) -> Self {
        DeviceTensor {
            backend,
            shape,
            dtype,
            sparse: false,
            handle: Arc::new(LazyHandle::Input {
                id: next_input_handle_id(),
                tensor: handle,
            }),
        }
    }

    /// Builds a device tensor from a lazy graph node, flushing immediately
    /// when eager mode is set.
    pub fn from_lazy(
        graph: Arc<GraphArena<B>>,
        shape: Shape,
        dtype: DType,
        sparse: bool,
        value: ValueId,
    ) -> Result<Self> {
        let backend = graph.backend();

        if crate::env::eager_enabled() {
            let handle = graph.flush_until(value)?;
            Ok(DeviceTensor {
                backend,
                shape,
                dtype,
                sparse,
                handle: Arc::new(LazyHandle::Input {
                    id: next_input_handle_id(),
                    tensor: handle,
                }),
            })
        } else {
            Ok(DeviceTensor {
                backend,
                shape,
                dtype,
                sparse,
                handle: Arc::new(LazyHandle::Node { graph, value }),
            })
        }
    }

    /// Copies the device tensor back to the host as a [`Tensor`].
    ///
    /// Pending graph nodes execute here; any deferred casting or numeric
    /// policy error surfaces from this call.
    pub fn to_host(&self) -> Result<Tensor> {
        let handle = self.materialize()?;
        let literal = self.backend.to_literal(&handle)?;
        Tensor::from_literal(&literal)
    }

    pub fn backend(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Reports whether the tensor is flagged sparse.
    pub fn is_sparse(&self) -> bool {
        self.sparse
    }

    /// Returns a copy of the tensor with the sparsity flag replaced.
    pub fn with_sparse(&self, sparse: bool) -> Self {
        let mut tensor = self.clone();
        tensor.sparse = sparse;
        tensor
    }

    /// Returns the raw lazy handle reference for graph wiring.
    pub(crate) fn lazy_handle(&self) -> &Arc<LazyHandle<B>> {
        &self.handle
    }

    /// Returns the owning graph arena when the tensor is still lazy.
    pub(crate) fn graph(&self) -> Option<Arc<GraphArena<B>>> {
        self.handle.graph()
    }

    /// Reports whether the tensor still has pending graph work.
    pub fn is_lazy(&self) -> bool {
        matches!(&*self.handle, LazyHandle::Node { .. })
    }

    /// Ensures the tensor is materialized on the backend and returns the handle.
    pub fn materialize(&self) -> Result<B::TensorHandle> {
        match &*self.handle {
            LazyHandle::Input { tensor, .. } => Ok(tensor.clone()),
            LazyHandle::Node { graph, value } => {
                if let Some(handle) = graph.try_ready_handle(*value) {
                    return Ok(handle);
                }
                let mut handles = graph.materialize_values(&[*value])?;
                handles
                    .pop()
                    .ok_or_else(|| anyhow!("failed to materialize value {:?}", value))
            }
        }
    }

    /// Builds a backend `TensorSpec` matching this tensor.
    pub(crate) fn tensor_spec(&self) -> TensorSpec {
        TensorSpec::new(
            spec_utils::backend_dtype(self.dtype),
            spec_utils::backend_shape_from_shape(&self.shape),
        )
    }
}

impl<B: PortableBackend> fmt::Debug for DeviceTensor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceTensor")
            .field("backend", &self.backend.backend_name())
            .field("shape", &self.shape.dims())
            .field("dtype", &self.dtype)
            .field("sparse", &self.sparse)
            .finish()
    }
}
