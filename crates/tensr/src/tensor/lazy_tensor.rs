use std::sync::Arc;

use crate::backend::spec::{PortableBackend, ValueId};
use crate::ops::graph::GraphArena;

/// Internal representation of a device tensor's backing storage.
///
/// `Input` tensors hold a materialised backend handle; `Node` tensors point at
/// a pending value inside a lazy graph arena.
pub(crate) enum LazyHandle<B: PortableBackend + 'static> {
    Input {
        /// Identity used to deduplicate imports of the same input.
        id: u64,
        tensor: B::TensorHandle,
    },
    Node {
        graph: Arc<GraphArena<B>>,
        value: ValueId,
    },
}

impl<B: PortableBackend + 'static> LazyHandle<B> {
    pub(crate) fn graph(&self) -> Option<Arc<GraphArena<B>>> {
        match self {
            LazyHandle::Input { .. } => None,
            LazyHandle::Node { graph, .. } => Some(Arc::clone(graph)),
        }
    }
}
