//! Mutable builder used to stage operations inside a [`GraphArena`](super::arena::GraphArena).

use std::sync::Arc;

use anyhow::Result;

use crate::backend::spec::{Operand, Operation, PortableBackend, TensorSpec, ValueId};
use crate::tensor::lazy_tensor::LazyHandle;
use crate::tensor::DeviceTensor;

use super::arena::GraphArena;
use super::state::{GraphInner, NodeRecord, NodeState, ParameterRecord};

/// Context passed to graph capture closures for importing tensors and emitting nodes.
pub struct GraphBuilder<'a, B: PortableBackend + 'static> {
    pub(super) arena: Arc<GraphArena<B>>,
    pub(super) inner: &'a mut GraphInner<B>,
}

impl<'a, B: PortableBackend + 'static> GraphBuilder<'a, B> {
    /// Imports a tensor into the graph, returning the associated value identifier.
    /// Existing input handles are reused so repeated captures share parameters.
    pub fn import(&mut self, tensor: &DeviceTensor<B>) -> Result<ValueId> {
        match &**tensor.lazy_handle() {
            LazyHandle::Input { id, tensor: handle } => {
                if let Some(existing) = self.inner.parameter_lookup.get(id) {
                    return Ok(*existing);
                }
                let value = self.allocate_value();
                self.inner.parameters.push(ParameterRecord {
                    value,
                    spec: tensor.tensor_spec(),
                    handle: handle.clone(),
                });
                self.inner.parameter_lookup.insert(*id, value);
                Ok(value)
            }
            LazyHandle::Node { graph, value } => {
                if Arc::ptr_eq(graph, &self.arena) {
                    Ok(*value)
                } else {
                    // Cross-arena edge: force the foreign graph and feed the
                    // result in as a plain parameter.
                    let handle = tensor.materialize()?;
                    let value_id = self.allocate_value();
                    self.inner.parameters.push(ParameterRecord {
                        value: value_id,
                        spec: tensor.tensor_spec(),
                        handle,
                    });
                    Ok(value_id)
                }
            }
        }
    }

    /// Emits a new operation node and returns its output value identifier.
    pub fn emit(&mut self, op: Operation, operands: Vec<Operand>, spec: TensorSpec) -> ValueId {
        let value = self.allocate_value();
        self.inner.nodes.insert(
            value,
            NodeRecord {
                op,
                operands,
                spec,
                state: NodeState::Pending,
            },
        );
        self.inner.order.push(value);
        value
    }

    /// Marks a value as an exported graph output so future materialisations
    /// surface the handle without recomputation.
    pub fn export(&mut self, value: ValueId) {
        self.inner.exports.insert(value);
    }

    fn allocate_value(&mut self) -> ValueId {
        let value = ValueId(self.inner.next_value);
        self.inner.next_value += 1;
        value
    }
}
