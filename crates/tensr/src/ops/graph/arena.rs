//! Shared arena that stores lazily constructed operation graphs.
//!
//! The arena records pending operations as functional ops capture them, then
//! lowers the pending subgraph into a single backend program when a value is
//! materialised. Nodes that have already executed become program parameters on
//! later flushes, so each node runs at most once.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use log::debug;

use crate::backend::spec::{
    Operand, PortableBackend, Program, ProgramBuilder, TensorSpec, ValueId,
};

use super::builder::GraphBuilder;
use super::state::{GraphInner, NodeState};

/// Central storage for lazy tensor graphs built on top of a single backend instance.
pub struct GraphArena<B: PortableBackend + 'static> {
    backend: Arc<B>,
    inner: Mutex<GraphInner<B>>,
}

impl<B: PortableBackend + 'static> GraphArena<B> {
    /// Creates a new arena wrapping the provided backend.
    pub fn new(backend: Arc<B>) -> Arc<Self> {
        Arc::new(GraphArena {
            backend,
            inner: Mutex::new(GraphInner::new()),
        })
    }

    /// Returns the underlying backend handle.
    pub fn backend(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    pub(crate) fn try_ready_handle(&self, value: ValueId) -> Option<B::TensorHandle> {
        let inner = self.inner.lock().expect("graph arena poisoned");
        if let Some(record) = inner.nodes.get(&value) {
            return match &record.state {
                NodeState::Ready(handle) => Some(handle.clone()),
                NodeState::Pending => None,
            };
        }
        inner
            .parameters
            .iter()
            .find(|param| param.value == value)
            .map(|param| param.handle.clone())
    }

    /// Captures a sequence of graph edits, exposing a [`GraphBuilder`] to the
    /// caller. The edits stay recorded until materialisation is requested.
    pub fn capture<R, F>(self: &Arc<Self>, f: F) -> Result<R>
    where
        F: FnOnce(&mut GraphBuilder<B>) -> Result<R>,
    {
        let mut inner = self.inner.lock().expect("graph arena poisoned");
        let mut builder = GraphBuilder {
            arena: Arc::clone(self),
            inner: &mut inner,
        };
        f(&mut builder)
    }

    /// Materialises the requested value, executing pending nodes as necessary.
    pub fn flush_until(&self, value: ValueId) -> Result<B::TensorHandle> {
        let mut handles = self.materialize_values(&[value])?;
        handles
            .pop()
            .ok_or_else(|| anyhow!("value missing after execution"))
    }

    /// Materialises all requested value identifiers, executing pending nodes
    /// at most once.
    ///
    /// Exported values are materialised alongside the explicit targets so the
    /// arena never has to re-run a flushed subgraph for a sibling result.
    pub fn materialize_values(&self, values: &[ValueId]) -> Result<Vec<B::TensorHandle>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let mut inner = self.inner.lock().expect("graph arena poisoned");

        let mut has_pending = false;
        for value in values {
            if let Some(node) = inner.nodes.get(value) {
                if matches!(node.state, NodeState::Pending) {
                    has_pending = true;
                }
            } else if !inner.parameters.iter().any(|record| record.value == *value) {
                return Err(anyhow!("value {:?} not registered in graph", value));
            }
        }

        if has_pending {
            // Union of exports and explicit targets, deduplicated.
            let mut requested = Vec::new();
            let mut seen = HashSet::new();
            for value in inner.exports.iter().copied().chain(values.iter().copied()) {
                if seen.insert(value) {
                    requested.push(value);
                }
            }

            let mut pending = HashSet::new();
            let mut inputs = HashSet::new();
            for value in &requested {
                if inner.nodes.contains_key(value) {
                    collect_dependencies(&inner, *value, &mut pending, &mut inputs)?;
                }
            }

            if !pending.is_empty() {
                self.execute_pending(&mut inner, &requested, &pending, inputs)?;
            }
        }

        gather_handles_for_targets(&inner, values)
    }

    /// Lowers the pending subgraph into a program, runs it, and marks the
    /// produced nodes ready.
    fn execute_pending(
        &self,
        inner: &mut GraphInner<B>,
        requested: &[ValueId],
        pending: &HashSet<ValueId>,
        inputs: HashSet<ValueId>,
    ) -> Result<()> {
        let mut bindings: Vec<(ValueId, TensorSpec, B::TensorHandle)> =
            Vec::with_capacity(inputs.len());
        for value in inputs {
            if let Some(param) = inner.parameters.iter().find(|record| record.value == value) {
                bindings.push((value, param.spec.clone(), param.handle.clone()));
                continue;
            }
            let node = inner
                .nodes
                .get(&value)
                .ok_or_else(|| anyhow!("input value {:?} not registered", value))?;
            match &node.state {
                NodeState::Ready(handle) => {
                    bindings.push((value, node.spec.clone(), handle.clone()));
                }
                NodeState::Pending => {
                    return Err(anyhow!("input value {:?} still pending", value));
                }
            }
        }
        bindings.sort_by_key(|(value, _, _)| value.0);

        let mut builder = ProgramBuilder::new();
        let mut mapping: HashMap<ValueId, ValueId> = HashMap::new();
        let mut entry_inputs = Vec::with_capacity(bindings.len());

        for (value, spec, handle) in &bindings {
            let new_id = builder.add_parameter(spec.clone());
            mapping.insert(*value, new_id);
            entry_inputs.push(handle.clone());
        }

        // Insertion order keeps dependencies ahead of their consumers.
        let mut outputs = Vec::new();
        for value in &inner.order {
            if pending.contains(value) {
                let node = inner
                    .nodes
                    .get(value)
                    .ok_or_else(|| anyhow!("missing node for value {:?}", value))?;
                let mapped_operands = node
                    .operands
                    .iter()
                    .map(|operand| match operand {
                        Operand::Value(src) => mapping
                            .get(src)
                            .copied()
                            .map(Operand::Value)
                            .ok_or_else(|| anyhow!("missing operand mapping for {:?}", src)),
                        Operand::Literal(lit) => Ok(Operand::Literal(lit.clone())),
                    })
                    .collect::<Result<Vec<_>>>()?;
                let new_id = builder.emit_single(node.op.clone(), mapped_operands, node.spec.clone());
                mapping.insert(*value, new_id);
            }
            if requested.contains(value) && pending.contains(value) {
                outputs.push(*value);
            }
        }

        let result_ids = outputs
            .iter()
            .map(|original| {
                mapping
                    .get(original)
                    .copied()
                    .ok_or_else(|| anyhow!("missing mapping for output value {:?}", original))
            })
            .collect::<Result<Vec<_>>>()?;

        let function = builder.finish("captured", result_ids);
        let program = Program::new("captured").with_functions(vec![function]);
        debug!(
            "flushing {} pending nodes on backend {}",
            pending.len(),
            self.backend.backend_name()
        );

        let mut produced = self.backend.run_program(&program, &entry_inputs)?;
        if produced.len() != outputs.len() {
            return Err(anyhow!(
                "backend returned {} outputs, expected {}",
                produced.len(),
                outputs.len()
            ));
        }

        for (value_id, handle) in outputs.iter().zip(produced.drain(..)) {
            if let Some(node) = inner.nodes.get_mut(value_id) {
                node.state = NodeState::Ready(handle);
            }
        }
        Ok(())
    }
}

fn gather_handles_for_targets<B: PortableBackend + 'static>(
    inner: &GraphInner<B>,
    targets: &[ValueId],
) -> Result<Vec<B::TensorHandle>> {
    let mut handles = Vec::with_capacity(targets.len());
    for value in targets {
        if let Some(node) = inner.nodes.get(value) {
            match &node.state {
                NodeState::Ready(handle) => handles.push(handle.clone()),
                NodeState::Pending => {
                    return Err(anyhow!("value {:?} pending after program execution", value));
                }
            }
        } else if let Some(param) = inner.parameters.iter().find(|record| record.value == *value) {
            handles.push(param.handle.clone());
        } else {
            return Err(anyhow!("value {:?} not registered", value));
        }
    }
    Ok(handles)
}

/// Recursively collects pending dependencies for `value`, classifying which
/// values can be fed as parameters and which nodes must be executed.
fn collect_dependencies<B: PortableBackend + 'static>(
    inner: &GraphInner<B>,
    value: ValueId,
    pending: &mut HashSet<ValueId>,
    inputs: &mut HashSet<ValueId>,
) -> Result<()> {
    if pending.contains(&value) || inputs.contains(&value) {
        return Ok(());
    }

    let node = inner
        .nodes
        .get(&value)
        .ok_or_else(|| anyhow!("value {:?} not registered", value))?;

    if let NodeState::Ready(_) = node.state {
        inputs.insert(value);
        return Ok(());
    }

    pending.insert(value);

    for operand in &node.operands {
        if let Operand::Value(dep) = operand {
            if inner.nodes.contains_key(dep) {
                collect_dependencies(inner, *dep, pending, inputs)?;
            } else {
                inputs.insert(*dep);
            }
        }
    }

    Ok(())
}
