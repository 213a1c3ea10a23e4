//! Interior state shared by the graph arena and its builder.

use std::collections::{HashMap, HashSet};

use crate::backend::spec::{Operand, Operation, PortableBackend, TensorSpec, ValueId};

/// Execution state of a graph node.
pub(super) enum NodeState<B: PortableBackend + 'static> {
    /// Not yet executed; will be lowered into the next program.
    Pending,
    /// Executed; the handle can be surfaced or fed as a program parameter.
    Ready(B::TensorHandle),
}

/// Recorded operation node awaiting execution.
pub(super) struct NodeRecord<B: PortableBackend + 'static> {
    pub op: Operation,
    pub operands: Vec<Operand>,
    pub spec: TensorSpec,
    pub state: NodeState<B>,
}

/// Materialised input imported into the graph.
pub(super) struct ParameterRecord<B: PortableBackend + 'static> {
    pub value: ValueId,
    pub spec: TensorSpec,
    pub handle: B::TensorHandle,
}

pub(super) struct GraphInner<B: PortableBackend + 'static> {
    pub next_value: u32,
    pub nodes: HashMap<ValueId, NodeRecord<B>>,
    /// Insertion order; lowering walks this so dependencies precede consumers.
    pub order: Vec<ValueId>,
    pub parameters: Vec<ParameterRecord<B>>,
    /// Deduplicates imports keyed by input handle identity.
    pub parameter_lookup: HashMap<u64, ValueId>,
    /// Values that outlive captures and must survive every flush.
    pub exports: HashSet<ValueId>,
}

impl<B: PortableBackend + 'static> GraphInner<B> {
    pub fn new() -> Self {
        GraphInner {
            next_value: 0,
            nodes: HashMap::new(),
            order: Vec::new(),
            parameters: Vec::new(),
            parameter_lookup: HashMap::new(),
            exports: HashSet::new(),
        }
    }
}
