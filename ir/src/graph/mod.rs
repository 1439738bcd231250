//! Arena-backed dataflow graph.
//!
//! Nodes live in slots of a single arena and refer to each other through
//! [`NodeId`] handles. Edges are owned by the consumer (its ordered list of
//! input [`Value`]s); every output keeps a non-owning back-reference list of
//! its [`Use`]s so replacements can find all consumers without scanning.
//!
//! Output types are computed by [`Op::infer`] when a node is added and never
//! change afterwards. The only edge mutations are the replacement operations
//! in [`mutate`](self::mutate), each validated in full before it touches the
//! graph.

use smallvec::SmallVec;
use snafu::{OptionExt, ensure};

use kiln_dtype::DType;

use crate::error::*;
use crate::op::Op;
use crate::shape::{Shape, TensorType};
use crate::types::ConstValue;

pub mod constructors;
pub mod mutate;
pub mod traverse;
pub mod tree;

/// Handle of a node slot in a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("%{_0}")]
pub struct NodeId(u32);

impl NodeId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// One output of one node: what an input edge points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("{node}.{index}")]
pub struct Value {
    pub node: NodeId,
    pub index: usize,
}

impl Value {
    pub const fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

impl From<NodeId> for Value {
    fn from(node: NodeId) -> Self {
        Self { node, index: 0 }
    }
}

/// A consumer's input slot reading some output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Use {
    pub consumer: NodeId,
    pub input: usize,
}

#[derive(Debug, Clone)]
pub struct Output {
    ty: TensorType,
    users: SmallVec<[Use; 2]>,
}

impl Output {
    pub fn ty(&self) -> &TensorType {
        &self.ty
    }

    pub fn users(&self) -> &[Use] {
        &self.users
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    op: Op,
    inputs: SmallVec<[Value; 4]>,
    outputs: SmallVec<[Output; 2]>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn inputs(&self) -> &[Value] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Type of the first output.
    pub fn ty(&self) -> &TensorType {
        &self.outputs[0].ty
    }

    pub fn shape(&self) -> &Shape {
        &self.outputs[0].ty.shape
    }

    pub fn dtype(&self) -> DType {
        self.outputs[0].ty.dtype
    }

    /// Whether any output has a consumer.
    pub fn is_used(&self) -> bool {
        self.outputs.iter().any(|output| !output.users.is_empty())
    }
}

/// A tensor dataflow graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    parameters: Vec<NodeId>,
    results: Vec<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node computing `op` over `inputs`, inferring its output types.
    ///
    /// Fails without modifying the graph if an input does not exist or the
    /// operation rejects the input types.
    pub fn add_node(&mut self, op: Op, inputs: impl IntoIterator<Item = Value>) -> Result<NodeId> {
        let inputs: SmallVec<[Value; 4]> = inputs.into_iter().collect();
        let input_types = inputs.iter().map(|&value| self.ty(value).cloned()).collect::<Result<SmallVec<[_; 4]>>>()?;

        if let Op::GetOutputElement { index } = op {
            let referenced = inputs.first().map_or(index, |value| value.index);
            ensure!(referenced == index, OutputIndexMismatchSnafu { index, referenced });
        }

        let output_types = op.infer(&input_types)?;
        let id = NodeId(self.nodes.len() as u32);
        for (input, value) in inputs.iter().enumerate() {
            self.output_mut(*value).users.push(Use { consumer: id, input });
        }

        tracing::trace!(%id, op = %op, "node added");
        let outputs = output_types.into_iter().map(|ty| Output { ty, users: SmallVec::new() }).collect();
        self.nodes.push(Some(Node { id, op, inputs, outputs }));
        Ok(id)
    }

    pub fn add_parameter(&mut self, dtype: DType, shape: impl Into<Shape>) -> Result<NodeId> {
        let id = self.add_node(Op::Parameter { dtype, shape: shape.into() }, [])?;
        self.parameters.push(id);
        Ok(id)
    }

    pub fn add_constant(&mut self, value: ConstValue, dtype: DType, shape: impl Into<Shape>) -> Result<NodeId> {
        self.add_node(Op::Constant { value, dtype, shape: shape.into() }, [])
    }

    /// Declare `value` a graph output.
    pub fn add_result(&mut self, value: impl Into<Value>) -> Result<NodeId> {
        let id = self.add_node(Op::Result, [value.into()])?;
        self.results.push(id);
        Ok(id)
    }

    /// A node with the same operation and parameters as `id` over `new_inputs`.
    ///
    /// Output types are re-inferred, so the copy may differ in shape when the
    /// new inputs do.
    pub fn rebuild(&mut self, id: NodeId, new_inputs: impl IntoIterator<Item = Value>) -> Result<NodeId> {
        let op = self.node(id)?.op.clone();
        self.add_node(op, new_inputs)
    }

    // =========================================================================
    // Access
    // =========================================================================

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id).context(NodeNotFoundSnafu { id })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn op(&self, id: NodeId) -> Result<&Op> {
        Ok(&self.node(id)?.op)
    }

    pub fn output(&self, value: Value) -> Result<&Output> {
        let node = self.node(value.node)?;
        node.outputs.get(value.index).context(OutputOutOfRangeSnafu {
            id: value.node,
            index: value.index,
            outputs: node.outputs.len(),
        })
    }

    pub fn ty(&self, value: Value) -> Result<&TensorType> {
        Ok(&self.output(value)?.ty)
    }

    pub fn shape(&self, value: impl Into<Value>) -> Result<&Shape> {
        Ok(&self.output(value.into())?.ty.shape)
    }

    pub fn dtype(&self, value: impl Into<Value>) -> Result<DType> {
        Ok(self.output(value.into())?.ty.dtype)
    }

    pub fn users(&self, value: impl Into<Value>) -> Result<&[Use]> {
        Ok(&self.output(value.into())?.users)
    }

    /// Consumers of any output of `id`, in first-use order, without duplicates.
    pub fn consumers(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut consumers = Vec::new();
        for output in &self.node(id)?.outputs {
            for usage in &output.users {
                if !consumers.contains(&usage.consumer) {
                    consumers.push(usage.consumer);
                }
            }
        }
        Ok(consumers)
    }

    pub fn input(&self, id: NodeId, input: usize) -> Result<Value> {
        let node = self.node(id)?;
        node.inputs.get(input).copied().context(InputOutOfRangeSnafu { id, index: input, inputs: node.inputs.len() })
    }

    /// Node producing input `input` of `id`.
    pub fn producer(&self, id: NodeId, input: usize) -> Result<NodeId> {
        Ok(self.input(id, input)?.node)
    }

    pub fn parameters(&self) -> &[NodeId] {
        &self.parameters
    }

    pub fn results(&self) -> &[NodeId] {
        &self.results
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    // Callers validate `value` first; a dangling value here is a bug in this module.
    fn output_mut(&mut self, value: Value) -> &mut Output {
        match self.nodes[value.node.index()].as_mut() {
            Some(node) => &mut node.outputs[value.index],
            None => unreachable!("dangling value {value}"),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut).context(NodeNotFoundSnafu { id })
    }
}
