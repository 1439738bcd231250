//! Declarative subgraph patterns.
//!
//! A [`Pat`] is a tree that never lives in the graph. It mirrors the shape of
//! the subgraph it should find:
//!
//! - [`Pat::Op`] matches a node by operation (kind, or exact parameters) and
//!   matches its arguments against the producers of the node's inputs.
//! - [`Pat::Label`] is a named wildcard. The first occurrence binds a node if
//!   the label's [`Predicate`] holds (and, for a label built around a
//!   template, if the node also matches the template). Every later occurrence
//!   of the same name must see the very same node.
//! - [`Pat::Skip`] matches its target directly, or looks through any number of
//!   single-input nodes that satisfy its transparency predicate.
//!
//! ```rust,ignore
//! // sigmoid(x) spelled out: 1 / (1 + exp(-x)) with broadcast constants
//! let one = Pat::label_if("one", Predicate::Class(OpClass::Constant));
//! let x = Pat::label("x");
//! let pat = Pat::divide(Pat::broadcast(one.clone()), Pat::add(Pat::exp(Pat::negative(x)), Pat::broadcast(one)));
//! let matcher = Matcher::new(pat);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use kiln_dtype::DType;

use crate::graph::{Graph, NodeId};
use crate::op::{Op, OpKey};
use crate::shape::Shape;
use crate::types::{BinaryOp, OpClass, UnaryOp};

pub mod matcher;
pub mod recurrent;

pub use matcher::{Match, Matcher};
pub use recurrent::{RecurrentMatch, RecurrentMatcher};

/// A pattern tree node.
#[derive(Debug, Clone)]
pub enum Pat {
    Op { filter: OpFilter, args: Vec<Pat> },
    Label { name: String, predicate: Predicate, template: Option<Box<Pat>> },
    Skip { target: Box<Pat>, transparent: Predicate },
}

/// Which operations a [`Pat::Op`] accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum OpFilter {
    /// Any parameters.
    Key(OpKey),
    /// Equal parameters.
    Exact(Op),
}

impl OpFilter {
    pub fn matches(&self, op: &Op) -> bool {
        match self {
            Self::Key(key) => op.key() == *key,
            Self::Exact(expected) => op == expected,
        }
    }
}

/// Admissibility test on a candidate node.
#[derive(Clone, derive_more::Debug)]
pub enum Predicate {
    Any,
    Class(OpClass),
    Key(OpKey),
    /// First output has this element type.
    DType(DType),
    /// First output has this rank.
    Rank(usize),
    /// First output has exactly this shape.
    Shape(Shape),
    All(Vec<Predicate>),
    AnyOf(Vec<Predicate>),
    Custom(#[debug(skip)] Arc<dyn Fn(&Graph, NodeId) -> bool + Send + Sync>),
}

impl Predicate {
    /// Broadcast or Reshape.
    pub fn layout_only() -> Self {
        Self::Class(OpClass::LayoutOnly)
    }

    pub fn custom(test: impl Fn(&Graph, NodeId) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(test))
    }

    pub fn test(&self, graph: &Graph, id: NodeId) -> bool {
        let Some(node) = graph.get(id) else { return false };
        match self {
            Self::Any => true,
            Self::Class(class) => node.op().class() == *class,
            Self::Key(key) => node.op().key() == *key,
            Self::DType(dtype) => node.dtype() == *dtype,
            Self::Rank(rank) => node.shape().len() == *rank,
            Self::Shape(shape) => node.shape() == shape,
            Self::All(predicates) => predicates.iter().all(|p| p.test(graph, id)),
            Self::AnyOf(predicates) => predicates.iter().any(|p| p.test(graph, id)),
            Self::Custom(test) => test(graph, id),
        }
    }
}

impl Pat {
    // =========================================================================
    // Wildcards
    // =========================================================================

    /// Label admitting any node.
    pub fn label(name: impl Into<String>) -> Self {
        Self::label_if(name, Predicate::Any)
    }

    pub fn label_if(name: impl Into<String>, predicate: Predicate) -> Self {
        Self::Label { name: name.into(), predicate, template: None }
    }

    /// Label that binds whatever matches `template`.
    ///
    /// Labels inside the template bind as well, so a callback can reach both
    /// the captured root and its parts.
    pub fn capture(name: impl Into<String>, template: Pat) -> Self {
        Self::Label { name: name.into(), predicate: Predicate::Any, template: Some(Box::new(template)) }
    }

    pub fn skip(target: Pat, transparent: Predicate) -> Self {
        Self::Skip { target: Box::new(target), transparent }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    pub fn op(key: OpKey, args: impl IntoIterator<Item = Pat>) -> Self {
        Self::Op { filter: OpFilter::Key(key), args: args.into_iter().collect() }
    }

    pub fn exact(op: Op, args: impl IntoIterator<Item = Pat>) -> Self {
        Self::Op { filter: OpFilter::Exact(op), args: args.into_iter().collect() }
    }

    pub fn unary(op: UnaryOp, arg: Pat) -> Self {
        Self::op(OpKey::Unary(op), [arg])
    }

    pub fn binary(op: BinaryOp, lhs: Pat, rhs: Pat) -> Self {
        Self::op(OpKey::Binary(op), [lhs, rhs])
    }

    pub fn negative(arg: Pat) -> Self {
        Self::unary(UnaryOp::Negative, arg)
    }

    pub fn exp(arg: Pat) -> Self {
        Self::unary(UnaryOp::Exp, arg)
    }

    pub fn tanh(arg: Pat) -> Self {
        Self::unary(UnaryOp::Tanh, arg)
    }

    pub fn sigmoid(arg: Pat) -> Self {
        Self::unary(UnaryOp::Sigmoid, arg)
    }

    pub fn add(lhs: Pat, rhs: Pat) -> Self {
        Self::binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn multiply(lhs: Pat, rhs: Pat) -> Self {
        Self::binary(BinaryOp::Multiply, lhs, rhs)
    }

    pub fn divide(lhs: Pat, rhs: Pat) -> Self {
        Self::binary(BinaryOp::Divide, lhs, rhs)
    }

    pub fn broadcast(arg: Pat) -> Self {
        Self::op(OpKey::Broadcast, [arg])
    }

    pub fn reshape(arg: Pat) -> Self {
        Self::op(OpKey::Reshape, [arg])
    }

    pub fn slice(arg: Pat) -> Self {
        Self::op(OpKey::Slice, [arg])
    }

    pub fn dot(lhs: Pat, rhs: Pat) -> Self {
        Self::op(OpKey::Dot, [lhs, rhs])
    }

    pub fn concat(args: impl IntoIterator<Item = Pat>) -> Self {
        Self::op(OpKey::Concat, args)
    }

    /// Any output of a multi-output producer.
    pub fn get_output_element(arg: Pat) -> Self {
        Self::op(OpKey::GetOutputElement, [arg])
    }

    /// Output `index` of a multi-output producer.
    pub fn output_element(arg: Pat, index: usize) -> Self {
        Self::exact(Op::GetOutputElement { index }, [arg])
    }

    pub fn lstm(args: [Pat; 5]) -> Self {
        Self::op(OpKey::Lstm, args)
    }

    pub fn rnn(args: [Pat; 5]) -> Self {
        Self::op(OpKey::Rnn, args)
    }

    /// Label names in first-occurrence order (templates included).
    pub fn label_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_labels(&mut names);
        names
    }

    fn collect_labels<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Self::Op { args, .. } => args.iter().for_each(|arg| arg.collect_labels(names)),
            Self::Label { name, template, .. } => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
                if let Some(template) = template {
                    template.collect_labels(names);
                }
            }
            Self::Skip { target, .. } => target.collect_labels(names),
        }
    }
}

// =========================================================================
// Bindings
// =========================================================================

/// Bound node per interned label index.
pub type BindingStore = SmallVec<[(u8, NodeId); 8]>;

pub trait BindingStoreExt {
    fn get_by_index(&self, idx: u8) -> Option<NodeId>;

    /// Named `set_binding` to avoid conflict with `SmallVec::insert`.
    fn set_binding(&mut self, idx: u8, node: NodeId);
}

impl BindingStoreExt for BindingStore {
    fn get_by_index(&self, idx: u8) -> Option<NodeId> {
        self.iter().find(|(i, _)| *i == idx).map(|(_, node)| *node)
    }

    fn set_binding(&mut self, idx: u8, node: NodeId) {
        match self.iter_mut().find(|(i, _)| *i == idx) {
            Some(entry) => entry.1 = node,
            None => self.push((idx, node)),
        }
    }
}

/// Label name interning: maps names to compact indices for binding storage.
#[derive(Debug, Clone, Default)]
pub struct LabelIntern {
    names: Vec<String>,
    indices: HashMap<String, u8>,
}

impl LabelIntern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert(&mut self, name: &str) -> u8 {
        if let Some(&idx) = self.indices.get(name) {
            return idx;
        }
        let idx = self.names.len() as u8;
        self.names.push(name.to_string());
        self.indices.insert(name.to_string(), idx);
        idx
    }

    pub fn get_index(&self, name: &str) -> Option<u8> {
        self.indices.get(name).copied()
    }

    pub fn get_name(&self, idx: u8) -> Option<&str> {
        self.names.get(idx as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
