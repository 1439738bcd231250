//! ASCII tree rendering of a value's producer subgraph.
//!
//! The graph is a DAG, so a node may be reached more than once. The compact
//! renderer prints such repeats as `[%id] → (see above)`.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashSet;
use std::io;
use std::rc::Rc;

use ptree::{Style, TreeItem};

use super::{Graph, NodeId, Value};

#[derive(Clone)]
pub struct GraphTree<'g> {
    graph: &'g Graph,
    value: Value,
    visited: Rc<RefCell<HashSet<NodeId>>>,
    is_backref: RefCell<bool>,
}

impl<'g> GraphTree<'g> {
    pub fn new(graph: &'g Graph, value: Value) -> Self {
        Self { graph, value, visited: Rc::default(), is_backref: RefCell::new(false) }
    }
}

impl TreeItem for GraphTree<'_> {
    type Child = Self;

    fn write_self<W: io::Write>(&self, f: &mut W, _style: &Style) -> io::Result<()> {
        let id = self.value.node;
        let mut visited = self.visited.borrow_mut();
        if !visited.insert(id) {
            *self.is_backref.borrow_mut() = true;
            return write!(f, "[{id}] → (see above)");
        }
        write!(f, "{}", format_value(self.graph, self.value))
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        if *self.is_backref.borrow() {
            return Cow::Borrowed(&[]);
        }
        let inputs = self.graph.get(self.value.node).map(|node| node.inputs()).unwrap_or_default();
        let children = inputs
            .iter()
            .map(|&value| GraphTree {
                graph: self.graph,
                value,
                visited: self.visited.clone(),
                is_backref: RefCell::new(false),
            })
            .collect();
        Cow::Owned(children)
    }
}

/// `[%id] Op : type`, with the output index when the producer has several.
fn format_value(graph: &Graph, value: Value) -> String {
    let Some(node) = graph.get(value.node) else {
        return format!("[{}] <freed>", value.node);
    };
    let output = match node.outputs().len() {
        1 => String::new(),
        _ => format!(".{}", value.index),
    };
    let ty = node.outputs().get(value.index).map(|output| output.ty().to_string()).unwrap_or_default();
    format!("[{}{}] {} : {}", value.node, output, node.op(), ty)
}

impl Graph {
    /// Render the subgraph producing `value` as an ASCII tree.
    pub fn tree(&self, value: impl Into<Value>) -> String {
        let tree = GraphTree::new(self, value.into());
        let mut buf = Vec::new();
        match ptree::write_tree(&tree, &mut buf) {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(err) => format!("<tree rendering failed: {err}>"),
        }
    }
}
