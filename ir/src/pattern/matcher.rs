//! Structural matching of a [`Pat`] against a rooted subgraph.

use std::sync::Arc;

use smallvec::{SmallVec, smallvec};
use snafu::OptionExt;

use super::{BindingStore, BindingStoreExt, LabelIntern, Pat};
use crate::error::*;
use crate::graph::{Graph, NodeId};

/// A compiled pattern: the tree plus its interned label table.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: Pat,
    intern: Arc<LabelIntern>,
}

/// Successful match: the root and every label's binding.
#[derive(Debug, Clone)]
pub struct Match {
    root: NodeId,
    bindings: BindingStore,
    intern: Arc<LabelIntern>,
}

impl Match {
    pub(crate) fn new(root: NodeId, bindings: BindingStore, intern: Arc<LabelIntern>) -> Self {
        Self { root, bindings, intern }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn into_bindings(self) -> BindingStore {
        self.bindings
    }

    pub fn get(&self, label: &str) -> Option<NodeId> {
        self.intern.get_index(label).and_then(|idx| self.bindings.get_by_index(idx))
    }

    /// Binding of `label`; an unbound label is a malformed rule.
    pub fn node(&self, label: &str) -> Result<NodeId> {
        self.get(label).context(UnboundLabelSnafu { label })
    }

    /// `(label, node)` pairs in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.bindings.iter().filter_map(|&(idx, node)| Some((self.intern.get_name(idx)?, node)))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Matcher {
    pub fn new(pattern: Pat) -> Self {
        let mut intern = LabelIntern::new();
        for name in pattern.label_names() {
            intern.get_or_insert(name);
        }
        Self { pattern, intern: Arc::new(intern) }
    }

    pub fn pattern(&self) -> &Pat {
        &self.pattern
    }

    pub fn intern(&self) -> &Arc<LabelIntern> {
        &self.intern
    }

    /// Match the pattern rooted at `root`.
    ///
    /// Bindings from a failed attempt are discarded; nothing leaks into the
    /// next attempt.
    pub fn match_root(&self, graph: &Graph, root: NodeId) -> Option<Match> {
        self.match_seeded(graph, root, &BindingStore::new())
    }

    /// Match with some labels already bound, as if by earlier occurrences.
    pub fn match_seeded(&self, graph: &Graph, root: NodeId, seed: &BindingStore) -> Option<Match> {
        let mut store = seed.clone();
        if !self.match_node(graph, &self.pattern, root, &mut store) {
            return None;
        }
        tracing::trace!(%root, bindings = store.len(), "pattern matched");
        Some(Match::new(root, store, self.intern.clone()))
    }

    fn match_node(&self, graph: &Graph, pat: &Pat, id: NodeId, store: &mut BindingStore) -> bool {
        match pat {
            Pat::Label { name, predicate, template } => {
                let Some(idx) = self.intern.get_index(name) else { return false };
                if let Some(bound) = store.get_by_index(idx) {
                    return bound == id;
                }
                if !predicate.test(graph, id) {
                    return false;
                }
                if let Some(template) = template {
                    let mut scratch = store.clone();
                    if !self.match_node(graph, template, id, &mut scratch) {
                        return false;
                    }
                    *store = scratch;
                }
                store.set_binding(idx, id);
                true
            }

            Pat::Skip { target, transparent } => {
                let mut scratch = store.clone();
                if self.match_node(graph, target, id, &mut scratch) {
                    *store = scratch;
                    return true;
                }
                match graph.get(id).map(|node| node.inputs()) {
                    Some([only]) if transparent.test(graph, id) => self.match_node(graph, pat, only.node, store),
                    _ => false,
                }
            }

            Pat::Op { filter, args } => {
                let Some(node) = graph.get(id) else { return false };
                if !filter.matches(node.op()) || node.inputs().len() != args.len() {
                    return false;
                }
                let children: SmallVec<[NodeId; 4]> = node.inputs().iter().map(|value| value.node).collect();
                if node.op().is_commutative() {
                    self.match_permutations(graph, args, &children, store)
                } else {
                    let order: SmallVec<[usize; 4]> = (0..children.len()).collect();
                    self.try_order(graph, args, &children, &order, store)
                }
            }
        }
    }

    /// Try every assignment of `children` to `args` (Heap's algorithm); the
    /// identity order first, then the swapped one for binary operations.
    fn match_permutations(&self, graph: &Graph, args: &[Pat], children: &[NodeId], store: &mut BindingStore) -> bool {
        let n = children.len();
        let mut order: SmallVec<[usize; 4]> = (0..n).collect();
        if self.try_order(graph, args, children, &order, store) {
            return true;
        }

        let mut c: SmallVec<[usize; 4]> = smallvec![0; n];
        let mut i = 0;
        while i < n {
            if c[i] < i {
                if i % 2 == 0 {
                    order.swap(0, i);
                } else {
                    order.swap(c[i], i);
                }
                if self.try_order(graph, args, children, &order, store) {
                    return true;
                }
                c[i] += 1;
                i = 0;
            } else {
                c[i] = 0;
                i += 1;
            }
        }
        false
    }

    fn try_order(
        &self,
        graph: &Graph,
        args: &[Pat],
        children: &[NodeId],
        order: &[usize],
        store: &mut BindingStore,
    ) -> bool {
        let mut scratch = store.clone();
        let matched = args.iter().zip(order).all(|(arg, &k)| self.match_node(graph, arg, children[k], &mut scratch));
        if matched {
            *store = scratch;
        }
        matched
    }
}
