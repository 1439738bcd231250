//! Matching a motif repeated along a loop-carried dependency.
//!
//! An unrolled recurrence is a chain of identical subgraphs where step `t`
//! consumes a value produced by step `t - 1`. The recurrent label marks that
//! value inside the motif: whatever it binds in one iteration is the root of
//! the next. Correlated labels mark values every step shares (weights,
//! biases); they are pre-bound from the first iteration, so a step that uses
//! different weights simply fails to match and the chain ends before it.

use std::sync::Arc;

use snafu::{OptionExt, ensure};

use super::{BindingStore, BindingStoreExt, LabelIntern, Match, Matcher, Pat};
use crate::error::*;
use crate::graph::{Graph, NodeId};

#[derive(Debug, Clone)]
pub struct RecurrentMatcher {
    matcher: Matcher,
    recurrent: u8,
    correlated: Vec<u8>,
    max_iterations: usize,
}

/// Per-iteration bindings of a recurrent match.
///
/// Iteration 0 is the one rooted at the original root, i.e. the latest step
/// of the recurrence; later iterations walk back in time.
#[derive(Debug, Clone)]
pub struct RecurrentMatch {
    root: NodeId,
    recurrent: u8,
    iterations: Vec<BindingStore>,
    intern: Arc<LabelIntern>,
}

impl RecurrentMatcher {
    pub const DEFAULT_MAX_ITERATIONS: usize = 1024;

    /// Fails if `recurrent` or any correlated label does not occur in `pattern`.
    pub fn new<'a>(pattern: Pat, recurrent: &str, correlated: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let matcher = Matcher::new(pattern);
        let index = |label: &str| matcher.intern().get_index(label).context(UnboundLabelSnafu { label });
        let recurrent = index(recurrent)?;
        let correlated = correlated.into_iter().map(index).collect::<Result<Vec<_>>>()?;
        Ok(Self { matcher, recurrent, correlated, max_iterations: Self::DEFAULT_MAX_ITERATIONS })
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Follow the recurrence backwards from `root` for as long as the motif
    /// keeps matching. `None` unless at least one iteration matched.
    pub fn match_root(&self, graph: &Graph, root: NodeId) -> Option<RecurrentMatch> {
        self.match_root_within(graph, root, self.max_iterations)
    }

    /// [`match_root`](Self::match_root) with an explicit iteration bound.
    pub fn match_root_within(&self, graph: &Graph, root: NodeId, max_iterations: usize) -> Option<RecurrentMatch> {
        let mut iterations: Vec<BindingStore> = Vec::new();
        let mut seed = BindingStore::new();
        let mut current = root;

        while iterations.len() < max_iterations.max(1) {
            let Some(found) = self.matcher.match_seeded(graph, current, &seed) else { break };
            let bindings = found.into_bindings();

            if let Some(first) = iterations.first()
                && self.correlated.iter().any(|&idx| first.get_by_index(idx) != bindings.get_by_index(idx))
            {
                break;
            }
            if iterations.is_empty() {
                for &idx in &self.correlated {
                    if let Some(node) = bindings.get_by_index(idx) {
                        seed.set_binding(idx, node);
                    }
                }
            }

            let next = bindings.get_by_index(self.recurrent);
            iterations.push(bindings);
            match next {
                Some(next) if next != current => current = next,
                _ => break,
            }
        }

        if iterations.is_empty() {
            return None;
        }
        tracing::debug!(%root, iterations = iterations.len(), "recurrent pattern matched");
        Some(RecurrentMatch { root, recurrent: self.recurrent, iterations, intern: self.matcher.intern().clone() })
    }
}

impl RecurrentMatch {
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of matched iterations (at least 1).
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    /// Bindings of `label` in every iteration where it was bound, newest
    /// (root-side) first. Reverse for temporal order.
    pub fn bound_nodes(&self, label: &str) -> Vec<NodeId> {
        let Some(idx) = self.intern.get_index(label) else { return Vec::new() };
        self.iterations.iter().filter_map(|bindings| bindings.get_by_index(idx)).collect()
    }

    /// Like [`bound_nodes`](Self::bound_nodes), but a label that never bound
    /// is a malformed rule.
    pub fn require(&self, label: &str) -> Result<Vec<NodeId>> {
        let nodes = self.bound_nodes(label);
        ensure!(!nodes.is_empty(), UnboundLabelSnafu { label });
        Ok(nodes)
    }

    /// The single-match view of iteration `index`.
    pub fn iteration(&self, index: usize) -> Option<Match> {
        let bindings = self.iterations.get(index)?.clone();
        let root = match index {
            0 => self.root,
            _ => self.iterations[index - 1].get_by_index(self.recurrent)?,
        };
        Some(Match::new(root, bindings, self.intern.clone()))
    }
}
