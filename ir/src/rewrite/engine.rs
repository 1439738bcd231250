//! Pattern-driven graph rewriting to a fixed point.
//!
//! # Algorithm
//!
//! A pass runs in rounds. Each round walks the nodes reachable from the
//! declared results, consumers before producers, and offers every node to the
//! pass's rules in registration order. The first rule whose pattern matches
//! structurally gets its callback, which either declines (the graph is left
//! as it was and the next rule is tried) or replaces the matched root.
//!
//! After a replacement the graph is swept and the round carries on over the
//! nodes that are still alive. Nodes created by the replacement are visited
//! in the next round. A round without replacements is the fixed point; a pass
//! that still replaces after `max_iterations` rounds fails with
//! [`Error::RewriteLimitExceeded`].
//!
//! ## Example
//!
//! ```ignore
//! fn fold_double_negation(graph: &mut Graph, m: &Match) -> Result<RewriteOutcome> {
//!     let x = m.node("x")?;
//!     graph.replace_node(m.root(), x)?;
//!     Ok(RewriteOutcome::Replaced)
//! }
//!
//! let pass = GraphRewrite::new("algebraic")
//!     .rule("double_negation", Matcher::new(Pat::negative(Pat::negative(Pat::label("x")))), fold_double_negation);
//! let stats = PassManager::new(RewriteConfig::default()).with_pass(pass).run(&mut graph, &mut TracingSink)?;
//! ```

use snafu::ensure;

use super::config::RewriteConfig;
use super::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::*;
use crate::graph::{Graph, NodeId};
use crate::pattern::{Match, Matcher, RecurrentMatch, RecurrentMatcher};

/// What a callback did with a structural match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// A precondition beyond structure does not hold; the graph is untouched.
    Declined,
    /// The matched root has been replaced.
    Replaced,
}

pub type RewriteFn = Box<dyn Fn(&mut Graph, &Match) -> Result<RewriteOutcome> + Send + Sync>;
pub type RecurrentRewriteFn = Box<dyn Fn(&mut Graph, &RecurrentMatch) -> Result<RewriteOutcome> + Send + Sync>;

enum RuleKind {
    Single { matcher: Matcher, callback: RewriteFn },
    Recurrent { matcher: RecurrentMatcher, callback: RecurrentRewriteFn },
}

struct Rule {
    name: &'static str,
    kind: RuleKind,
}

impl Rule {
    /// `None` when the pattern does not match at `root`.
    fn apply(&self, graph: &mut Graph, root: NodeId, config: &RewriteConfig) -> Option<Result<RewriteOutcome>> {
        match &self.kind {
            RuleKind::Single { matcher, callback } => {
                let found = matcher.match_root(graph, root)?;
                Some(callback(graph, &found))
            }
            RuleKind::Recurrent { matcher, callback } => {
                let limit = matcher.max_iterations().min(config.max_recurrent_iterations);
                let found = matcher.match_root_within(graph, root, limit)?;
                Some(callback(graph, &found))
            }
        }
    }
}

/// A named, ordered set of rewrite rules run to a fixed point.
pub struct GraphRewrite {
    name: String,
    rules: Vec<Rule>,
}

/// Counters of one pass run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassStats {
    pub pass: String,
    pub replacements: usize,
    /// Rounds, the final one without replacements included.
    pub iterations: usize,
    pub declined: usize,
}

impl GraphRewrite {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), rules: Vec::new() }
    }

    pub fn rule(
        mut self,
        name: &'static str,
        matcher: Matcher,
        callback: impl Fn(&mut Graph, &Match) -> Result<RewriteOutcome> + Send + Sync + 'static,
    ) -> Self {
        self.rules.push(Rule { name, kind: RuleKind::Single { matcher, callback: Box::new(callback) } });
        self
    }

    pub fn recurrent_rule(
        mut self,
        name: &'static str,
        matcher: RecurrentMatcher,
        callback: impl Fn(&mut Graph, &RecurrentMatch) -> Result<RewriteOutcome> + Send + Sync + 'static,
    ) -> Self {
        self.rules.push(Rule { name, kind: RuleKind::Recurrent { matcher, callback: Box::new(callback) } });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|rule| rule.name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run this pass alone until no rule replaces anything.
    #[tracing::instrument(skip_all, fields(pass = %self.name))]
    pub fn run(&self, graph: &mut Graph, config: &RewriteConfig, sink: &mut dyn DiagnosticSink) -> Result<PassStats> {
        let mut stats = PassStats { pass: self.name.clone(), replacements: 0, iterations: 0, declined: 0 };

        loop {
            ensure!(
                stats.iterations < config.max_iterations.max(1),
                RewriteLimitExceededSnafu { pass: self.name.clone(), iterations: stats.iterations }
            );
            stats.iterations += 1;

            let replaced = self.round(graph, config, sink, &mut stats)?;
            if replaced == 0 {
                break;
            }
            stats.replacements += replaced;
        }

        if config.sweep_dead_nodes {
            graph.sweep();
        }
        sink.report(Diagnostic::PassFinished {
            pass: self.name.clone(),
            replacements: stats.replacements,
            iterations: stats.iterations,
        });
        Ok(stats)
    }

    /// One consumers-first walk; returns the number of replacements.
    fn round(
        &self,
        graph: &mut Graph,
        config: &RewriteConfig,
        sink: &mut dyn DiagnosticSink,
        stats: &mut PassStats,
    ) -> Result<usize> {
        let mut replaced = 0;
        let order = graph.ordered_nodes();

        for &id in order.iter().rev() {
            for rule in &self.rules {
                // An earlier replacement in this round may have freed the node.
                if !graph.contains(id) {
                    break;
                }
                tracing::trace!(rule = rule.name, node = %id, "trying rule");
                let Some(outcome) = rule.apply(graph, id, config) else { continue };
                sink.report(Diagnostic::Matched { pass: self.name.clone(), rule: rule.name, root: id });

                match outcome? {
                    RewriteOutcome::Declined => {
                        stats.declined += 1;
                        sink.report(Diagnostic::Declined { pass: self.name.clone(), rule: rule.name, root: id });
                    }
                    RewriteOutcome::Replaced => {
                        replaced += 1;
                        sink.report(Diagnostic::Replaced { pass: self.name.clone(), rule: rule.name, root: id });
                        if config.sweep_dead_nodes {
                            graph.sweep();
                        }
                        break;
                    }
                }
            }
        }
        Ok(replaced)
    }
}

impl std::fmt::Debug for GraphRewrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphRewrite").field("name", &self.name).field("rules", &self.rule_names().collect::<Vec<_>>()).finish()
    }
}

/// Per-pass counters of a [`PassManager`] run, in pass order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub passes: Vec<PassStats>,
}

impl RewriteStats {
    pub fn total_replacements(&self) -> usize {
        self.passes.iter().map(|pass| pass.replacements).sum()
    }

    /// Replacements made by the pass called `name` (0 if it never ran).
    pub fn replacements(&self, name: &str) -> usize {
        self.passes.iter().filter(|pass| pass.pass == name).map(|pass| pass.replacements).sum()
    }

    pub fn is_unchanged(&self) -> bool {
        self.total_replacements() == 0
    }
}

/// Ordered passes, each run to its own fixed point.
#[derive(Debug, Default)]
pub struct PassManager {
    passes: Vec<GraphRewrite>,
    config: RewriteConfig,
}

impl PassManager {
    pub fn new(config: RewriteConfig) -> Self {
        Self { passes: Vec::new(), config }
    }

    pub fn with_pass(mut self, pass: GraphRewrite) -> Self {
        self.push(pass);
        self
    }

    pub fn push(&mut self, pass: GraphRewrite) {
        self.passes.push(pass);
    }

    pub fn passes(&self) -> &[GraphRewrite] {
        &self.passes
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    #[tracing::instrument(skip_all, fields(passes = self.passes.len()))]
    pub fn run(&self, graph: &mut Graph, sink: &mut dyn DiagnosticSink) -> Result<RewriteStats> {
        let mut stats = RewriteStats::default();
        for pass in &self.passes {
            stats.passes.push(pass.run(graph, &self.config, sink)?);
        }
        tracing::debug!(replacements = stats.total_replacements(), live = graph.len(), "rewrite finished");
        Ok(stats)
    }
}
