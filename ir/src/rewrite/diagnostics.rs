//! Reporting channel for rewrite events.
//!
//! Sinks observe; they never influence what a pass does.

use derive_more::Display;

use crate::graph::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Diagnostic {
    #[display("{pass}/{rule}: matched at {root}")]
    Matched { pass: String, rule: &'static str, root: NodeId },

    #[display("{pass}/{rule}: declined at {root}")]
    Declined { pass: String, rule: &'static str, root: NodeId },

    #[display("{pass}/{rule}: replaced at {root}")]
    Replaced { pass: String, rule: &'static str, root: NodeId },

    #[display("{pass}: finished with {replacements} replacements after {iterations} iterations")]
    PassFinished { pass: String, replacements: usize, iterations: usize },
}

impl Diagnostic {
    pub fn pass(&self) -> &str {
        match self {
            Self::Matched { pass, .. }
            | Self::Declined { pass, .. }
            | Self::Replaced { pass, .. }
            | Self::PassFinished { pass, .. } => pass,
        }
    }
}

pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Forwards every diagnostic to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::Matched { .. } => tracing::trace!(%diagnostic),
            _ => tracing::debug!(%diagnostic),
        }
    }
}

/// Keeps every diagnostic in arrival order.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replaced(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| matches!(d, Diagnostic::Replaced { .. }))
    }

    pub fn declined(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| matches!(d, Diagnostic::Declined { .. }))
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn report(&mut self, diagnostic: Diagnostic) {
        (**self).report(diagnostic);
    }
}
