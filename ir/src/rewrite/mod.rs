//! Graph rewrite passes.
//!
//! Rules pair a pattern with a callback; [`GraphRewrite`] runs them to a fixed
//! point and [`PassManager`] sequences passes, reporting to a
//! [`DiagnosticSink`].

pub mod config;
pub mod diagnostics;
pub mod engine;

pub use config::RewriteConfig;
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, TracingSink};
pub use engine::{GraphRewrite, PassManager, PassStats, RecurrentRewriteFn, RewriteFn, RewriteOutcome, RewriteStats};
