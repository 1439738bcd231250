//! Tensor dataflow graph IR for the Kiln compiler.
//!
//! This crate defines the graph, its operations and the machinery that
//! rewrites it.
//!
//! # Module Organization
//!
//! - [`types`] - Constants and operation sub-kinds (unary, binary)
//! - [`op`] - Closed operation enum and its identity key
//! - [`ops`] - Shape inference per operation family
//! - [`shape`] - Tensor types and shape utilities
//! - [`graph`] - Arena graph, construction, replacement, traversal
//! - [`autodiff`] - Adjoint rules and reverse-mode accumulation
//! - [`pattern`] - Subgraph patterns, the matcher and the recurrent matcher
//! - [`rewrite`] - Rule passes, pass manager and diagnostics
//! - [`error`] - Error types and result handling

pub mod autodiff;
pub mod error;
pub mod graph;
pub mod op;
pub mod ops;
pub mod pattern;
pub mod prelude;
pub mod rewrite;
pub mod shape;
pub mod types;


pub use error::{Error, Result};
pub use graph::{Graph, Node, NodeId, Output, Use, Value};
pub use op::{Arity, Op, OpKey};
pub use ops::convolution::ConvolutionParams;
pub use ops::recurrent::RnnAttrs;
pub use shape::{Shape, TensorType};
pub use types::{BinaryOp, ConstValue, OpClass, UnaryOp};

pub use pattern::{BindingStore, BindingStoreExt, Match, Matcher, Pat, Predicate, RecurrentMatch, RecurrentMatcher};
pub use rewrite::{GraphRewrite, PassManager, RewriteConfig, RewriteOutcome, RewriteStats};

pub use kiln_dtype::DType;
