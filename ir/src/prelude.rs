//! Common imports for building and rewriting graphs.
//!
//! ```rust,ignore
//! use kiln_ir::prelude::*;
//! ```

// Graph
pub use crate::graph::{Graph, NodeId, Value};
pub use crate::op::{Op, OpKey};
pub use crate::shape::{Shape, TensorType};

// Operation types
pub use crate::ops::convolution::ConvolutionParams;
pub use crate::ops::recurrent::RnnAttrs;
pub use crate::types::{BinaryOp, ConstValue, OpClass, UnaryOp};

// Matching and rewriting
pub use crate::pattern::{Match, Matcher, Pat, Predicate, RecurrentMatch, RecurrentMatcher};
pub use crate::rewrite::{
    CollectingSink, DiagnosticSink, GraphRewrite, PassManager, RewriteConfig, RewriteOutcome, TracingSink,
};

pub use crate::error::{Error, Result};

pub use kiln_dtype::DType;
