//! # evtgen-ast
//!
//! The logical form of detection queries consumed by the `evtgen` document
//! synthesizer.
//!
//! Query text is parsed elsewhere; this crate only carries the resulting
//! tree:
//!
//! - **Comparisons**: `field <op> value` with `==`, `!=`, `<`, `<=`, `>`,
//!   `>=`, `:` (wildcard), `in`, `not in`
//! - **Connectives**: conjunction and disjunction of child nodes
//! - **Event scoping**: `<category> where <query>`
//! - **Sequences**: ordered steps correlated by join fields
//! - **Wildcard patterns**: `*`/`?` with backslash escapes
//!
//! Trees deserialize from YAML or JSON with serde.
//!
//! ## Quick Start
//!
//! ```rust
//! use evtgen_ast::{CompareOp, LogicalNode};
//!
//! let node = LogicalNode::from_yaml(r#"
//! event_typed:
//!   category: process
//!   query:
//!     comparison: { field: process.name, op: ":", value: "*.exe" }
//! "#).unwrap();
//!
//! assert_eq!(
//!     node,
//!     LogicalNode::event("process", LogicalNode::cmp("process.name", CompareOp::Wildcard, "*.exe"))
//! );
//! assert_eq!(node.to_string(), r#"process where process.name : "*.exe""#);
//! ```

pub mod ast;
pub mod error;
pub mod value;

pub use ast::{CompareOp, Comparison, LogicalNode, Sequence, SequenceStep, from_yaml_str};
pub use error::{AstError, Result};
pub use value::{Literal, SpecialChar, StringPart, WildcardString};
