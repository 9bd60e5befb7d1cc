//! # evtgen
//!
//! Synthesizes event documents that trigger detection queries, together
//! with the index mappings those documents need.
//!
//! This crate consumes the logical query tree from [`evtgen_ast`] and works
//! in two phases:
//!
//! - **Branch generation**: the tree is interpreted into [`Branch`]es, the
//!   alternative ways of satisfying it. Each branch holds one
//!   [`ConstraintSet`] per event; constraints on the same field are merged
//!   and conflicts are reported as errors.
//! - **Resolution**: every constraint is turned into a concrete value,
//!   respecting the field's schema type, and the values are assembled into
//!   nested JSON documents. The mapping of every touched field is recorded.
//!
//! Randomness is controlled by a [`Policy`]: fuzziness 0 is deterministic,
//! higher levels draw values and alternatives at random from a seedable
//! source. Completeness selects one alternative per disjunction or all of
//! them.
//!
//! ## Quick Start
//!
//! ```rust
//! use evtgen::{Emitter, EmitterConfig, Policy, Schema, matches_sequence};
//! use evtgen_ast::{CompareOp, LogicalNode};
//!
//! let query = LogicalNode::event(
//!     "network",
//!     LogicalNode::or([
//!         LogicalNode::equals("destination.port", 22),
//!         LogicalNode::cmp("destination.port", CompareOp::In, vec![80, 443]),
//!     ]),
//! );
//!
//! let mut emitter = Emitter::with_config(
//!     Schema::default(),
//!     EmitterConfig { seed: Some(7), policy: Policy::deterministic(), ..Default::default() },
//! );
//! let docs = emitter.docs_from_ast(&query, true).unwrap();
//! assert_eq!(docs.len(), 2);
//! for branch_docs in &docs {
//!     assert!(matches_sequence(&query, branch_docs));
//! }
//!
//! let mappings = emitter.emit_mappings();
//! assert_eq!(mappings["properties"]["destination"]["properties"]["port"]["type"], "long");
//! ```

pub mod assembler;
pub mod branch;
pub mod constraint;
pub mod document;
pub mod emitter;
pub mod error;
pub mod eval;
pub mod mapping;
pub mod policy;
pub mod schema;
pub mod stats;
pub mod synth;

// Re-export the most commonly used types and functions at crate root
pub use branch::Branch;
pub use constraint::{Bounds, ConstraintKind, ConstraintSet, FieldConstraint, Resolved, Scalar};
pub use emitter::{Emitter, EmitterConfig};
pub use error::{EmitError, Result, SynthError};
pub use eval::{matches, matches_sequence};
pub use mapping::MappingTree;
pub use policy::{Completeness, Policy, PolicyGuard};
pub use schema::{Domain, Schema};
pub use stats::{NodeCounter, NodeStats};
