#![allow(dead_code)]

use evtgen::{Emitter, EmitterConfig, Policy, Schema};
use evtgen_ast::LogicalNode;
use serde_json::Value;

pub fn node(yaml: &str) -> LogicalNode {
    LogicalNode::from_yaml(yaml).unwrap()
}

/// Seeded emitter with fuzziness 0 and every alternative kept.
pub fn emitter(seed: u64) -> Emitter {
    emitter_with_policy(seed, Policy::deterministic())
}

pub fn emitter_with_policy(seed: u64, policy: Policy) -> Emitter {
    Emitter::with_config(
        Schema::default(),
        EmitterConfig {
            seed: Some(seed),
            policy,
            base_timestamp: Some(0),
        },
    )
}

/// Documents for a YAML-serialized query, flattened, without timestamps.
pub fn docs(yaml: &str) -> Vec<Value> {
    emitter(0).emit_docs(&node(yaml)).unwrap()
}

/// Documents grouped per branch.
pub fn branch_docs(emitter: &mut Emitter, yaml: &str) -> Vec<Vec<Value>> {
    emitter.docs_from_ast(&node(yaml), false).unwrap()
}
