//! The generation session.
//!
//! An [`Emitter`] owns everything that changes while documents are produced:
//! the policy, the random source, the accumulated mappings and the node
//! statistics. One emitter serves one logical caller; it is not shared
//! between threads.

use evtgen_ast::LogicalNode;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;

use crate::assembler;
use crate::branch::{Branch, BranchEngine};
use crate::error::{EmitError, Result};
use crate::mapping::MappingTree;
use crate::policy::{Completeness, Policy, PolicyGuard};
use crate::schema::Schema;
use crate::stats::NodeStats;

/// Construction-time settings of an [`Emitter`].
#[derive(Debug, Clone, Default)]
pub struct EmitterConfig {
    /// Fixed seed for reproducible output; drawn from the OS when `None`.
    pub seed: Option<u64>,
    pub policy: Policy,
    /// Epoch milliseconds of the first document's `@timestamp`; wall clock
    /// time when `None`.
    pub base_timestamp: Option<i64>,
}

/// Generates documents that trigger logical queries.
///
/// # Example
///
/// ```rust
/// use evtgen::{Emitter, EmitterConfig, Policy, Schema};
/// use evtgen_ast::{CompareOp, LogicalNode};
/// use serde_json::json;
///
/// let mut emitter = Emitter::with_config(
///     Schema::default(),
///     EmitterConfig { seed: Some(1), policy: Policy::deterministic(), ..Default::default() },
/// );
/// let query = LogicalNode::event(
///     "process",
///     LogicalNode::and([
///         LogicalNode::equals("process.name", "regsvr32.exe"),
///         LogicalNode::cmp("process.pid", CompareOp::Gt, 4),
///     ]),
/// );
/// let docs = emitter.emit_docs(&query).unwrap();
/// assert_eq!(
///     docs,
///     vec![json!({
///         "event": {"category": ["process"]},
///         "process": {"name": "regsvr32.exe", "pid": 5}
///     })]
/// );
/// ```
#[derive(Debug)]
pub struct Emitter {
    schema: Schema,
    policy: Policy,
    rng: StdRng,
    mappings: MappingTree,
    stats: NodeStats,
    base_timestamp: Option<i64>,
}

impl Emitter {
    /// An emitter with the default policy and an OS-seeded random source.
    pub fn new(schema: Schema) -> Self {
        Self::with_config(schema, EmitterConfig::default())
    }

    pub fn with_config(schema: Schema, config: EmitterConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Emitter {
            schema,
            policy: config.policy,
            rng,
            mappings: MappingTree::new(),
            stats: NodeStats::new(),
            base_timestamp: config.base_timestamp,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub(crate) fn set_policy(&mut self, policy: Policy) {
        self.policy = policy;
    }

    /// Restart the random source from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    // -------------------------------------------------------------------------
    // Scoped policy overrides
    // -------------------------------------------------------------------------

    /// Use `level` fuzziness until the returned guard is dropped.
    pub fn fuzziness(&mut self, level: u32) -> PolicyGuard<'_> {
        let policy = Policy {
            fuzziness: level,
            ..self.policy
        };
        PolicyGuard::new(self, policy)
    }

    /// Use `completeness` until the returned guard is dropped.
    pub fn completeness(&mut self, completeness: Completeness) -> PolicyGuard<'_> {
        let policy = Policy {
            completeness,
            ..self.policy
        };
        PolicyGuard::new(self, policy)
    }

    /// Use `policy` until the returned guard is dropped.
    pub fn with_policy(&mut self, policy: Policy) -> PolicyGuard<'_> {
        PolicyGuard::new(self, policy)
    }

    // -------------------------------------------------------------------------
    // Generation
    // -------------------------------------------------------------------------

    /// Interpret `node` into branches under the current policy.
    pub fn emit(&mut self, node: &LogicalNode) -> Result<Vec<Branch>> {
        let mut engine = BranchEngine {
            schema: &self.schema,
            policy: self.policy,
            rng: &mut self.rng,
            stats: &mut self.stats,
        };
        let branches = engine.emit(node)?;
        log::debug!("{} branch(es) for {node}", branches.len());
        Ok(branches)
    }

    /// Resolve one branch into documents, one per constraint set.
    ///
    /// The branch's fields enter the accumulated mappings only once every
    /// set has resolved.
    pub fn resolve_branch(&mut self, branch: &Branch, emit_timestamp: bool) -> Result<Vec<Value>> {
        let docs = self.resolve_unrecorded(branch, emit_timestamp)?;
        assembler::record_mappings(branch, &self.schema, &mut self.mappings);
        Ok(docs)
    }

    fn resolve_unrecorded(&mut self, branch: &Branch, emit_timestamp: bool) -> Result<Vec<Value>> {
        let base = emit_timestamp.then(|| {
            self.base_timestamp
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis())
        });
        assembler::resolve_branch(branch, &self.schema, self.policy, &mut self.rng, base)
    }

    /// Resolve every branch; fails when there is none to resolve.
    ///
    /// Mappings are recorded only when all branches resolve.
    pub fn docs_from_branches(
        &mut self,
        branches: &[Branch],
        emit_timestamp: bool,
    ) -> Result<Vec<Vec<Value>>> {
        if branches.is_empty() {
            return Err(EmitError::EmptyResult);
        }
        let docs = branches
            .iter()
            .map(|branch| self.resolve_unrecorded(branch, emit_timestamp))
            .collect::<Result<Vec<_>>>()?;
        for branch in branches {
            assembler::record_mappings(branch, &self.schema, &mut self.mappings);
        }
        Ok(docs)
    }

    /// Interpret and resolve `node`, one document list per branch.
    pub fn docs_from_ast(
        &mut self,
        node: &LogicalNode,
        emit_timestamp: bool,
    ) -> Result<Vec<Vec<Value>>> {
        let branches = self.emit(node)?;
        self.docs_from_branches(&branches, emit_timestamp)
    }

    /// All documents for `node`, flattened across branches, without
    /// timestamps.
    pub fn emit_docs(&mut self, node: &LogicalNode) -> Result<Vec<Value>> {
        Ok(self.docs_from_ast(node, false)?.into_iter().flatten().collect())
    }

    // -------------------------------------------------------------------------
    // Mappings and statistics
    // -------------------------------------------------------------------------

    /// Mapping of every field touched since the last reset.
    pub fn emit_mappings(&self) -> Value {
        self.mappings.to_value()
    }

    pub fn mappings(&self) -> &MappingTree {
        &self.mappings
    }

    pub fn reset_mappings(&mut self) {
        self.mappings.clear();
    }

    pub fn ast_stats(&self) -> &NodeStats {
        &self.stats
    }
}
