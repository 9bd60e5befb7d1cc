//! Branch engine: interprets a [`LogicalNode`] tree into the alternative
//! ways of satisfying it.
//!
//! Each alternative is a [`Branch`], one [`ConstraintSet`] per event the
//! alternative needs. Plain queries produce single-event branches; a sequence
//! produces branches with one set per step.

use std::collections::HashSet;

use evtgen_ast::{CompareOp, Comparison, Literal, LogicalNode, Sequence};
use rand::Rng;

use crate::constraint::{ConstraintKind, ConstraintSet, FieldConstraint, Resolved, Scalar};
use crate::error::{EmitError, Result};
use crate::policy::{Completeness, Policy, fuzzy_choice, fuzzy_shuffle};
use crate::schema::Schema;
use crate::stats::NodeStats;

/// Category that matches any event and is therefore not stamped.
pub const ANY_CATEGORY: &str = "any";

/// Field that carries an event's category.
pub const CATEGORY_FIELD: &str = "event.category";

/// One way of satisfying a query: an ordered list of per-event constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Branch {
    sets: Vec<ConstraintSet>,
}

impl Branch {
    pub fn new(sets: Vec<ConstraintSet>) -> Self {
        Branch { sets }
    }

    pub fn single(set: ConstraintSet) -> Self {
        Branch { sets: vec![set] }
    }

    pub fn sets(&self) -> &[ConstraintSet] {
        &self.sets
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn is_single_event(&self) -> bool {
        self.sets.len() == 1
    }

    fn into_single(self, context: &str) -> Result<ConstraintSet> {
        if !self.is_single_event() {
            return Err(EmitError::UnsupportedNode(format!(
                "{}-event branch inside {context}",
                self.sets.len()
            )));
        }
        Ok(self.sets.into_iter().next().unwrap_or_default())
    }
}

/// Borrowed view of the session state the engine needs.
pub(crate) struct BranchEngine<'a, R: Rng + ?Sized> {
    pub schema: &'a Schema,
    pub policy: Policy,
    pub rng: &'a mut R,
    pub stats: &'a mut NodeStats,
}

impl<R: Rng + ?Sized> BranchEngine<'_, R> {
    /// Interpret `node`, counting the attempt in the node statistics.
    pub fn emit(&mut self, node: &LogicalNode) -> Result<Vec<Branch>> {
        let result = self.emit_node(node);
        self.stats.record(node.kind(), result.is_ok());
        match &result {
            Ok(branches) => log::trace!("{} -> {} branch(es)", node.kind(), branches.len()),
            Err(e) => log::trace!("{} failed: {e}", node.kind()),
        }
        result
    }

    fn emit_node(&mut self, node: &LogicalNode) -> Result<Vec<Branch>> {
        match node {
            LogicalNode::Comparison(cmp) => self.emit_comparison(cmp),
            LogicalNode::Conjunction(terms) => self.emit_conjunction(terms),
            LogicalNode::Disjunction(terms) => self.emit_disjunction(terms),
            LogicalNode::EventTyped { category, query } => self.emit_event_typed(category, query),
            LogicalNode::Sequence(seq) => self.emit_sequence(seq),
            LogicalNode::Constant(true) => Ok(vec![Branch::single(ConstraintSet::new())]),
            LogicalNode::Constant(false) => Ok(Vec::new()),
            LogicalNode::Unsupported(kind) => Err(EmitError::UnsupportedNode(kind.clone())),
        }
    }

    fn emit_comparison(&mut self, cmp: &Comparison) -> Result<Vec<Branch>> {
        // `field : ("a*", "b*")` matches any of the patterns
        if cmp.op == CompareOp::Wildcard
            && let Literal::List(items) = &cmp.value
        {
            let alternatives: Vec<LogicalNode> = items
                .iter()
                .map(|item| LogicalNode::cmp(cmp.field.clone(), CompareOp::Wildcard, item.clone()))
                .collect();
            return self.emit_disjunction(&alternatives);
        }

        let constraint = FieldConstraint::from_comparison(cmp)?;
        if self.policy.is_exhaustive()
            && let ConstraintKind::SetMembership {
                values,
                negate: false,
            } = &constraint.kind
        {
            return self.emit_members(&cmp.field, values, constraint.clone());
        }

        let mut set = ConstraintSet::new();
        set.insert(&cmp.field, constraint)?;
        Ok(vec![Branch::single(set)])
    }

    /// One equality branch per member of a positive `in` list.
    ///
    /// Integer members outside the field's domain are skipped; when none is
    /// left the membership constraint is kept as is, so that resolution
    /// reports the boundary.
    fn emit_members(
        &mut self,
        field: &str,
        values: &[Scalar],
        membership: FieldConstraint,
    ) -> Result<Vec<Branch>> {
        let (lo, hi) = self.schema.domain(field).integer_bounds();
        let mut branches = Vec::with_capacity(values.len());
        for value in values {
            if let Scalar::Integer(n) = value
                && !(lo..=hi).contains(n)
            {
                continue;
            }
            let mut set = ConstraintSet::new();
            set.insert(field, FieldConstraint::equals(value.clone()))?;
            branches.push(Branch::single(set));
        }
        if branches.is_empty() {
            let mut set = ConstraintSet::new();
            set.insert(field, membership)?;
            return Ok(vec![Branch::single(set)]);
        }
        fuzzy_shuffle(&mut branches, self.policy, &mut *self.rng);
        Ok(branches)
    }

    /// Cartesian product of the terms' branches, merged field by field.
    ///
    /// Terms are interpreted with every alternative kept, so that
    /// combinations whose constraints conflict can be dropped before the
    /// policy samples the survivors. A conflict is an error only when it hit
    /// the one combination there was; when every one of several
    /// combinations conflicts the conjunction has no branch.
    fn emit_conjunction(&mut self, terms: &[LogicalNode]) -> Result<Vec<Branch>> {
        let policy = self.policy;
        self.policy = Policy {
            completeness: Completeness::Exhaustive,
            ..policy
        };
        let product = self.conjunction_product(terms);
        self.policy = policy;

        let sets = product?;
        let sets = if policy.is_exhaustive() {
            sets
        } else {
            fuzzy_choice(&sets, policy, &mut *self.rng)
                .cloned()
                .into_iter()
                .collect()
        };
        Ok(sets.into_iter().map(Branch::single).collect())
    }

    fn conjunction_product(&mut self, terms: &[LogicalNode]) -> Result<Vec<ConstraintSet>> {
        let mut acc = vec![ConstraintSet::new()];
        let mut dropped = 0usize;
        let mut conflict = None;
        for term in terms {
            let branches = self.emit(term)?;
            let mut next = Vec::with_capacity(acc.len() * branches.len());
            for branch in branches {
                let set = branch.into_single("Conjunction")?;
                for left in &acc {
                    let mut merged = left.clone();
                    match merged.merge(&set) {
                        Ok(()) => next.push(merged),
                        Err(e) => {
                            log::trace!("dropping combination: {e}");
                            dropped += 1;
                            conflict = Some(e);
                        }
                    }
                }
            }
            acc = next;
            if acc.is_empty() {
                break;
            }
        }
        match conflict {
            Some(e) if acc.is_empty() && dropped == 1 => Err(e),
            _ => Ok(acc),
        }
    }

    /// Branches of every alternative that can be satisfied.
    ///
    /// An alternative that fails with a conflict is left out; the failure is
    /// reported only when no alternative yields a branch. Unsupported
    /// constructs fail the whole disjunction.
    fn emit_disjunction(&mut self, terms: &[LogicalNode]) -> Result<Vec<Branch>> {
        let mut all = Vec::new();
        let mut failure = None;
        for term in terms {
            match self.emit(term) {
                Ok(branches) => all.extend(branches),
                Err(e) if e.is_unsupported() => return Err(e),
                Err(e) => {
                    log::trace!("dropping alternative {term}: {e}");
                    failure = Some(e);
                }
            }
        }
        if all.is_empty()
            && let Some(e) = failure
        {
            return Err(e);
        }
        if self.policy.is_exhaustive() {
            fuzzy_shuffle(&mut all, self.policy, &mut *self.rng);
            return Ok(all);
        }
        Ok(fuzzy_choice(&all, self.policy, &mut *self.rng)
            .cloned()
            .into_iter()
            .collect())
    }

    fn emit_event_typed(&mut self, category: &str, query: &LogicalNode) -> Result<Vec<Branch>> {
        let mut branches = self.emit(query)?;
        if category == ANY_CATEGORY {
            return Ok(branches);
        }
        let stamp = FieldConstraint::equals(Scalar::String(category.to_string()));
        for branch in &mut branches {
            for set in &mut branch.sets {
                set.insert(CATEGORY_FIELD, stamp.clone())?;
            }
        }
        Ok(branches)
    }

    fn emit_sequence(&mut self, seq: &Sequence) -> Result<Vec<Branch>> {
        if seq.steps.is_empty() {
            return Err(EmitError::UnsupportedNode("Sequence without steps".into()));
        }
        let arity = seq.join_keys(0).len();
        if (1..seq.steps.len()).any(|i| seq.join_keys(i).len() != arity) {
            return Err(EmitError::UnsupportedNode(
                "Sequence with differing join key counts".into(),
            ));
        }

        let mut combos: Vec<Vec<ConstraintSet>> = vec![Vec::new()];
        for step in &seq.steps {
            let mut options = Vec::new();
            for branch in self.emit(&step.query)? {
                options.push(branch.into_single("Sequence step")?);
            }
            let mut next = Vec::with_capacity(combos.len() * options.len());
            for prefix in &combos {
                for option in &options {
                    let mut combo = prefix.clone();
                    combo.push(option.clone());
                    next.push(combo);
                }
            }
            combos = next;
        }

        if !self.policy.is_exhaustive() {
            combos = fuzzy_choice(&combos, self.policy, &mut *self.rng)
                .cloned()
                .into_iter()
                .collect();
        }

        let mut used: Vec<HashSet<Scalar>> = vec![HashSet::new(); arity];
        combos
            .into_iter()
            .map(|sets| self.correlate(seq, sets, &mut used))
            .collect()
    }

    /// Force the k-th join key of every step to one shared value.
    ///
    /// Constraints already placed on a join key by any step are merged into
    /// a single constraint for the group, resolved once, and written back as
    /// equality into each step. Values used by earlier combinations of the
    /// same sequence are avoided where the constraint leaves a choice.
    fn correlate(
        &mut self,
        seq: &Sequence,
        mut sets: Vec<ConstraintSet>,
        used: &mut [HashSet<Scalar>],
    ) -> Result<Branch> {
        for (k, taken) in used.iter_mut().enumerate() {
            let fields: Vec<&str> = (0..sets.len()).map(|i| seq.join_keys(i)[k]).collect();

            let mut group = FieldConstraint::exists(true);
            for (set, field) in sets.iter().zip(&fields) {
                if let Some(constraint) = set.get(field) {
                    group = group.merge(constraint, field)?;
                }
            }

            let key = fields[0];
            let domain = self.schema.domain(key);
            let resolved =
                group.resolve_joined(key, domain, &mut *self.rng, self.policy, &|v| !taken.contains(v))?;
            let value = match resolved {
                Resolved::Value(v) => v,
                Resolved::Absent => {
                    return Err(EmitError::UnsupportedNode(format!(
                        "Sequence joined on absent field {key}"
                    )));
                }
                Resolved::Multi(_) => {
                    return Err(EmitError::UnsupportedNode(format!(
                        "Sequence joined on multi-valued field {key}"
                    )));
                }
            };
            log::debug!("join key {k} ({}) = {value}", fields.join(", "));
            taken.insert(value.clone());

            for (set, field) in sets.iter_mut().zip(&fields) {
                set.insert(field, FieldConstraint::equals(value.clone()))?;
            }
        }
        Ok(Branch::new(sets))
    }
}
