//! Document assembler: turns a [`Branch`] into JSON documents and records
//! the mapping of every field it touches.

use rand::Rng;
use serde_json::{Map, Value};

use crate::branch::Branch;
use crate::constraint::ConstraintSet;
use crate::document::{deep_merge, emit_field};
use crate::error::Result;
use crate::mapping::MappingTree;
use crate::policy::Policy;
use crate::schema::Schema;

/// Field holding the event time in milliseconds since the epoch.
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// Fields that always carry an array of values, even when only one value
/// was asked for.
pub const ARRAY_FIELDS: &[&str] = &["event.category", "event.type"];

/// Resolve one constraint set into a nested document.
///
/// Fields that must be absent are left out of the document.
pub fn resolve_set<R: Rng + ?Sized>(
    set: &ConstraintSet,
    schema: &Schema,
    policy: Policy,
    rng: &mut R,
) -> Result<Value> {
    let mut doc = Value::Object(Map::new());
    for (field, constraint) in set.iter() {
        let resolved = constraint.resolve(field, schema.domain(field), rng, policy, &|_| true)?;
        let value = match resolved.into_json() {
            Some(value @ Value::Array(_)) => value,
            Some(value) if ARRAY_FIELDS.contains(&field) => Value::Array(vec![value]),
            Some(value) => value,
            None => continue,
        };
        deep_merge(&mut doc, emit_field(field, value));
    }
    Ok(doc)
}

/// Resolve every set of `branch`, in step order.
///
/// With a `base_timestamp`, document `i` gets `@timestamp = base + i`, so
/// sequence steps are strictly ordered in time.
pub fn resolve_branch<R: Rng + ?Sized>(
    branch: &Branch,
    schema: &Schema,
    policy: Policy,
    rng: &mut R,
    base_timestamp: Option<i64>,
) -> Result<Vec<Value>> {
    let mut docs = Vec::with_capacity(branch.len());
    for (i, set) in branch.sets().iter().enumerate() {
        let mut doc = resolve_set(set, schema, policy, rng)?;
        if let Some(base) = base_timestamp
            && let Value::Object(map) = &mut doc
        {
            map.insert(TIMESTAMP_FIELD.to_string(), Value::from(base + i as i64));
        }
        docs.push(doc);
    }
    Ok(docs)
}

/// Record the mapping of every field `branch` constrains, including fields
/// that must be absent.
pub fn record_mappings(branch: &Branch, schema: &Schema, mappings: &mut MappingTree) {
    for set in branch.sets() {
        for field in set.fields() {
            mappings.accumulate(field, schema);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{FieldConstraint, Scalar};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    fn set(fields: &[(&str, FieldConstraint)]) -> ConstraintSet {
        let mut set = ConstraintSet::new();
        for (field, c) in fields {
            set.insert(field, c.clone()).unwrap();
        }
        set
    }

    #[test]
    fn test_resolve_set_nests_and_skips_absent() {
        let s = set(&[
            ("process.name", FieldConstraint::equals(Scalar::String("a.exe".into()))),
            ("process.pid", FieldConstraint::equals(Scalar::Integer(4))),
            ("process.parent.name", FieldConstraint::exists(false)),
        ]);
        let doc = resolve_set(
            &s,
            &Schema::default(),
            Policy::deterministic(),
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();
        assert_eq!(doc, json!({"process": {"name": "a.exe", "pid": 4}}));

        let mut mappings = MappingTree::new();
        record_mappings(&Branch::single(s), &Schema::default(), &mut mappings);
        assert_eq!(mappings.field_type("process.parent.name"), Some("keyword"));
        assert_eq!(mappings.field_type("process.pid"), Some("long"));
    }

    #[test]
    fn test_resolve_set_wraps_array_fields() {
        let s = set(&[
            ("event.category", FieldConstraint::equals(Scalar::String("process".into()))),
            ("event.type", FieldConstraint::equals(Scalar::String("start".into()))),
            ("event.action", FieldConstraint::equals(Scalar::String("exec".into()))),
        ]);
        let doc = resolve_set(
            &s,
            &Schema::default(),
            Policy::deterministic(),
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();
        assert_eq!(
            doc,
            json!({"event": {"category": ["process"], "type": ["start"], "action": "exec"}})
        );
    }

    #[test]
    fn test_resolve_branch_timestamps_in_step_order() {
        let branch = Branch::new(vec![
            set(&[("a", FieldConstraint::equals(Scalar::Integer(1)))]),
            set(&[("a", FieldConstraint::equals(Scalar::Integer(2)))]),
        ]);
        let docs = resolve_branch(
            &branch,
            &Schema::empty(),
            Policy::deterministic(),
            &mut StdRng::seed_from_u64(0),
            Some(1_700_000_000_000),
        )
        .unwrap();
        assert_eq!(
            docs,
            vec![
                json!({"a": 1, "@timestamp": 1_700_000_000_000i64}),
                json!({"a": 2, "@timestamp": 1_700_000_000_001i64}),
            ]
        );
    }

    #[test]
    fn test_resolve_branch_without_timestamp() {
        let branch = Branch::single(set(&[("a", FieldConstraint::equals(Scalar::Boolean(true)))]));
        let docs = resolve_branch(
            &branch,
            &Schema::empty(),
            Policy::deterministic(),
            &mut StdRng::seed_from_u64(0),
            None,
        )
        .unwrap();
        assert_eq!(docs, vec![json!({"a": true})]);
    }
}
