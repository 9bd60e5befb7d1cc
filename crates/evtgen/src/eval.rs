//! Offline evaluation of a [`LogicalNode`] against documents.
//!
//! Used to check that generated documents really trigger their query
//! without a search backend. Semantics follow the query language: `==` is
//! case-sensitive, `:` is a case-insensitive wildcard match, and a field
//! holding an array matches when any element does (all elements for `!=`
//! and `not in`).

use evtgen_ast::{CompareOp, Comparison, Literal, LogicalNode, Sequence, WildcardString};
use serde_json::Value;

use crate::branch::{ANY_CATEGORY, CATEGORY_FIELD};
use crate::constraint::compile_wildcard;
use crate::document::Document;

/// Does a single document satisfy `node`? Sequences never match one document.
pub fn matches(node: &LogicalNode, doc: &Value) -> bool {
    match node {
        LogicalNode::Comparison(cmp) => eval_comparison(cmp, doc),
        LogicalNode::Conjunction(terms) => terms.iter().all(|t| matches(t, doc)),
        LogicalNode::Disjunction(terms) => terms.iter().any(|t| matches(t, doc)),
        LogicalNode::EventTyped { category, query } => {
            (category == ANY_CATEGORY || has_category(doc, category)) && matches(query, doc)
        }
        LogicalNode::Constant(b) => *b,
        LogicalNode::Sequence(_) | LogicalNode::Unsupported(_) => false,
    }
}

/// Does the ordered list of documents satisfy `node`?
///
/// A non-sequence node needs exactly one document.
pub fn matches_sequence(node: &LogicalNode, docs: &[Value]) -> bool {
    match node {
        LogicalNode::Sequence(seq) => eval_sequence(seq, docs),
        _ => docs.len() == 1 && matches(node, &docs[0]),
    }
}

fn eval_sequence(seq: &Sequence, docs: &[Value]) -> bool {
    if seq.steps.len() != docs.len() {
        return false;
    }
    if !seq.steps.iter().zip(docs).all(|(step, doc)| matches(&step.query, doc)) {
        return false;
    }
    let arity = seq.join_keys(0).len();
    (0..arity).all(|k| {
        let values: Vec<Option<&Value>> = docs
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                seq.join_keys(i)
                    .get(k)
                    .and_then(|field| Document::from_value(doc).get_field(field))
            })
            .collect();
        values.iter().all(Option::is_some) && values.windows(2).all(|w| w[0] == w[1])
    })
}

fn has_category(doc: &Value, category: &str) -> bool {
    match Document::from_value(doc).get_field(CATEGORY_FIELD) {
        Some(Value::String(s)) => s == category,
        Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(category)),
        _ => false,
    }
}

fn eval_comparison(cmp: &Comparison, doc: &Value) -> bool {
    let value = Document::from_value(doc).get_field(&cmp.field);

    if cmp.value == Literal::Null {
        return match cmp.op {
            CompareOp::Eq => value.is_none_or(Value::is_null),
            CompareOp::NotEq => value.is_some_and(|v| !v.is_null()),
            _ => false,
        };
    }

    let Some(value) = value else {
        return false;
    };
    let candidates: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };

    match cmp.op {
        CompareOp::NotEq => candidates.iter().all(|v| !literal_eq(&cmp.value, v)),
        CompareOp::NotIn => candidates.iter().all(|v| !in_list(&cmp.value, v)),
        CompareOp::Eq => candidates.iter().any(|v| literal_eq(&cmp.value, v)),
        CompareOp::In => candidates.iter().any(|v| in_list(&cmp.value, v)),
        CompareOp::Wildcard => candidates.iter().any(|v| wildcard_match(&cmp.value, v)),
        CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => {
            let Some(bound) = cmp.value.as_i64() else {
                return false;
            };
            candidates.iter().filter_map(|v| v.as_i64()).any(|n| match cmp.op {
                CompareOp::Lt => n < bound,
                CompareOp::Lte => n <= bound,
                CompareOp::Gt => n > bound,
                _ => n >= bound,
            })
        }
    }
}

fn literal_eq(lit: &Literal, v: &Value) -> bool {
    match (lit, v) {
        (Literal::String(s), Value::String(t)) => s == t,
        (Literal::Integer(n), Value::Number(m)) => m.as_i64() == Some(*n),
        (Literal::Boolean(b), Value::Bool(c)) => b == c,
        _ => false,
    }
}

fn in_list(lit: &Literal, v: &Value) -> bool {
    match lit {
        Literal::List(items) => items.iter().any(|item| literal_eq(item, v)),
        single => literal_eq(single, v),
    }
}

fn wildcard_match(lit: &Literal, v: &Value) -> bool {
    let Some(s) = v.as_str() else {
        return false;
    };
    match lit {
        Literal::String(pattern) => compile_wildcard(&WildcardString::new(pattern))
            .is_ok_and(|re| re.is_match(s)),
        Literal::List(items) => items.iter().any(|item| wildcard_match(item, v)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evtgen_ast::SequenceStep;
    use serde_json::json;

    #[test]
    fn test_comparisons() {
        let doc = json!({"process": {"name": "CMD.EXE", "pid": 4, "args": ["a", "-d"]}});
        assert!(matches(&LogicalNode::equals("process.name", "CMD.EXE"), &doc));
        assert!(!matches(&LogicalNode::equals("process.name", "cmd.exe"), &doc));
        assert!(matches(&LogicalNode::cmp("process.name", CompareOp::Wildcard, "cmd*"), &doc));
        assert!(matches(&LogicalNode::cmp("process.pid", CompareOp::Gte, 4), &doc));
        assert!(!matches(&LogicalNode::cmp("process.pid", CompareOp::Lt, 4), &doc));
        assert!(matches(&LogicalNode::cmp("process.pid", CompareOp::In, vec![1, 4]), &doc));
        assert!(matches(&LogicalNode::cmp("process.pid", CompareOp::NotIn, vec![1, 2]), &doc));
        assert!(matches(&LogicalNode::equals("process.args", "-d"), &doc));
        assert!(!matches(&LogicalNode::cmp("process.args", CompareOp::NotEq, "-d"), &doc));
    }

    #[test]
    fn test_null_and_missing() {
        let doc = json!({"a": 1});
        assert!(matches(&LogicalNode::equals("b", Literal::Null), &doc));
        assert!(matches(&LogicalNode::cmp("a", CompareOp::NotEq, Literal::Null), &doc));
        assert!(!matches(&LogicalNode::cmp("b", CompareOp::NotEq, 1), &doc));
    }

    #[test]
    fn test_event_typed() {
        let doc = json!({"event": {"category": "process"}});
        assert!(matches(&LogicalNode::event("process", LogicalNode::Constant(true)), &doc));
        assert!(!matches(&LogicalNode::event("file", LogicalNode::Constant(true)), &doc));
        assert!(matches(&LogicalNode::event("any", LogicalNode::Constant(true)), &json!({})));
    }

    #[test]
    fn test_sequence_join() {
        let node = LogicalNode::Sequence(Sequence {
            by: vec!["user.id".into()],
            steps: vec![
                SequenceStep {
                    query: LogicalNode::Constant(true),
                    by: vec![],
                },
                SequenceStep {
                    query: LogicalNode::Constant(true),
                    by: vec![],
                },
            ],
        });
        let same = [json!({"user": {"id": "x"}}), json!({"user": {"id": "x"}})];
        let differ = [json!({"user": {"id": "x"}}), json!({"user": {"id": "y"}})];
        assert!(matches_sequence(&node, &same));
        assert!(!matches_sequence(&node, &differ));
        assert!(!matches_sequence(&node, &same[..1]));
        assert!(!matches(&node, &same[0]));
    }
}
