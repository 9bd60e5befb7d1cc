//! Logical form of a detection query: comparisons combined by boolean
//! connectives, scoped to event categories and arranged into sequences.
//!
//! The tree is produced by an external query parser and serialized with
//! serde (externally tagged, snake_case), e.g.
//!
//! ```yaml
//! event_typed:
//!   category: process
//!   query:
//!     conjunction:
//!       - comparison: { field: process.name, op: "==", value: regsvr32.exe }
//!       - comparison: { field: process.args, op: ":", value: "*scrobj*" }
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::value::Literal;

// =============================================================================
// Comparison operators
// =============================================================================

/// Operator of a field comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    /// Case-insensitive wildcard match (`:`).
    #[serde(rename = ":")]
    Wildcard,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
}

impl CompareOp {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::NotEq),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Lte),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Gte),
            ":" => Some(CompareOp::Wildcard),
            "in" => Some(CompareOp::In),
            "not in" => Some(CompareOp::NotIn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Wildcard => ":",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
        }
    }

    /// `<`, `<=`, `>` and `>=`.
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte
        )
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// A single `field <op> value` test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub field: String,
    pub op: CompareOp,
    pub value: Literal,
}

impl Comparison {
    pub fn new(field: impl Into<String>, op: CompareOp, value: impl Into<Literal>) -> Self {
        Comparison {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op, self.value)
    }
}

/// One bracketed step of a sequence, with its own join fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceStep {
    pub query: LogicalNode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by: Vec<String>,
}

/// An ordered list of steps, each matching one event, correlated by join fields.
///
/// The join keys of a step are the sequence-wide `by` fields followed by the
/// step's own `by` fields. Keys correlate positionally: the k-th key of every
/// step must carry the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by: Vec<String>,
    pub steps: Vec<SequenceStep>,
}

impl Sequence {
    /// Join keys of step `index`, sequence-wide fields first.
    pub fn join_keys(&self, index: usize) -> Vec<&str> {
        let mut keys: Vec<&str> = self.by.iter().map(String::as_str).collect();
        if let Some(step) = self.steps.get(index) {
            keys.extend(step.by.iter().map(String::as_str));
        }
        keys
    }
}

/// A node of the logical query tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalNode {
    Comparison(Comparison),
    Conjunction(Vec<LogicalNode>),
    Disjunction(Vec<LogicalNode>),
    EventTyped {
        category: String,
        query: Box<LogicalNode>,
    },
    Sequence(Sequence),
    /// `true` / `false` literal condition.
    Constant(bool),
    /// A construct the query parser recognized but this model does not carry.
    Unsupported(String),
}

impl LogicalNode {
    /// Name of the node kind, used in diagnostics and statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            LogicalNode::Comparison(_) => "Comparison",
            LogicalNode::Conjunction(_) => "Conjunction",
            LogicalNode::Disjunction(_) => "Disjunction",
            LogicalNode::EventTyped { .. } => "EventTyped",
            LogicalNode::Sequence(_) => "Sequence",
            LogicalNode::Constant(_) => "Constant",
            LogicalNode::Unsupported(_) => "Unsupported",
        }
    }

    pub fn cmp(field: impl Into<String>, op: CompareOp, value: impl Into<Literal>) -> Self {
        LogicalNode::Comparison(Comparison::new(field, op, value))
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::cmp(field, CompareOp::Eq, value)
    }

    pub fn and(terms: impl IntoIterator<Item = LogicalNode>) -> Self {
        LogicalNode::Conjunction(terms.into_iter().collect())
    }

    pub fn or(terms: impl IntoIterator<Item = LogicalNode>) -> Self {
        LogicalNode::Disjunction(terms.into_iter().collect())
    }

    pub fn event(category: impl Into<String>, query: LogicalNode) -> Self {
        LogicalNode::EventTyped {
            category: category.into(),
            query: Box::new(query),
        }
    }

    /// Parse a node from its YAML (or JSON, which is valid YAML) serialization.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        from_yaml_str(yaml)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Deserialize `T` from YAML (or JSON) text.
///
/// serde_yaml reads externally tagged enums only from YAML tags
/// (`!comparison {...}`), while query files use the `comparison: {...}` map
/// form. The text is therefore loaded as an untyped value first and then
/// deserialized through `serde_json`, which accepts the map form.
pub fn from_yaml_str<T: DeserializeOwned>(yaml: &str) -> Result<T> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    let json = serde_json::to_value(value)?;
    Ok(serde_json::from_value(json)?)
}

impl fmt::Display for LogicalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalNode::Comparison(c) => write!(f, "{c}"),
            LogicalNode::Conjunction(terms) => write_joined(f, terms, "and", "true"),
            LogicalNode::Disjunction(terms) => write_joined(f, terms, "or", "false"),
            LogicalNode::EventTyped { category, query } => {
                write!(f, "{category} where {query}")
            }
            LogicalNode::Sequence(seq) => {
                write!(f, "sequence")?;
                if !seq.by.is_empty() {
                    write!(f, " by {}", seq.by.join(", "))?;
                }
                for step in &seq.steps {
                    write!(f, " [{}]", step.query)?;
                    if !step.by.is_empty() {
                        write!(f, " by {}", step.by.join(", "))?;
                    }
                }
                Ok(())
            }
            LogicalNode::Constant(b) => write!(f, "{b}"),
            LogicalNode::Unsupported(kind) => write!(f, "<unsupported {kind}>"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    terms: &[LogicalNode],
    op: &str,
    empty: &str,
) -> fmt::Result {
    match terms {
        [] => f.write_str(empty),
        [single] => write!(f, "{single}"),
        _ => {
            write!(f, "(")?;
            for (i, term) in terms.iter().enumerate() {
                if i > 0 {
                    write!(f, " {op} ")?;
                }
                write!(f, "{term}")?;
            }
            write!(f, ")")
        }
    }
}
