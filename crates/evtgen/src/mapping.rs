//! Index mapping tree accumulated from the fields of generated documents.
//!
//! Rendered in the usual mapping shape:
//!
//! ```json
//! {"properties": {"process": {"properties": {"pid": {"type": "long"}}}}}
//! ```

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::schema::Schema;

#[derive(Debug, Clone, PartialEq, Eq)]
enum MappingNode {
    Leaf(String),
    Object(BTreeMap<String, MappingNode>),
}

/// Nested field → type mapping. Writes are idempotent; a later write with a
/// different type, or one that turns a leaf into an object, replaces the
/// earlier entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTree {
    root: BTreeMap<String, MappingNode>,
}

impl MappingTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `field` with its schema type (`keyword` if unknown).
    pub fn accumulate(&mut self, field: &str, schema: &Schema) {
        self.insert(field, schema.mapping_type(field));
    }

    pub fn insert(&mut self, field: &str, field_type: &str) {
        let segments: Vec<&str> = field.split('.').collect();
        let Some((leaf, parents)) = segments.split_last() else {
            return;
        };
        let mut level = &mut self.root;
        for segment in parents {
            let node = level
                .entry((*segment).to_string())
                .or_insert_with(|| MappingNode::Object(BTreeMap::new()));
            if let MappingNode::Leaf(old) = node {
                log::debug!("mapping of '{field}' replaces leaf type '{old}' at '{segment}'");
                *node = MappingNode::Object(BTreeMap::new());
            }
            level = match node {
                MappingNode::Object(children) => children,
                MappingNode::Leaf(_) => return,
            };
        }
        level.insert((*leaf).to_string(), MappingNode::Leaf(field_type.to_string()));
    }

    /// Type recorded for a dotted field, if it is a leaf.
    pub fn field_type(&self, field: &str) -> Option<&str> {
        let mut level = &self.root;
        let mut segments = field.split('.').peekable();
        while let Some(segment) = segments.next() {
            match (level.get(segment)?, segments.peek()) {
                (MappingNode::Leaf(t), None) => return Some(t),
                (MappingNode::Object(children), Some(_)) => level = children,
                _ => return None,
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn clear(&mut self) {
        self.root.clear();
    }

    /// Render as `{"properties": {...}}`.
    pub fn to_value(&self) -> Value {
        properties(&self.root)
    }
}

fn properties(level: &BTreeMap<String, MappingNode>) -> Value {
    let mut props = Map::new();
    for (name, node) in level {
        let rendered = match node {
            MappingNode::Leaf(t) => {
                let mut leaf = Map::new();
                leaf.insert("type".to_string(), Value::String(t.clone()));
                Value::Object(leaf)
            }
            MappingNode::Object(children) => properties(children),
        };
        props.insert(name.clone(), rendered);
    }
    let mut out = Map::new();
    out.insert("properties".to_string(), Value::Object(props));
    Value::Object(out)
}

impl Serialize for MappingTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
