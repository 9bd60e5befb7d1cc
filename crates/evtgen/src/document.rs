//! Building and reading nested JSON documents addressed by dotted paths.
//!
//! Generated documents are nested: the value for `process.parent.name` lands
//! at `{"process": {"parent": {"name": ...}}}`. Reading accepts both shapes,
//! with a flat key taking precedence over nested traversal.

use serde_json::{Map, Value};

/// Wrap `value` in one object per path segment.
pub fn emit_field(path: &str, value: Value) -> Value {
    path.rsplit('.').fold(value, |inner, segment| {
        let mut map = Map::new();
        map.insert(segment.to_string(), inner);
        Value::Object(map)
    })
}

/// Recursively merge `src` into `dst`.
///
/// Objects are merged key by key; any other collision is resolved in favor
/// of `src`.
pub fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (key, src_val) in src_map {
                match dst_map.get_mut(&key) {
                    Some(dst_val) => deep_merge(dst_val, src_val),
                    None => {
                        dst_map.insert(key, src_val);
                    }
                }
            }
        }
        (dst, src) => *dst = src,
    }
}

/// Read-only view of a document with dot-notation field access.
#[derive(Debug)]
pub struct Document<'a> {
    inner: &'a Value,
}

impl<'a> Document<'a> {
    pub fn from_value(value: &'a Value) -> Self {
        Document { inner: value }
    }

    /// Get a field by dotted path.
    ///
    /// A flat key equal to the whole path wins over nested traversal. Arrays
    /// met along the path are searched element by element.
    pub fn get_field(&self, path: &str) -> Option<&'a Value> {
        if let Some(obj) = self.inner.as_object()
            && let Some(v) = obj.get(path)
        {
            return Some(v);
        }

        if path.contains('.') {
            let parts: Vec<&str> = path.split('.').collect();
            return traverse(self.inner, &parts);
        }

        None
    }

    pub fn as_value(&self) -> &'a Value {
        self.inner
    }
}

fn traverse<'a>(current: &'a Value, parts: &[&str]) -> Option<&'a Value> {
    let Some((head, rest)) = parts.split_first() else {
        return Some(current);
    };

    match current {
        Value::Object(map) => traverse(map.get(*head)?, rest),
        Value::Array(arr) => arr.iter().find_map(|item| traverse(item, parts)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_emit_field_nests_segments() {
        assert_eq!(
            emit_field("process.parent.name", json!("cmd.exe")),
            json!({"process": {"parent": {"name": "cmd.exe"}}})
        );
        assert_eq!(emit_field("pid", json!(4)), json!({"pid": 4}));
    }

    #[test]
    fn test_deep_merge_combines_siblings() {
        let mut doc = emit_field("process.name", json!("a"));
        deep_merge(&mut doc, emit_field("process.pid", json!(1)));
        deep_merge(&mut doc, emit_field("event.category", json!("process")));
        assert_eq!(
            doc,
            json!({"process": {"name": "a", "pid": 1}, "event": {"category": "process"}})
        );
    }

    #[test]
    fn test_deep_merge_last_write_wins() {
        let mut doc = json!({"a": {"b": 1}});
        deep_merge(&mut doc, json!({"a": {"b": [1, 2]}}));
        assert_eq!(doc, json!({"a": {"b": [1, 2]}}));
        deep_merge(&mut doc, json!({"a": "flat"}));
        assert_eq!(doc, json!({"a": "flat"}));
    }

    #[test]
    fn test_nested_and_flat_lookup() {
        let v = json!({"actor.id": "flat", "actor": {"id": "nested", "name": "n"}});
        let doc = Document::from_value(&v);
        assert_eq!(doc.get_field("actor.id"), Some(&json!("flat")));
        assert_eq!(doc.get_field("actor.name"), Some(&json!("n")));
        assert_eq!(doc.get_field("missing"), None);
    }

    #[test]
    fn test_array_traversal() {
        let v = json!({"a": {"b": [{"x": 1}, {"c": "found"}]}});
        let doc = Document::from_value(&v);
        assert_eq!(doc.get_field("a.b.c"), Some(&json!("found")));
        assert_eq!(doc.get_field("a.b.d"), None);
    }
}
