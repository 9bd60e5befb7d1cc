mod helpers;

use std::error::Error as _;

use evtgen::{EmitError, Schema, SynthError};
use evtgen_ast::LogicalNode;
use helpers::*;

fn emit_err(yaml: &str) -> EmitError {
    emitter(0).docs_from_ast(&node(yaml), false).unwrap_err()
}

#[test]
fn equality_conflict_names_field_and_values() {
    let err = emit_err(
        r#"
conjunction:
  - comparison: { field: process.name, op: "==", value: cmd.exe }
  - comparison: { field: process.name, op: "==", value: powershell.exe }
"#,
    );
    assert!(
        matches!(&err, EmitError::Conflict { field, .. } if field == "process.name"),
        "expected Conflict, got: {err}"
    );
    assert_eq!(
        err.to_string(),
        "Unsolvable constraints: process.name ('cmd.exe' != 'powershell.exe')"
    );
}

#[test]
fn mixed_operand_types_conflict() {
    let err = emit_err(
        r#"
conjunction:
  - comparison: { field: destination.port, op: "==", value: "80" }
  - comparison: { field: destination.port, op: ">", value: 10 }
"#,
    );
    assert!(matches!(err, EmitError::Conflict { .. }), "got: {err}");
}

#[test]
fn equality_outside_every_member_has_no_document() {
    let err = emit_err(
        r#"
conjunction:
  - comparison: { field: destination.port, op: "==", value: 22 }
  - comparison: { field: destination.port, op: in, value: [80, 443] }
"#,
    );
    assert!(matches!(err, EmitError::EmptyResult), "got: {err}");
}

#[test]
fn excluded_equality_conflicts() {
    let err = emit_err(
        r#"
conjunction:
  - comparison: { field: destination.port, op: "==", value: 22 }
  - comparison: { field: destination.port, op: "not in", value: [22, 443] }
"#,
    );
    assert_eq!(
        err.to_string(),
        "Unsolvable constraints: destination.port (22 in (22, 443))"
    );
}

#[test]
fn empty_range_is_unsolvable() {
    let err = emit_err(
        r#"
conjunction:
  - comparison: { field: process.pid, op: ">=", value: 10 }
  - comparison: { field: process.pid, op: "<", value: 10 }
"#,
    );
    assert!(
        matches!(err, EmitError::UnsolvableRange { min: 10, max: 9, .. }),
        "got: {err}"
    );
}

#[test]
fn range_outside_field_domain() {
    let mut schema = Schema::default();
    schema.merge(Schema::from_yaml("process.pid: unsigned_long\nevent.code: byte").unwrap());
    let mut e = evtgen::Emitter::with_config(
        schema,
        evtgen::EmitterConfig {
            seed: Some(0),
            ..Default::default()
        },
    );

    let err = e
        .emit_docs(&node(r#"comparison: { field: process.pid, op: "<", value: 0 }"#))
        .unwrap_err();
    assert!(
        matches!(
            &err,
            EmitError::OutOfBoundary { field, domain_min: 0, .. } if field == "process.pid"
        ),
        "got: {err}"
    );

    let err = e
        .emit_docs(&node(r#"comparison: { field: event.code, op: "==", value: 300 }"#))
        .unwrap_err();
    assert!(
        matches!(err, EmitError::OutOfBoundary { domain_max: 127, .. }),
        "got: {err}"
    );
}

#[test]
fn excluded_literal_pattern_exhausts_synthesis() {
    let err = emit_err(
        r#"
conjunction:
  - comparison: { field: process.name, op: ":", value: cmd.exe }
  - comparison: { field: process.name, op: "!=", value: cmd.exe }
"#,
    );
    let EmitError::Boundary { field, source } = &err else {
        panic!("expected Boundary, got: {err}");
    };
    assert_eq!(field, "process.name");
    assert!(matches!(source, SynthError::Exhausted { .. }));
    assert!(err.source().is_some());
}

#[test]
fn unsupported_node_kind() {
    let err = emit_err("unsupported: Pipe");
    assert!(err.is_unsupported());
    assert_eq!(err.to_string(), "Unsupported node kind: Pipe");
}

#[test]
fn float_operand_is_unsupported() {
    let err = emit_err(r#"comparison: { field: process.pid, op: "==", value: 1.5 }"#);
    assert!(matches!(err, EmitError::UnsupportedComparison(_)), "got: {err}");
    assert!(err.is_unsupported());
}

#[test]
fn sequence_nested_in_conjunction_is_unsupported() {
    let err = emit_err(
        r#"
conjunction:
  - comparison: { field: a, op: "==", value: 1 }
  - sequence:
      by: [user.id]
      steps:
        - query: { constant: true }
        - query: { constant: true }
"#,
    );
    assert!(err.is_unsupported(), "got: {err}");
}

#[test]
fn sequence_joined_on_absent_field_conflicts() {
    let err = emit_err(
        r#"
sequence:
  by: [user.id]
  steps:
    - query: { comparison: { field: user.id, op: "==", value: null } }
    - query: { constant: true }
"#,
    );
    assert!(
        matches!(&err, EmitError::Conflict { field, .. } if field == "user.id"),
        "got: {err}"
    );
}

#[test]
fn sequence_joined_on_different_literals_conflicts() {
    let err = emit_err(
        r#"
sequence:
  by: [process.name]
  steps:
    - query:
        event_typed:
          category: process
          query: { comparison: { field: process.name, op: ":", value: cmd.exe } }
    - query:
        event_typed:
          category: process
          query: { comparison: { field: process.name, op: ":", value: powershell.exe } }
"#,
    );
    assert!(!err.is_unsupported(), "got: {err}");
    assert_eq!(
        err.to_string(),
        "Unsolvable constraints: process.name ('cmd.exe' != 'powershell.exe')"
    );
}

#[test]
fn sequence_joined_on_disjoint_patterns_conflicts() {
    let err = emit_err(
        r#"
sequence:
  by: [file.name]
  steps:
    - query: { comparison: { field: file.name, op: ":", value: "*.exe" } }
    - query: { comparison: { field: file.name, op: ":", value: "*.dll" } }
"#,
    );
    assert!(
        matches!(&err, EmitError::Conflict { field, .. } if field == "file.name"),
        "got: {err}"
    );
}

#[test]
fn wildcard_on_date_field_is_unsupported() {
    let err = emit_err(r#"comparison: { field: "@timestamp", op: ":", value: "2023-*" }"#);
    assert!(err.is_unsupported(), "got: {err}");
}

#[test]
fn structured_field_type_cannot_be_synthesized() {
    let mut schema = Schema::default();
    schema.merge(Schema::from_yaml("source.geo.location: geo_point").unwrap());
    let mut e = evtgen::Emitter::with_config(
        schema,
        evtgen::EmitterConfig {
            seed: Some(0),
            ..Default::default()
        },
    );
    let err = e
        .emit_docs(&node(r#"comparison: { field: source.geo.location, op: "!=", value: null }"#))
        .unwrap_err();
    assert!(matches!(err, EmitError::UnsupportedComparison(_)), "got: {err}");
}

#[test]
fn unsatisfiable_query_yields_empty_result() {
    let err = emit_err(
        r#"
event_typed:
  category: process
  query:
    conjunction:
      - comparison: { field: process.name, op: "==", value: a.exe }
      - constant: false
"#,
    );
    assert!(matches!(err, EmitError::EmptyResult));
    assert_eq!(err.to_string(), "Cannot trigger with any document");
    assert!(!err.is_unsupported());
}

#[test]
fn failed_generation_leaves_emitter_usable() {
    let mut e = emitter(0);
    let bad = node(
        r#"
conjunction:
  - comparison: { field: a, op: "==", value: 1 }
  - comparison: { field: a, op: "==", value: 2 }
"#,
    );
    assert!(e.emit_docs(&bad).is_err());
    let good = LogicalNode::equals("a", 1);
    assert_eq!(e.emit_docs(&good).unwrap(), vec![serde_json::json!({"a": 1})]);
    assert_eq!(e.ast_stats().get("Conjunction").total, 1);
    assert_eq!(e.ast_stats().get("Conjunction").successful, 0);
}

#[test]
fn malformed_schema_is_rejected() {
    assert!(matches!(
        Schema::from_yaml("process.pid: { type: '' }"),
        Err(EmitError::Schema(_))
    ));
    assert!(matches!(Schema::from_yaml("[not, a, map]"), Err(EmitError::Yaml(_))));
    assert!(matches!(
        Schema::from_file("/nonexistent/schema.yaml"),
        Err(EmitError::Io(_))
    ));
}
