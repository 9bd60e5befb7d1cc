//! Field-type schema: maps dotted field paths to index mapping types.
//!
//! Schemas are flat YAML (or JSON) documents:
//!
//! ```yaml
//! process.pid:
//!   type: long
//! source.ip: ip          # shorthand
//! ```
//!
//! Fields missing from the schema are never an error: they resolve as
//! strings and are mapped as `keyword`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EmitError, Result};

/// Mapping type used for fields the schema does not know.
pub const DEFAULT_TYPE: &str = "keyword";

/// Common fields known without any external schema file.
const BUILTIN_FIELDS: &[(&str, &str)] = &[
    ("@timestamp", "date"),
    ("destination.ip", "ip"),
    ("destination.port", "long"),
    ("dns.question.name", "keyword"),
    ("event.action", "keyword"),
    ("event.category", "keyword"),
    ("event.code", "keyword"),
    ("event.dataset", "keyword"),
    ("event.kind", "keyword"),
    ("event.module", "keyword"),
    ("event.outcome", "keyword"),
    ("event.type", "keyword"),
    ("file.extension", "keyword"),
    ("file.name", "keyword"),
    ("file.path", "keyword"),
    ("file.size", "long"),
    ("host.ip", "ip"),
    ("host.name", "keyword"),
    ("host.os.name", "keyword"),
    ("host.os.type", "keyword"),
    ("network.direction", "keyword"),
    ("network.protocol", "keyword"),
    ("network.transport", "keyword"),
    ("process.args", "keyword"),
    ("process.args_count", "long"),
    ("process.code_signature.subject_name", "keyword"),
    ("process.code_signature.trusted", "boolean"),
    ("process.command_line", "wildcard"),
    ("process.entity_id", "keyword"),
    ("process.executable", "keyword"),
    ("process.exit_code", "long"),
    ("process.name", "keyword"),
    ("process.parent.args", "keyword"),
    ("process.parent.command_line", "wildcard"),
    ("process.parent.executable", "keyword"),
    ("process.parent.name", "keyword"),
    ("process.parent.pid", "long"),
    ("process.pe.original_file_name", "keyword"),
    ("process.pid", "long"),
    ("registry.data.strings", "wildcard"),
    ("registry.path", "keyword"),
    ("registry.value", "keyword"),
    ("source.ip", "ip"),
    ("source.port", "long"),
    ("url.full", "wildcard"),
    ("user.domain", "keyword"),
    ("user.id", "keyword"),
    ("user.name", "keyword"),
];

/// Overrides layered on top of the base schema by default.
const CUSTOM_FIELDS: &[(&str, &str)] = &[
    ("file.Ext.windows.zone_identifier", "long"),
    ("process.parent.Ext.real.pid", "long"),
];

// =============================================================================
// Value domains
// =============================================================================

/// The set of values a field's mapping type can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Keyword,
    Integer { min: i64, max: i64 },
    Float,
    Boolean,
    Ip,
    Date,
    /// Structured or exotic types (`geo_point`, `nested`, ...) for which no
    /// value can be synthesized.
    Unsupported,
}

impl Domain {
    pub fn from_type(field_type: &str) -> Domain {
        match field_type {
            "keyword" | "constant_keyword" | "wildcard" | "text" | "match_only_text" => {
                Domain::Keyword
            }
            "long" => Domain::Integer {
                min: i64::MIN,
                max: i64::MAX,
            },
            "integer" => Domain::Integer {
                min: i32::MIN.into(),
                max: i32::MAX.into(),
            },
            "short" => Domain::Integer {
                min: i16::MIN.into(),
                max: i16::MAX.into(),
            },
            "byte" => Domain::Integer {
                min: i8::MIN.into(),
                max: i8::MAX.into(),
            },
            // values above i64::MAX cannot be expressed by the operand type
            "unsigned_long" => Domain::Integer {
                min: 0,
                max: i64::MAX,
            },
            "float" | "double" | "half_float" | "scaled_float" => Domain::Float,
            "boolean" => Domain::Boolean,
            "ip" => Domain::Ip,
            "date" | "date_nanos" => Domain::Date,
            _ => Domain::Unsupported,
        }
    }

    /// Integer bounds of the domain; the full `i64` range for non-integer types.
    pub fn integer_bounds(&self) -> (i64, i64) {
        match self {
            Domain::Integer { min, max } => (*min, *max),
            _ => (i64::MIN, i64::MAX),
        }
    }
}

// =============================================================================
// Schema
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum RawFieldSpec {
    Short(String),
    Full {
        #[serde(rename = "type")]
        field_type: String,
    },
}

/// Mapping type of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Flat field → type table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    fields: BTreeMap<String, FieldSpec>,
}

impl Default for Schema {
    /// Built-in fields with the custom overrides applied.
    fn default() -> Self {
        let mut schema = Schema::builtin();
        schema.merge(Schema::custom_overrides());
        schema
    }
}

impl Schema {
    pub fn empty() -> Self {
        Schema {
            fields: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        Self::from_pairs(BUILTIN_FIELDS)
    }

    pub fn custom_overrides() -> Self {
        Self::from_pairs(CUSTOM_FIELDS)
    }

    fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut schema = Schema::empty();
        for (field, field_type) in pairs {
            schema.insert(field, field_type);
        }
        schema
    }

    /// Parse a flat YAML or JSON schema document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawFieldSpec> = serde_yaml::from_str(yaml)?;
        let mut schema = Schema::empty();
        for (field, spec) in raw {
            let field_type = match spec {
                RawFieldSpec::Short(t) | RawFieldSpec::Full { field_type: t } => t,
            };
            if field_type.trim().is_empty() {
                return Err(EmitError::Schema(format!("field '{field}' has an empty type")));
            }
            schema.fields.insert(field, FieldSpec { field_type });
        }
        log::debug!("loaded schema with {} fields", schema.len());
        Ok(schema)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Layer `other` over `self`; its types win on collisions.
    pub fn merge(&mut self, other: Schema) {
        self.fields.extend(other.fields);
    }

    pub fn insert(&mut self, field: &str, field_type: &str) {
        self.fields.insert(
            field.to_string(),
            FieldSpec {
                field_type: field_type.to_string(),
            },
        );
    }

    pub fn field_type(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(|s| s.field_type.as_str())
    }

    /// Declared type, or [`DEFAULT_TYPE`].
    pub fn mapping_type(&self, field: &str) -> &str {
        self.field_type(field).unwrap_or(DEFAULT_TYPE)
    }

    pub fn domain(&self, field: &str) -> Domain {
        Domain::from_type(self.mapping_type(field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
