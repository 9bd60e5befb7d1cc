//! Generation error types.

use thiserror::Error;

/// A value synthesizer failure, before it is attributed to a field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthError {
    /// The bounds leave no admissible value.
    #[error("empty solution space, {min} <= x <= {max}")]
    Boundary { min: i128, max: i128 },

    /// Every candidate was rejected by exclusions or the acceptance predicate.
    #[error("no acceptable value after {attempts} attempts")]
    Exhausted { attempts: usize },
}

/// Errors that can occur while turning a query into documents.
#[derive(Debug, Error)]
pub enum EmitError {
    /// A node kind the engine has no interpretation for.
    #[error("Unsupported node kind: {0}")]
    UnsupportedNode(String),

    /// An operator/operand combination outside the supported set.
    #[error("Unsupported comparison: {0}")]
    UnsupportedComparison(String),

    /// Two constraints on the same field cannot both hold.
    #[error("Unsolvable constraints: {field} ({reason})")]
    Conflict { field: String, reason: String },

    /// A range intersection is empty.
    #[error("Unsolvable constraints: {field} (empty solution space, {min} <= x <= {max})")]
    UnsolvableRange { field: String, min: i128, max: i128 },

    /// A range is empty once clamped to the field's value domain.
    #[error(
        "Unsolvable constraints: {field} (out of boundary, {min} <= x <= {max} \
         clamped to {domain_min} <= x <= {domain_max})"
    )]
    OutOfBoundary {
        field: String,
        min: i128,
        max: i128,
        domain_min: i64,
        domain_max: i64,
    },

    /// Value synthesis failed for a field.
    #[error("Unsolvable constraints: {field} ({source})")]
    Boundary {
        field: String,
        #[source]
        source: SynthError,
    },

    /// The query admits no branch at all.
    #[error("Cannot trigger with any document")]
    EmptyResult,

    /// A wildcard pattern failed to compile to a matcher.
    #[error("invalid wildcard pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Schema contents are malformed.
    #[error("invalid schema: {0}")]
    Schema(String),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EmitError {
    /// `true` for errors caused by query features outside the supported
    /// model, as opposed to queries that are supported but unsatisfiable.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            EmitError::UnsupportedNode(_) | EmitError::UnsupportedComparison(_)
        )
    }

    pub(crate) fn conflict(field: &str, reason: impl Into<String>) -> Self {
        EmitError::Conflict {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EmitError>;
