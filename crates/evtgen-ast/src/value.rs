use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// WildcardString: match patterns for the `:` operator
// =============================================================================
//
// Patterns use `*` for runs of any characters and `?` for exactly one
// character. Backslash escapes the next character.

/// Wildcard tokens that can appear in a match pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialChar {
    /// Any run of characters (`*`)
    WildcardMulti,
    /// Exactly one character (`?`)
    WildcardSingle,
}

/// A part of a [`WildcardString`]: plain text or a wildcard token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringPart {
    Plain(String),
    Special(SpecialChar),
}

/// A `:` operand split into literal runs and wildcard tokens.
///
/// ## Escape semantics
///
/// | Input | Parsed as |
/// |-------|-----------|
/// | `\*`  | literal `*` |
/// | `\?`  | literal `?` |
/// | `\\`  | literal `\` |
/// | `\W`  | literal `\W` (both kept) |
///
/// A backslash only consumes itself before `*`, `?` or `\`, so Windows
/// paths such as `C:\Windows\*.exe` keep their separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardString {
    pub parts: Vec<StringPart>,
    pub original: String,
}

impl WildcardString {
    /// Parse a pattern, interpreting `*` and `?` as wildcards and `\` as escape.
    pub fn new(s: &str) -> Self {
        let mut parts: Vec<StringPart> = Vec::new();
        let mut acc = String::new();
        let mut escaped = false;

        for c in s.chars() {
            if escaped {
                if c == '*' || c == '?' || c == '\\' {
                    acc.push(c);
                } else {
                    acc.push('\\');
                    acc.push(c);
                }
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '*' || c == '?' {
                if !acc.is_empty() {
                    parts.push(StringPart::Plain(std::mem::take(&mut acc)));
                }
                let special = if c == '*' {
                    SpecialChar::WildcardMulti
                } else {
                    SpecialChar::WildcardSingle
                };
                // `**` matches exactly what `*` does
                if special == SpecialChar::WildcardMulti
                    && parts.last() == Some(&StringPart::Special(SpecialChar::WildcardMulti))
                {
                    continue;
                }
                parts.push(StringPart::Special(special));
            } else {
                acc.push(c);
            }
        }

        if escaped {
            acc.push('\\');
        }
        if !acc.is_empty() {
            parts.push(StringPart::Plain(acc));
        }

        WildcardString {
            parts,
            original: s.to_string(),
        }
    }

    /// Returns `true` if the pattern contains no wildcards.
    pub fn is_plain(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, StringPart::Plain(_)))
    }

    /// Returns `true` if the pattern contains any wildcard token.
    pub fn contains_wildcards(&self) -> bool {
        !self.is_plain()
    }

    /// The literal text of a wildcard-free pattern, with escapes removed.
    pub fn as_plain(&self) -> Option<String> {
        if !self.is_plain() {
            return None;
        }
        Some(
            self.parts
                .iter()
                .filter_map(|p| match p {
                    StringPart::Plain(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect(),
        )
    }
}

impl fmt::Display for WildcardString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

// =============================================================================
// Literal: comparison operands
// =============================================================================

/// The right-hand side of a comparison.
///
/// Serialized untagged, so YAML/JSON scalars map directly:
/// `"cmd.exe"`, `4`, `true`, `null`, `[80, 443]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Literal>),
}

impl Literal {
    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Boolean(_) => "boolean",
            Literal::Integer(_) => "integer",
            Literal::Float(_) => "float",
            Literal::String(_) => "string",
            Literal::List(_) => "list",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert to the JSON value that would appear in a document.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::Null => serde_json::Value::Null,
            Literal::Boolean(b) => serde_json::Value::Bool(*b),
            Literal::Integer(n) => serde_json::Value::from(*n),
            Literal::Float(f) => serde_json::Value::from(*f),
            Literal::String(s) => serde_json::Value::String(s.clone()),
            Literal::List(items) => {
                serde_json::Value::Array(items.iter().map(Literal::to_json).collect())
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Integer(n) => write!(f, "{n}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::String(s) => write!(f, "{s:?}"),
            Literal::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::Integer(n)
    }
}

impl From<i32> for Literal {
    fn from(n: i32) -> Self {
        Literal::Integer(n.into())
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Boolean(b)
    }
}

impl<T: Into<Literal>> From<Vec<T>> for Literal {
    fn from(items: Vec<T>) -> Self {
        Literal::List(items.into_iter().map(Into::into).collect())
    }
}

// =============================================================================
// Tests
// =============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn text_without_wildcards_is_plain(s in "[a-zA-Z0-9._:/ -]{0,24}") {
            let w = WildcardString::new(&s);
            prop_assert!(w.is_plain());
            prop_assert_eq!(w.as_plain(), Some(s));
        }

        #[test]
        fn parts_alternate_and_keep_original(s in r"[ab*?\\]{0,16}") {
            let w = WildcardString::new(&s);
            prop_assert_eq!(&w.original, &s);
            for pair in w.parts.windows(2) {
                let adjacent_plain = matches!(pair, [StringPart::Plain(_), StringPart::Plain(_)]);
                let adjacent_star = pair
                    .iter()
                    .all(|p| *p == StringPart::Special(SpecialChar::WildcardMulti));
                prop_assert!(!adjacent_plain && !adjacent_star, "{:?}", w.parts);
            }
        }
    }
}
