//! Per-field constraint algebra.
//!
//! A [`FieldConstraint`] describes the values one field may take within one
//! event. Constraints on the same field are combined with
//! [`FieldConstraint::merge`], which computes their intersection or reports a
//! conflict, and turned into a concrete value with
//! [`FieldConstraint::resolve`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use evtgen_ast::{CompareOp, Comparison, Literal, SpecialChar, StringPart, WildcardString};
use rand::Rng;
use regex::Regex;
use serde_json::Value;

use crate::error::{EmitError, Result, SynthError};
use crate::policy::Policy;
use crate::schema::Domain;
use crate::synth::{self, Anchor, RANDOM_STRING_LEN};

// =============================================================================
// Scalars
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Boolean,
    Integer,
    String,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScalarType::Boolean => "boolean",
            ScalarType::Integer => "integer",
            ScalarType::String => "string",
        })
    }
}

/// A concrete constraint operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scalar {
    Boolean(bool),
    Integer(i64),
    String(String),
}

impl Scalar {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::Boolean(_) => ScalarType::Boolean,
            Scalar::Integer(_) => ScalarType::Integer,
            Scalar::String(_) => ScalarType::String,
        }
    }

    /// Supported literal operands; `None` for null, floats and lists.
    pub fn from_literal(lit: &Literal) -> Option<Scalar> {
        match lit {
            Literal::Boolean(b) => Some(Scalar::Boolean(*b)),
            Literal::Integer(n) => Some(Scalar::Integer(*n)),
            Literal::String(s) => Some(Scalar::String(s.clone())),
            Literal::Null | Literal::Float(_) | Literal::List(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Boolean(b) => Value::Bool(*b),
            Scalar::Integer(n) => Value::from(*n),
            Scalar::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Boolean(b) => write!(f, "{b}"),
            Scalar::Integer(n) => write!(f, "{n}"),
            Scalar::String(s) => write!(f, "'{s}'"),
        }
    }
}

// =============================================================================
// Wildcard patterns
// =============================================================================

/// Compile a wildcard pattern into an anchored, case-insensitive regex.
pub fn compile_wildcard(wildcard: &WildcardString) -> Result<Regex> {
    let mut pattern = String::from("(?is)^");
    for part in &wildcard.parts {
        match part {
            StringPart::Plain(text) => pattern.push_str(&regex::escape(text)),
            StringPart::Special(SpecialChar::WildcardMulti) => pattern.push_str(".*"),
            StringPart::Special(SpecialChar::WildcardSingle) => pattern.push('.'),
        }
    }
    pattern.push('$');
    Ok(Regex::new(&pattern)?)
}

/// A `:` operand together with its compiled matcher.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub wildcard: WildcardString,
    regex: Regex,
}

impl Pattern {
    pub fn new(s: &str) -> Result<Self> {
        Self::from_wildcard(WildcardString::new(s))
    }

    pub fn from_wildcard(wildcard: WildcardString) -> Result<Self> {
        let regex = compile_wildcard(&wildcard)?;
        Ok(Pattern { wildcard, regex })
    }

    /// `self` with its first `*` replaced by the parts of `inner`, so that
    /// expansions start out matching both patterns' literal text.
    fn splice(&self, inner: &Pattern) -> Result<Pattern> {
        let parts = &self.wildcard.parts;
        let Some(at) = parts
            .iter()
            .position(|p| *p == StringPart::Special(SpecialChar::WildcardMulti))
        else {
            return Ok(self.clone());
        };
        let mut spliced = parts[..at].to_vec();
        spliced.extend(inner.wildcard.parts.iter().cloned());
        spliced.extend(parts[at + 1..].iter().cloned());
        Self::from_wildcard(WildcardString {
            parts: spliced,
            original: format!("{} <- {}", self.wildcard, inner.wildcard),
        })
    }

    pub fn is_match(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.wildcard == other.wildcard
    }
}

// =============================================================================
// Bounds
// =============================================================================

/// Inclusive integer bounds with a set of excluded points.
///
/// Exclusive comparison operands are normalized on construction (`> 4`
/// becomes `min = 5`); bounds are widened to `i128` so that normalization at
/// the edges of `i64` cannot overflow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bounds {
    pub min: Option<i128>,
    pub max: Option<i128>,
    pub excluded: BTreeSet<i64>,
}

impl Bounds {
    pub fn from_op(op: CompareOp, value: i64) -> Option<Self> {
        let v = i128::from(value);
        let (min, max) = match op {
            CompareOp::Lt => (None, Some(v - 1)),
            CompareOp::Lte => (None, Some(v)),
            CompareOp::Gt => (Some(v + 1), None),
            CompareOp::Gte => (Some(v), None),
            _ => return None,
        };
        Some(Bounds {
            min,
            max,
            excluded: BTreeSet::new(),
        })
    }

    pub fn lower(&self) -> i128 {
        self.min.unwrap_or(i128::from(i64::MIN))
    }

    pub fn upper(&self) -> i128 {
        self.max.unwrap_or(i128::from(i64::MAX))
    }

    pub fn contains(&self, n: i64) -> bool {
        let n128 = i128::from(n);
        self.lower() <= n128 && n128 <= self.upper() && !self.excluded.contains(&n)
    }

    pub fn intersect(&self, other: &Bounds) -> Bounds {
        let min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Bounds {
            min,
            max,
            excluded: self.excluded.union(&other.excluded).copied().collect(),
        }
    }

    /// No admissible integer remains.
    pub fn is_empty(&self) -> bool {
        let (lo, hi) = (self.lower(), self.upper());
        if lo > hi {
            return true;
        }
        let excluded_inside = self
            .excluded
            .iter()
            .filter(|n| (lo..=hi).contains(&i128::from(**n)))
            .count();
        hi - lo + 1 <= excluded_inside as i128
    }

    /// The tightest side: the lower bound when present, else the upper one.
    pub fn anchor(&self) -> Anchor {
        if self.min.is_none() && self.max.is_some() {
            Anchor::High
        } else {
            Anchor::Low
        }
    }
}

// =============================================================================
// Constraints
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    Equals(Scalar),
    NotEquals(Scalar),
    Range(Bounds),
    SetMembership { values: Vec<Scalar>, negate: bool },
    Exists(bool),
    /// Every pattern must be matched; more than one pattern resolves to an
    /// array with one element per pattern.
    Wildcard {
        patterns: Vec<Pattern>,
        excluded: Vec<Scalar>,
    },
}

/// The set of values one field may take within one event.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldConstraint {
    pub kind: ConstraintKind,
}

/// Outcome of resolving a constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// The field must not appear.
    Absent,
    Value(Scalar),
    Multi(Vec<Scalar>),
}

impl Resolved {
    pub fn into_json(self) -> Option<Value> {
        match self {
            Resolved::Absent => None,
            Resolved::Value(v) => Some(v.to_json()),
            Resolved::Multi(vs) => Some(Value::Array(vs.iter().map(Scalar::to_json).collect())),
        }
    }
}

impl From<ConstraintKind> for FieldConstraint {
    fn from(kind: ConstraintKind) -> Self {
        FieldConstraint { kind }
    }
}

impl FieldConstraint {
    pub fn equals(value: Scalar) -> Self {
        ConstraintKind::Equals(value).into()
    }

    pub fn exists(present: bool) -> Self {
        ConstraintKind::Exists(present).into()
    }

    /// Type fixed by the operand; `None` for pure existence constraints.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match &self.kind {
            ConstraintKind::Equals(v) | ConstraintKind::NotEquals(v) => Some(v.scalar_type()),
            ConstraintKind::Range(_) => Some(ScalarType::Integer),
            ConstraintKind::SetMembership { values, .. } => values.first().map(Scalar::scalar_type),
            ConstraintKind::Exists(_) => None,
            ConstraintKind::Wildcard { .. } => Some(ScalarType::String),
        }
    }

    /// Translate one comparison into a constraint on its field.
    pub fn from_comparison(cmp: &Comparison) -> Result<Self> {
        let unsupported = || {
            EmitError::UnsupportedComparison(format!(
                "{cmp} ({} operand)",
                cmp.value.type_name()
            ))
        };

        if cmp.value == Literal::Null {
            return match cmp.op {
                CompareOp::Eq => Ok(Self::exists(false)),
                CompareOp::NotEq => Ok(Self::exists(true)),
                _ => Err(unsupported()),
            };
        }

        let kind = match cmp.op {
            CompareOp::Eq => ConstraintKind::Equals(Scalar::from_literal(&cmp.value).ok_or_else(unsupported)?),
            CompareOp::NotEq => {
                ConstraintKind::NotEquals(Scalar::from_literal(&cmp.value).ok_or_else(unsupported)?)
            }
            CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => {
                let n = cmp.value.as_i64().ok_or_else(unsupported)?;
                ConstraintKind::Range(Bounds::from_op(cmp.op, n).ok_or_else(unsupported)?)
            }
            CompareOp::Wildcard => {
                let s = cmp.value.as_str().ok_or_else(unsupported)?;
                ConstraintKind::Wildcard {
                    patterns: vec![Pattern::new(s)?],
                    excluded: Vec::new(),
                }
            }
            CompareOp::In | CompareOp::NotIn => {
                let items = match &cmp.value {
                    Literal::List(items) => items.as_slice(),
                    single => std::slice::from_ref(single),
                };
                let mut values: Vec<Scalar> = Vec::with_capacity(items.len());
                for item in items {
                    let v = Scalar::from_literal(item).ok_or_else(unsupported)?;
                    if values.first().is_some_and(|f| f.scalar_type() != v.scalar_type()) {
                        return Err(unsupported());
                    }
                    if !values.contains(&v) {
                        values.push(v);
                    }
                }
                if values.is_empty() {
                    return Err(unsupported());
                }
                let negate = cmp.op == CompareOp::NotIn;
                if negate {
                    values.sort();
                }
                ConstraintKind::SetMembership { values, negate }
            }
        };
        Ok(kind.into())
    }

    fn rank(&self) -> u8 {
        match self.kind {
            ConstraintKind::Exists(_) => 0,
            ConstraintKind::Equals(_) => 1,
            ConstraintKind::NotEquals(_) => 2,
            ConstraintKind::SetMembership { .. } => 3,
            ConstraintKind::Range(_) => 4,
            ConstraintKind::Wildcard { .. } => 5,
        }
    }

    /// Intersect two constraints on `field`.
    ///
    /// The result does not depend on argument order (up to the order of set
    /// members). Fails with a conflict error naming `field` and both values
    /// when the intersection is empty.
    pub fn merge(&self, other: &FieldConstraint, field: &str) -> Result<FieldConstraint> {
        if let (Some(a), Some(b)) = (self.scalar_type(), other.scalar_type())
            && a != b
        {
            return Err(EmitError::conflict(
                field,
                format!("{a} value cannot equal {b} value"),
            ));
        }

        let (a, b) = match self.rank().cmp(&other.rank()) {
            Ordering::Greater => (other, self),
            _ => (self, other),
        };

        use ConstraintKind::*;
        let kind = match (&a.kind, &b.kind) {
            (Exists(x), Exists(y)) if x == y => Exists(*x),
            (Exists(_), Exists(_)) => {
                return Err(EmitError::conflict(field, "must be both present and absent"));
            }
            (Exists(true), _) => b.kind.clone(),
            (Exists(false), _) => {
                return Err(EmitError::conflict(field, "absent field cannot hold a value"));
            }

            (Equals(v), Equals(w)) => {
                if v != w {
                    return Err(EmitError::conflict(field, format!("{v} != {w}")));
                }
                Equals(v.clone())
            }
            (Equals(v), NotEquals(w)) => {
                if v == w {
                    return Err(EmitError::conflict(field, format!("{v} is excluded")));
                }
                Equals(v.clone())
            }
            (Equals(v), SetMembership { values, negate }) => {
                if values.contains(v) == *negate {
                    let relation = if *negate { "in" } else { "not in" };
                    return Err(EmitError::conflict(
                        field,
                        format!("{v} {relation} {}", display_set(values)),
                    ));
                }
                Equals(v.clone())
            }
            (Equals(v), Range(bounds)) => match v {
                Scalar::Integer(n) if bounds.contains(*n) => Equals(v.clone()),
                _ => {
                    return Err(EmitError::conflict(
                        field,
                        format!("{v} outside {}", display_bounds(bounds)),
                    ));
                }
            },
            (Equals(v), Wildcard { patterns, excluded }) => match v {
                Scalar::String(s)
                    if patterns.iter().all(|p| p.is_match(s)) && !excluded.contains(v) =>
                {
                    Equals(v.clone())
                }
                _ => {
                    return Err(EmitError::conflict(
                        field,
                        format!("{v} does not match {}", display_patterns(patterns)),
                    ));
                }
            },

            (NotEquals(v), NotEquals(w)) => {
                if v == w {
                    NotEquals(v.clone())
                } else {
                    SetMembership {
                        values: sorted(vec![v.clone(), w.clone()]),
                        negate: true,
                    }
                }
            }
            (NotEquals(v), SetMembership { values, negate: false }) => {
                let remaining: Vec<Scalar> = values.iter().filter(|x| *x != v).cloned().collect();
                if remaining.is_empty() {
                    return Err(EmitError::conflict(
                        field,
                        format!("{} minus {v} is empty", display_set(values)),
                    ));
                }
                SetMembership {
                    values: remaining,
                    negate: false,
                }
            }
            (NotEquals(v), SetMembership { values, negate: true }) => {
                let mut all = values.clone();
                all.push(v.clone());
                SetMembership {
                    values: sorted(all),
                    negate: true,
                }
            }
            (NotEquals(v), Range(bounds)) => match v {
                Scalar::Integer(n) => {
                    let mut bounds = bounds.clone();
                    bounds.excluded.insert(*n);
                    checked_range(field, bounds)?
                }
                _ => integer_expected(field, v)?,
            },
            (NotEquals(v), Wildcard { patterns, excluded }) => {
                let mut excluded = excluded.clone();
                if !excluded.contains(v) {
                    excluded.push(v.clone());
                }
                Wildcard {
                    patterns: patterns.clone(),
                    excluded,
                }
            }

            (
                SetMembership {
                    values: xs,
                    negate: false,
                },
                SetMembership {
                    values: ys,
                    negate: false,
                },
            ) => {
                let common: Vec<Scalar> = xs.iter().filter(|x| ys.contains(x)).cloned().collect();
                if common.is_empty() {
                    return Err(EmitError::conflict(
                        field,
                        format!("{} and {} are disjoint", display_set(xs), display_set(ys)),
                    ));
                }
                SetMembership {
                    values: common,
                    negate: false,
                }
            }
            (
                SetMembership {
                    values: xs,
                    negate: true,
                },
                SetMembership {
                    values: ys,
                    negate: true,
                },
            ) => {
                let mut all = xs.clone();
                all.extend(ys.iter().cloned());
                SetMembership {
                    values: sorted(all),
                    negate: true,
                }
            }
            (
                SetMembership {
                    values: xs,
                    negate: xn,
                },
                SetMembership { values: ys, .. },
            ) => {
                let (included, excluded) = if *xn { (ys, xs) } else { (xs, ys) };
                let remaining: Vec<Scalar> = included
                    .iter()
                    .filter(|x| !excluded.contains(x))
                    .cloned()
                    .collect();
                if remaining.is_empty() {
                    return Err(EmitError::conflict(
                        field,
                        format!(
                            "{} is contained in {}",
                            display_set(included),
                            display_set(excluded)
                        ),
                    ));
                }
                SetMembership {
                    values: remaining,
                    negate: false,
                }
            }
            (SetMembership { values, negate: false }, Range(bounds)) => {
                let remaining: Vec<Scalar> = values
                    .iter()
                    .filter(|v| matches!(v, Scalar::Integer(n) if bounds.contains(*n)))
                    .cloned()
                    .collect();
                if remaining.is_empty() {
                    return Err(EmitError::conflict(
                        field,
                        format!("{} outside {}", display_set(values), display_bounds(bounds)),
                    ));
                }
                SetMembership {
                    values: remaining,
                    negate: false,
                }
            }
            (SetMembership { values, negate: true }, Range(bounds)) => {
                let mut bounds = bounds.clone();
                bounds
                    .excluded
                    .extend(values.iter().filter_map(|v| match v {
                        Scalar::Integer(n) => Some(*n),
                        _ => None,
                    }));
                checked_range(field, bounds)?
            }
            (SetMembership { values, negate: false }, Wildcard { patterns, excluded }) => {
                let remaining: Vec<Scalar> = values
                    .iter()
                    .filter(|v| {
                        matches!(v, Scalar::String(s) if patterns.iter().all(|p| p.is_match(s)))
                            && !excluded.contains(v)
                    })
                    .cloned()
                    .collect();
                if remaining.is_empty() {
                    return Err(EmitError::conflict(
                        field,
                        format!(
                            "{} does not match {}",
                            display_set(values),
                            display_patterns(patterns)
                        ),
                    ));
                }
                SetMembership {
                    values: remaining,
                    negate: false,
                }
            }
            (SetMembership { values, negate: true }, Wildcard { patterns, excluded }) => {
                let mut excluded = excluded.clone();
                for v in values {
                    if !excluded.contains(v) {
                        excluded.push(v.clone());
                    }
                }
                Wildcard {
                    patterns: patterns.clone(),
                    excluded,
                }
            }

            (Range(x), Range(y)) => checked_range(field, x.intersect(y))?,

            (Wildcard { patterns: xp, excluded: xe }, Wildcard { patterns: yp, excluded: ye }) => {
                let mut patterns = xp.clone();
                for p in yp {
                    if !patterns.contains(p) {
                        patterns.push(p.clone());
                    }
                }
                let mut excluded = xe.clone();
                for v in ye {
                    if !excluded.contains(v) {
                        excluded.push(v.clone());
                    }
                }
                Wildcard { patterns, excluded }
            }

            // Remaining pairs mix integer ranges with string patterns, which
            // the type check above already rejected.
            (Range(_), Wildcard { .. }) => {
                return Err(EmitError::conflict(
                    field,
                    "integer range cannot hold a string pattern",
                ));
            }
            _ => {
                return Err(EmitError::conflict(
                    field,
                    format!("cannot combine {:?} with {:?}", a.kind, b.kind),
                ));
            }
        };
        Ok(kind.into())
    }

    /// Produce a concrete value for `field`.
    ///
    /// Integer constraints are first clamped to the field's value domain.
    /// `accept` is consulted for every synthesized candidate; forced values
    /// (equality, patterns without wildcards) bypass it.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        field: &str,
        domain: Domain,
        rng: &mut R,
        policy: Policy,
        accept: &dyn Fn(&Scalar) -> bool,
    ) -> Result<Resolved> {
        let fuzzy = policy.is_fuzzy();
        let tag = |source: SynthError| EmitError::Boundary {
            field: field.to_string(),
            source,
        };
        let (dmin, dmax) = domain.integer_bounds();
        let accept_int = |n: i64| accept(&Scalar::Integer(n));
        let accept_str = |s: &str| accept(&Scalar::String(s.to_string()));

        let synthesized = !matches!(
            self.kind,
            ConstraintKind::Equals(_) | ConstraintKind::Exists(false)
        );
        let no_synthesis = || {
            EmitError::UnsupportedComparison(format!(
                "no value can be synthesized for the mapping type of {field}"
            ))
        };
        if domain == Domain::Unsupported && synthesized {
            return Err(no_synthesis());
        }

        let resolved = match &self.kind {
            ConstraintKind::Exists(false) => Resolved::Absent,
            ConstraintKind::Exists(true) => Resolved::Value(match domain {
                Domain::Keyword => Scalar::String(
                    synth::random_string(rng, RANDOM_STRING_LEN, &accept_str).map_err(tag)?,
                ),
                Domain::Integer { .. } | Domain::Float => Scalar::Integer(
                    synth::resolve_range(
                        dmin.max(0),
                        dmax,
                        Anchor::Low,
                        &BTreeSet::new(),
                        rng,
                        fuzzy,
                        &accept_int,
                    )
                    .map_err(tag)?,
                ),
                Domain::Boolean => {
                    let b = synth::any_bool(rng, fuzzy);
                    Scalar::Boolean(pick_bool([b, !b], accept).map_err(tag)?)
                }
                Domain::Ip => Scalar::String(
                    synth::synthesize_ip(None, rng, fuzzy, &|ip| accept_str(&ip.to_string()))
                        .map_err(tag)?
                        .to_string(),
                ),
                Domain::Date => Scalar::String(
                    synth::synthesize_date(rng, fuzzy, &accept_str).map_err(tag)?,
                ),
                Domain::Unsupported => return Err(no_synthesis()),
            }),
            ConstraintKind::Equals(v) => {
                if let Scalar::Integer(n) = v
                    && !(dmin..=dmax).contains(n)
                {
                    return Err(out_of_boundary(field, (*n).into(), (*n).into(), dmin, dmax));
                }
                Resolved::Value(synth::resolve_equals(v))
            }
            ConstraintKind::NotEquals(v) => Resolved::Value(match v {
                Scalar::Integer(n) => Scalar::Integer(
                    synth::not_equal_integer(*n, dmin, dmax, rng, fuzzy, &accept_int)
                        .map_err(tag)?,
                ),
                Scalar::String(s) if domain == Domain::Ip => Scalar::String(
                    synth::synthesize_ip(None, rng, fuzzy, &|ip| {
                        let text = ip.to_string();
                        text != *s && accept_str(&text)
                    })
                    .map_err(tag)?
                    .to_string(),
                ),
                Scalar::String(s) if domain == Domain::Date => Scalar::String(
                    synth::synthesize_date(rng, fuzzy, &|d| d != s && accept_str(d))
                        .map_err(tag)?,
                ),
                Scalar::String(s) => {
                    Scalar::String(synth::not_equal_string(s, rng, fuzzy, &accept_str).map_err(tag)?)
                }
                Scalar::Boolean(b) => Scalar::Boolean(pick_bool([!b], accept).map_err(tag)?),
            }),
            ConstraintKind::Range(bounds) => {
                let lo = bounds.lower().max(dmin.into());
                let hi = bounds.upper().min(dmax.into());
                if lo > hi {
                    return Err(out_of_boundary(
                        field,
                        bounds.lower(),
                        bounds.upper(),
                        dmin,
                        dmax,
                    ));
                }
                // both sides now lie within the i64 domain
                let (lo, hi) = (lo as i64, hi as i64);
                Resolved::Value(Scalar::Integer(
                    synth::resolve_range(
                        lo,
                        hi,
                        bounds.anchor(),
                        &bounds.excluded,
                        rng,
                        fuzzy,
                        &accept_int,
                    )
                    .map_err(tag)?,
                ))
            }
            ConstraintKind::SetMembership {
                values,
                negate: false,
            } => {
                let in_domain = |v: &Scalar| match v {
                    Scalar::Integer(n) => (dmin..=dmax).contains(n) && accept(v),
                    _ => accept(v),
                };
                Resolved::Value(
                    synth::resolve_set_membership(values, rng, fuzzy, &in_domain)
                        .map_err(tag)?
                        .clone(),
                )
            }
            ConstraintKind::SetMembership {
                values,
                negate: true,
            } => Resolved::Value(resolve_outside(values, domain, rng, fuzzy, accept).map_err(tag)?),
            ConstraintKind::Wildcard { patterns, excluded } => {
                let mut out = Vec::with_capacity(patterns.len());
                for pattern in patterns {
                    let s = expand_pattern(field, pattern, domain, rng, &|s| {
                        let v = Scalar::String(s.to_string());
                        !excluded.contains(&v) && accept(&v)
                    })?;
                    out.push(Scalar::String(s));
                }
                match out.len() {
                    1 => Resolved::Value(out.remove(0)),
                    _ => Resolved::Multi(out),
                }
            }
        };
        Ok(resolved)
    }

    /// Like [`resolve`](Self::resolve), but several patterns must be met by
    /// one shared value instead of one array element each.
    ///
    /// Used for sequence join keys, where every step must carry the same
    /// value. A literal pattern is taken as the candidate when there is one;
    /// otherwise each pattern in turn, with the others spliced into its
    /// first `*`, is expanded until a value matches all of them. Fails with
    /// a conflict naming the patterns when no shared value is found.
    pub fn resolve_joined<R: Rng + ?Sized>(
        &self,
        field: &str,
        domain: Domain,
        rng: &mut R,
        policy: Policy,
        accept: &dyn Fn(&Scalar) -> bool,
    ) -> Result<Resolved> {
        let ConstraintKind::Wildcard { patterns, excluded } = &self.kind else {
            return self.resolve(field, domain, rng, policy, accept);
        };
        if patterns.len() < 2 {
            return self.resolve(field, domain, rng, policy, accept);
        }

        let admissible = |s: &str| {
            let v = Scalar::String(s.to_string());
            patterns.iter().all(|p| p.is_match(s)) && !excluded.contains(&v) && accept(&v)
        };

        if let Some(literal) = patterns.iter().find_map(|p| p.wildcard.as_plain()) {
            if admissible(&literal) {
                return Ok(Resolved::Value(Scalar::String(literal)));
            }
            let reason = match patterns.iter().find(|p| !p.is_match(&literal)) {
                Some(other) => match other.wildcard.as_plain() {
                    Some(text) => format!("'{literal}' != '{text}'"),
                    None => format!("'{literal}' does not match '{}'", other.wildcard),
                },
                None => format!("'{literal}' is excluded"),
            };
            return Err(EmitError::conflict(field, reason));
        }

        // each pattern in turn hosts the others in its first `*`
        let mut candidates = Vec::with_capacity(patterns.len());
        for (host, first) in patterns.iter().enumerate() {
            let mut combined = first.clone();
            for (i, guest) in patterns.iter().enumerate() {
                if i != host {
                    combined = combined.splice(guest)?;
                }
            }
            candidates.push(combined);
        }
        for _ in 0..synth::MAX_ATTEMPTS / patterns.len() {
            for candidate in &candidates {
                match expand_pattern(field, candidate, domain, rng, &admissible) {
                    Ok(s) => return Ok(Resolved::Value(Scalar::String(s))),
                    Err(e) if e.is_unsupported() => return Err(e),
                    Err(_) => {}
                }
            }
        }
        Err(EmitError::conflict(
            field,
            format!("{} share no value", display_patterns(patterns)),
        ))
    }
}

/// Expand one `:` pattern into a value of `domain` that `accept` agrees to.
///
/// Literal patterns are taken as they are. Patterns with wildcards are
/// expanded into strings on keyword fields and into addresses on ip fields;
/// other domains have no textual form to expand into.
fn expand_pattern<R: Rng + ?Sized>(
    field: &str,
    pattern: &Pattern,
    domain: Domain,
    rng: &mut R,
    accept: &dyn Fn(&str) -> bool,
) -> Result<String> {
    let tag = |source: SynthError| EmitError::Boundary {
        field: field.to_string(),
        source,
    };
    if pattern.wildcard.is_plain() {
        return synth::resolve_wildcard(&pattern.wildcard, rng, accept).map_err(tag);
    }
    match domain {
        Domain::Keyword => synth::resolve_wildcard(&pattern.wildcard, rng, accept).map_err(tag),
        Domain::Ip => synth::ip_from_wildcard(&pattern.wildcard, rng, &|ip| {
            let text = ip.to_string();
            pattern.is_match(&text) && accept(&text)
        })
        .map(|ip| ip.to_string())
        .map_err(tag),
        _ => Err(EmitError::UnsupportedComparison(format!(
            "wildcard pattern '{}' on non-text field {field}",
            pattern.wildcard
        ))),
    }
}

fn resolve_outside<R: Rng + ?Sized>(
    values: &[Scalar],
    domain: Domain,
    rng: &mut R,
    fuzzy: bool,
    accept: &dyn Fn(&Scalar) -> bool,
) -> std::result::Result<Scalar, SynthError> {
    match values.first() {
        Some(Scalar::Integer(_)) => {
            let ints: Vec<i64> = values
                .iter()
                .filter_map(|v| match v {
                    Scalar::Integer(n) => Some(*n),
                    _ => None,
                })
                .collect();
            let (lo, hi) = domain.integer_bounds();
            synth::integer_outside(&ints, lo, hi, rng, fuzzy, &|n| accept(&Scalar::Integer(n)))
                .map(Scalar::Integer)
        }
        Some(Scalar::Boolean(_)) => {
            let candidates: Vec<bool> = [true, false]
                .into_iter()
                .filter(|b| !values.contains(&Scalar::Boolean(*b)))
                .collect();
            pick_bool(candidates, accept).map(Scalar::Boolean)
        }
        _ => {
            let strings: Vec<String> = values
                .iter()
                .filter_map(|v| match v {
                    Scalar::String(s) => Some(s.clone()),
                    _ => None,
                })
                .collect();
            if domain == Domain::Ip {
                synth::synthesize_ip(None, rng, fuzzy, &|ip| {
                    let text = ip.to_string();
                    !strings.contains(&text) && accept(&Scalar::String(text))
                })
                .map(|ip| Scalar::String(ip.to_string()))
            } else if domain == Domain::Date {
                synth::synthesize_date(rng, fuzzy, &|d| {
                    !strings.iter().any(|s| s == d) && accept(&Scalar::String(d.to_string()))
                })
                .map(Scalar::String)
            } else {
                synth::string_outside(&strings, rng, fuzzy, &|s| {
                    accept(&Scalar::String(s.to_string()))
                })
                .map(Scalar::String)
            }
        }
    }
}

fn pick_bool(
    candidates: impl IntoIterator<Item = bool>,
    accept: &dyn Fn(&Scalar) -> bool,
) -> std::result::Result<bool, SynthError> {
    candidates
        .into_iter()
        .find(|b| accept(&Scalar::Boolean(*b)))
        .ok_or(SynthError::Exhausted { attempts: 2 })
}

fn checked_range(field: &str, bounds: Bounds) -> Result<ConstraintKind> {
    if bounds.is_empty() {
        return Err(EmitError::UnsolvableRange {
            field: field.to_string(),
            min: bounds.lower(),
            max: bounds.upper(),
        });
    }
    Ok(ConstraintKind::Range(bounds))
}

fn out_of_boundary(field: &str, min: i128, max: i128, domain_min: i64, domain_max: i64) -> EmitError {
    EmitError::OutOfBoundary {
        field: field.to_string(),
        min,
        max,
        domain_min,
        domain_max,
    }
}

fn integer_expected(field: &str, v: &Scalar) -> Result<ConstraintKind> {
    Err(EmitError::conflict(
        field,
        format!("{v} is not an integer"),
    ))
}

fn sorted(mut values: Vec<Scalar>) -> Vec<Scalar> {
    values.sort();
    values.dedup();
    values
}

fn display_set(values: &[Scalar]) -> String {
    let items: Vec<String> = values.iter().map(Scalar::to_string).collect();
    format!("({})", items.join(", "))
}

fn display_bounds(bounds: &Bounds) -> String {
    format!("{} <= x <= {}", bounds.lower(), bounds.upper())
}

fn display_patterns(patterns: &[Pattern]) -> String {
    let items: Vec<String> = patterns
        .iter()
        .map(|p| format!("'{}'", p.wildcard))
        .collect();
    items.join(" and ")
}

// =============================================================================
// Constraint sets
// =============================================================================

/// Constraints of one event, keyed by dotted field path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    fields: BTreeMap<String, FieldConstraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint, merging with any constraint already on the field.
    pub fn insert(&mut self, field: &str, constraint: FieldConstraint) -> Result<()> {
        let merged = match self.fields.get(field) {
            Some(existing) => existing.merge(&constraint, field)?,
            None => constraint,
        };
        self.fields.insert(field.to_string(), merged);
        Ok(())
    }

    /// Merge every constraint of `other` into `self`.
    pub fn merge(&mut self, other: &ConstraintSet) -> Result<()> {
        for (field, constraint) in &other.fields {
            self.insert(field, constraint.clone())?;
        }
        Ok(())
    }

    pub fn get(&self, field: &str) -> Option<&FieldConstraint> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldConstraint)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
