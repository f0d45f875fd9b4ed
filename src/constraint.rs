use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::context::EvaluationContext;

/// A single targeting condition of a [crate::Segment].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub segment_id: i64,
    pub property: String,
    pub operator: Operator,
    pub value: String,
}

/// The closed set of constraint operators.
///
/// Operators outside the set are still accepted when reading a snapshot, as
/// [Operator::Unknown], and simply never match.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Ereg,
    Nereg,
    In,
    NotIn,
    Contains,
    NotContains,
    Unknown(String),
}

impl Operator {
    /// Wire names of every supported operator.
    pub const SUPPORTED: [&'static str; 12] = [
        "EQ",
        "NEQ",
        "LT",
        "LTE",
        "GT",
        "GTE",
        "EREG",
        "NEREG",
        "IN",
        "NOTIN",
        "CONTAINS",
        "NOTCONTAINS",
    ];

    pub fn parse(s: &str) -> Operator {
        match s {
            "EQ" => Operator::Eq,
            "NEQ" => Operator::Neq,
            "LT" => Operator::Lt,
            "LTE" => Operator::Lte,
            "GT" => Operator::Gt,
            "GTE" => Operator::Gte,
            "EREG" => Operator::Ereg,
            "NEREG" => Operator::Nereg,
            "IN" => Operator::In,
            "NOTIN" => Operator::NotIn,
            "CONTAINS" => Operator::Contains,
            "NOTCONTAINS" => Operator::NotContains,
            other => Operator::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Operator::Eq => "EQ",
            Operator::Neq => "NEQ",
            Operator::Lt => "LT",
            Operator::Lte => "LTE",
            Operator::Gt => "GT",
            Operator::Gte => "GTE",
            Operator::Ereg => "EREG",
            Operator::Nereg => "NEREG",
            Operator::In => "IN",
            Operator::NotIn => "NOTIN",
            Operator::Contains => "CONTAINS",
            Operator::NotContains => "NOTCONTAINS",
            Operator::Unknown(s) => s,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Operator::Unknown(_))
    }

    fn matches(&self, lhs: &str, rhs: &str) -> bool {
        match self {
            Operator::Eq => lhs == rhs,
            Operator::Neq => lhs != rhs,

            // numeric ops
            Operator::Lt => numeric_op(lhs, rhs, |l, r| l < r),
            Operator::Lte => numeric_op(lhs, rhs, |l, r| l <= r),
            Operator::Gt => numeric_op(lhs, rhs, |l, r| l > r),
            Operator::Gte => numeric_op(lhs, rhs, |l, r| l >= r),

            // an invalid pattern fails both the positive and the negated form
            Operator::Ereg => regex_op(lhs, rhs).unwrap_or(false),
            Operator::Nereg => regex_op(lhs, rhs).map(|m| !m).unwrap_or(false),

            Operator::In => in_list(lhs, rhs),
            Operator::NotIn => !in_list(lhs, rhs),

            Operator::Contains => lhs.contains(rhs),
            Operator::NotContains => !lhs.contains(rhs),

            Operator::Unknown(_) => false,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Operator::parse(&s))
    }
}

impl Constraint {
    /// Reports whether this constraint holds for `context`. A missing property never matches.
    pub fn matches(&self, context: &EvaluationContext) -> bool {
        match context.property(&self.property) {
            Some(value) => self
                .operator
                .matches(&value.to_property_string(), &self.value),
            None => false,
        }
    }
}

/// Reports whether `context` satisfies every constraint in the list.
///
/// An empty list matches unconditionally. A context without a property map fails as soon as there
/// is at least one constraint.
pub fn matches_all(constraints: &[Constraint], context: &EvaluationContext) -> bool {
    if constraints.is_empty() {
        return true;
    }
    if !context.has_properties() {
        return false;
    }
    constraints.iter().all(|c| c.matches(context))
}

fn numeric_op<F: Fn(f64, f64) -> bool>(lhs: &str, rhs: &str, f: F) -> bool {
    match (lhs.trim().parse::<f64>(), rhs.trim().parse::<f64>()) {
        (Ok(l), Ok(r)) => f(l, r),
        _ => false,
    }
}

fn in_list(lhs: &str, list: &str) -> bool {
    list.split(',').any(|v| v.trim() == lhs)
}

lazy_static! {
    // Keyed by the raw pattern; None records a pattern that failed to compile.
    static ref REGEX_CACHE: RwLock<HashMap<String, Option<Arc<Regex>>>> =
        RwLock::new(HashMap::new());
}

const REGEX_CACHE_LIMIT: usize = 4096;

/// Full-string match of `text` against `pattern`, or None when the pattern is invalid.
fn regex_op(text: &str, pattern: &str) -> Option<bool> {
    compiled(pattern).map(|re| re.is_match(text))
}

fn compiled(pattern: &str) -> Option<Arc<Regex>> {
    if let Ok(cache) = REGEX_CACHE.read() {
        if let Some(entry) = cache.get(pattern) {
            return entry.clone();
        }
    }

    let entry = match Regex::new(&format!("^(?:{})$", pattern)) {
        Ok(re) => Some(Arc::new(re)),
        Err(e) => {
            warn!("Invalid regex for 'EREG' operator ({}): {}", e, pattern);
            None
        }
    };

    if let Ok(mut cache) = REGEX_CACHE.write() {
        if cache.len() >= REGEX_CACHE_LIMIT {
            cache.clear();
        }
        cache.insert(pattern.to_string(), entry.clone());
    }
    entry
}
