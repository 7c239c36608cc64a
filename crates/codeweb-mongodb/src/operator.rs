//! Simplified query operators.
//!
//! A condition key of the form `field__operator` names one of the operators
//! below. Each operator is a pure transform from the condition value to the
//! clause stored under `field` in the native filter.

use bson::{doc, Bson};
use std::fmt;
use std::str::FromStr;

/// Separator between the field name and the operator in a condition key.
pub const SEPARATOR: &str = "__";

/// Query operators understood by the simplified condition syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Implicit equality, value used as-is
    Eq,
    /// `$ne`
    Ne,
    /// `$gt`
    Gt,
    /// `$gte`
    Gte,
    /// `$lt`
    Lt,
    /// `$lte`
    Lte,
    /// `$in`, scalar wrapped in an array
    In,
    /// `$nin`, scalar wrapped in an array
    Nin,
    /// `$exists`
    Exists,
    /// Case-insensitive `$regex`
    Regex,
    /// Case-insensitive `$regex` with the raw value as pattern
    Contains,
    /// Case-insensitive `$regex` anchored at the start
    StartsWith,
    /// Case-insensitive `$regex` anchored at the end
    EndsWith,
    /// `$all`, scalar wrapped in an array
    All,
    /// `$size`
    Size,
}

/// Name table used to resolve the operator suffix of a condition key.
const OPERATORS: &[(&str, Operator)] = &[
    ("eq", Operator::Eq),
    ("ne", Operator::Ne),
    ("gt", Operator::Gt),
    ("gte", Operator::Gte),
    ("lt", Operator::Lt),
    ("lte", Operator::Lte),
    ("in", Operator::In),
    ("nin", Operator::Nin),
    ("exists", Operator::Exists),
    ("regex", Operator::Regex),
    ("contains", Operator::Contains),
    ("starts_with", Operator::StartsWith),
    ("ends_with", Operator::EndsWith),
    ("all", Operator::All),
    ("size", Operator::Size),
];

impl Operator {
    /// All operators, in table order.
    pub fn all() -> impl Iterator<Item = Operator> {
        OPERATORS.iter().map(|(_, op)| *op)
    }

    /// Looks up an operator by its suffix name. Unknown names return `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        OPERATORS
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, op)| *op)
    }

    /// Returns the suffix name of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::Nin => "nin",
            Operator::Exists => "exists",
            Operator::Regex => "regex",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::All => "all",
            Operator::Size => "size",
        }
    }

    /// Builds the clause for `value`.
    ///
    /// Pattern operators interpolate the value unescaped, so regex
    /// metacharacters in the value keep their regex meaning.
    pub fn apply(&self, value: Bson) -> Bson {
        match self {
            Operator::Eq => value,
            Operator::Ne => Bson::Document(doc! { "$ne": value }),
            Operator::Gt => Bson::Document(doc! { "$gt": value }),
            Operator::Gte => Bson::Document(doc! { "$gte": value }),
            Operator::Lt => Bson::Document(doc! { "$lt": value }),
            Operator::Lte => Bson::Document(doc! { "$lte": value }),
            Operator::In => Bson::Document(doc! { "$in": into_array(value) }),
            Operator::Nin => Bson::Document(doc! { "$nin": into_array(value) }),
            Operator::Exists => Bson::Document(doc! { "$exists": value }),
            Operator::Regex | Operator::Contains => case_insensitive(value),
            Operator::StartsWith => {
                case_insensitive(Bson::String(format!("^{}", pattern_text(&value))))
            }
            Operator::EndsWith => {
                case_insensitive(Bson::String(format!("{}$", pattern_text(&value))))
            }
            Operator::All => Bson::Document(doc! { "$all": into_array(value) }),
            Operator::Size => Bson::Document(doc! { "$size": value }),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("Unknown query operator: {}", s))
    }
}

fn into_array(value: Bson) -> Bson {
    match value {
        Bson::Array(_) => value,
        other => Bson::Array(vec![other]),
    }
}

fn case_insensitive(pattern: Bson) -> Bson {
    Bson::Document(doc! { "$regex": pattern, "$options": "i" })
}

// Strings interpolate their raw text; other values use their display form.
fn pattern_text(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}
