//! Filter objects for `find` queries.
//!
//! # Responsibility
//! - Parse JSON filter objects (`{ "field": value, "other": { "$gt": 3 } }`).
//! - Evaluate parsed filters against documents.
//!
//! # Invariants
//! - A bare value means strict equality (`$eq`).
//! - Several conditions in one object are combined with AND.
//! - Field names may be dotted paths into nested objects.
//! - Range operators never match a missing field.

use crate::engine::compare::{compare_values, values_equal};
use crate::model::document::Document;
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Parse error for filter objects.
#[derive(Debug)]
pub enum FilterError {
    NotAnObject,
    UnknownOperator(String),
    InvalidOperand { op: String, reason: &'static str },
    InvalidRegex { pattern: String, message: String },
}

impl Display for FilterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "filter must be a JSON object"),
            Self::UnknownOperator(op) => write!(f, "unknown filter operator `{op}`"),
            Self::InvalidOperand { op, reason } => {
                write!(f, "invalid operand for `{op}`: {reason}")
            }
            Self::InvalidRegex { pattern, message } => {
                write!(f, "invalid regex `{pattern}`: {message}")
            }
        }
    }
}

impl Error for FilterError {}

/// Comparison applied to one field.
#[derive(Debug, Clone)]
pub enum FieldOp {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Regex(Regex),
    Contains(Value),
}

/// Parsed filter tree.
#[derive(Debug, Clone, Default)]
pub enum Filter {
    /// Matches every document.
    #[default]
    All,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Field { path: String, op: FieldOp },
}

impl Filter {
    /// Parses a JSON filter object.
    ///
    /// An empty object parses to `Filter::All`.
    pub fn parse(value: &Value) -> Result<Self, FilterError> {
        match value {
            Value::Object(map) => parse_object(map),
            Value::Null => Ok(Self::All),
            _ => Err(FilterError::NotAnObject),
        }
    }

    /// Equality on one field.
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Field {
            path: path.into(),
            op: FieldOp::Eq(value.into()),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::All => true,
            Self::And(parts) => parts.iter().all(|part| part.matches(doc)),
            Self::Or(parts) => parts.iter().any(|part| part.matches(doc)),
            Self::Field { path, op } => op.matches(doc.get_path(path)),
        }
    }
}

impl FieldOp {
    fn matches(&self, actual: Option<&Value>) -> bool {
        match self {
            Self::Eq(expected) => actual.is_some_and(|value| values_equal(value, expected)),
            Self::Ne(expected) => !actual.is_some_and(|value| values_equal(value, expected)),
            Self::Gt(bound) => range_match(actual, bound, |ord| ord == Ordering::Greater),
            Self::Gte(bound) => range_match(actual, bound, |ord| ord != Ordering::Less),
            Self::Lt(bound) => range_match(actual, bound, |ord| ord == Ordering::Less),
            Self::Lte(bound) => range_match(actual, bound, |ord| ord != Ordering::Greater),
            Self::In(options) => actual
                .is_some_and(|value| options.iter().any(|option| values_equal(value, option))),
            Self::Nin(options) => !actual
                .is_some_and(|value| options.iter().any(|option| values_equal(value, option))),
            Self::Exists(expected) => actual.is_some() == *expected,
            Self::Regex(regex) => matches!(actual, Some(Value::String(text)) if regex.is_match(text)),
            Self::Contains(needle) => match (actual, needle) {
                (Some(Value::Array(items)), _) => items.iter().any(|item| values_equal(item, needle)),
                (Some(Value::String(text)), Value::String(part)) => text.contains(part.as_str()),
                _ => false,
            },
        }
    }
}

fn range_match(actual: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match actual {
        Some(Value::Null) | None => false,
        Some(value) if same_kind(value, bound) => accept(compare_values(Some(value), Some(bound))),
        Some(_) => false,
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

fn parse_object(map: &Map<String, Value>) -> Result<Filter, FilterError> {
    let mut parts = Vec::with_capacity(map.len());
    for (key, value) in map {
        match key.as_str() {
            "$and" => parts.push(Filter::And(parse_list("$and", value)?)),
            "$or" => parts.push(Filter::Or(parse_list("$or", value)?)),
            op if op.starts_with('$') => return Err(FilterError::UnknownOperator(op.to_string())),
            path => parse_field(path, value, &mut parts)?,
        }
    }

    Ok(match parts.len() {
        0 => Filter::All,
        1 => parts.remove(0),
        _ => Filter::And(parts),
    })
}

fn parse_list(op: &str, value: &Value) -> Result<Vec<Filter>, FilterError> {
    let Value::Array(items) = value else {
        return Err(FilterError::InvalidOperand {
            op: op.to_string(),
            reason: "expected an array of filter objects",
        });
    };
    items.iter().map(Filter::parse).collect()
}

fn parse_field(path: &str, value: &Value, parts: &mut Vec<Filter>) -> Result<(), FilterError> {
    let operators = match value {
        Value::Object(map) if !map.is_empty() && map.keys().all(|key| key.starts_with('$')) => map,
        other => {
            parts.push(Filter::eq(path, other.clone()));
            return Ok(());
        }
    };

    for (op, operand) in operators {
        let field_op = match op.as_str() {
            "$eq" => FieldOp::Eq(operand.clone()),
            "$ne" => FieldOp::Ne(operand.clone()),
            "$gt" => FieldOp::Gt(operand.clone()),
            "$gte" => FieldOp::Gte(operand.clone()),
            "$lt" => FieldOp::Lt(operand.clone()),
            "$lte" => FieldOp::Lte(operand.clone()),
            "$in" => FieldOp::In(expect_array(op, operand)?),
            "$nin" => FieldOp::Nin(expect_array(op, operand)?),
            "$exists" => match operand {
                Value::Bool(flag) => FieldOp::Exists(*flag),
                _ => {
                    return Err(FilterError::InvalidOperand {
                        op: op.clone(),
                        reason: "expected a boolean",
                    })
                }
            },
            "$regex" => {
                let Value::String(pattern) = operand else {
                    return Err(FilterError::InvalidOperand {
                        op: op.clone(),
                        reason: "expected a pattern string",
                    });
                };
                let regex = Regex::new(pattern).map_err(|err| FilterError::InvalidRegex {
                    pattern: pattern.clone(),
                    message: err.to_string(),
                })?;
                FieldOp::Regex(regex)
            }
            "$contains" => FieldOp::Contains(operand.clone()),
            other => return Err(FilterError::UnknownOperator(other.to_string())),
        };
        parts.push(Filter::Field {
            path: path.to_string(),
            op: field_op,
        });
    }
    Ok(())
}

fn expect_array(op: &str, operand: &Value) -> Result<Vec<Value>, FilterError> {
    match operand {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(FilterError::InvalidOperand {
            op: op.to_string(),
            reason: "expected an array",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    #[test]
    fn bare_values_mean_equality() {
        let filter = Filter::parse(&json!({ "kind": "cow", "age": 3 })).unwrap();
        assert!(filter.matches(&doc(json!({ "kind": "cow", "age": 3.0 }))));
        assert!(!filter.matches(&doc(json!({ "kind": "cow", "age": 4 }))));
    }

    #[test]
    fn empty_object_matches_everything() {
        let filter = Filter::parse(&json!({})).unwrap();
        assert!(filter.is_all());
        assert!(filter.matches(&Document::new()));
    }

    #[test]
    fn ne_matches_missing_fields() {
        let filter = Filter::parse(&json!({ "deleted": { "$ne": true } })).unwrap();
        assert!(filter.matches(&doc(json!({ "id": "a" }))));
        assert!(!filter.matches(&doc(json!({ "deleted": true }))));
    }

    #[test]
    fn range_operators_combine_with_and() {
        let filter = Filter::parse(&json!({ "weight": { "$gte": 100, "$lt": 200 } })).unwrap();
        assert!(filter.matches(&doc(json!({ "weight": 150 }))));
        assert!(!filter.matches(&doc(json!({ "weight": 200 }))));
        assert!(!filter.matches(&doc(json!({ "weight": "150" }))));
        assert!(!filter.matches(&doc(json!({}))));
    }

    #[test]
    fn or_and_dotted_paths() {
        let filter = Filter::parse(&json!({
            "$or": [{ "owner.name": "ana" }, { "tags": { "$contains": "vip" } }]
        }))
        .unwrap();
        assert!(filter.matches(&doc(json!({ "owner": { "name": "ana" } }))));
        assert!(filter.matches(&doc(json!({ "tags": ["vip"] }))));
        assert!(!filter.matches(&doc(json!({ "owner": { "name": "bo" } }))));
    }

    #[test]
    fn regex_in_and_exists() {
        let filter = Filter::parse(&json!({
            "name": { "$regex": "^Be" },
            "kind": { "$in": ["cow", "goat"] },
            "sold": { "$exists": false }
        }))
        .unwrap();
        assert!(filter.matches(&doc(json!({ "name": "Bella", "kind": "goat" }))));
        assert!(!filter.matches(&doc(json!({ "name": "Bella", "kind": "goat", "sold": 1 }))));
    }

    #[test]
    fn rejects_unknown_operators_and_bad_regex() {
        assert!(matches!(
            Filter::parse(&json!({ "a": { "$near": 1 } })),
            Err(FilterError::UnknownOperator(op)) if op == "$near"
        ));
        assert!(matches!(
            Filter::parse(&json!({ "a": { "$regex": "(" } })),
            Err(FilterError::InvalidRegex { .. })
        ));
        assert!(matches!(Filter::parse(&json!(3)), Err(FilterError::NotAnObject)));
    }
}
