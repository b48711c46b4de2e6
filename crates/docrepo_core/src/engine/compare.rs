//! Built-in value ordering used by simple/compound sorts and range filters.
//!
//! Ordering rules:
//! - missing < null < bool < number < string < array < object
//! - numbers compare numerically
//! - numeric strings sort before other strings and compare by value
//! - other strings compare by code point
//! - arrays and objects of the same kind compare equal

use serde_json::Value;
use std::cmp::Ordering;

/// Compares two optional JSON values with the engine's total order.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (Some(a), Some(b)) => (a, b),
    };

    let rank_order = type_rank(a).cmp(&type_rank(b));
    if rank_order != Ordering::Equal {
        return rank_order;
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(_), Value::Number(_)) => {
            compare_f64(a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0))
        }
        (Value::String(x), Value::String(y)) => match (numeric_text(x), numeric_text(y)) {
            (Some(nx), Some(ny)) => compare_f64(nx, ny).then_with(|| x.cmp(y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => x.cmp(y),
        },
        _ => Ordering::Equal,
    }
}

/// Equality used by filter operators: numbers compare by value, so `1`
/// and `1.0` are equal.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Total order over `f64`; `NaN` sorts after every number.
pub fn compare_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

/// Renders a number the way a JSON/JS consumer prints it (`3`, not `3.0`).
pub fn number_to_string(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Stable string key for a value, used by equality joins.
pub fn join_key(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number_to_string(number.as_f64().unwrap_or(0.0)),
        other => other.to_string(),
    }
}

fn numeric_text(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|number| !number.is_nan())
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_sorts_before_everything() {
        assert_eq!(compare_values(None, Some(&json!(null))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(1)), None), Ordering::Greater);
    }

    #[test]
    fn numeric_strings_compare_by_value() {
        assert_eq!(
            compare_values(Some(&json!("9")), Some(&json!("10"))),
            Ordering::Less
        );
        assert_eq!(
            compare_values(Some(&json!("b")), Some(&json!("a"))),
            Ordering::Greater
        );
    }

    #[test]
    fn numeric_strings_sort_before_other_strings() {
        let cmp = |a: &str, b: &str| compare_values(Some(&json!(a)), Some(&json!(b)));
        assert_eq!(cmp("9", "10"), Ordering::Less);
        assert_eq!(cmp("10", "1a"), Ordering::Less);
        assert_eq!(cmp("9", "1a"), Ordering::Less);
        assert_eq!(cmp("1.0", "1"), Ordering::Greater);
    }

    #[test]
    fn numbers_before_strings() {
        assert_eq!(
            compare_values(Some(&json!(100)), Some(&json!("1"))),
            Ordering::Less
        );
    }

    #[test]
    fn integer_and_float_are_equal() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(!values_equal(&json!(1), &json!("1")));
    }

    #[test]
    fn join_key_prints_integers_without_fraction() {
        assert_eq!(join_key(&json!(3.0)), "3");
        assert_eq!(join_key(&json!(2.5)), "2.5");
        assert_eq!(join_key(&json!("x")), "x");
    }
}
