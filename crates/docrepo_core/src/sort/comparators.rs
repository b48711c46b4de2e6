//! Field-type-aware comparators for query results.
//!
//! # Responsibility
//! - Build generic (natural), date and numeric comparators for one field.
//! - Build comparators for transformation-based orders.
//!
//! # Invariants
//! - Falsy values sort last regardless of direction: a falsy left operand
//!   orders after the right one and vice versa. This is a UI convenience
//!   (incomplete records sink to the end), not a general sorting law.
//! - Two falsy operands compare equal so every comparator is a total order.
//! - The generic and numeric comparators treat missing, null, `false`,
//!   `""`, numeric zero and the literal string `"0"` as falsy.
//! - The date comparator is strict: numeric zero is a valid date (epoch 0).

use crate::engine::compare::{compare_f64, number_to_string};
use crate::model::document::{is_truthy, Document};
use crate::sort::natural::natural_cmp;
use crate::sort::order::{TransformKind, TransformOrder};
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

static FLOAT_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[+-]?(?:Infinity|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)")
        .expect("valid float prefix regex")
});

const NAIVE_DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq)]
enum GenericKey {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
enum NumericKey {
    Number(f64),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
enum DateKey {
    Instant(i64),
    Text(String),
}

/// Generic comparator: numbers numerically, text in natural order.
pub fn natural_sort(
    field: impl Into<String>,
    descending: bool,
) -> impl Fn(&Document, &Document) -> Ordering {
    let field = field.into();
    move |a, b| {
        falsy_last(
            generic_key(a.get(&field)),
            generic_key(b.get(&field)),
            descending,
            compare_generic,
        )
    }
}

/// Numeric comparator: numeric prefix parse with raw-value fallback.
pub fn number_sort(
    field: impl Into<String>,
    descending: bool,
) -> impl Fn(&Document, &Document) -> Ordering {
    let field = field.into();
    move |a, b| {
        falsy_last(
            numeric_key(a.get(&field)),
            numeric_key(b.get(&field)),
            descending,
            compare_numeric,
        )
    }
}

/// Date comparator over a dotted path.
///
/// `field` may take the form `date+days`: the date read from `date` is
/// shifted by the whole number of days stored in `days` before comparing.
pub fn date_sort(
    field: impl Into<String>,
    descending: bool,
) -> impl Fn(&Document, &Document) -> Ordering {
    let field = field.into();
    let (date_field, offset_field) = match field.split_once('+') {
        Some((date, offset)) => (date.to_string(), Some(offset.to_string())),
        None => (field, None),
    };
    move |a, b| {
        falsy_last(
            date_key(a, &date_field, offset_field.as_deref()),
            date_key(b, &date_field, offset_field.as_deref()),
            descending,
            compare_date,
        )
    }
}

/// Comparator for a transformation order: documents are transformed first,
/// then the order's field is compared by numeric or natural rules.
pub fn transform_sort(order: &TransformOrder) -> impl Fn(&Document, &Document) -> Ordering {
    let order = order.clone();
    let numeric = number_sort(order.field.clone(), order.descending);
    move |a, b| {
        let (a, b) = ((order.transformation)(a), (order.transformation)(b));
        match order.kind {
            TransformKind::Number => numeric(&a, &b),
            TransformKind::Natural => falsy_last(
                text_key(a.get(&order.field)),
                text_key(b.get(&order.field)),
                order.descending,
                |x: &String, y: &String| natural_cmp(x, y),
            ),
        }
    }
}

/// Parses the leading numeric prefix of a value the way a lenient
/// `parseFloat` would: `"12kg"` is 12, `"kg12"` is not a number.
pub fn parse_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_float_prefix(text),
        _ => None,
    }
}

pub fn parse_float_prefix(text: &str) -> Option<f64> {
    let matched = FLOAT_PREFIX_RE.find(text)?.as_str().trim();
    match matched.trim_start_matches(['+', '-']) {
        "Infinity" if matched.starts_with('-') => Some(f64::NEG_INFINITY),
        "Infinity" => Some(f64::INFINITY),
        _ => matched.parse::<f64>().ok(),
    }
}

fn falsy_last<K>(
    a: Option<K>,
    b: Option<K>,
    descending: bool,
    compare: impl Fn(&K, &K) -> Ordering,
) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ordering = compare(&a, &b);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
    }
}

fn non_zero_number(value: &Value) -> Option<f64> {
    parse_float(value).filter(|number| *number != 0.0 && !number.is_nan())
}

fn generic_key(value: Option<&Value>) -> Option<GenericKey> {
    let value = value?;
    if let Some(number) = non_zero_number(value) {
        return Some(GenericKey::Number(number));
    }
    let text = match value {
        Value::String(text) => text.to_lowercase(),
        Value::Bool(true) => "true".to_string(),
        Value::Null | Value::Bool(false) | Value::Number(_) => return None,
        other => other.to_string().to_lowercase(),
    };
    if text.is_empty() || text == "0" {
        None
    } else {
        Some(GenericKey::Text(text))
    }
}

fn compare_generic(a: &GenericKey, b: &GenericKey) -> Ordering {
    match (a, b) {
        (GenericKey::Number(x), GenericKey::Number(y)) => compare_f64(*x, *y),
        (GenericKey::Text(x), GenericKey::Text(y)) => natural_cmp(x, y),
        (GenericKey::Number(_), GenericKey::Text(_)) => Ordering::Less,
        (GenericKey::Text(_), GenericKey::Number(_)) => Ordering::Greater,
    }
}

fn numeric_key(value: Option<&Value>) -> Option<NumericKey> {
    let value = value?;
    if let Some(number) = non_zero_number(value) {
        return Some(NumericKey::Number(number));
    }
    if !is_truthy(value) {
        return None;
    }
    match value {
        Value::String(text) if text == "0" => None,
        Value::String(text) => Some(NumericKey::Raw(text.clone())),
        other => Some(NumericKey::Raw(other.to_string())),
    }
}

fn compare_numeric(a: &NumericKey, b: &NumericKey) -> Ordering {
    match (a, b) {
        (NumericKey::Number(x), NumericKey::Number(y)) => compare_f64(*x, *y),
        (NumericKey::Raw(x), NumericKey::Raw(y)) => x.cmp(y),
        (NumericKey::Number(_), NumericKey::Raw(_)) => Ordering::Less,
        (NumericKey::Raw(_), NumericKey::Number(_)) => Ordering::Greater,
    }
}

fn date_key(doc: &Document, date_field: &str, offset_field: Option<&str>) -> Option<DateKey> {
    let key = match doc.get_path(date_field)? {
        Value::Null | Value::Bool(false) => return None,
        Value::Number(number) => DateKey::Instant(number.as_f64().filter(|n| !n.is_nan())? as i64),
        Value::String(text) if text.is_empty() => return None,
        Value::String(text) => match parse_date_ms(text) {
            Some(ms) => DateKey::Instant(ms),
            None => DateKey::Text(text.clone()),
        },
        other => DateKey::Text(other.to_string()),
    };

    let days = offset_field
        .and_then(|field| doc.get_path(field))
        .and_then(parse_float)
        .filter(|days| days.is_finite())
        .map_or(0, |days| days.trunc() as i64);

    Some(match key {
        DateKey::Instant(ms) if days != 0 => DateKey::Instant(add_days(ms, days)),
        other => other,
    })
}

fn compare_date(a: &DateKey, b: &DateKey) -> Ordering {
    match (a, b) {
        (DateKey::Instant(x), DateKey::Instant(y)) => x.cmp(y),
        (DateKey::Text(x), DateKey::Text(y)) => x.cmp(y),
        (DateKey::Instant(_), DateKey::Text(_)) => Ordering::Less,
        (DateKey::Text(_), DateKey::Instant(_)) => Ordering::Greater,
    }
}

fn text_key(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => number.as_f64().map(number_to_string),
        other => Some(other.to_string()),
    }
}

/// Parses RFC 3339, naive date-time (treated as UTC) or plain `YYYY-MM-DD`.
fn parse_date_ms(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp_millis());
    }
    for format in NAIVE_DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp_millis())
}

fn add_days(ms: i64, days: i64) -> i64 {
    const DAY_MS: i64 = 86_400_000;
    let shifted = DateTime::<Utc>::from_timestamp_millis(ms).and_then(|instant| {
        if days >= 0 {
            instant.checked_add_days(Days::new(days.unsigned_abs()))
        } else {
            instant.checked_sub_days(Days::new(days.unsigned_abs()))
        }
    });
    match shifted {
        Some(instant) => instant.timestamp_millis(),
        None => ms.saturating_add(days.saturating_mul(DAY_MS)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    fn sorted_ids(
        mut docs: Vec<Document>,
        comparator: impl Fn(&Document, &Document) -> Ordering,
    ) -> Vec<String> {
        docs.sort_by(|a, b| comparator(a, b));
        docs.iter()
            .map(|doc| doc.id().unwrap_or("").to_string())
            .collect()
    }

    #[test]
    fn parse_float_prefix_matches_lenient_parse() {
        assert_eq!(parse_float_prefix("12.5kg"), Some(12.5));
        assert_eq!(parse_float_prefix("  -3e2x"), Some(-300.0));
        assert_eq!(parse_float_prefix(".5"), Some(0.5));
        assert_eq!(parse_float_prefix("item2"), None);
        assert_eq!(parse_float_prefix("-Infinity"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_float(&json!(true)), None);
    }

    #[test]
    fn natural_sort_orders_labels_by_digit_runs() {
        let docs = vec![
            doc(json!({ "id": "item2", "label": "item2" })),
            doc(json!({ "id": "item10", "label": "item10" })),
            doc(json!({ "id": "item1", "label": "item1" })),
        ];
        assert_eq!(
            sorted_ids(docs.clone(), natural_sort("label", false)),
            vec!["item1", "item2", "item10"]
        );
        assert_eq!(
            sorted_ids(docs, natural_sort("label", true)),
            vec!["item10", "item2", "item1"]
        );
    }

    #[test]
    fn natural_sort_is_case_insensitive_and_numeric_first() {
        let docs = vec![
            doc(json!({ "id": "b", "name": "Bella" })),
            doc(json!({ "id": "a", "name": "alma" })),
            doc(json!({ "id": "n", "name": "12" })),
        ];
        assert_eq!(
            sorted_ids(docs, natural_sort("name", false)),
            vec!["n", "a", "b"]
        );
    }

    #[test]
    fn falsy_values_sort_last_in_both_directions() {
        let docs = vec![
            doc(json!({ "id": "zero-text", "tag": "0" })),
            doc(json!({ "id": "x", "tag": "x" })),
            doc(json!({ "id": "missing" })),
            doc(json!({ "id": "a", "tag": "a" })),
            doc(json!({ "id": "empty", "tag": "" })),
        ];
        for descending in [false, true] {
            let ids = sorted_ids(docs.clone(), natural_sort("tag", descending));
            let expected_head = if descending { ["x", "a"] } else { ["a", "x"] };
            assert_eq!(&ids[..2], &expected_head);
            assert_eq!(&ids[2..], &["zero-text", "missing", "empty"]);
        }
    }

    #[test]
    fn number_sort_parses_prefixes_and_sinks_zeroes() {
        let docs = vec![
            doc(json!({ "id": "heavy", "weight": "310kg" })),
            doc(json!({ "id": "zero", "weight": 0 })),
            doc(json!({ "id": "light", "weight": 95.5 })),
            doc(json!({ "id": "zero-text", "weight": "0" })),
            doc(json!({ "id": "mid", "weight": "120" })),
        ];
        assert_eq!(
            sorted_ids(docs.clone(), number_sort("weight", false)),
            vec!["light", "mid", "heavy", "zero", "zero-text"]
        );
        assert_eq!(
            sorted_ids(docs, number_sort("weight", true)),
            vec!["heavy", "mid", "light", "zero", "zero-text"]
        );
    }

    #[test]
    fn date_sort_keeps_numeric_zero_but_generic_drops_it() {
        let docs = vec![
            doc(json!({ "id": "later", "at": 5_000 })),
            doc(json!({ "id": "epoch", "at": 0 })),
            doc(json!({ "id": "text-zero", "at": "0" })),
        ];

        let by_date = sorted_ids(docs.clone(), date_sort("at", false));
        assert_eq!(by_date[0], "epoch");
        assert_eq!(by_date[1], "later");

        let generic = sorted_ids(docs, natural_sort("at", false));
        assert_eq!(generic[0], "later");
        assert!(generic[1..].contains(&"epoch".to_string()));
        assert!(generic[1..].contains(&"text-zero".to_string()));
    }

    #[test]
    fn date_sort_applies_day_offsets() {
        let docs = vec![
            doc(json!({ "id": "plus3", "dueDate": "2024-03-01", "daysAdded": 3 })),
            doc(json!({ "id": "plus0", "dueDate": "2024-03-01", "daysAdded": 0 })),
            doc(json!({ "id": "early", "dueDate": "2024-03-02T08:00:00Z", "daysAdded": "1" })),
        ];
        assert_eq!(
            sorted_ids(docs, date_sort("dueDate+daysAdded", false)),
            vec!["plus0", "early", "plus3"]
        );
    }

    #[test]
    fn date_sort_reads_nested_paths_and_sinks_missing() {
        let docs = vec![
            doc(json!({ "id": "none" })),
            doc(json!({ "id": "new", "health": { "checked": "2024-05-01" } })),
            doc(json!({ "id": "old", "health": { "checked": "2023-01-01 10:00:00" } })),
        ];
        assert_eq!(
            sorted_ids(docs, date_sort("health.checked", true)),
            vec!["new", "old", "none"]
        );
    }

    #[test]
    fn transform_sort_compares_transformed_fields() {
        let order = TransformOrder::new("score", TransformKind::Number, true, |doc: &Document| {
            let total = ["a", "b"]
                .iter()
                .filter_map(|field| doc.get(field).and_then(Value::as_f64))
                .sum::<f64>();
            doc.clone().with("score", total)
        });
        let docs = vec![
            doc(json!({ "id": "low", "a": 1, "b": 1 })),
            doc(json!({ "id": "high", "a": 5, "b": 4 })),
            doc(json!({ "id": "none" })),
        ];
        assert_eq!(
            sorted_ids(docs, transform_sort(&order)),
            vec!["high", "low", "none"]
        );
    }

    #[test]
    fn transform_sort_natural_kind() {
        let order = TransformOrder::new("code", TransformKind::Natural, false, |doc: &Document| {
            let code = doc.get("raw").and_then(Value::as_str).unwrap_or("").trim().to_string();
            doc.clone().with("code", code)
        });
        let docs = vec![
            doc(json!({ "id": "b", "raw": " pen10 " })),
            doc(json!({ "id": "a", "raw": "pen9" })),
        ];
        assert_eq!(sorted_ids(docs, transform_sort(&order)), vec!["a", "b"]);
    }

    #[test]
    fn transform_sort_natural_kind_descends_and_keeps_missing_last() {
        let order = TransformOrder::new("code", TransformKind::Natural, true, |doc: &Document| {
            match doc.get("raw") {
                Some(raw) => Document::new().with("code", raw.clone()),
                None => Document::new(),
            }
        });
        let docs = vec![
            doc(json!({ "id": "none" })),
            doc(json!({ "id": "nine", "raw": "pen9" })),
            doc(json!({ "id": "ten", "raw": "pen10" })),
        ];
        assert_eq!(
            sorted_ids(docs, transform_sort(&order)),
            vec!["ten", "nine", "none"]
        );
    }
}
