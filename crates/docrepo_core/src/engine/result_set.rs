//! Chained query construction over a collection snapshot.
//!
//! A `ResultSet` owns copies of the documents it ranges over, so callers can
//! keep chaining after the collection lock is released and never mutate
//! stored state through query results.

use crate::engine::compare::{compare_values, join_key};
use crate::engine::filter::Filter;
use crate::model::document::Document;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds the output document of an equality join from a left document and
/// its matching right document, if any.
pub type JoinMapFn = Arc<dyn Fn(&Document, Option<&Document>) -> Document + Send + Sync>;

/// One sort key of a compound sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn new(field: impl Into<String>, descending: bool) -> Self {
        Self {
            field: field.into(),
            descending,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    rows: Vec<Document>,
}

impl ResultSet {
    pub fn new(rows: Vec<Document>) -> Self {
        Self { rows }
    }

    /// Keeps rows matching a filter object.
    pub fn find(mut self, filter: &Filter) -> Self {
        if !filter.is_all() {
            self.rows.retain(|doc| filter.matches(doc));
        }
        self
    }

    /// Keeps rows matching a predicate.
    pub fn filter(mut self, predicate: impl Fn(&Document) -> bool) -> Self {
        self.rows.retain(|doc| predicate(doc));
        self
    }

    /// Stable sort with a caller comparator.
    pub fn sort_by(mut self, comparator: impl Fn(&Document, &Document) -> Ordering) -> Self {
        self.rows.sort_by(|a, b| comparator(a, b));
        self
    }

    /// Sorts by one field with the engine's built-in value ordering.
    pub fn simple_sort(self, field: &str, descending: bool) -> Self {
        self.compound_sort(&[SortKey::new(field, descending)])
    }

    /// Sorts by several fields in priority order.
    pub fn compound_sort(mut self, keys: &[SortKey]) -> Self {
        self.rows.sort_by(|a, b| {
            keys.iter()
                .map(|key| {
                    let ordering =
                        compare_values(a.get_path(&key.field), b.get_path(&key.field));
                    if key.descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        self
    }

    /// Skips the first `count` rows.
    pub fn offset(mut self, count: usize) -> Self {
        self.rows.drain(..count.min(self.rows.len()));
        self
    }

    /// Keeps at most `count` rows.
    pub fn limit(mut self, count: usize) -> Self {
        self.rows.truncate(count);
        self
    }

    /// Pairs each row with the right document whose `right_key` equals the
    /// row's `left_key`. The last right document wins on duplicate keys.
    ///
    /// Without `map` the output is `{ "left": <row>, "right": <match or {}> }`.
    /// Joined rows are projections and carry no `seq`.
    pub fn eq_join(
        mut self,
        right: &[Document],
        left_key: &str,
        right_key: &str,
        map: Option<&JoinMapFn>,
    ) -> Self {
        let mut by_key: HashMap<String, &Document> = HashMap::with_capacity(right.len());
        for doc in right {
            if let Some(value) = doc.get_path(right_key) {
                by_key.insert(join_key(value), doc);
            }
        }

        self.rows = self
            .rows
            .iter()
            .map(|left| {
                let matched = left
                    .get_path(left_key)
                    .and_then(|value| by_key.get(&join_key(value)).copied());
                match map {
                    Some(map) => map(left, matched),
                    None => default_join(left, matched),
                }
            })
            .collect();
        self
    }

    /// Projects every row with `map`, then folds the projections with
    /// `reduce`.
    pub fn map_reduce<M, R, O>(self, map: impl Fn(&Document) -> M, reduce: R) -> O
    where
        R: FnOnce(Vec<M>) -> O,
    {
        let mapped: Vec<M> = self.rows.iter().map(map).collect();
        reduce(mapped)
    }

    pub fn first(self) -> Option<Document> {
        self.rows.into_iter().next()
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Terminal step: returns the rows.
    pub fn data(self) -> Vec<Document> {
        self.rows
    }
}

fn default_join(left: &Document, right: Option<&Document>) -> Document {
    let mut fields = Map::new();
    fields.insert("left".to_string(), left.to_value());
    fields.insert(
        "right".to_string(),
        right.map_or_else(|| Value::Object(Map::new()), Document::to_value),
    );
    Document {
        seq: None,
        meta: None,
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: Vec<Value>) -> ResultSet {
        ResultSet::new(
            values
                .into_iter()
                .map(|value| Document::from_value(value).unwrap())
                .collect(),
        )
    }

    fn names(docs: &[Document]) -> Vec<&str> {
        docs.iter()
            .map(|doc| doc.get("name").and_then(Value::as_str).unwrap_or(""))
            .collect()
    }

    #[test]
    fn simple_sort_handles_mixed_numeric_and_text_codes() {
        let codes: Vec<Value> = (0..60)
            .map(|n| match n % 3 {
                0 => json!({ "code": format!("{}", n % 17) }),
                1 => json!({ "code": format!("{}a", n % 13) }),
                _ => json!({ "code": format!("z{}", n % 7) }),
            })
            .collect();

        let sorted = rows(codes).simple_sort("code", false).data();

        let texts: Vec<&str> = sorted
            .iter()
            .map(|doc| doc.get("code").and_then(Value::as_str).unwrap_or(""))
            .collect();
        let first_text = texts
            .iter()
            .position(|code| code.parse::<f64>().is_err())
            .unwrap();
        assert!(texts[first_text..]
            .iter()
            .all(|code| code.parse::<f64>().is_err()));
        assert!(texts[..first_text]
            .windows(2)
            .all(|pair| pair[0].parse::<f64>().unwrap() <= pair[1].parse::<f64>().unwrap()));
        assert!(texts[first_text..].windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn compound_sort_orders_by_priority_then_name() {
        let sorted = rows(vec![
            json!({ "name": "b", "priority": 1 }),
            json!({ "name": "c", "priority": 2 }),
            json!({ "name": "a", "priority": 1 }),
        ])
        .compound_sort(&[SortKey::new("priority", true), SortKey::new("name", false)])
        .data();

        assert_eq!(names(&sorted), vec!["c", "a", "b"]);
    }

    #[test]
    fn offset_then_limit_pages_rows() {
        let page = rows((0..5).map(|i| json!({ "name": i.to_string() })).collect())
            .offset(1)
            .limit(2)
            .data();
        assert_eq!(names(&page), vec!["1", "2"]);

        let beyond = rows(vec![json!({ "name": "x" })]).offset(10).data();
        assert!(beyond.is_empty());
    }

    #[test]
    fn eq_join_defaults_to_left_right_pairs() {
        let owners = vec![
            Document::from_value(json!({ "id": "o1", "name": "Ana" })).unwrap(),
            Document::from_value(json!({ "id": "o2", "name": "Bo" })).unwrap(),
        ];
        let joined = rows(vec![
            json!({ "name": "cow", "ownerId": "o2" }),
            json!({ "name": "goat", "ownerId": "o9" }),
        ])
        .eq_join(&owners, "ownerId", "id", None)
        .data();

        assert_eq!(joined[0].get_path("right.name"), Some(&json!("Bo")));
        assert_eq!(joined[1].get("right"), Some(&json!({})));
        assert_eq!(joined[1].get_path("left.name"), Some(&json!("goat")));
    }

    #[test]
    fn eq_join_uses_map_function() {
        let owners = vec![Document::from_value(json!({ "id": 1, "name": "Ana" })).unwrap()];
        let map: JoinMapFn = Arc::new(|left, right| {
            let owner = right
                .and_then(|doc| doc.get("name").cloned())
                .unwrap_or(Value::Null);
            left.clone().with("ownerName", owner)
        });
        let joined = rows(vec![json!({ "name": "cow", "ownerId": 1.0 })])
            .eq_join(&owners, "ownerId", "id", Some(&map))
            .data();

        assert_eq!(joined[0].get("ownerName"), Some(&json!("Ana")));
    }

    #[test]
    fn map_reduce_projects_and_folds() {
        let total: i64 = rows(vec![json!({ "n": 2 }), json!({ "n": 3 })]).map_reduce(
            |doc| doc.get("n").and_then(Value::as_i64).unwrap_or(0),
            |values| values.into_iter().sum(),
        );
        assert_eq!(total, 5);
    }
}
