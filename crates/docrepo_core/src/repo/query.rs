//! Query inputs for repository reads.
//!
//! # Responsibility
//! - Combine filter objects and where predicates into `Criteria`.
//! - Carry ordering, paging and equality joins in `FindOptions`.

use crate::db::CollectionHandle;
use crate::engine::{FieldOp, Filter, FilterError, JoinMapFn, ResultSet};
use crate::model::document::{Document, DELETED_FIELD, ID_FIELD};
use crate::repo::repository::{RepoError, RepoResult};
use crate::sort::Order;
use serde_json::Value;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub type Predicate = Box<dyn Fn(&Document) -> bool + Send + Sync>;

/// Filter object plus where predicates, all of which must match.
#[derive(Default)]
pub struct Criteria {
    filter: Filter,
    predicates: Vec<Predicate>,
}

impl Criteria {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            predicates: Vec::new(),
        }
    }

    /// Parses a JSON filter object such as `{ "kind": "cow" }`.
    pub fn parse(value: &Value) -> Result<Self, FilterError> {
        Ok(Self::new(Filter::parse(value)?))
    }

    pub fn by_id(id: &str) -> Self {
        Self::new(Filter::eq(ID_FIELD, id))
    }

    /// Documents without the soft-delete tombstone.
    pub fn not_deleted() -> Self {
        Self::new(Filter::Field {
            path: DELETED_FIELD.to_string(),
            op: FieldOp::Ne(Value::Bool(true)),
        })
    }

    /// Adds a where predicate.
    pub fn and_where(
        mut self,
        predicate: impl Fn(&Document) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Conjunction of two criteria.
    pub fn and(mut self, other: Criteria) -> Self {
        self.filter = match (self.filter, other.filter) {
            (Filter::All, filter) | (filter, Filter::All) => filter,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), right) => {
                left.push(right);
                Filter::And(left)
            }
            (left, right) => Filter::And(vec![left, right]),
        };
        self.predicates.extend(other.predicates);
        self
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filter.matches(doc) && self.predicates.iter().all(|predicate| predicate(doc))
    }

    /// Narrows a result set: filter object first, then each predicate.
    pub fn apply(&self, rows: ResultSet) -> ResultSet {
        self.predicates
            .iter()
            .fold(rows.find(&self.filter), |rows, predicate| {
                rows.filter(|doc| predicate(doc))
            })
    }
}

impl Debug for Criteria {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Criteria")
            .field("filter", &self.filter)
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

/// Right-hand side of an equality join.
#[derive(Debug, Clone)]
pub enum JoinSource {
    Documents(Vec<Document>),
    Collection(CollectionHandle),
}

impl JoinSource {
    /// Snapshots the right-hand documents.
    pub fn documents(&self) -> RepoResult<Vec<Document>> {
        match self {
            Self::Documents(docs) => Ok(docs.clone()),
            Self::Collection(handle) => {
                let collection = handle
                    .lock()
                    .map_err(|_| RepoError::Poisoned("join source".to_string()))?;
                Ok(collection.iter().cloned().collect())
            }
        }
    }
}

/// Equality join applied before filtering.
#[derive(Clone)]
pub struct EqJoin {
    pub source: JoinSource,
    pub left_key: String,
    pub right_key: String,
    pub map: Option<JoinMapFn>,
}

impl EqJoin {
    pub fn new(source: JoinSource, left_key: impl Into<String>, right_key: impl Into<String>) -> Self {
        Self {
            source,
            left_key: left_key.into(),
            right_key: right_key.into(),
            map: None,
        }
    }

    pub fn with_map(
        mut self,
        map: impl Fn(&Document, Option<&Document>) -> Document + Send + Sync + 'static,
    ) -> Self {
        self.map = Some(Arc::new(map));
        self
    }
}

impl Debug for EqJoin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EqJoin")
            .field("source", &self.source)
            .field("left_key", &self.left_key)
            .field("right_key", &self.right_key)
            .field("map", &self.map.is_some())
            .finish()
    }
}

/// Ordering, paging and joins for `find`.
///
/// `limit` is applied before `offset`, so `limit(3).offset(2)` yields at
/// most one row. `Some(0)` for either behaves like `None`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub order: Option<Order>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub joins: Vec<EqJoin>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order(mut self, order: impl Into<Order>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn join(mut self, join: EqJoin) -> Self {
        self.joins.push(join);
        self
    }
}
