//! Order specifiers and the comparator selector.
//!
//! # Responsibility
//! - Model order specifiers as a tagged variant (`Order`).
//! - Resolve an `Order` once into a `SortPlan` using `SortConfig`.
//!
//! # Invariants
//! - A leading `-` marks a field descending and is stripped from the name.
//! - Unknown fields resolve to the generic comparator, never to an error.
//! - Field-type routing comes from configuration, not hardcoded names.

use crate::engine::result_set::{ResultSet, SortKey};
use crate::model::document::Document;
use crate::sort::comparators::{date_sort, natural_sort, number_sort, transform_sort};
use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// One field with a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOrder {
    pub field: String,
    pub descending: bool,
}

impl FieldOrder {
    /// Parses `"name"` (ascending) or `"-name"` (descending).
    pub fn parse(spec: &str) -> Self {
        match spec.strip_prefix('-') {
            Some(field) => Self::desc(field),
            None => Self::asc(spec),
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Field name before an optional `+offset` suffix.
    pub fn primary_field(&self) -> &str {
        self.field
            .split_once('+')
            .map_or(self.field.as_str(), |(primary, _)| primary)
    }
}

impl From<&FieldOrder> for SortKey {
    fn from(value: &FieldOrder) -> Self {
        SortKey::new(value.field.clone(), value.descending)
    }
}

/// How transformed values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Number,
    Natural,
}

pub type TransformFn = Arc<dyn Fn(&Document) -> Document + Send + Sync>;

/// Sort by a field of a transformed copy of each document.
#[derive(Clone)]
pub struct TransformOrder {
    pub field: String,
    pub kind: TransformKind,
    pub descending: bool,
    pub transformation: TransformFn,
}

impl TransformOrder {
    pub fn new(
        field: impl Into<String>,
        kind: TransformKind,
        descending: bool,
        transformation: impl Fn(&Document) -> Document + Send + Sync + 'static,
    ) -> Self {
        Self {
            field: field.into(),
            kind,
            descending,
            transformation: Arc::new(transformation),
        }
    }
}

impl Debug for TransformOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformOrder")
            .field("field", &self.field)
            .field("kind", &self.kind)
            .field("descending", &self.descending)
            .finish_non_exhaustive()
    }
}

/// Order specifier accepted by `find`.
#[derive(Debug, Clone)]
pub enum Order {
    Field(FieldOrder),
    Compound(Vec<FieldOrder>),
    Transform(TransformOrder),
}

impl Order {
    pub fn field(spec: &str) -> Self {
        Self::Field(FieldOrder::parse(spec))
    }

    /// Multi-key order; each spec is parsed for its own leading `-`.
    pub fn compound<I, S>(specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Compound(
            specs
                .into_iter()
                .map(|spec| FieldOrder::parse(spec.as_ref()))
                .collect(),
        )
    }
}

impl From<&str> for Order {
    fn from(value: &str) -> Self {
        Self::field(value)
    }
}

impl From<TransformOrder> for Order {
    fn from(value: TransformOrder) -> Self {
        Self::Transform(value)
    }
}

/// Comparator chosen for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Delegate to the engine's built-in single-field sort.
    Engine,
    Date,
    Numeric,
    Generic,
}

/// Comparator selector configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortConfig {
    /// Fields holding dates (epoch ms or ISO-8601 strings).
    pub date_fields: BTreeSet<String>,
    /// Fields holding numbers, possibly as strings with units.
    pub numeric_fields: BTreeSet<String>,
    /// Fields containing this substring use the engine's built-in sort.
    pub passthrough_marker: Option<String>,
}

impl SortConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.date_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_numeric_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.numeric_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_passthrough_marker(mut self, marker: impl Into<String>) -> Self {
        self.passthrough_marker = Some(marker.into());
        self
    }

    pub fn classify(&self, order: &FieldOrder) -> FieldKind {
        if let Some(marker) = self.passthrough_marker.as_deref() {
            if !marker.is_empty() && order.field.contains(marker) {
                return FieldKind::Engine;
            }
        }
        if self.date_fields.contains(order.primary_field()) {
            FieldKind::Date
        } else if self.numeric_fields.contains(&order.field) {
            FieldKind::Numeric
        } else {
            FieldKind::Generic
        }
    }

    /// Resolves an order specifier into an executable plan.
    pub fn resolve(&self, order: &Order) -> SortPlan {
        match order {
            Order::Compound(fields) => SortPlan::Compound(fields.iter().map(SortKey::from).collect()),
            Order::Transform(transform) => SortPlan::Transform(transform.clone()),
            Order::Field(field) => match self.classify(field) {
                FieldKind::Engine => SortPlan::Engine(field.clone()),
                FieldKind::Date => SortPlan::Date(field.clone()),
                FieldKind::Numeric => SortPlan::Numeric(field.clone()),
                FieldKind::Generic => SortPlan::Natural(field.clone()),
            },
        }
    }
}

/// Order resolved to a concrete comparator.
#[derive(Debug, Clone)]
pub enum SortPlan {
    Engine(FieldOrder),
    Natural(FieldOrder),
    Date(FieldOrder),
    Numeric(FieldOrder),
    Compound(Vec<SortKey>),
    Transform(TransformOrder),
}

impl SortPlan {
    pub fn apply(&self, rows: ResultSet) -> ResultSet {
        match self {
            Self::Engine(order) => rows.simple_sort(&order.field, order.descending),
            Self::Natural(order) => rows.sort_by(natural_sort(order.field.clone(), order.descending)),
            Self::Date(order) => rows.sort_by(date_sort(order.field.clone(), order.descending)),
            Self::Numeric(order) => rows.sort_by(number_sort(order.field.clone(), order.descending)),
            Self::Compound(keys) => rows.compound_sort(keys),
            Self::Transform(order) => rows.sort_by(transform_sort(order)),
        }
    }
}
