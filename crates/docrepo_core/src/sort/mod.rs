//! Result ordering: comparators, order specifiers and the selector.
//!
//! # Responsibility
//! - Compare documents by field with type-aware rules (generic, date,
//!   numeric, transformed).
//! - Turn caller order specifiers into engine sorts.
//!
//! # Invariants
//! - Comparators are total orders, so stable sorts never reorder equal rows.

pub mod comparators;
pub mod natural;
pub mod order;

pub use comparators::{date_sort, natural_sort, number_sort, transform_sort};
pub use natural::natural_cmp;
pub use order::{
    FieldKind, FieldOrder, Order, SortConfig, SortPlan, TransformFn, TransformKind,
    TransformOrder,
};
