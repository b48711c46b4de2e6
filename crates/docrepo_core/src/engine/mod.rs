//! Embedded in-memory collection engine.
//!
//! # Responsibility
//! - Hold named document collections with `seq` identity and revision meta.
//! - Provide filter objects, where predicates and chained result sets with
//!   sorting, paging and equality joins.
//! - Track pending changes so the store can mirror collections to SQLite.
//!
//! # Invariants
//! - Query results are copies; stored documents change only through
//!   `Collection` mutation methods.

pub mod collection;
pub mod compare;
pub mod filter;
pub mod result_set;

pub use collection::{
    Collection, CollectionEvent, EngineError, EngineResult, EventListener, PendingChanges,
};
pub use filter::{FieldOp, Filter, FilterError};
pub use result_set::{JoinMapFn, ResultSet, SortKey};
