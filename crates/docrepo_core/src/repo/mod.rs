//! Repository facade over engine collections.
//!
//! # Responsibility
//! - Expose document CRUD, queries and reconciliation per collection.
//! - Keep engine and SQLite details behind one error type.
//!
//! # Invariants
//! - Soft delete sets `deleted = true`; only `remove*`/`clear` drop rows.
//! - Repository APIs return semantic errors (`NotFound`, `NotImplemented`)
//!   in addition to engine and storage errors.

pub mod query;
pub mod reconcile;
pub mod repository;
pub mod view;

pub use query::{Criteria, EqJoin, FindOptions, JoinSource, Predicate};
pub use reconcile::{Reconciled, SyncSummary};
pub use repository::{RepoError, RepoResult, Repository};
pub use view::DynamicView;
