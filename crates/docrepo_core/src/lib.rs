//! Document repository core.
//!
//! An in-memory collection engine with filter/sort/join queries, mirrored
//! to SQLite, behind a repository facade that stamps lifecycle fields and
//! reconciles incoming entities by id.

pub mod clock;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sort;

pub use clock::{Clock, ManualClock, SystemClock};
pub use db::{DbError, DbResult, Store, StoreConfig};
pub use engine::{CollectionEvent, Filter, FilterError, ResultSet};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::document::{Document, DocumentError, SeqId};
pub use repo::{
    Criteria, DynamicView, EqJoin, FindOptions, JoinSource, RepoError, RepoResult, Repository,
    SyncSummary,
};
pub use service::EntityService;
pub use sort::{Order, SortConfig, TransformKind, TransformOrder};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
