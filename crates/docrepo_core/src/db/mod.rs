//! SQLite mirror bootstrap, schema migrations and the collection store.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the document mirror.
//! - Apply schema migrations in deterministic order.
//! - Load collections into the engine and write their changes back.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Collections are not loaded before migrations succeed.

use crate::engine::EngineError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;
mod store;

pub use open::{open_db, open_db_in_memory};
pub use store::{CollectionHandle, Store, StoreConfig};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// A persisted row cannot be decoded into a document.
    InvalidData(String),
    /// Persisted rows violate engine invariants (e.g. duplicate ids).
    Engine(EngineError),
    /// A lock was poisoned by a panic in another holder.
    Poisoned(&'static str),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted document: {message}"),
            Self::Engine(err) => write!(f, "{err}"),
            Self::Poisoned(what) => write!(f, "{what} lock poisoned"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Engine(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::InvalidData(_) | Self::Poisoned(_) => {
                None
            }
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<EngineError> for DbError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
