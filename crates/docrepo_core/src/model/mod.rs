//! Document data model shared by the engine, the store and repositories.
//!
//! # Responsibility
//! - Define the canonical record shape stored in collections.
//! - Keep engine bookkeeping apart from caller-owned fields.
//!
//! # Invariants
//! - Every persisted document carries exactly one domain `id`.
//! - Deletion is represented by soft-delete tombstones unless a caller asks
//!   for physical removal.

pub mod document;
