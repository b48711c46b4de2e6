//! Core use-case services.
//!
//! # Responsibility
//! - Wrap repositories into typed, use-case level APIs.
//! - Keep callers decoupled from document and storage details.

pub mod entity_service;

pub use entity_service::EntityService;
