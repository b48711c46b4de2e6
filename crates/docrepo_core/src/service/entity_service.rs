//! Typed entity service.
//!
//! # Responsibility
//! - Convert `serde` entities to documents and back.
//! - Delegate persistence to the repository facade.
//!
//! # Invariants
//! - Entities are matched by domain `id`; `save` never creates duplicates.
//! - Conversion failures surface as `RepoError::Document`.

use crate::model::document::Document;
use crate::repo::{Criteria, FindOptions, RepoResult, Repository, SyncSummary};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Use-case service for one entity type stored in one collection.
pub struct EntityService<'s, T> {
    repo: Repository<'s>,
    _entity: PhantomData<fn() -> T>,
}

impl<'s, T> EntityService<'s, T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(repo: Repository<'s>) -> Self {
        Self {
            repo,
            _entity: PhantomData,
        }
    }

    pub fn repository(&self) -> &Repository<'s> {
        &self.repo
    }

    /// Inserts or updates one entity by `id` and returns the stored form.
    pub fn save(&self, entity: &T) -> RepoResult<T> {
        let (_, stored) = self.repo.reconcile(Document::from_entity(entity)?)?;
        Ok(stored.to_entity()?)
    }

    pub fn save_all(&self, entities: &[T]) -> RepoResult<SyncSummary> {
        let docs = entities
            .iter()
            .map(Document::from_entity)
            .collect::<Result<Vec<_>, _>>()?;
        self.repo.synchronize(docs)
    }

    /// Loads an entity by `id`.
    ///
    /// Soft-deleted entities are returned only when `include_deleted` is set.
    pub fn get(&self, id: &str, include_deleted: bool) -> RepoResult<Option<T>> {
        match self.repo.find_by_id(id)? {
            Some(doc) if include_deleted || !doc.is_deleted() => Ok(Some(doc.to_entity()?)),
            _ => Ok(None),
        }
    }

    pub fn find(&self, criteria: &Criteria, options: &FindOptions) -> RepoResult<Vec<T>> {
        self.repo
            .find(criteria, options)?
            .iter()
            .map(|doc| Ok(doc.to_entity()?))
            .collect()
    }

    /// Soft-deletes the entity with `id`.
    pub fn delete(&self, id: &str) -> RepoResult<()> {
        self.repo.delete(id)?;
        Ok(())
    }

    /// Counts live entities, or every stored one with `include_deleted`.
    pub fn count(&self, include_deleted: bool) -> RepoResult<usize> {
        if include_deleted {
            self.repo.count()
        } else {
            self.repo.count_where(&Criteria::not_deleted())
        }
    }
}
