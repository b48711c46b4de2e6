//! Repository facade over one engine collection.
//!
//! # Responsibility
//! - Stamp lifecycle fields (`id`, `created`, `updatedAt`, `deleted`).
//! - Route saves to insert or update and run queries with ordering.
//! - Flush changes to the SQLite mirror when autosave is on.
//!
//! # Invariants
//! - Every operation is attempted once; failures surface as `RepoError`.
//! - Updates never overwrite the stored `created` value.
//! - The collection lock is never held while flushing.

use crate::clock::{Clock, SystemClock};
use crate::db::{CollectionHandle, DbError, Store};
use crate::engine::{Collection, EngineError, EngineResult, EventListener, FilterError, ResultSet};
use crate::model::document::{
    Document, DocumentError, SeqId, CREATED_FIELD, UPDATED_AT_FIELD,
};
use crate::repo::query::{Criteria, FindOptions};
use crate::repo::view::DynamicView;
use crate::sort::{FieldOrder, Order};
use log::{debug, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, MutexGuard};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error surface of the repository facade.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Engine(EngineError),
    Filter(FilterError),
    Document(DocumentError),
    /// No live document carries this domain id.
    NotFound(String),
    NotImplemented(&'static str),
    /// The collection lock was poisoned by a panicking holder.
    Poisoned(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Engine(err) => write!(f, "{err}"),
            Self::Filter(err) => write!(f, "{err}"),
            Self::Document(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "document not found: {id}"),
            Self::NotImplemented(op) => write!(f, "operation not implemented: {op}"),
            Self::Poisoned(name) => write!(f, "collection lock poisoned: {name}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Engine(err) => Some(err),
            Self::Filter(err) => Some(err),
            Self::Document(err) => Some(err),
            Self::NotFound(_) | Self::NotImplemented(_) | Self::Poisoned(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<EngineError> for RepoError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<FilterError> for RepoError {
    fn from(value: FilterError) -> Self {
        Self::Filter(value)
    }
}

impl From<DocumentError> for RepoError {
    fn from(value: DocumentError) -> Self {
        Self::Document(value)
    }
}

/// Document repository bound to one collection of a [`Store`].
pub struct Repository<'s> {
    store: &'s Store,
    collection: CollectionHandle,
    name: String,
    clock: Arc<dyn Clock>,
}

impl<'s> Repository<'s> {
    /// Binds a repository to `name`, loading the collection on first use.
    pub fn try_new(store: &'s Store, name: &str) -> RepoResult<Self> {
        let collection = store.init_collection(name)?;
        Ok(Self {
            store,
            collection,
            name: name.to_string(),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replaces the timestamp source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &'s Store {
        self.store
    }

    /// Shared handle, e.g. as the right side of a join.
    pub fn handle(&self) -> CollectionHandle {
        Arc::clone(&self.collection)
    }

    /// Always fails; documents are created through `insert` or `save`.
    pub fn create(&self, _doc: &Document) -> RepoResult<Document> {
        Err(RepoError::NotImplemented("create"))
    }

    /// Inserts a new document, assigning `id` when absent.
    pub fn insert(&self, doc: Document) -> RepoResult<Document> {
        let now = self.clock.now_ms();
        let result = self.mutate("insert", |collection| {
            collection.insert(stamp_new(doc, now), now)
        });
        self.finish(result)
    }

    /// Inserts every document; stops at the first failure.
    pub fn insert_many(&self, docs: Vec<Document>) -> RepoResult<Vec<Document>> {
        let now = self.clock.now_ms();
        let result = self.mutate("insert_many", |collection| {
            docs.into_iter()
                .map(|doc| collection.insert(stamp_new(doc, now), now))
                .collect()
        });
        self.finish(result)
    }

    /// Upserts: documents already stored are updated, the rest inserted.
    pub fn save(&self, doc: Document) -> RepoResult<Document> {
        let now = self.clock.now_ms();
        let result = self.mutate("save", |collection| save_one(collection, doc, now));
        self.finish(result)
    }

    /// Upserts each document individually.
    pub fn save_many(&self, docs: Vec<Document>) -> RepoResult<Vec<Document>> {
        let now = self.clock.now_ms();
        let result = self.mutate("save_many", |collection| {
            docs.into_iter()
                .map(|doc| save_one(collection, doc, now))
                .collect()
        });
        self.finish(result)
    }

    /// Replaces a stored document. The document must carry its `seq`.
    pub fn update(&self, doc: Document) -> RepoResult<Document> {
        let now = self.clock.now_ms();
        let result = self.mutate("update", |collection| update_one(collection, doc, now));
        self.finish(result)
    }

    pub fn update_many(&self, docs: Vec<Document>) -> RepoResult<Vec<Document>> {
        let now = self.clock.now_ms();
        let result = self.mutate("update_many", |collection| {
            docs.into_iter()
                .map(|doc| update_one(collection, doc, now))
                .collect()
        });
        self.finish(result)
    }

    /// Applies `mutation` to every document matching `criteria`.
    ///
    /// Returns how many documents were updated.
    pub fn update_where(
        &self,
        criteria: &Criteria,
        mutation: impl Fn(&mut Document),
    ) -> RepoResult<usize> {
        let now = self.clock.now_ms();
        let result = self.mutate("update_where", |collection| {
            let matched = criteria.apply(collection.chain()).data();
            let updated = matched.len();
            for mut doc in matched {
                mutation(&mut doc);
                update_one(collection, doc, now)?;
            }
            Ok(updated)
        });
        self.finish(result)
    }

    /// Soft-deletes the document carrying `id`.
    ///
    /// # Errors
    /// - `RepoError::NotFound` when no document has this id.
    pub fn delete(&self, id: &str) -> RepoResult<Document> {
        let now = self.clock.now_ms();
        let mut doc = self.find_by_id(id)?.ok_or_else(|| {
            warn!(
                "event=repo_delete module=repo status=error collection={} error_code=not_found",
                self.name
            );
            RepoError::NotFound(id.to_string())
        })?;

        doc.mark_deleted();
        let result = self.mutate("delete", |collection| update_one(collection, doc, now));
        self.finish(result)
    }

    /// Physically removes every document.
    pub fn clear(&self) -> RepoResult<usize> {
        let result = self.mutate("clear", |collection| Ok(collection.clear()));
        self.finish(result)
    }

    pub fn remove_where(&self, predicate: impl Fn(&Document) -> bool) -> RepoResult<usize> {
        let result = self.mutate("remove_where", |collection| {
            Ok(collection.remove_where(predicate))
        });
        self.finish(result)
    }

    /// Physically removes a stored document.
    pub fn remove(&self, doc: &Document) -> RepoResult<Option<Document>> {
        let Some(seq) = doc.seq else {
            return Err(RepoError::Engine(EngineError::MissingSeq {
                collection: self.name.clone(),
            }));
        };
        self.remove_by_seq(seq)
    }

    /// Returns `None` when `seq` is unknown.
    pub fn remove_by_seq(&self, seq: SeqId) -> RepoResult<Option<Document>> {
        let result = self.mutate("remove", |collection| Ok(collection.remove(seq)));
        self.finish(result)
    }

    /// Result set over a snapshot of the collection.
    pub fn chain(&self) -> RepoResult<ResultSet> {
        Ok(self.lock()?.chain())
    }

    /// Joins, filters, orders and pages the collection.
    pub fn find(&self, criteria: &Criteria, options: &FindOptions) -> RepoResult<Vec<Document>> {
        let joined = options
            .joins
            .iter()
            .map(|join| Ok((join, join.source.documents()?)))
            .collect::<RepoResult<Vec<_>>>()?;

        let mut rows = self.chain()?;
        for (join, right) in &joined {
            rows = rows.eq_join(right, &join.left_key, &join.right_key, join.map.as_ref());
        }
        rows = criteria.apply(rows);
        if let Some(order) = &options.order {
            rows = self.store.config().sort.resolve(order).apply(rows);
        }
        // Limit first, then offset within the limited rows.
        if let Some(limit) = options.limit.filter(|limit| *limit > 0) {
            rows = rows.limit(limit);
        }
        if let Some(offset) = options.offset.filter(|offset| *offset > 0) {
            rows = rows.offset(offset);
        }

        let docs = rows.data();
        debug!(
            "event=repo_find module=repo status=ok collection={} rows={}",
            self.name,
            docs.len()
        );
        Ok(docs)
    }

    pub fn find_one(&self, criteria: &Criteria) -> RepoResult<Option<Document>> {
        Ok(criteria.apply(self.chain()?).first())
    }

    pub fn find_by_id(&self, id: &str) -> RepoResult<Option<Document>> {
        Ok(self.lock()?.get_by_id(id).cloned())
    }

    pub fn count(&self) -> RepoResult<usize> {
        Ok(self.lock()?.count())
    }

    pub fn count_where(&self, criteria: &Criteria) -> RepoResult<usize> {
        Ok(criteria.apply(self.chain()?).count())
    }

    /// Distinct values of `property` across matching documents.
    ///
    /// `order` is a single field specifier (`"-name"` for descending) used to
    /// pre-sort. Missing values appear as `null`; the first occurrence wins.
    pub fn distinct(
        &self,
        criteria: &Criteria,
        property: &str,
        order: Option<&str>,
    ) -> RepoResult<Vec<Value>> {
        let mut rows = criteria.apply(self.chain()?);
        if let Some(order) = order {
            let order = FieldOrder::parse(order);
            rows = rows.simple_sort(&order.field, order.descending);
        }

        Ok(rows.map_reduce(
            |doc| doc.get_path(property).cloned().unwrap_or(Value::Null),
            |values| {
                let mut unique: Vec<Value> = Vec::new();
                for value in values {
                    if !unique.contains(&value) {
                        unique.push(value);
                    }
                }
                unique
            },
        ))
    }

    /// Saved criteria and ordering, re-evaluated on every read.
    pub fn view(&self, criteria: Criteria, order: Option<Order>) -> DynamicView<'_, 's> {
        DynamicView::new(self, criteria, order)
    }

    pub fn set_events_disabled(&self, disabled: bool) -> RepoResult<()> {
        self.lock()?.set_events_disabled(disabled);
        Ok(())
    }

    pub fn subscribe(&self, listener: EventListener) -> RepoResult<()> {
        self.lock()?.subscribe(listener);
        Ok(())
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, Collection>> {
        self.collection
            .lock()
            .map_err(|_| RepoError::Poisoned(self.name.clone()))
    }

    fn mutate<T>(
        &self,
        op: &'static str,
        apply: impl FnOnce(&mut Collection) -> EngineResult<T>,
    ) -> RepoResult<T> {
        let mut collection = self.lock()?;
        apply(&mut *collection).map_err(|err| {
            warn!(
                "event=repo_{} module=repo status=error collection={} error={}",
                op, self.name, err
            );
            RepoError::Engine(err)
        })
    }

    /// Flushes whatever the mutation left pending, even when it failed part
    /// way, then reports the mutation's own outcome first.
    fn finish<T>(&self, result: RepoResult<T>) -> RepoResult<T> {
        let flushed = if self.store.config().autosave {
            self.store.flush_collection(&self.collection).map(|_| ())
        } else {
            Ok(())
        };
        let value = result?;
        flushed?;
        Ok(value)
    }
}

impl std::fmt::Debug for Repository<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn stamp_new(mut doc: Document, now: i64) -> Document {
    if !doc.has_domain_id() {
        doc.set_id(Uuid::new_v4().to_string());
    }
    if !doc.fields.contains_key(CREATED_FIELD) {
        doc.set(CREATED_FIELD, now);
    }
    doc.set(UPDATED_AT_FIELD, now);
    doc
}

fn save_one(collection: &mut Collection, doc: Document, now: i64) -> EngineResult<Document> {
    if doc.is_stored() {
        let mut doc = doc;
        if !doc.has_domain_id() {
            doc.set_id(Uuid::new_v4().to_string());
        }
        update_one(collection, doc, now)
    } else {
        collection.insert(stamp_new(doc, now), now)
    }
}

fn update_one(collection: &mut Collection, mut doc: Document, now: i64) -> EngineResult<Document> {
    let stored_created = doc
        .seq
        .and_then(|seq| collection.get(seq))
        .and_then(|stored| stored.fields.get(CREATED_FIELD).cloned());
    if let Some(created) = stored_created {
        doc.set(CREATED_FIELD, created);
    }
    doc.set(UPDATED_AT_FIELD, now);
    collection.update(doc, now)
}
