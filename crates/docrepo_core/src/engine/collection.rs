//! In-memory document collection.
//!
//! # Responsibility
//! - Own the documents of one named collection in insertion (`seq`) order.
//! - Assign `seq` and engine `meta` on insert, bump revisions on update.
//! - Keep a unique index over string `id` values.
//! - Record pending changes for the SQLite mirror and emit change events.
//!
//! # Invariants
//! - `seq` values are strictly increasing and never reused, even after clear.
//! - A document already carrying `seq` cannot be inserted again.
//! - Two stored documents never share the same string `id`.

use crate::engine::result_set::ResultSet;
use crate::model::document::{DocMeta, Document, SeqId};
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level mutation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Insert was called with a document that already has a `seq`.
    AlreadyStored { collection: String, seq: SeqId },
    /// Update was called with a document that has no `seq`.
    MissingSeq { collection: String },
    /// No stored document carries this `seq`.
    UnknownSeq { collection: String, seq: SeqId },
    /// Unique `id` index violation.
    DuplicateId { collection: String, id: String },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyStored { collection, seq } => write!(
                f,
                "document seq={seq} is already in collection `{collection}`; use update"
            ),
            Self::MissingSeq { collection } => write!(
                f,
                "cannot update a document that was never stored in `{collection}`"
            ),
            Self::UnknownSeq { collection, seq } => {
                write!(f, "collection `{collection}` has no document seq={seq}")
            }
            Self::DuplicateId { collection, id } => {
                write!(f, "duplicate id `{id}` in collection `{collection}`")
            }
        }
    }
}

impl Error for EngineError {}

/// Change notification emitted after a successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionEvent {
    Inserted(Document),
    Updated(Document),
    Removed(Document),
    Cleared { removed: usize },
}

pub type EventListener = Box<dyn Fn(&str, &CollectionEvent) + Send>;

/// Changes not yet written to the SQLite mirror.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChanges {
    pub cleared: bool,
    pub upserted: BTreeSet<SeqId>,
    pub removed: BTreeSet<SeqId>,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        !self.cleared && self.upserted.is_empty() && self.removed.is_empty()
    }

    fn merge_older(&mut self, older: PendingChanges) {
        if self.cleared {
            return;
        }
        self.cleared = older.cleared;
        for seq in older.upserted {
            if !self.removed.contains(&seq) {
                self.upserted.insert(seq);
            }
        }
        for seq in older.removed {
            if !self.upserted.contains(&seq) {
                self.removed.insert(seq);
            }
        }
    }
}

/// One named, in-memory collection.
pub struct Collection {
    name: String,
    docs: BTreeMap<SeqId, Document>,
    id_index: HashMap<String, SeqId>,
    next_seq: SeqId,
    pending: PendingChanges,
    listeners: Vec<EventListener>,
    events_disabled: bool,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: BTreeMap::new(),
            id_index: HashMap::new(),
            next_seq: 1,
            pending: PendingChanges::default(),
            listeners: Vec::new(),
            events_disabled: false,
        }
    }

    /// Rebuilds a collection from persisted documents without marking them
    /// pending.
    ///
    /// # Errors
    /// - Returns `DuplicateId` when persisted rows violate the id index.
    pub fn restore(
        name: impl Into<String>,
        docs: impl IntoIterator<Item = Document>,
        next_seq: SeqId,
    ) -> EngineResult<Self> {
        let mut collection = Self::new(name);
        for doc in docs {
            let Some(seq) = doc.seq else {
                return Err(EngineError::MissingSeq {
                    collection: collection.name.clone(),
                });
            };
            if let Some(id) = doc.id() {
                if collection.id_index.insert(id.to_string(), seq).is_some() {
                    return Err(EngineError::DuplicateId {
                        collection: collection.name.clone(),
                        id: id.to_string(),
                    });
                }
            }
            collection.next_seq = collection.next_seq.max(seq + 1);
            collection.docs.insert(seq, doc);
        }
        collection.next_seq = collection.next_seq.max(next_seq);
        Ok(collection)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> usize {
        self.docs.len()
    }

    /// Next `seq` the engine will assign.
    pub fn next_seq(&self) -> SeqId {
        self.next_seq
    }

    pub fn get(&self, seq: SeqId) -> Option<&Document> {
        self.docs.get(&seq)
    }

    /// Looks up a document through the unique id index.
    pub fn get_by_id(&self, id: &str) -> Option<&Document> {
        self.id_index.get(id).and_then(|seq| self.docs.get(seq))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }

    /// Starts a query chain over a snapshot of every document.
    pub fn chain(&self) -> ResultSet {
        ResultSet::new(self.docs.values().cloned().collect())
    }

    /// Inserts a new document and returns it with `seq` and `meta` set.
    pub fn insert(&mut self, mut doc: Document, now_ms: i64) -> EngineResult<Document> {
        if let Some(seq) = doc.seq {
            return Err(EngineError::AlreadyStored {
                collection: self.name.clone(),
                seq,
            });
        }
        if let Some(id) = doc.id() {
            if self.id_index.contains_key(id) {
                return Err(EngineError::DuplicateId {
                    collection: self.name.clone(),
                    id: id.to_string(),
                });
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        doc.seq = Some(seq);
        doc.meta = Some(DocMeta::fresh(now_ms));

        if let Some(id) = doc.id() {
            self.id_index.insert(id.to_string(), seq);
        }
        self.docs.insert(seq, doc.clone());
        self.pending.upserted.insert(seq);
        debug!(
            "event=engine_insert module=engine status=ok collection={} seq={}",
            self.name, seq
        );
        self.emit(CollectionEvent::Inserted(doc.clone()));
        Ok(doc)
    }

    /// Replaces a stored document identified by its `seq`.
    ///
    /// The engine keeps `meta.created`, bumps `meta.revision` and stamps
    /// `meta.updated`.
    pub fn update(&mut self, mut doc: Document, now_ms: i64) -> EngineResult<Document> {
        let Some(seq) = doc.seq else {
            return Err(EngineError::MissingSeq {
                collection: self.name.clone(),
            });
        };
        let Some(stored) = self.docs.get(&seq) else {
            return Err(EngineError::UnknownSeq {
                collection: self.name.clone(),
                seq,
            });
        };

        let old_id = stored.id().map(str::to_string);
        let new_id = doc.id().map(str::to_string);
        if let Some(id) = new_id.as_deref() {
            if let Some(owner) = self.id_index.get(id) {
                if *owner != seq {
                    return Err(EngineError::DuplicateId {
                        collection: self.name.clone(),
                        id: id.to_string(),
                    });
                }
            }
        }

        let mut meta = stored.meta.unwrap_or_else(|| DocMeta::fresh(now_ms));
        meta.revision += 1;
        meta.updated = now_ms;
        doc.meta = Some(meta);

        if old_id != new_id {
            if let Some(id) = old_id {
                self.id_index.remove(&id);
            }
            if let Some(id) = new_id {
                self.id_index.insert(id, seq);
            }
        }
        self.docs.insert(seq, doc.clone());
        self.pending.upserted.insert(seq);
        debug!(
            "event=engine_update module=engine status=ok collection={} seq={} revision={}",
            self.name, seq, meta.revision
        );
        self.emit(CollectionEvent::Updated(doc.clone()));
        Ok(doc)
    }

    /// Physically removes one document. Returns `None` when `seq` is unknown.
    pub fn remove(&mut self, seq: SeqId) -> Option<Document> {
        let removed = self.docs.remove(&seq)?;
        if let Some(id) = removed.id() {
            self.id_index.remove(id);
        }
        self.pending.upserted.remove(&seq);
        self.pending.removed.insert(seq);
        debug!(
            "event=engine_remove module=engine status=ok collection={} seq={}",
            self.name, seq
        );
        self.emit(CollectionEvent::Removed(removed.clone()));
        Some(removed)
    }

    /// Removes every document matching `predicate`, returning how many.
    pub fn remove_where(&mut self, predicate: impl Fn(&Document) -> bool) -> usize {
        let doomed: Vec<SeqId> = self
            .docs
            .iter()
            .filter(|(_, doc)| predicate(doc))
            .map(|(seq, _)| *seq)
            .collect();
        doomed
            .into_iter()
            .filter_map(|seq| self.remove(seq))
            .count()
    }

    /// Removes every document. `seq` numbering continues afterwards.
    pub fn clear(&mut self) -> usize {
        let removed = self.docs.len();
        self.docs.clear();
        self.id_index.clear();
        self.pending = PendingChanges {
            cleared: true,
            ..PendingChanges::default()
        };
        debug!(
            "event=engine_clear module=engine status=ok collection={} removed={}",
            self.name, removed
        );
        self.emit(CollectionEvent::Cleared { removed });
        removed
    }

    pub fn subscribe(&mut self, listener: EventListener) {
        self.listeners.push(listener);
    }

    /// Suppresses (or re-enables) change events without touching listeners.
    pub fn set_events_disabled(&mut self, disabled: bool) {
        self.events_disabled = disabled;
    }

    pub fn events_disabled(&self) -> bool {
        self.events_disabled
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Hands pending changes to the mirror writer.
    pub fn take_pending(&mut self) -> PendingChanges {
        std::mem::take(&mut self.pending)
    }

    /// Puts back changes whose write failed, under any newer changes.
    pub fn restore_pending(&mut self, older: PendingChanges) {
        self.pending.merge_older(older);
    }

    fn emit(&self, event: CollectionEvent) {
        if self.events_disabled {
            return;
        }
        for listener in &self.listeners {
            listener(&self.name, &event);
        }
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("count", &self.docs.len())
            .field("next_seq", &self.next_seq)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
