//! Collection store: the engine's link to the SQLite mirror.
//!
//! # Responsibility
//! - Hand out shared in-memory collections, loading them on first use.
//! - Write each collection's pending changes back in one transaction.
//!
//! # Invariants
//! - A collection name maps to exactly one in-memory collection per store.
//! - A failed flush leaves the pending changes queued for the next flush.
//! - `documents.doc_id` mirrors the engine's unique id index.

use crate::db::{open_db, open_db_in_memory, DbError, DbResult};
use crate::engine::{Collection, PendingChanges};
use crate::model::document::{DocMeta, Document, SeqId};
use crate::sort::SortConfig;
use log::{debug, error, info};
use rusqlite::{params, Connection, Row};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Shared handle to one in-memory collection.
pub type CollectionHandle = Arc<Mutex<Collection>>;

/// Store-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Flush a collection after every repository mutation.
    pub autosave: bool,
    /// Comparator selector used by repository `find` ordering.
    pub sort: SortConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            autosave: true,
            sort: SortConfig::default(),
        }
    }
}

struct DocumentRow {
    seq: i64,
    doc_id: Option<String>,
    body: String,
    meta: Option<String>,
}

struct FlushBatch {
    pending: PendingChanges,
    rows: Vec<DocumentRow>,
    next_seq: i64,
}

/// Owner of the SQLite connection and the loaded collections.
#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
    collections: Mutex<BTreeMap<String, CollectionHandle>>,
    config: StoreConfig,
}

impl Store {
    /// Opens (or creates) a store file.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> DbResult<Self> {
        Ok(Self::from_connection(open_db(path)?, config))
    }

    /// Opens a store whose mirror lives only as long as the process.
    pub fn open_in_memory(config: StoreConfig) -> DbResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?, config))
    }

    /// Wraps a connection that already has migrations applied.
    pub fn from_connection(conn: Connection, config: StoreConfig) -> Self {
        Self {
            conn: Mutex::new(conn),
            collections: Mutex::new(BTreeMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the named collection, loading persisted documents the first
    /// time it is requested.
    pub fn init_collection(&self, name: &str) -> DbResult<CollectionHandle> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| DbError::Poisoned("collection registry"))?;
        if let Some(handle) = collections.get(name) {
            return Ok(Arc::clone(handle));
        }

        let started_at = Instant::now();
        let collection = self.load_collection(name).map_err(|err| {
            error!(
                "event=collection_init module=db status=error collection={} error={}",
                name, err
            );
            err
        })?;
        info!(
            "event=collection_init module=db status=ok collection={} documents={} duration_ms={}",
            name,
            collection.count(),
            started_at.elapsed().as_millis()
        );

        let handle = Arc::new(Mutex::new(collection));
        collections.insert(name.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Names of every collection registered in the database, sorted.
    pub fn collection_names(&self) -> DbResult<Vec<String>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY name ASC;")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Flushes every loaded collection. Returns how many had changes.
    pub fn flush(&self) -> DbResult<usize> {
        let handles: Vec<CollectionHandle> = self
            .collections
            .lock()
            .map_err(|_| DbError::Poisoned("collection registry"))?
            .values()
            .cloned()
            .collect();

        let mut written = 0;
        for handle in &handles {
            if self.flush_collection(handle)? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Writes one collection's pending changes in a single transaction.
    ///
    /// Returns `false` when there was nothing to write.
    pub fn flush_collection(&self, handle: &CollectionHandle) -> DbResult<bool> {
        let started_at = Instant::now();
        let (name, batch) = {
            let mut collection = lock_collection(handle)?;
            if !collection.has_pending() {
                return Ok(false);
            }
            let pending = collection.take_pending();
            match encode_batch(&collection, &pending) {
                Ok((rows, next_seq)) => (
                    collection.name().to_string(),
                    FlushBatch {
                        pending,
                        rows,
                        next_seq,
                    },
                ),
                Err(err) => {
                    collection.restore_pending(pending);
                    return Err(err);
                }
            }
        };

        if let Err(err) = self.write_batch(&name, &batch) {
            error!(
                "event=collection_flush module=db status=error collection={} error={}",
                name, err
            );
            lock_collection(handle)?.restore_pending(batch.pending);
            return Err(err);
        }

        debug!(
            "event=collection_flush module=db status=ok collection={} upserted={} removed={} cleared={} duration_ms={}",
            name,
            batch.rows.len(),
            batch.pending.removed.len(),
            batch.pending.cleared,
            started_at.elapsed().as_millis()
        );
        Ok(true)
    }

    fn load_collection(&self, name: &str) -> DbResult<Collection> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO collections (name) VALUES (?1);",
            [name],
        )?;
        let next_seq: i64 = conn.query_row(
            "SELECT next_seq FROM collections WHERE name = ?1;",
            [name],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT seq, body, meta
             FROM documents
             WHERE collection = ?1
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query([name])?;
        let mut docs = Vec::new();
        while let Some(row) = rows.next()? {
            docs.push(parse_document_row(row)?);
        }

        Ok(Collection::restore(name, docs, seq_from_sql(next_seq)?)?)
    }

    fn write_batch(&self, name: &str, batch: &FlushBatch) -> DbResult<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO collections (name) VALUES (?1);",
            [name],
        )?;
        if batch.pending.cleared {
            tx.execute("DELETE FROM documents WHERE collection = ?1;", [name])?;
        }
        for seq in &batch.pending.removed {
            tx.execute(
                "DELETE FROM documents WHERE collection = ?1 AND seq = ?2;",
                params![name, seq_to_sql(*seq)?],
            )?;
        }
        // Ids may move between documents within one batch.
        for row in &batch.rows {
            tx.execute(
                "UPDATE documents SET doc_id = NULL WHERE collection = ?1 AND seq = ?2;",
                params![name, row.seq],
            )?;
        }
        for row in &batch.rows {
            tx.execute(
                "INSERT INTO documents (collection, seq, doc_id, body, meta)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(collection, seq) DO UPDATE SET
                    doc_id = excluded.doc_id,
                    body = excluded.body,
                    meta = excluded.meta;",
                params![name, row.seq, row.doc_id, row.body, row.meta],
            )?;
        }
        tx.execute(
            "UPDATE collections SET next_seq = ?2 WHERE name = ?1;",
            params![name, batch.next_seq],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn lock_conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned("connection"))
    }
}

fn lock_collection(handle: &CollectionHandle) -> DbResult<MutexGuard<'_, Collection>> {
    handle.lock().map_err(|_| DbError::Poisoned("collection"))
}

fn encode_batch(
    collection: &Collection,
    pending: &PendingChanges,
) -> DbResult<(Vec<DocumentRow>, i64)> {
    let rows = pending
        .upserted
        .iter()
        .filter_map(|seq| collection.get(*seq))
        .map(encode_document)
        .collect::<DbResult<Vec<_>>>()?;
    Ok((rows, seq_to_sql(collection.next_seq())?))
}

fn encode_document(doc: &Document) -> DbResult<DocumentRow> {
    let seq = doc
        .seq
        .ok_or_else(|| DbError::InvalidData("stored document has no seq".to_string()))?;
    let body = serde_json::to_string(&doc.fields)
        .map_err(|err| DbError::InvalidData(format!("cannot encode seq={seq}: {err}")))?;
    let meta = doc
        .meta
        .map(|meta| serde_json::to_string(&meta))
        .transpose()
        .map_err(|err| DbError::InvalidData(format!("cannot encode meta of seq={seq}: {err}")))?;

    Ok(DocumentRow {
        seq: seq_to_sql(seq)?,
        doc_id: doc.id().map(str::to_string),
        body,
        meta,
    })
}

fn parse_document_row(row: &Row<'_>) -> DbResult<Document> {
    let seq = seq_from_sql(row.get("seq")?)?;
    let body: String = row.get("body")?;
    let value: Value = serde_json::from_str(&body).map_err(|err| {
        DbError::InvalidData(format!("invalid JSON in documents.body for seq={seq}: {err}"))
    })?;
    let mut doc = Document::from_value(value)
        .map_err(|err| DbError::InvalidData(format!("seq={seq}: {err}")))?;

    doc.seq = Some(seq);
    doc.meta = match row.get::<_, Option<String>>("meta")? {
        Some(text) => Some(serde_json::from_str::<DocMeta>(&text).map_err(|err| {
            DbError::InvalidData(format!("invalid documents.meta for seq={seq}: {err}"))
        })?),
        None => None,
    };
    Ok(doc)
}

fn seq_to_sql(seq: SeqId) -> DbResult<i64> {
    i64::try_from(seq).map_err(|_| DbError::InvalidData(format!("seq {seq} exceeds i64")))
}

fn seq_from_sql(value: i64) -> DbResult<SeqId> {
    SeqId::try_from(value).map_err(|_| DbError::InvalidData(format!("negative seq {value}")))
}
