//! Reconciliation of incoming entities by domain id.
//!
//! # Invariants
//! - Entities are applied in order; later lookups see earlier writes.
//! - A failure stops the run; entities already applied stay committed.

use crate::model::document::Document;
use crate::repo::repository::{RepoResult, Repository};
use log::{info, warn};
use std::time::Instant;

/// Outcome counts of one `synchronize` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub inserted: usize,
    pub updated: usize,
}

impl SyncSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

/// How a single entity was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Inserted,
    Updated,
}

impl Repository<'_> {
    /// Merges `entities` into the collection, matching on `id`.
    pub fn synchronize(
        &self,
        entities: impl IntoIterator<Item = Document>,
    ) -> RepoResult<SyncSummary> {
        let started_at = Instant::now();
        let mut summary = SyncSummary::default();

        for entity in entities {
            match self.reconcile(entity) {
                Ok((Reconciled::Inserted, _)) => summary.inserted += 1,
                Ok((Reconciled::Updated, _)) => summary.updated += 1,
                Err(err) => {
                    warn!(
                        "event=repo_sync module=repo status=error collection={} committed={} error={}",
                        self.name(),
                        summary.total(),
                        err
                    );
                    return Err(err);
                }
            }
        }

        info!(
            "event=repo_sync module=repo status=ok collection={} inserted={} updated={} duration_ms={}",
            self.name(),
            summary.inserted,
            summary.updated,
            started_at.elapsed().as_millis()
        );
        Ok(summary)
    }

    /// Applies one entity: update when its `id` is stored, insert otherwise.
    pub fn reconcile(&self, mut entity: Document) -> RepoResult<(Reconciled, Document)> {
        let existing = match entity.id() {
            Some(id) => self.find_by_id(id)?,
            None => None,
        };

        match existing {
            Some(stored) => {
                entity.seq = stored.seq;
                entity.meta = stored.meta;
                Ok((Reconciled::Updated, self.save(entity)?))
            }
            None => {
                entity.seq = None;
                entity.meta = None;
                Ok((Reconciled::Inserted, self.insert(entity)?))
            }
        }
    }
}
