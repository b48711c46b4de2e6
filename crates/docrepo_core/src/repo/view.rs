//! Dynamic views: saved criteria and ordering over a live collection.

use crate::repo::query::{Criteria, FindOptions};
use crate::repo::repository::{RepoResult, Repository};
use crate::model::document::Document;
use crate::sort::Order;

/// Criteria and ordering re-applied to the collection on every read.
#[derive(Debug)]
pub struct DynamicView<'r, 's> {
    repo: &'r Repository<'s>,
    criteria: Criteria,
    options: FindOptions,
}

impl<'r, 's> DynamicView<'r, 's> {
    pub(crate) fn new(repo: &'r Repository<'s>, criteria: Criteria, order: Option<Order>) -> Self {
        Self {
            repo,
            criteria,
            options: FindOptions {
                order,
                ..FindOptions::default()
            },
        }
    }

    /// Narrows the view further; existing criteria stay in force.
    pub fn apply_criteria(&mut self, criteria: Criteria) {
        let current = std::mem::take(&mut self.criteria);
        self.criteria = current.and(criteria);
    }

    pub fn apply_order(&mut self, order: Order) {
        self.options.order = Some(order);
    }

    pub fn data(&self) -> RepoResult<Vec<Document>> {
        self.repo.find(&self.criteria, &self.options)
    }

    pub fn count(&self) -> RepoResult<usize> {
        self.repo.count_where(&self.criteria)
    }
}
