//! Cached, batched reporting over the region tree

pub mod cache;
pub mod repository;

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{ReportError, Result};
use crate::period::Period;
use crate::query::{CountsByPeriod, GroupedCounts};
use crate::region::RegionTree;
use crate::store::{MonthlyStatesView, PatientStore};

pub use cache::{CachedValue, RegionEntry, ReportsCache};
pub use repository::{Repository, percentage};

/// Per-region count mappings, keyed by region slug
pub type CountsByRegion = BTreeMap<String, CountsByPeriod>;
/// Per-region grouped count mappings, keyed by region slug
pub type GroupedByRegion = BTreeMap<String, GroupedCounts>;

/// Shared state a [`Repository`] is built from: the region tree, the raw
/// event store, the materialized monthly-states view, and the metric cache
#[derive(Clone)]
pub struct ReportingContext {
    /// Region tree
    pub tree: Arc<RegionTree>,
    /// Raw patient event store
    pub store: Arc<PatientStore>,
    /// Materialized per-patient-per-month view
    pub view: Arc<RwLock<MonthlyStatesView>>,
    /// Shared metric cache
    pub cache: Arc<ReportsCache>,
}

impl ReportingContext {
    /// Wrap a tree and store with an empty view and cache
    #[must_use]
    pub fn new(tree: RegionTree, store: PatientStore) -> Self {
        Self {
            tree: Arc::new(tree),
            store: Arc::new(store),
            view: Arc::new(RwLock::new(MonthlyStatesView::new())),
            cache: Arc::new(ReportsCache::new()),
        }
    }

    /// Rebuild the monthly-states view through the given month. Must run
    /// before any v2 repository reads; typically scheduled after data
    /// ingestion.
    pub fn refresh_view(&self, through: Period) -> Result<()> {
        let mut view = self
            .view
            .write()
            .map_err(|_| ReportError::Cache("monthly states view lock poisoned".to_string()))?;
        view.refresh(&self.store, through);
        Ok(())
    }
}
