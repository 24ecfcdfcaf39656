//! Content-addressed cache for computed metrics
//!
//! Cache entries are keyed by the full (region, metric, period range,
//! group-by, schema version) tuple, so independent computations never
//! collide and values computed under one schema version are invisible to
//! the other. The store itself is a process-wide key-value map; busting
//! is an explicit per-fetch flag, not ambient state.

use std::sync::Mutex;

use chrono::NaiveDate;
use log::debug;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::config::SchemaVersion;
use crate::error::{ReportError, Result};
use crate::period::PeriodRange;
use crate::query::{CountsByPeriod, GroupedCounts};

/// Composite cache key for one region's slice of one metric
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionEntry {
    /// Region slug
    pub region_slug: String,
    /// Metric name
    pub metric: &'static str,
    /// Optional group-by dimension
    pub group_by: Option<&'static str>,
    /// Full period range the value covers
    pub range: PeriodRange,
    /// Schema version the value was computed under
    pub schema: SchemaVersion,
}

impl RegionEntry {
    /// Build an entry
    #[must_use]
    pub fn new(
        region_slug: String,
        metric: &'static str,
        group_by: Option<&'static str>,
        range: PeriodRange,
        schema: SchemaVersion,
    ) -> Self {
        Self {
            region_slug,
            metric,
            group_by,
            range,
            schema,
        }
    }

    /// Deterministic string form of the key
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "region_entry/{}/{}/{}/{}/{}",
            self.schema.tag(),
            self.region_slug,
            self.metric,
            self.range.fingerprint(),
            self.group_by.unwrap_or("-"),
        )
    }
}

/// A cached value: plain counts, grouped counts, or an earliest-record
/// timestamp
#[derive(Debug, Clone)]
pub enum CachedValue {
    /// period → count
    Counts(CountsByPeriod),
    /// period → (group key → count)
    Grouped(GroupedCounts),
    /// Earliest patient record for the region
    RecordedAt(Option<NaiveDate>),
}

/// Process-wide metric cache
#[derive(Debug, Default)]
pub struct ReportsCache {
    entries: Mutex<FxHashMap<String, CachedValue>>,
}

impl ReportsCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Drop every entry, starting a new cache generation
    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, FxHashMap<String, CachedValue>>> {
        self.entries
            .lock()
            .map_err(|_| ReportError::Cache("reports cache lock poisoned".to_string()))
    }

    /// Multi-key fetch: returns one value per entry, in entry order.
    ///
    /// Hits are served from the store unless `force` is set; every miss
    /// is computed via `compute` (in parallel across entries, which is
    /// safe because entries are content-addressed and computations are
    /// read-only) and written back before returning. Store failures
    /// propagate; there is no silent fallback to direct computation.
    pub fn fetch_multi<F>(
        &self,
        entries: &[RegionEntry],
        force: bool,
        compute: F,
    ) -> Result<Vec<CachedValue>>
    where
        F: Fn(&RegionEntry) -> Result<CachedValue> + Sync,
    {
        let mut values: Vec<Option<CachedValue>> = {
            let stored = self.lock()?;
            entries
                .iter()
                .map(|entry| {
                    if force {
                        None
                    } else {
                        stored.get(&entry.cache_key()).cloned()
                    }
                })
                .collect()
        };

        let misses: Vec<usize> = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.is_none().then_some(i))
            .collect();
        if !misses.is_empty() {
            debug!(
                "cache fetch: {} hits, {} misses",
                entries.len() - misses.len(),
                misses.len()
            );
            let computed: Vec<(usize, CachedValue)> = misses
                .par_iter()
                .map(|&i| compute(&entries[i]).map(|v| (i, v)))
                .collect::<Result<_>>()?;

            let mut stored = self.lock()?;
            for (i, value) in computed {
                stored.insert(entries[i].cache_key(), value.clone());
                values[i] = Some(value);
            }
        }

        Ok(values.into_iter().flatten().collect())
    }
}
