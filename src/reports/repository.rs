//! The reporting repository
//!
//! One repository instance answers the full metric battery for a fixed set
//! of regions over a fixed month range. Counts are fetched through the
//! shared [`ReportsCache`] in region batches and memoized per instance, so
//! repeated accessor calls within one request hit neither the cache nor the
//! schema a second time. Rates are derived from the cached count mappings
//! and are never cached themselves.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use log::debug;
use rustc_hash::FxHashMap;

use crate::config::{RepositoryConfig, SchemaVersion};
use crate::error::{ReportError, Result};
use crate::models::RegionNode;
use crate::period::{Period, PeriodRange, PeriodType};
use crate::query::{
    BpMeasuresQuery, CountsByPeriod, FollowUpsQuery, GroupedCounts, Metric,
    RegisteredPatientsQuery, ReportingSchema, SchemaV1, SchemaV2,
};
use crate::reports::cache::{CachedValue, RegionEntry, ReportsCache};
use crate::reports::{CountsByRegion, GroupedByRegion, ReportingContext};
use crate::store::PatientStore;

type MemoKey = (&'static str, Option<&'static str>);

#[derive(Clone)]
enum MemoValue {
    Counts(CountsByRegion),
    Grouped(GroupedByRegion),
    Recorded(BTreeMap<String, Option<NaiveDate>>),
}

/// Batched, cached metric access for a set of regions over a month range
pub struct Repository {
    regions: Vec<RegionNode>,
    facilities: FxHashMap<String, Vec<String>>,
    periods: PeriodRange,
    schema: Arc<dyn ReportingSchema>,
    schema_version: SchemaVersion,
    store: Arc<PatientStore>,
    cache: Arc<ReportsCache>,
    bypass_cache: Cell<bool>,
    memo: RefCell<FxHashMap<MemoKey, MemoValue>>,
}

impl Repository {
    /// Build a repository for the given regions (referenced by slug or id)
    /// and period range. Only month granularity is supported.
    pub fn new(
        ctx: &ReportingContext,
        region_refs: &[&str],
        periods: impl Into<PeriodRange>,
        config: &RepositoryConfig,
    ) -> Result<Self> {
        let periods = periods.into();
        if periods.period_type() != PeriodType::Month {
            return Err(ReportError::Argument(
                "repository periods must be month-granularity".to_string(),
            ));
        }

        let mut regions = Vec::with_capacity(region_refs.len());
        let mut facilities = FxHashMap::default();
        for reference in region_refs {
            let node = ctx.tree.resolve(reference)?.clone();
            facilities.insert(node.slug.clone(), ctx.tree.facilities_of(&node.id)?);
            regions.push(node);
        }

        let schema_version = config.schema_version();
        let schema: Arc<dyn ReportingSchema> = match schema_version {
            SchemaVersion::V1 => Arc::new(SchemaV1::new(ctx.store.clone(), facilities.clone())),
            SchemaVersion::V2 => Arc::new(SchemaV2::new(
                ctx.store.clone(),
                ctx.view.clone(),
                facilities.clone(),
            )),
        };
        debug!(
            "repository over {} regions, {}, schema {}",
            regions.len(),
            periods.fingerprint(),
            schema_version.tag()
        );

        Ok(Self {
            regions,
            facilities,
            periods,
            schema,
            schema_version,
            store: ctx.store.clone(),
            cache: ctx.cache.clone(),
            bypass_cache: Cell::new(config.bypass_cache),
            memo: RefCell::new(FxHashMap::default()),
        })
    }

    /// Regions this repository covers, in construction order
    #[must_use]
    pub fn regions(&self) -> &[RegionNode] {
        &self.regions
    }

    /// The month range this repository covers
    #[must_use]
    pub fn periods(&self) -> PeriodRange {
        self.periods
    }

    /// Schema version in effect
    #[must_use]
    pub fn schema_version(&self) -> SchemaVersion {
        self.schema_version
    }

    /// Whether batch fetches currently overwrite cache entries
    #[must_use]
    pub fn bypass_cache(&self) -> bool {
        self.bypass_cache.get()
    }

    /// Toggle cache bypass. Takes effect at the next batch fetch;
    /// already-memoized values are kept.
    pub fn set_bypass_cache(&self, bypass: bool) {
        self.bypass_cache.set(bypass);
    }

    // ---- schema-computed counts ----

    /// Patients registered in each month
    pub fn monthly_registrations(&self) -> Result<CountsByRegion> {
        self.cached_counts(Metric::MonthlyRegistrations)
    }

    /// Running registration totals
    pub fn cumulative_registrations(&self) -> Result<CountsByRegion> {
        self.cached_counts(Metric::CumulativeRegistrations)
    }

    /// Assigned patients bucketed by registration month
    pub fn assigned_patients(&self) -> Result<CountsByRegion> {
        self.cached_counts(Metric::AssignedPatients)
    }

    /// Running assigned totals
    pub fn cumulative_assigned_patients(&self) -> Result<CountsByRegion> {
        self.cached_counts(Metric::CumulativeAssignedPatients)
    }

    /// Assigned patients under care in each month
    pub fn under_care(&self) -> Result<CountsByRegion> {
        self.cached_counts(Metric::UnderCare)
    }

    /// Assigned patients lost to follow-up in each month
    pub fn ltfu(&self) -> Result<CountsByRegion> {
        self.cached_counts(Metric::LostToFollowUp)
    }

    /// Denominator: assigned, non-dead, registered at least three months
    /// earlier, lost-to-follow-up included
    pub fn adjusted_patients_with_ltfu(&self) -> Result<CountsByRegion> {
        self.cached_counts(Metric::AdjustedWithLtfu)
    }

    /// Denominator: as above but restricted to patients under care
    pub fn adjusted_patients_without_ltfu(&self) -> Result<CountsByRegion> {
        self.cached_counts(Metric::AdjustedWithoutLtfu)
    }

    /// Default adjusted denominator (under-care variant)
    pub fn adjusted_patients(&self) -> Result<CountsByRegion> {
        self.adjusted_patients_without_ltfu()
    }

    /// Adjusted patients whose latest BP in the trailing three months is
    /// under control
    pub fn controlled(&self) -> Result<CountsByRegion> {
        self.cached_counts(Metric::Controlled)
    }

    /// Adjusted patients whose latest BP in the trailing three months is
    /// not under control
    pub fn uncontrolled(&self) -> Result<CountsByRegion> {
        self.cached_counts(Metric::Uncontrolled)
    }

    /// Adjusted under-care patients with no visit in the trailing three
    /// months
    pub fn missed_visits(&self) -> Result<CountsByRegion> {
        self.cached_counts(Metric::MissedVisits)
    }

    /// Missed visits with lost-to-follow-up patients included
    pub fn missed_visits_with_ltfu(&self) -> Result<CountsByRegion> {
        self.cached_counts(Metric::MissedVisitsWithLtfu)
    }

    /// Adjusted under-care patients who visited but had no BP taken
    pub fn visited_without_bp_taken(&self) -> Result<CountsByRegion> {
        self.cached_counts(Metric::VisitedWithoutBpTaken)
    }

    // ---- derived rates ----

    /// Controlled patients as a rounded percentage of the under-care
    /// adjusted denominator
    pub fn controlled_rates(&self) -> Result<CountsByRegion> {
        self.rates(Metric::Controlled, Metric::AdjustedWithoutLtfu)
    }

    /// Uncontrolled percentage of the under-care adjusted denominator
    pub fn uncontrolled_rates(&self) -> Result<CountsByRegion> {
        self.rates(Metric::Uncontrolled, Metric::AdjustedWithoutLtfu)
    }

    /// Missed-visit percentage of the under-care adjusted denominator
    pub fn missed_visits_rates(&self) -> Result<CountsByRegion> {
        self.rates(Metric::MissedVisits, Metric::AdjustedWithoutLtfu)
    }

    /// Missed-visit percentage with lost-to-follow-up patients in both the
    /// numerator and the denominator
    pub fn missed_visits_with_ltfu_rates(&self) -> Result<CountsByRegion> {
        self.rates(Metric::MissedVisitsWithLtfu, Metric::AdjustedWithLtfu)
    }

    /// Visited-without-BP percentage of the under-care adjusted denominator
    pub fn visited_without_bp_taken_rates(&self) -> Result<CountsByRegion> {
        self.rates(Metric::VisitedWithoutBpTaken, Metric::AdjustedWithoutLtfu)
    }

    /// Lost-to-follow-up percentage of all patients ever assigned
    pub fn ltfu_rates(&self) -> Result<CountsByRegion> {
        self.rates(Metric::LostToFollowUp, Metric::CumulativeAssignedPatients)
    }

    // ---- direct and grouped counts ----

    /// Distinct patients with a follow-up BP at each region's facilities
    pub fn follow_ups(&self) -> Result<CountsByRegion> {
        let store = Arc::clone(&self.store);
        let periods = self.periods;
        self.cached_direct("follow_ups", move |facilities| {
            FollowUpsQuery::new().count(&store, facilities, &periods)
        })
    }

    /// Follow-ups grouped by the user who took the BP
    pub fn follow_ups_by_user(&self) -> Result<GroupedByRegion> {
        let store = Arc::clone(&self.store);
        let periods = self.periods;
        self.cached_grouped("follow_ups", "user", move |facilities| {
            FollowUpsQuery::new().count_by_user(&store, facilities, &periods)
        })
    }

    /// BP measurements taken at each region's facilities
    pub fn bp_measures(&self) -> Result<CountsByRegion> {
        let store = Arc::clone(&self.store);
        let periods = self.periods;
        self.cached_direct("bp_measures", move |facilities| {
            BpMeasuresQuery::new().count(&store, facilities, &periods)
        })
    }

    /// BP measurements grouped by the measuring user
    pub fn bp_measures_by_user(&self) -> Result<GroupedByRegion> {
        let store = Arc::clone(&self.store);
        let periods = self.periods;
        self.cached_grouped("bp_measures", "user", move |facilities| {
            BpMeasuresQuery::new().count_by_user(&store, facilities, &periods)
        })
    }

    /// Monthly registrations grouped by registering user
    pub fn monthly_registrations_by_user(&self) -> Result<GroupedByRegion> {
        let store = Arc::clone(&self.store);
        let periods = self.periods;
        self.cached_grouped("monthly_registrations", "registration_user", move |facilities| {
            RegisteredPatientsQuery::new().count_by_user(&store, facilities, &periods)
        })
    }

    /// Running registration totals grouped by registering user; users with
    /// no registrations yet still appear with zeros
    pub fn cumulative_registrations_by_user(&self) -> Result<GroupedByRegion> {
        let store = Arc::clone(&self.store);
        let periods = self.periods;
        self.cached_grouped("cumulative_registrations", "registration_user", move |facilities| {
            RegisteredPatientsQuery::new().cumulative_by_user(&store, facilities, &periods)
        })
    }

    // ---- region metadata ----

    /// Earliest patient record per region; `None` marks a region that has
    /// never had patient data
    pub fn earliest_patient_recorded_at(&self) -> Result<BTreeMap<String, Option<NaiveDate>>> {
        let key = ("earliest_patient_recorded_at", None);
        if let Some(MemoValue::Recorded(hit)) = self.memo.borrow().get(&key) {
            return Ok(hit.clone());
        }
        let entries = self.entries("earliest_patient_recorded_at", None);
        let schema = &self.schema;
        let values = self
            .cache
            .fetch_multi(&entries, self.bypass_cache.get(), |entry| {
                schema
                    .earliest_patient_recorded_at(&entry.region_slug)
                    .map(CachedValue::RecordedAt)
            })?;
        let result: BTreeMap<String, Option<NaiveDate>> = entries
            .iter()
            .zip(values)
            .map(|(entry, value)| match value {
                CachedValue::RecordedAt(date) => Ok((entry.region_slug.clone(), date)),
                _ => Err(unexpected_value(entry)),
            })
            .collect::<Result<_>>()?;
        self.memo
            .borrow_mut()
            .insert(key, MemoValue::Recorded(result.clone()));
        Ok(result)
    }

    /// Earliest patient record per region as a month
    pub fn earliest_patient_recorded_at_period(
        &self,
    ) -> Result<BTreeMap<String, Option<Period>>> {
        Ok(self
            .earliest_patient_recorded_at()?
            .into_iter()
            .map(|(slug, date)| (slug, date.map(Period::month_of)))
            .collect())
    }

    // ---- plumbing ----

    fn entries(&self, metric: &'static str, group_by: Option<&'static str>) -> Vec<RegionEntry> {
        self.regions
            .iter()
            .map(|region| {
                RegionEntry::new(
                    region.slug.clone(),
                    metric,
                    group_by,
                    self.periods,
                    self.schema_version,
                )
            })
            .collect()
    }

    fn cached_counts(&self, metric: Metric) -> Result<CountsByRegion> {
        let key = (metric.name(), None);
        if let Some(MemoValue::Counts(hit)) = self.memo.borrow().get(&key) {
            return Ok(hit.clone());
        }
        let entries = self.entries(metric.name(), None);
        let schema = &self.schema;
        let values = self
            .cache
            .fetch_multi(&entries, self.bypass_cache.get(), |entry| {
                schema
                    .counts(metric, &entry.region_slug, &entry.range)
                    .map(CachedValue::Counts)
            })?;
        let result = collect_counts(&entries, values)?;
        self.memo
            .borrow_mut()
            .insert(key, MemoValue::Counts(result.clone()));
        Ok(result)
    }

    fn cached_direct<F>(&self, metric: &'static str, compute: F) -> Result<CountsByRegion>
    where
        F: Fn(&[String]) -> CountsByPeriod + Sync,
    {
        let key = (metric, None);
        if let Some(MemoValue::Counts(hit)) = self.memo.borrow().get(&key) {
            return Ok(hit.clone());
        }
        let entries = self.entries(metric, None);
        let facilities = &self.facilities;
        let values = self
            .cache
            .fetch_multi(&entries, self.bypass_cache.get(), |entry| {
                let set = facilities
                    .get(&entry.region_slug)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                Ok(CachedValue::Counts(compute(set)))
            })?;
        let result = collect_counts(&entries, values)?;
        self.memo
            .borrow_mut()
            .insert(key, MemoValue::Counts(result.clone()));
        Ok(result)
    }

    fn cached_grouped<F>(
        &self,
        metric: &'static str,
        group_by: &'static str,
        compute: F,
    ) -> Result<GroupedByRegion>
    where
        F: Fn(&[String]) -> GroupedCounts + Sync,
    {
        let key = (metric, Some(group_by));
        if let Some(MemoValue::Grouped(hit)) = self.memo.borrow().get(&key) {
            return Ok(hit.clone());
        }
        let entries = self.entries(metric, Some(group_by));
        let facilities = &self.facilities;
        let values = self
            .cache
            .fetch_multi(&entries, self.bypass_cache.get(), |entry| {
                let set = facilities
                    .get(&entry.region_slug)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                Ok(CachedValue::Grouped(compute(set)))
            })?;
        let result: GroupedByRegion = entries
            .iter()
            .zip(values)
            .map(|(entry, value)| match value {
                CachedValue::Grouped(grouped) => Ok((entry.region_slug.clone(), grouped)),
                _ => Err(unexpected_value(entry)),
            })
            .collect::<Result<_>>()?;
        self.memo
            .borrow_mut()
            .insert(key, MemoValue::Grouped(result.clone()));
        Ok(result)
    }

    /// Numerator over denominator as a rounded percentage, per region and
    /// period. A missing or zero denominator yields 0, not an error;
    /// regions with no data keep their empty mappings.
    fn rates(&self, numerator: Metric, denominator: Metric) -> Result<CountsByRegion> {
        let numerators = self.cached_counts(numerator)?;
        let denominators = self.cached_counts(denominator)?;
        Ok(numerators
            .into_iter()
            .map(|(slug, counts)| {
                let region_denominators = denominators.get(&slug);
                let cells = counts
                    .into_iter()
                    .map(|(period, n)| {
                        let d = region_denominators
                            .and_then(|m| m.get(&period))
                            .copied()
                            .unwrap_or(0);
                        (period, percentage(n, d))
                    })
                    .collect();
                (slug, cells)
            })
            .collect())
    }
}

fn collect_counts(entries: &[RegionEntry], values: Vec<CachedValue>) -> Result<CountsByRegion> {
    entries
        .iter()
        .zip(values)
        .map(|(entry, value)| match value {
            CachedValue::Counts(counts) => Ok((entry.region_slug.clone(), counts)),
            _ => Err(unexpected_value(entry)),
        })
        .collect()
}

fn unexpected_value(entry: &RegionEntry) -> ReportError {
    ReportError::Cache(format!("unexpected value type under {}", entry.cache_key()))
}

/// Rounded percentage with zero-denominator guarded to 0
#[must_use]
pub fn percentage(numerator: i64, denominator: i64) -> i64 {
    if denominator <= 0 {
        return 0;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    {
        (numerator as f64 / denominator as f64 * 100.0).round() as i64
    }
}
