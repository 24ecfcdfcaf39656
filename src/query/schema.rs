//! The two interchangeable computation schemas
//!
//! `SchemaV1` computes every metric directly from raw event tables;
//! `SchemaV2` reads the materialized per-patient-per-month view. Both
//! apply the same clinical classification rules, so for any dataset whose
//! view has been refreshed through the requested range they produce
//! identical results. A repository resolves its schema once at
//! construction, never per query, so one report never mixes schemas.

use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use log::debug;
use rustc_hash::FxHashMap;

use crate::clinical::{self, ADJUSTMENT_MONTHS};
use crate::config::SchemaVersion;
use crate::error::{ReportError, Result};
use crate::models::{CareState, TreatmentOutcome};
use crate::period::{Period, PeriodRange};
use crate::query::{
    AssignedPatientsQuery, CountsByPeriod, Metric, RegisteredPatientsQuery,
    earliest_patient_recorded_at,
};
use crate::store::{MonthlyStatesView, PatientMonthRow, PatientStore};

/// A computation schema: maps (metric, region, period range) to counts
pub trait ReportingSchema: Send + Sync {
    /// Which schema this is; part of every cache key
    fn version(&self) -> SchemaVersion;

    /// Counts for one metric over one region and the full period range.
    /// The range is computed as a single contiguous unit because the
    /// cumulative metrics need the full history up to each period.
    fn counts(&self, metric: Metric, region_slug: &str, range: &PeriodRange)
    -> Result<CountsByPeriod>;

    /// Earliest patient record (registered or assigned) for a region
    fn earliest_patient_recorded_at(&self, region_slug: &str) -> Result<Option<NaiveDate>>;
}

/// A reporting month's classification of one patient, produced by either
/// schema's backing data
struct MonthState {
    months_since_registration: i32,
    care_state: CareState,
    treatment_outcome: TreatmentOutcome,
}

impl MonthState {
    fn matches(&self, metric: Metric) -> bool {
        let adjusted = self.months_since_registration >= ADJUSTMENT_MONTHS;
        let under_care = self.care_state == CareState::UnderCare;
        match metric {
            Metric::CumulativeAssignedPatients => true,
            Metric::UnderCare => under_care,
            Metric::LostToFollowUp => self.care_state == CareState::LostToFollowUp,
            Metric::AdjustedWithLtfu => adjusted,
            Metric::AdjustedWithoutLtfu => adjusted && under_care,
            Metric::Controlled => {
                adjusted && under_care && self.treatment_outcome == TreatmentOutcome::Controlled
            }
            Metric::Uncontrolled => {
                adjusted && under_care && self.treatment_outcome == TreatmentOutcome::Uncontrolled
            }
            Metric::MissedVisits => {
                adjusted && under_care && self.treatment_outcome == TreatmentOutcome::MissedVisit
            }
            Metric::MissedVisitsWithLtfu => {
                adjusted && self.treatment_outcome == TreatmentOutcome::MissedVisit
            }
            Metric::VisitedWithoutBpTaken => {
                adjusted && under_care && self.treatment_outcome == TreatmentOutcome::VisitedNoBp
            }
            Metric::MonthlyRegistrations
            | Metric::CumulativeRegistrations
            | Metric::AssignedPatients => false,
        }
    }
}

/// Legacy schema: computes directly against the raw event tables
pub struct SchemaV1 {
    store: Arc<PatientStore>,
    regions: FxHashMap<String, Vec<String>>,
    registered_patients_query: RegisteredPatientsQuery,
    assigned_patients_query: AssignedPatientsQuery,
}

impl SchemaV1 {
    /// Build the schema over a region-slug to facility-set mapping
    #[must_use]
    pub fn new(store: Arc<PatientStore>, regions: FxHashMap<String, Vec<String>>) -> Self {
        Self {
            store,
            regions,
            registered_patients_query: RegisteredPatientsQuery::new(),
            assigned_patients_query: AssignedPatientsQuery::new(),
        }
    }

    fn facilities(&self, region_slug: &str) -> Result<&[String]> {
        self.regions
            .get(region_slug)
            .map(Vec::as_slice)
            .ok_or_else(|| ReportError::RegionNotFound(region_slug.to_string()))
    }

    /// Per-period counts of assigned patients matching the metric's
    /// care-state predicate
    fn state_counts(
        &self,
        metric: Metric,
        facilities: &[String],
        range: &PeriodRange,
    ) -> CountsByPeriod {
        let store = &self.store;
        let assigned: Vec<_> = store
            .patients()
            .filter(|p| !p.deleted && facilities.contains(&p.assigned_facility))
            .collect();

        range
            .iter()
            .map(|month| {
                let count = assigned
                    .iter()
                    .filter(|p| clinical::months_since_registration(p, month) >= 0)
                    .filter(|p| !p.dead())
                    .filter(|p| {
                        MonthState {
                            months_since_registration: clinical::months_since_registration(p, month),
                            care_state: clinical::care_state(store, p, month),
                            treatment_outcome: clinical::treatment_outcome(store, p, month),
                        }
                        .matches(metric)
                    })
                    .count() as i64;
                (month, count)
            })
            .collect()
    }
}

impl ReportingSchema for SchemaV1 {
    fn version(&self) -> SchemaVersion {
        SchemaVersion::V1
    }

    fn counts(
        &self,
        metric: Metric,
        region_slug: &str,
        range: &PeriodRange,
    ) -> Result<CountsByPeriod> {
        let facilities = self.facilities(region_slug)?;
        debug!("schema v1 computing {} for {region_slug}", metric.name());
        let counts = match metric {
            Metric::MonthlyRegistrations => {
                self.registered_patients_query.count(&self.store, facilities, range)
            }
            Metric::CumulativeRegistrations => {
                self.registered_patients_query.cumulative(&self.store, facilities, range)
            }
            Metric::AssignedPatients => {
                self.assigned_patients_query.count(&self.store, facilities, range)
            }
            Metric::CumulativeAssignedPatients => {
                self.assigned_patients_query.cumulative(&self.store, facilities, range)
            }
            _ => {
                if earliest_patient_recorded_at(&self.store, facilities).is_none() {
                    CountsByPeriod::new()
                } else {
                    self.state_counts(metric, facilities, range)
                }
            }
        };
        Ok(counts)
    }

    fn earliest_patient_recorded_at(&self, region_slug: &str) -> Result<Option<NaiveDate>> {
        let facilities = self.facilities(region_slug)?;
        Ok(earliest_patient_recorded_at(&self.store, facilities))
    }
}

/// View-backed schema: reads pre-aggregated per-patient-per-month rows
pub struct SchemaV2 {
    store: Arc<PatientStore>,
    view: Arc<RwLock<MonthlyStatesView>>,
    regions: FxHashMap<String, Vec<String>>,
}

impl SchemaV2 {
    /// Build the schema over the shared view. The earliest-record lookup
    /// and the empty-region check still consult the patient table; all
    /// per-month counts come from view rows.
    #[must_use]
    pub fn new(
        store: Arc<PatientStore>,
        view: Arc<RwLock<MonthlyStatesView>>,
        regions: FxHashMap<String, Vec<String>>,
    ) -> Self {
        Self { store, view, regions }
    }

    fn facilities(&self, region_slug: &str) -> Result<&[String]> {
        self.regions
            .get(region_slug)
            .map(Vec::as_slice)
            .ok_or_else(|| ReportError::RegionNotFound(region_slug.to_string()))
    }

    fn row_count(
        &self,
        range: &PeriodRange,
        predicate: impl Fn(&PatientMonthRow) -> bool,
    ) -> Result<CountsByPeriod> {
        let view = self
            .view
            .read()
            .map_err(|_| ReportError::Cache("monthly states view lock poisoned".to_string()))?;
        Ok(range
            .iter()
            .map(|month| {
                let count = view.rows_for(month).filter(|row| predicate(row)).count() as i64;
                (month, count)
            })
            .collect())
    }
}

impl ReportingSchema for SchemaV2 {
    fn version(&self) -> SchemaVersion {
        SchemaVersion::V2
    }

    fn counts(
        &self,
        metric: Metric,
        region_slug: &str,
        range: &PeriodRange,
    ) -> Result<CountsByPeriod> {
        let facilities = self.facilities(region_slug)?.to_vec();
        if earliest_patient_recorded_at(&self.store, &facilities).is_none() {
            return Ok(CountsByPeriod::new());
        }
        debug!("schema v2 computing {} for {region_slug}", metric.name());
        match metric {
            Metric::MonthlyRegistrations => self.row_count(range, |row| {
                row.months_since_registration == 0
                    && facilities.contains(&row.registration_facility)
            }),
            Metric::CumulativeRegistrations => {
                self.row_count(range, |row| facilities.contains(&row.registration_facility))
            }
            Metric::AssignedPatients => self.row_count(range, |row| {
                row.months_since_registration == 0
                    && row.care_state != CareState::Dead
                    && facilities.contains(&row.assigned_facility)
            }),
            _ => self.row_count(range, |row| {
                row.care_state != CareState::Dead
                    && facilities.contains(&row.assigned_facility)
                    && MonthState {
                        months_since_registration: row.months_since_registration,
                        care_state: row.care_state,
                        treatment_outcome: row.treatment_outcome,
                    }
                    .matches(metric)
            }),
        }
    }

    fn earliest_patient_recorded_at(&self, region_slug: &str) -> Result<Option<NaiveDate>> {
        let facilities = self.facilities(region_slug)?;
        Ok(earliest_patient_recorded_at(&self.store, facilities))
    }
}
