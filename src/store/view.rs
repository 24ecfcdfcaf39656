//! Materialized per-patient-per-month summary view
//!
//! The v2 schema reads these rows instead of the raw event tables. The
//! view is rebuilt by an external refresh job; the reporting layer only
//! ever reads whatever state the view currently holds and never triggers
//! a refresh itself. `refresh` is idempotent and non-concurrent.

use log::info;
use rustc_hash::FxHashMap;

use crate::clinical;
use crate::models::{CareState, PatientStatus, TreatmentOutcome};
use crate::period::{Period, PeriodRange};
use crate::store::PatientStore;

/// One row of the view: a patient's reporting state for one month
#[derive(Debug, Clone)]
pub struct PatientMonthRow {
    /// Patient id
    pub patient_id: String,
    /// Report month
    pub month: Period,
    /// Patient status as of the refresh
    pub status: PatientStatus,
    /// Registration facility
    pub registration_facility: String,
    /// Currently assigned facility
    pub assigned_facility: String,
    /// Registering user
    pub registration_user: String,
    /// Calendar months since the registration month
    pub months_since_registration: i32,
    /// Care state for this month
    pub care_state: CareState,
    /// 3-month treatment outcome for this month
    pub treatment_outcome: TreatmentOutcome,
}

/// The materialized view: one row per patient per month from registration
/// through the refresh horizon
#[derive(Debug, Default)]
pub struct MonthlyStatesView {
    rows: Vec<PatientMonthRow>,
    by_month: FxHashMap<Period, Vec<usize>>,
    refreshed_through: Option<Period>,
}

impl MonthlyStatesView {
    /// Create an empty, never-refreshed view
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last month the view has rows for, if ever refreshed
    #[must_use]
    pub const fn refreshed_through(&self) -> Option<Period> {
        self.refreshed_through
    }

    /// Rebuild all rows from the raw store, covering every non-deleted
    /// patient from their registration month through `through`.
    pub fn refresh(&mut self, store: &PatientStore, through: Period) {
        self.rows.clear();
        self.by_month.clear();

        for patient in store.patients().filter(|p| !p.deleted) {
            let first = Period::month_of(patient.recorded_at);
            if first > through {
                continue;
            }
            let months = PeriodRange {
                start: first,
                end: through,
            };
            for month in months.iter() {
                let row = PatientMonthRow {
                    patient_id: patient.id.clone(),
                    month,
                    status: patient.status,
                    registration_facility: patient.registration_facility.clone(),
                    assigned_facility: patient.assigned_facility.clone(),
                    registration_user: patient.registration_user.clone(),
                    months_since_registration: clinical::months_since_registration(patient, month),
                    care_state: clinical::care_state(store, patient, month),
                    treatment_outcome: clinical::treatment_outcome(store, patient, month),
                };
                self.by_month.entry(month).or_default().push(self.rows.len());
                self.rows.push(row);
            }
        }
        self.refreshed_through = Some(through);
        info!(
            "refreshed monthly states view through {through}: {} rows",
            self.rows.len()
        );
    }

    /// All rows for one month
    pub fn rows_for(&self, month: Period) -> impl Iterator<Item = &PatientMonthRow> {
        self.by_month
            .get(&month)
            .into_iter()
            .flatten()
            .map(|i| &self.rows[*i])
    }

    /// All rows
    #[must_use]
    pub fn rows(&self) -> &[PatientMonthRow] {
        &self.rows
    }
}
