//! Clinical classification rules
//!
//! Pure functions over the raw event store. Both computation schemas call
//! into these, which is what guarantees they agree for any given dataset:
//! the legacy schema applies them per query, the v2 schema applies them
//! once per patient per month when the view is refreshed.
//!
//! Cutoff conventions, relative to a report month M:
//! - LTFU window: `(end_of_month(M) - 12 months, end_of_month(M)]`
//! - outcome/visit window: `(end_of_month(M) - 3 months, end_of_month(M)]`
//! - registration age is a calendar-month difference, so a patient
//!   registered on any day 12 calendar months before M counts as 12.

use chrono::Months;

use crate::models::{BloodPressure, CareState, Patient, TreatmentOutcome};
use crate::period::Period;
use crate::store::{DateWindow, PatientStore};

/// A BP strictly under this systolic value (and the diastolic limit) is controlled
pub const CONTROLLED_SYSTOLIC_LIMIT: i32 = 140;
/// Diastolic limit for control classification
pub const CONTROLLED_DIASTOLIC_LIMIT: i32 = 90;

/// Months of registration age at which a patient becomes eligible for LTFU
pub const LTFU_MONTHS: i32 = 12;
/// Months of registration age at which a patient enters the adjusted denominators
pub const ADJUSTMENT_MONTHS: i32 = 3;

/// Whether a measurement is under control
#[must_use]
pub fn bp_controlled(bp: &BloodPressure) -> bool {
    bp.systolic < CONTROLLED_SYSTOLIC_LIMIT && bp.diastolic < CONTROLLED_DIASTOLIC_LIMIT
}

/// Calendar months between the patient's registration month and the report month
#[must_use]
pub fn months_since_registration(patient: &Patient, month: Period) -> i32 {
    month.month_index() - Period::month_of(patient.recorded_at).month_index()
}

/// The trailing 12-month BP window for LTFU classification
#[must_use]
pub fn ltfu_window(month: Period) -> DateWindow {
    let upto = month.end_date();
    DateWindow {
        after: upto.checked_sub_months(Months::new(12)).unwrap_or(upto),
        upto,
    }
}

/// The trailing 3-month window for visit and outcome classification
#[must_use]
pub fn outcome_window(month: Period) -> DateWindow {
    let upto = month.end_date();
    DateWindow {
        after: upto.checked_sub_months(Months::new(3)).unwrap_or(upto),
        upto,
    }
}

/// Hypertension care state of a patient for a report month.
///
/// Dead is disjoint from the other two states. A patient registered less
/// than 12 months before the report month is never lost to follow-up,
/// regardless of BP history.
#[must_use]
pub fn care_state(store: &PatientStore, patient: &Patient, month: Period) -> CareState {
    if patient.dead() {
        return CareState::Dead;
    }
    if months_since_registration(patient, month) >= LTFU_MONTHS
        && !store.bp_taken_in(&patient.id, ltfu_window(month))
    {
        return CareState::LostToFollowUp;
    }
    CareState::UnderCare
}

/// 3-month treatment outcome for a report month, exactly one label with
/// precedence missed_visit > visited_no_bp > controlled/uncontrolled.
#[must_use]
pub fn treatment_outcome(store: &PatientStore, patient: &Patient, month: Period) -> TreatmentOutcome {
    let window = outcome_window(month);
    match store.latest_bp_in(&patient.id, window) {
        Some(bp) if bp_controlled(bp) => TreatmentOutcome::Controlled,
        Some(_) => TreatmentOutcome::Uncontrolled,
        None if store.visited_in(&patient.id, window) => TreatmentOutcome::VisitedNoBp,
        None => TreatmentOutcome::MissedVisit,
    }
}
