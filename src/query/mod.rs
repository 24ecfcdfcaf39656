//! Stateless metric queries against the raw event store
//!
//! Each query computes a mapping from period to count for one region,
//! given the region's facility set. Periods inside the requested range
//! are always present once a region has any data at all; regions with no
//! patient data yield an empty mapping so callers can distinguish "no
//! data" from "all zeros".

pub mod schema;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use itertools::Itertools;

use crate::models::Patient;
use crate::period::{Period, PeriodRange};
use crate::store::PatientStore;

pub use schema::{ReportingSchema, SchemaV1, SchemaV2};

/// Mapping from period to count for one region
pub type CountsByPeriod = BTreeMap<Period, i64>;
/// Mapping from period to per-group counts for one region
pub type GroupedCounts = BTreeMap<Period, BTreeMap<String, i64>>;

/// The schema-computed metric battery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Patients registered in the month
    MonthlyRegistrations,
    /// Running registration total up to and including the month
    CumulativeRegistrations,
    /// Patients assigned to the region, bucketed by registration month
    AssignedPatients,
    /// Running assigned total up to and including the month
    CumulativeAssignedPatients,
    /// Assigned patients under care in the month
    UnderCare,
    /// Assigned patients lost to follow-up in the month
    LostToFollowUp,
    /// Assigned, non-dead, registered at least 3 months before the month
    AdjustedWithLtfu,
    /// Adjusted denominator excluding lost-to-follow-up patients
    AdjustedWithoutLtfu,
    /// Adjusted patients whose latest 3-month BP is under control
    Controlled,
    /// Adjusted patients whose latest 3-month BP is not under control
    Uncontrolled,
    /// Adjusted under-care patients with no visit in the trailing 3 months
    MissedVisits,
    /// Missed visits including lost-to-follow-up patients
    MissedVisitsWithLtfu,
    /// Adjusted under-care patients who visited but had no BP taken
    VisitedWithoutBpTaken,
}

impl Metric {
    /// Stable name used in cache keys and logs
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MonthlyRegistrations => "monthly_registrations",
            Self::CumulativeRegistrations => "cumulative_registrations",
            Self::AssignedPatients => "assigned_patients",
            Self::CumulativeAssignedPatients => "cumulative_assigned_patients",
            Self::UnderCare => "under_care",
            Self::LostToFollowUp => "ltfu",
            Self::AdjustedWithLtfu => "adjusted_patients_with_ltfu",
            Self::AdjustedWithoutLtfu => "adjusted_patients_without_ltfu",
            Self::Controlled => "controlled",
            Self::Uncontrolled => "uncontrolled",
            Self::MissedVisits => "missed_visits",
            Self::MissedVisitsWithLtfu => "missed_visits_with_ltfu",
            Self::VisitedWithoutBpTaken => "visited_without_bp_taken",
        }
    }
}

/// Earliest registration or assignment date among a facility set's
/// patients; `None` means the region has no data at all.
#[must_use]
pub fn earliest_patient_recorded_at(
    store: &PatientStore,
    facilities: &[String],
) -> Option<NaiveDate> {
    store
        .patients()
        .filter(|p| !p.deleted)
        .filter(|p| {
            facilities.contains(&p.registration_facility)
                || facilities.contains(&p.assigned_facility)
        })
        .map(|p| p.recorded_at)
        .min()
}

/// Zero-fill every period of the range, or return an empty mapping when
/// the region has no data
fn zero_filled(
    store: &PatientStore,
    facilities: &[String],
    range: &PeriodRange,
) -> CountsByPeriod {
    if earliest_patient_recorded_at(store, facilities).is_none() {
        return CountsByPeriod::new();
    }
    range.iter().map(|p| (p, 0)).collect()
}

fn patients_registered_at<'s>(
    store: &'s PatientStore,
    facilities: &[String],
) -> impl Iterator<Item = &'s Patient> {
    let facilities = facilities.to_vec();
    store
        .patients()
        .filter(|p| !p.deleted)
        .filter(move |p| facilities.contains(&p.registration_facility))
}

fn patients_assigned_to<'s>(
    store: &'s PatientStore,
    facilities: &[String],
) -> impl Iterator<Item = &'s Patient> {
    let facilities = facilities.to_vec();
    store
        .patients()
        .filter(|p| !p.deleted && !p.dead())
        .filter(move |p| facilities.contains(&p.assigned_facility))
}

/// Registration counts per month, bucketed by registration date
#[derive(Debug, Default)]
pub struct RegisteredPatientsQuery;

impl RegisteredPatientsQuery {
    /// Create the query
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Monthly registration counts
    #[must_use]
    pub fn count(
        &self,
        store: &PatientStore,
        facilities: &[String],
        range: &PeriodRange,
    ) -> CountsByPeriod {
        let mut counts = zero_filled(store, facilities, range);
        if counts.is_empty() {
            return counts;
        }
        for patient in patients_registered_at(store, facilities) {
            let month = Period::month_of(patient.recorded_at);
            if let Some(count) = counts.get_mut(&month) {
                *count += 1;
            }
        }
        counts
    }

    /// Running totals up to and including each month. Needs the full
    /// registration history, so it counts from the beginning of time, not
    /// from the range start.
    #[must_use]
    pub fn cumulative(
        &self,
        store: &PatientStore,
        facilities: &[String],
        range: &PeriodRange,
    ) -> CountsByPeriod {
        let mut counts = zero_filled(store, facilities, range);
        if counts.is_empty() {
            return counts;
        }
        let registrations: Vec<Period> = patients_registered_at(store, facilities)
            .map(|p| Period::month_of(p.recorded_at))
            .collect();
        for (month, count) in counts.iter_mut() {
            *count = registrations.iter().filter(|m| *m <= month).count() as i64;
        }
        counts
    }

    /// Monthly registration counts grouped by registering user
    #[must_use]
    pub fn count_by_user(
        &self,
        store: &PatientStore,
        facilities: &[String],
        range: &PeriodRange,
    ) -> GroupedCounts {
        if earliest_patient_recorded_at(store, facilities).is_none() {
            return GroupedCounts::new();
        }
        let mut grouped: GroupedCounts = range.iter().map(|p| (p, BTreeMap::new())).collect();
        for patient in patients_registered_at(store, facilities) {
            let month = Period::month_of(patient.recorded_at);
            if let Some(users) = grouped.get_mut(&month) {
                *users.entry(patient.registration_user.clone()).or_insert(0) += 1;
            }
        }
        grouped
    }

    /// Running totals per registering user. Every user who ever registered
    /// a patient in the region appears in every period, zero included.
    #[must_use]
    pub fn cumulative_by_user(
        &self,
        store: &PatientStore,
        facilities: &[String],
        range: &PeriodRange,
    ) -> GroupedCounts {
        if earliest_patient_recorded_at(store, facilities).is_none() {
            return GroupedCounts::new();
        }
        let registrations: Vec<(Period, String)> = patients_registered_at(store, facilities)
            .map(|p| (Period::month_of(p.recorded_at), p.registration_user.clone()))
            .collect();
        let users: Vec<&String> = registrations.iter().map(|(_, u)| u).unique().collect();
        range
            .iter()
            .map(|month| {
                let per_user = users
                    .iter()
                    .map(|user| {
                        let total = registrations
                            .iter()
                            .filter(|(m, u)| *m <= month && u == *user)
                            .count() as i64;
                        ((*user).clone(), total)
                    })
                    .collect();
                (month, per_user)
            })
            .collect()
    }
}

/// Assigned-patient counts per month, by current assignment (not
/// historical), dead patients excluded
#[derive(Debug, Default)]
pub struct AssignedPatientsQuery;

impl AssignedPatientsQuery {
    /// Create the query
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Monthly assigned counts, bucketed by registration month
    #[must_use]
    pub fn count(
        &self,
        store: &PatientStore,
        facilities: &[String],
        range: &PeriodRange,
    ) -> CountsByPeriod {
        let mut counts = zero_filled(store, facilities, range);
        if counts.is_empty() {
            return counts;
        }
        for patient in patients_assigned_to(store, facilities) {
            let month = Period::month_of(patient.recorded_at);
            if let Some(count) = counts.get_mut(&month) {
                *count += 1;
            }
        }
        counts
    }

    /// Running assigned totals up to and including each month
    #[must_use]
    pub fn cumulative(
        &self,
        store: &PatientStore,
        facilities: &[String],
        range: &PeriodRange,
    ) -> CountsByPeriod {
        let mut counts = zero_filled(store, facilities, range);
        if counts.is_empty() {
            return counts;
        }
        let registrations: Vec<Period> = patients_assigned_to(store, facilities)
            .map(|p| Period::month_of(p.recorded_at))
            .collect();
        for (month, count) in counts.iter_mut() {
            *count = registrations.iter().filter(|m| *m <= month).count() as i64;
        }
        counts
    }
}

/// Hypertension follow-ups: distinct patients with a BP taken at the
/// region's facilities in a month strictly after their registration month
#[derive(Debug, Default)]
pub struct FollowUpsQuery;

impl FollowUpsQuery {
    /// Create the query
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn follow_up_events<'s>(
        &self,
        store: &'s PatientStore,
        facilities: &[String],
    ) -> Vec<(&'s str, Period, &'s str)> {
        store
            .blood_pressures()
            .iter()
            .filter(|bp| facilities.contains(&bp.facility_id))
            .filter_map(|bp| {
                let patient = store.patient(&bp.patient_id).filter(|p| !p.deleted)?;
                let month = Period::month_of(bp.recorded_at);
                (month > Period::month_of(patient.recorded_at))
                    .then_some((bp.patient_id.as_str(), month, bp.user_id.as_str()))
            })
            .collect()
    }

    /// Monthly follow-up counts
    #[must_use]
    pub fn count(
        &self,
        store: &PatientStore,
        facilities: &[String],
        range: &PeriodRange,
    ) -> CountsByPeriod {
        let mut counts = zero_filled(store, facilities, range);
        if counts.is_empty() {
            return counts;
        }
        let events = self.follow_up_events(store, facilities);
        for (month, count) in counts.iter_mut() {
            *count = events
                .iter()
                .filter(|(_, m, _)| m == month)
                .map(|(patient, ..)| patient)
                .unique()
                .count() as i64;
        }
        counts
    }

    /// Monthly follow-up counts grouped by the user who took the BP
    #[must_use]
    pub fn count_by_user(
        &self,
        store: &PatientStore,
        facilities: &[String],
        range: &PeriodRange,
    ) -> GroupedCounts {
        if earliest_patient_recorded_at(store, facilities).is_none() {
            return GroupedCounts::new();
        }
        let events = self.follow_up_events(store, facilities);
        range
            .iter()
            .map(|month| {
                let per_user = events
                    .iter()
                    .filter(|(_, m, _)| *m == month)
                    .map(|(patient, _, user)| (*user, *patient))
                    .unique()
                    .counts_by(|(user, _)| user.to_string())
                    .into_iter()
                    .map(|(user, n)| (user, n as i64))
                    .collect();
                (month, per_user)
            })
            .collect()
    }
}

/// BP measurement counts per month at the region's facilities
#[derive(Debug, Default)]
pub struct BpMeasuresQuery;

impl BpMeasuresQuery {
    /// Create the query
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Monthly measurement counts
    #[must_use]
    pub fn count(
        &self,
        store: &PatientStore,
        facilities: &[String],
        range: &PeriodRange,
    ) -> CountsByPeriod {
        let mut counts = zero_filled(store, facilities, range);
        if counts.is_empty() {
            return counts;
        }
        for bp in store.blood_pressures() {
            if !facilities.contains(&bp.facility_id) {
                continue;
            }
            if let Some(count) = counts.get_mut(&Period::month_of(bp.recorded_at)) {
                *count += 1;
            }
        }
        counts
    }

    /// Monthly measurement counts grouped by the measuring user
    #[must_use]
    pub fn count_by_user(
        &self,
        store: &PatientStore,
        facilities: &[String],
        range: &PeriodRange,
    ) -> GroupedCounts {
        if earliest_patient_recorded_at(store, facilities).is_none() {
            return GroupedCounts::new();
        }
        let mut grouped: GroupedCounts = range.iter().map(|p| (p, BTreeMap::new())).collect();
        for bp in store.blood_pressures() {
            if !facilities.contains(&bp.facility_id) {
                continue;
            }
            if let Some(users) = grouped.get_mut(&Period::month_of(bp.recorded_at)) {
                *users.entry(bp.user_id.clone()).or_insert(0) += 1;
            }
        }
        grouped
    }
}
