//! In-memory patient data store
//!
//! This is the read-only collaborator the reporting layer queries: flat
//! event tables with per-patient indexes. The legacy schema computes
//! directly against these tables; the v2 schema reads the materialized
//! view built from them (see [`view`]).

pub mod view;

use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use crate::models::{
    Appointment, BloodPressure, BloodSugar, Facility, Patient, PrescriptionDrug, Teleconsultation,
};

pub use view::{MonthlyStatesView, PatientMonthRow};

/// A half-open date window: `(after, upto]`
///
/// This matches the reporting cutoffs: an event exactly at a window's
/// lower bound is outside it, an event at the upper bound is inside.
#[derive(Debug, Clone, Copy)]
pub struct DateWindow {
    /// Exclusive lower bound
    pub after: NaiveDate,
    /// Inclusive upper bound
    pub upto: NaiveDate,
}

impl DateWindow {
    /// Whether the window contains the given date
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.after < date && date <= self.upto
    }
}

/// Flat table store for patients and their clinical events
#[derive(Debug, Default)]
pub struct PatientStore {
    patients: FxHashMap<String, Patient>,
    facilities: FxHashMap<String, Facility>,
    blood_pressures: Vec<BloodPressure>,
    blood_sugars: Vec<BloodSugar>,
    prescription_drugs: Vec<PrescriptionDrug>,
    appointments: Vec<Appointment>,
    teleconsultations: Vec<Teleconsultation>,
    // Row indexes into the event tables, keyed by patient id
    bp_index: FxHashMap<String, Vec<usize>>,
    bs_index: FxHashMap<String, Vec<usize>>,
    drug_index: FxHashMap<String, Vec<usize>>,
    appointment_index: FxHashMap<String, Vec<usize>>,
}

impl PatientStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a facility
    pub fn add_facility(&mut self, facility: Facility) {
        self.facilities.insert(facility.id.clone(), facility);
    }

    /// Add a patient
    pub fn add_patient(&mut self, patient: Patient) {
        self.patients.insert(patient.id.clone(), patient);
    }

    /// Add a blood pressure measurement
    pub fn add_blood_pressure(&mut self, bp: BloodPressure) {
        self.bp_index
            .entry(bp.patient_id.clone())
            .or_default()
            .push(self.blood_pressures.len());
        self.blood_pressures.push(bp);
    }

    /// Add a blood sugar measurement
    pub fn add_blood_sugar(&mut self, bs: BloodSugar) {
        self.bs_index
            .entry(bs.patient_id.clone())
            .or_default()
            .push(self.blood_sugars.len());
        self.blood_sugars.push(bs);
    }

    /// Add a prescription drug record
    pub fn add_prescription_drug(&mut self, drug: PrescriptionDrug) {
        self.drug_index
            .entry(drug.patient_id.clone())
            .or_default()
            .push(self.prescription_drugs.len());
        self.prescription_drugs.push(drug);
    }

    /// Add an appointment
    pub fn add_appointment(&mut self, appointment: Appointment) {
        self.appointment_index
            .entry(appointment.patient_id.clone())
            .or_default()
            .push(self.appointments.len());
        self.appointments.push(appointment);
    }

    /// Add a teleconsultation
    pub fn add_teleconsultation(&mut self, teleconsultation: Teleconsultation) {
        self.teleconsultations.push(teleconsultation);
    }

    /// Look up a patient by id
    #[must_use]
    pub fn patient(&self, id: &str) -> Option<&Patient> {
        self.patients.get(id)
    }

    /// Look up a facility by id
    #[must_use]
    pub fn facility(&self, id: &str) -> Option<&Facility> {
        self.facilities.get(id)
    }

    /// All patients, soft-deleted included
    pub fn patients(&self) -> impl Iterator<Item = &Patient> {
        self.patients.values()
    }

    /// All blood pressure measurements
    #[must_use]
    pub fn blood_pressures(&self) -> &[BloodPressure] {
        &self.blood_pressures
    }

    /// Blood pressures of one patient
    pub fn blood_pressures_of(&self, patient_id: &str) -> impl Iterator<Item = &BloodPressure> {
        self.bp_index
            .get(patient_id)
            .into_iter()
            .flatten()
            .map(|i| &self.blood_pressures[*i])
    }

    /// The most recent blood pressure of a patient inside a window, ties
    /// broken by insertion order (later record wins)
    #[must_use]
    pub fn latest_bp_in(&self, patient_id: &str, window: DateWindow) -> Option<&BloodPressure> {
        self.blood_pressures_of(patient_id)
            .filter(|bp| window.contains(bp.recorded_at))
            .max_by_key(|bp| bp.recorded_at)
    }

    /// Whether the patient has any blood pressure inside the window
    #[must_use]
    pub fn bp_taken_in(&self, patient_id: &str, window: DateWindow) -> bool {
        self.blood_pressures_of(patient_id)
            .any(|bp| window.contains(bp.recorded_at))
    }

    /// Whether the patient has a visit signal inside the window: a BP, a
    /// blood sugar, a prescription drug creation, or an appointment
    /// creation. Teleconsultations never count.
    #[must_use]
    pub fn visited_in(&self, patient_id: &str, window: DateWindow) -> bool {
        if self.bp_taken_in(patient_id, window) {
            return true;
        }
        let in_window = |rows: &FxHashMap<String, Vec<usize>>, dates: &dyn Fn(usize) -> NaiveDate| {
            rows.get(patient_id)
                .is_some_and(|idxs| idxs.iter().any(|i| window.contains(dates(*i))))
        };
        in_window(&self.bs_index, &|i| self.blood_sugars[i].recorded_at)
            || in_window(&self.drug_index, &|i| self.prescription_drugs[i].device_created_at)
            || in_window(&self.appointment_index, &|i| {
                self.appointments[i].device_created_at
            })
    }

    /// Ids of patients with at least one appointment at any of the given
    /// facilities
    #[must_use]
    pub fn appointed_patient_ids(&self, facility_ids: &[String]) -> Vec<String> {
        let mut ids: Vec<String> = self
            .appointments
            .iter()
            .filter(|a| facility_ids.iter().any(|f| *f == a.facility_id))
            .map(|a| a.patient_id.clone())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatientStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn patient(id: &str) -> Patient {
        Patient {
            id: id.to_string(),
            status: PatientStatus::Active,
            recorded_at: date(2019, 1, 1),
            registration_facility: "f1".to_string(),
            assigned_facility: "f1".to_string(),
            registration_user: "u1".to_string(),
            deleted: false,
        }
    }

    #[test]
    fn test_window_bounds() {
        let window = DateWindow {
            after: date(2020, 1, 31),
            upto: date(2020, 4, 30),
        };
        assert!(!window.contains(date(2020, 1, 31)));
        assert!(window.contains(date(2020, 2, 1)));
        assert!(window.contains(date(2020, 4, 30)));
        assert!(!window.contains(date(2020, 5, 1)));
    }

    #[test]
    fn test_latest_bp_in_window() {
        let mut store = PatientStore::new();
        store.add_patient(patient("p1"));
        for (day, systolic) in [(5, 150), (20, 120), (25, 160)] {
            store.add_blood_pressure(BloodPressure {
                patient_id: "p1".to_string(),
                facility_id: "f1".to_string(),
                user_id: "u1".to_string(),
                systolic,
                diastolic: 80,
                recorded_at: date(2020, 3, day),
            });
        }
        let window = DateWindow {
            after: date(2020, 2, 29),
            upto: date(2020, 3, 22),
        };
        let latest = store.latest_bp_in("p1", window).unwrap();
        assert_eq!(latest.systolic, 120);
    }

    #[test]
    fn test_teleconsultation_is_not_a_visit() {
        let mut store = PatientStore::new();
        store.add_patient(patient("p1"));
        store.add_teleconsultation(Teleconsultation {
            patient_id: "p1".to_string(),
            device_created_at: date(2020, 3, 10),
        });
        let window = DateWindow {
            after: date(2020, 2, 29),
            upto: date(2020, 3, 31),
        };
        assert!(!store.visited_in("p1", window));

        store.add_appointment(Appointment {
            patient_id: "p1".to_string(),
            facility_id: "f1".to_string(),
            device_created_at: date(2020, 3, 10),
            scheduled_date: Some(date(2020, 4, 1)),
        });
        assert!(store.visited_in("p1", window));
    }
}
