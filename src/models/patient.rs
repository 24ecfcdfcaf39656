//! Patient-side entities
//!
//! These are the raw event records the legacy schema computes against:
//! patients plus their blood pressures, blood sugars, prescription drugs,
//! appointments and teleconsultations. The store keeps them in flat tables;
//! a measurement or record is tied to the facility where it happened and
//! the user who recorded it.

use chrono::NaiveDate;

use crate::models::types::PatientStatus;

/// A patient registered in the program
#[derive(Debug, Clone)]
pub struct Patient {
    /// Unique patient identifier
    pub id: String,
    /// Record status
    pub status: PatientStatus,
    /// Registration date
    pub recorded_at: NaiveDate,
    /// Facility the patient registered at
    pub registration_facility: String,
    /// Facility currently responsible for the patient
    pub assigned_facility: String,
    /// User who registered the patient
    pub registration_user: String,
    /// Soft-deletion flag
    pub deleted: bool,
}

impl Patient {
    /// Whether the patient is recorded as dead
    #[must_use]
    pub fn dead(&self) -> bool {
        self.status == PatientStatus::Dead
    }
}

/// A blood pressure measurement
#[derive(Debug, Clone)]
pub struct BloodPressure {
    /// Patient the measurement belongs to
    pub patient_id: String,
    /// Facility where the measurement was taken
    pub facility_id: String,
    /// User who took the measurement
    pub user_id: String,
    /// Systolic reading (mmHg)
    pub systolic: i32,
    /// Diastolic reading (mmHg)
    pub diastolic: i32,
    /// Measurement date
    pub recorded_at: NaiveDate,
}

/// A blood sugar measurement
#[derive(Debug, Clone)]
pub struct BloodSugar {
    /// Patient the measurement belongs to
    pub patient_id: String,
    /// Facility where the measurement was taken
    pub facility_id: String,
    /// User who took the measurement
    pub user_id: String,
    /// Measurement date
    pub recorded_at: NaiveDate,
}

/// A prescription drug record; its creation counts as a visit
#[derive(Debug, Clone)]
pub struct PrescriptionDrug {
    /// Patient the prescription belongs to
    pub patient_id: String,
    /// Facility where the prescription was created
    pub facility_id: String,
    /// Device-side creation date
    pub device_created_at: NaiveDate,
}

/// An appointment; its creation counts as a visit signal
#[derive(Debug, Clone)]
pub struct Appointment {
    /// Patient the appointment is for
    pub patient_id: String,
    /// Facility the appointment was created at
    pub facility_id: String,
    /// Device-side creation date
    pub device_created_at: NaiveDate,
    /// Scheduled visit date
    pub scheduled_date: Option<NaiveDate>,
}

/// A teleconsultation. Never counts as a visit.
#[derive(Debug, Clone)]
pub struct Teleconsultation {
    /// Patient consulted
    pub patient_id: String,
    /// Device-side creation date
    pub device_created_at: NaiveDate,
}

/// A facility, the leaf-level source entity regions point at
#[derive(Debug, Clone)]
pub struct Facility {
    /// Unique facility identifier
    pub id: String,
    /// Facility name
    pub name: String,
}
