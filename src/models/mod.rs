//! Entity models for the reporting engine

pub mod patient;
pub mod region;
pub mod types;

pub use patient::{
    Appointment, BloodPressure, BloodSugar, Facility, Patient, PrescriptionDrug, Teleconsultation,
};
pub use region::{MAX_LABEL_LENGTH, RegionNode, RegionPath, SourceRef, path_label_for, slugify};
pub use types::{CareState, PatientStatus, REGION_TYPES, RegionType, TreatmentOutcome};
