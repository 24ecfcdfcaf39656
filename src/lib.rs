//! A Rust library for hypertension-program reporting: a materialized-path
//! region hierarchy, month-granularity reporting periods, patient care-state
//! classification, and a cached metric repository with two interchangeable
//! computation schemas.

pub mod clinical;
pub mod config;
pub mod error;
pub mod experiment;
pub mod models;
pub mod period;
pub mod query;
pub mod region;
pub mod reports;
pub mod store;

// Re-export the most common types for easier use
// Core types
pub use config::{RepositoryConfig, SchemaVersion};
pub use error::{ReportError, Result};
pub use period::{Period, PeriodRange, PeriodType};

// Region hierarchy
pub use models::{RegionNode, RegionPath, RegionType, SourceRef};
pub use region::RegionTree;

// Patient data and care states
pub use models::{CareState, Patient, PatientStatus, TreatmentOutcome};
pub use store::{DateWindow, MonthlyStatesView, PatientStore};

// Reporting
pub use query::{CountsByPeriod, GroupedCounts, Metric, ReportingSchema};
pub use reports::{
    CountsByRegion, GroupedByRegion, ReportingContext, Repository, ReportsCache,
};

// Experiments
pub use experiment::{Experiment, TreatmentGroup};
