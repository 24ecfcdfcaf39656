//! Core enum types used across the reporting models

use serde::{Deserialize, Serialize};

/// Node types of the organizational hierarchy, in canonical depth order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionType {
    /// The single root of the tree
    Root,
    /// Organization running one or more state programs
    Organization,
    /// State
    State,
    /// District
    District,
    /// Block
    Block,
    /// Facility where patients are seen
    Facility,
}

/// Canonical type order, shallowest first. Traversal-direction validity is
/// decided by consulting this list.
pub const REGION_TYPES: [RegionType; 6] = [
    RegionType::Root,
    RegionType::Organization,
    RegionType::State,
    RegionType::District,
    RegionType::Block,
    RegionType::Facility,
];

impl RegionType {
    /// Depth rank in the canonical order (root = 0)
    #[must_use]
    pub fn rank(self) -> usize {
        REGION_TYPES
            .iter()
            .position(|t| *t == self)
            .unwrap_or_default()
    }

    /// Lowercase name, matching the stored representation
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Organization => "organization",
            Self::State => "state",
            Self::District => "district",
            Self::Block => "block",
            Self::Facility => "facility",
        }
    }
}

/// Patient record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    /// Active in the program
    Active,
    /// Died; disjoint from every care state
    Dead,
    /// Migrated out of the program area
    Migrated,
}

/// Hypertension care state for a patient in a given report month.
///
/// The three states partition all patients: dead patients are always
/// `Dead`, and the remainder split into `LostToFollowUp` and `UnderCare`
/// by the 12-month rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareState {
    /// Registered and seen recently enough
    UnderCare,
    /// Registered at least 12 months ago with no BP in the trailing 12 months
    LostToFollowUp,
    /// Dead
    Dead,
}

/// Treatment outcome over the trailing 3 months, exactly one per patient
/// per report month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentOutcome {
    /// No visit signal in the trailing 3 months
    MissedVisit,
    /// Visited, but no BP measurement in the trailing 3 months
    VisitedNoBp,
    /// Most recent BP in the window is under control
    Controlled,
    /// Most recent BP in the window is not under control
    Uncontrolled,
}
