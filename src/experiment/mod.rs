//! A/B experiment definitions with deterministic group assignment
//!
//! Assignment hashes the subject identifier with CRC32 and takes the
//! remainder modulo the number of treatment groups. The same identifier
//! therefore always lands in the same group for a given group count, with
//! no per-subject state to store.

use chrono::NaiveDate;

use crate::error::{ReportError, Result};

/// One arm of an experiment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreatmentGroup {
    /// Position within the experiment, dense from 0
    pub index: u32,
    /// Display name
    pub name: String,
}

/// An experiment with a window and a fixed set of treatment groups
#[derive(Debug, Clone)]
pub struct Experiment {
    /// Unique experiment name
    pub name: String,
    /// First day subjects may be enrolled, if bounded
    pub start_date: Option<NaiveDate>,
    /// Last day subjects may be enrolled, if bounded
    pub end_date: Option<NaiveDate>,
    /// Arms, in index order
    pub treatment_groups: Vec<TreatmentGroup>,
}

impl Experiment {
    /// Build an experiment with groups named after the given labels
    #[must_use]
    pub fn new(name: impl Into<String>, group_names: &[&str]) -> Self {
        Self {
            name: name.into(),
            start_date: None,
            end_date: None,
            treatment_groups: group_names
                .iter()
                .enumerate()
                .map(|(index, group)| TreatmentGroup {
                    index: index as u32,
                    name: (*group).to_string(),
                })
                .collect(),
        }
    }

    /// Validate the definition: a name is required and a bounded window
    /// must not end before it starts
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ReportError::Validation(
                "experiment name must be present".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && end < start
        {
            return Err(ReportError::Validation(format!(
                "experiment {} ends ({end}) before it starts ({start})",
                self.name
            )));
        }
        Ok(())
    }

    /// Whether the experiment window covers the given date. Unbounded
    /// ends are open.
    #[must_use]
    pub fn active_on(&self, date: NaiveDate) -> bool {
        self.start_date.is_none_or(|start| start <= date)
            && self.end_date.is_none_or(|end| date <= end)
    }

    /// Deterministic group for a subject identifier; `None` when the
    /// experiment has no groups
    #[must_use]
    pub fn group_for(&self, subject_id: &str) -> Option<&TreatmentGroup> {
        if self.treatment_groups.is_empty() {
            return None;
        }
        let bucket = crc32fast::hash(subject_id.as_bytes()) as usize % self.treatment_groups.len();
        self.treatment_groups.get(bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let experiment = Experiment::new("reminders", &["control", "sms", "whatsapp"]);
        let first = experiment.group_for("patient-123").unwrap().clone();
        for _ in 0..10 {
            assert_eq!(experiment.group_for("patient-123").unwrap(), &first);
        }
    }

    #[test]
    fn test_assignment_spreads_over_all_groups() {
        let experiment = Experiment::new("reminders", &["control", "sms", "whatsapp"]);
        let mut seen = [false; 3];
        for i in 0..100 {
            let group = experiment.group_for(&format!("patient-{i}")).unwrap();
            seen[group.index as usize] = true;
        }
        assert_eq!(seen, [true, true, true]);
    }

    #[test]
    fn test_assignment_matches_crc32_mod_groups() {
        let experiment = Experiment::new("reminders", &["a", "b"]);
        let expected = crc32fast::hash(b"patient-7") as usize % 2;
        assert_eq!(
            experiment.group_for("patient-7").unwrap().index as usize,
            expected
        );
    }

    #[test]
    fn test_no_groups_means_no_assignment() {
        let experiment = Experiment::new("empty", &[]);
        assert!(experiment.group_for("patient-1").is_none());
    }

    #[test]
    fn test_validation_rejects_blank_name_and_inverted_window() {
        let blank = Experiment::new("  ", &["control"]);
        assert!(matches!(blank.validate(), Err(ReportError::Validation(_))));

        let mut inverted = Experiment::new("window", &["control"]);
        inverted.start_date = Some(date(2021, 6, 1));
        inverted.end_date = Some(date(2021, 5, 1));
        assert!(matches!(inverted.validate(), Err(ReportError::Validation(_))));

        let mut bounded = Experiment::new("window", &["control"]);
        bounded.start_date = Some(date(2021, 5, 1));
        bounded.end_date = Some(date(2021, 6, 1));
        assert!(bounded.validate().is_ok());
    }

    #[test]
    fn test_active_window_bounds_inclusive() {
        let mut experiment = Experiment::new("window", &["control"]);
        experiment.start_date = Some(date(2021, 5, 1));
        experiment.end_date = Some(date(2021, 5, 31));
        assert!(experiment.active_on(date(2021, 5, 1)));
        assert!(experiment.active_on(date(2021, 5, 31)));
        assert!(!experiment.active_on(date(2021, 4, 30)));
        assert!(!experiment.active_on(date(2021, 6, 1)));

        experiment.end_date = None;
        assert!(experiment.active_on(date(2030, 1, 1)));
    }
}
