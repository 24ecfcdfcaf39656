//! Shared fixture: a small program hierarchy with a year and a half of
//! patient history, used by the repository and schema-parity tests.
//!
//! Layout: India / IHCI / Assam / Darrang district with two blocks.
//! Kalaigaon block holds CHC Kalaigaon (`f-chc`, all the interesting
//! patients); Pathorighat block holds SC Pathorighat (`f-sc`, one recent
//! registration) and PHC Pathorighat (`f-phc`, no patient data at all).

#![allow(dead_code)]

use care_reports::models::{
    Appointment, BloodPressure, BloodSugar, Facility, Patient, PatientStatus, SourceRef,
};
use care_reports::{PatientStore, Period, PeriodRange, RegionTree, RegionType, ReportingContext};
use chrono::NaiveDate;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// The report range every test uses: January through June 2021
pub fn report_range() -> PeriodRange {
    PeriodRange::new(Period::Month(2021, 1), Period::Month(2021, 6)).unwrap()
}

pub fn patient(id: &str, recorded_at: NaiveDate, facility: &str, user: &str) -> Patient {
    Patient {
        id: id.to_string(),
        status: PatientStatus::Active,
        recorded_at,
        registration_facility: facility.to_string(),
        assigned_facility: facility.to_string(),
        registration_user: user.to_string(),
        deleted: false,
    }
}

pub fn bp(
    patient_id: &str,
    facility: &str,
    user: &str,
    systolic: i32,
    diastolic: i32,
    recorded_at: NaiveDate,
) -> BloodPressure {
    BloodPressure {
        patient_id: patient_id.to_string(),
        facility_id: facility.to_string(),
        user_id: user.to_string(),
        systolic,
        diastolic,
        recorded_at,
    }
}

fn tree() -> RegionTree {
    let mut tree = RegionTree::new();
    let root = tree
        .create_region("India", RegionType::Root, None, None)
        .unwrap();
    let org = tree
        .create_region(
            "IHCI",
            RegionType::Organization,
            Some(&root),
            Some(SourceRef::Organization("org-ihci".to_string())),
        )
        .unwrap();
    let state = tree
        .create_region("Assam", RegionType::State, Some(&org), None)
        .unwrap();
    let district = tree
        .create_region("Darrang", RegionType::District, Some(&state), None)
        .unwrap();
    let kalaigaon = tree
        .create_region("Kalaigaon", RegionType::Block, Some(&district), None)
        .unwrap();
    let pathorighat = tree
        .create_region("Pathorighat", RegionType::Block, Some(&district), None)
        .unwrap();
    tree.create_region(
        "CHC Kalaigaon",
        RegionType::Facility,
        Some(&kalaigaon),
        Some(SourceRef::Facility("f-chc".to_string())),
    )
    .unwrap();
    tree.create_region(
        "SC Pathorighat",
        RegionType::Facility,
        Some(&pathorighat),
        Some(SourceRef::Facility("f-sc".to_string())),
    )
    .unwrap();
    tree.create_region(
        "PHC Pathorighat",
        RegionType::Facility,
        Some(&pathorighat),
        Some(SourceRef::Facility("f-phc".to_string())),
    )
    .unwrap();
    tree
}

/// Patient history at CHC Kalaigaon, relative to the Jan-Jun 2021 range:
///
/// - `p1`: registered 2020-01, one controlled BP in May 2021. Lost to
///   follow-up January through April, controlled in May and June.
/// - `p2`: registered 2020-02, uncontrolled BPs in January and June 2021.
///   Under care all six months; missed visits in April and May.
/// - `p3`: registered 2020-03, never seen again. Under care in January
///   and February, lost to follow-up from March.
/// - `p4`: registered April 2021, too recent for any adjusted denominator.
/// - `p5`: dead. Counts in registrations only.
/// - `p6`: soft-deleted, invisible everywhere.
/// - `p8`: registered 2020-06, old BP in September 2020, blood sugar in
///   June 2021. Under care throughout; visited-no-BP in June.
/// - `p9` (SC Pathorighat): registered April 2021.
fn store() -> PatientStore {
    let mut store = PatientStore::new();
    store.add_facility(Facility {
        id: "f-chc".to_string(),
        name: "CHC Kalaigaon".to_string(),
    });
    store.add_facility(Facility {
        id: "f-sc".to_string(),
        name: "SC Pathorighat".to_string(),
    });
    store.add_facility(Facility {
        id: "f-phc".to_string(),
        name: "PHC Pathorighat".to_string(),
    });

    store.add_patient(patient("p1", date(2020, 1, 15), "f-chc", "u1"));
    store.add_patient(patient("p2", date(2020, 2, 1), "f-chc", "u1"));
    store.add_patient(patient("p3", date(2020, 3, 10), "f-chc", "u2"));
    store.add_patient(patient("p4", date(2021, 4, 20), "f-chc", "u2"));
    let mut dead = patient("p5", date(2020, 5, 1), "f-chc", "u1");
    dead.status = PatientStatus::Dead;
    store.add_patient(dead);
    let mut deleted = patient("p6", date(2020, 4, 1), "f-chc", "u1");
    deleted.deleted = true;
    store.add_patient(deleted);
    store.add_patient(patient("p8", date(2020, 6, 15), "f-chc", "u2"));
    store.add_patient(patient("p9", date(2021, 4, 5), "f-sc", "u3"));

    store.add_blood_pressure(bp("p1", "f-chc", "u1", 130, 80, date(2021, 5, 10)));
    store.add_blood_pressure(bp("p2", "f-chc", "u2", 160, 100, date(2021, 1, 20)));
    store.add_blood_pressure(bp("p2", "f-chc", "u2", 150, 95, date(2021, 6, 5)));
    store.add_blood_pressure(bp("p8", "f-chc", "u1", 120, 80, date(2020, 9, 1)));

    store.add_blood_sugar(BloodSugar {
        patient_id: "p8".to_string(),
        facility_id: "f-chc".to_string(),
        user_id: "u1".to_string(),
        recorded_at: date(2021, 6, 10),
    });

    // Old enough to stay outside every outcome window in the report range
    store.add_appointment(Appointment {
        patient_id: "p2".to_string(),
        facility_id: "f-chc".to_string(),
        device_created_at: date(2020, 7, 1),
        scheduled_date: Some(date(2020, 7, 20)),
    });

    store
}

/// The full fixture: tree, store, empty view and cache
pub fn context() -> ReportingContext {
    let _ = env_logger::builder().is_test(true).try_init();
    ReportingContext::new(tree(), store())
}
