mod common;

use care_reports::{RegionType, ReportError};
use common::context;

fn ids(patients: &[&care_reports::Patient]) -> Vec<String> {
    patients.iter().map(|p| p.id.clone()).collect()
}

#[test]
fn test_traversal_across_the_fixture_tree() {
    let ctx = context();
    let chc = ctx.tree.get_by_slug("chc-kalaigaon").unwrap();

    let district = ctx
        .tree
        .ancestor_of_type(&chc.id, RegionType::District)
        .unwrap()
        .unwrap();
    assert_eq!(district.slug, "darrang");

    let facilities = ctx
        .tree
        .descendants_of_type(&district.id, RegionType::Facility)
        .unwrap();
    assert_eq!(
        facilities.iter().map(|f| f.slug.as_str()).collect::<Vec<_>>(),
        ["chc-kalaigaon", "phc-pathorighat", "sc-pathorighat"]
    );

    // Asking downward along the ancestor axis is a caller bug
    assert!(matches!(
        ctx.tree.ancestor_of_type(&district.id, RegionType::Facility),
        Err(ReportError::NotSupported(_))
    ));
}

#[test]
fn test_enum_wire_representations() {
    assert_eq!(
        serde_json::to_value(RegionType::District).unwrap(),
        serde_json::json!("district")
    );
    assert_eq!(
        serde_json::to_value(care_reports::CareState::LostToFollowUp).unwrap(),
        serde_json::json!("lost_to_follow_up")
    );
}

#[test]
fn test_registered_and_assigned_patient_sets() {
    let ctx = context();
    let block = ctx.tree.get_by_slug("kalaigaon").unwrap();

    // Registration sets keep dead patients but never deleted ones
    let registered = ctx.tree.registered_patients(&block.id, &ctx.store).unwrap();
    assert_eq!(ids(&registered), ["p1", "p2", "p3", "p4", "p5", "p8"]);

    let assigned = ctx.tree.assigned_patients(&block.id, &ctx.store).unwrap();
    assert_eq!(ids(&assigned), ["p1", "p2", "p3", "p4", "p5", "p8"]);
}

#[test]
fn test_appointed_patients() {
    let ctx = context();
    let block = ctx.tree.get_by_slug("kalaigaon").unwrap();
    let appointed = ctx.tree.appointed_patients(&block.id, &ctx.store).unwrap();
    assert_eq!(ids(&appointed), ["p2"]);
}

#[test]
fn test_block_sync_includes_soft_deleted_patients() {
    let ctx = context();
    let block = ctx.tree.get_by_slug("kalaigaon").unwrap();
    let syncable = ctx.tree.syncable_patients(&block.id, &ctx.store).unwrap();
    assert_eq!(ids(&syncable), ["p1", "p2", "p3", "p4", "p5", "p6", "p8"]);

    // Every other region type syncs registered patients only
    let district = ctx.tree.get_by_slug("darrang").unwrap();
    let syncable = ctx.tree.syncable_patients(&district.id, &ctx.store).unwrap();
    assert!(!syncable.iter().any(|p| p.id == "p6"));
    assert!(syncable.iter().any(|p| p.id == "p9"));
}
