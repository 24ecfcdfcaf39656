mod common;

use care_reports::{
    CountsByRegion, Period, ReportError, ReportingContext, Repository, RepositoryConfig,
};
use common::{context, date, report_range};

const CHC: &str = "chc-kalaigaon";
const SC: &str = "sc-pathorighat";
const PHC: &str = "phc-pathorighat";
const DISTRICT: &str = "darrang";

fn repo(ctx: &ReportingContext, regions: &[&str]) -> Repository {
    Repository::new(ctx, regions, report_range(), &RepositoryConfig::default()).unwrap()
}

fn at(map: &CountsByRegion, slug: &str, month: u32) -> i64 {
    *map.get(slug)
        .unwrap_or_else(|| panic!("no mapping for {slug}"))
        .get(&Period::Month(2021, month))
        .unwrap_or_else(|| panic!("no value for {slug} 2021-{month}"))
}

fn assert_months(map: &CountsByRegion, slug: &str, expected: [i64; 6]) {
    for (i, want) in expected.iter().enumerate() {
        let month = i as u32 + 1;
        assert_eq!(
            at(map, slug, month),
            *want,
            "{slug} 2021-{month}: expected {want}"
        );
    }
}

#[test]
fn test_quarter_periods_are_rejected() {
    let ctx = context();
    let result = Repository::new(
        &ctx,
        &[CHC],
        Period::Quarter(2021, 1),
        &RepositoryConfig::default(),
    );
    assert!(matches!(result, Err(ReportError::Argument(_))));
}

#[test]
fn test_unknown_region_is_rejected() {
    let ctx = context();
    let result = Repository::new(
        &ctx,
        &["no-such-region"],
        report_range(),
        &RepositoryConfig::default(),
    );
    assert!(matches!(result, Err(ReportError::RegionNotFound(_))));
}

#[test]
fn test_regions_resolve_by_slug_or_id() {
    let ctx = context();
    let id = ctx.tree.get_by_slug(CHC).unwrap().id.clone();
    let repo = repo(&ctx, &[id.as_str()]);
    assert_eq!(repo.regions()[0].slug, CHC);
}

#[test]
fn test_registration_counts() {
    let ctx = context();
    let repo = repo(&ctx, &[CHC, DISTRICT]);

    // Only p4 registered inside the range; the dead patient still counts
    // toward the cumulative total, the deleted one never does
    let monthly = repo.monthly_registrations().unwrap();
    assert_months(&monthly, CHC, [0, 0, 0, 1, 0, 0]);
    assert_months(&monthly, DISTRICT, [0, 0, 0, 2, 0, 0]);

    let cumulative = repo.cumulative_registrations().unwrap();
    assert_months(&cumulative, CHC, [5, 5, 5, 6, 6, 6]);
    assert_months(&cumulative, DISTRICT, [5, 5, 5, 7, 7, 7]);
}

#[test]
fn test_assigned_counts_exclude_dead() {
    let ctx = context();
    let repo = repo(&ctx, &[CHC]);

    let assigned = repo.assigned_patients().unwrap();
    assert_months(&assigned, CHC, [0, 0, 0, 1, 0, 0]);

    let cumulative = repo.cumulative_assigned_patients().unwrap();
    assert_months(&cumulative, CHC, [4, 4, 4, 5, 5, 5]);
}

#[test]
fn test_care_state_progression() {
    let ctx = context();
    let repo = repo(&ctx, &[CHC]);

    // p1 is LTFU until the May BP brings them back; p3 crosses the
    // 12-month line in March and never comes back
    assert_months(&repo.under_care().unwrap(), CHC, [3, 3, 2, 3, 4, 4]);
    assert_months(&repo.ltfu().unwrap(), CHC, [1, 1, 2, 2, 1, 1]);
}

#[test]
fn test_adjusted_denominators() {
    let ctx = context();
    let repo = repo(&ctx, &[CHC]);

    // p4 never makes it in: two months old at the end of the range
    assert_months(
        &repo.adjusted_patients_with_ltfu().unwrap(),
        CHC,
        [4, 4, 4, 4, 4, 4],
    );
    assert_months(
        &repo.adjusted_patients_without_ltfu().unwrap(),
        CHC,
        [3, 3, 2, 2, 3, 3],
    );
    assert_eq!(
        repo.adjusted_patients().unwrap(),
        repo.adjusted_patients_without_ltfu().unwrap()
    );
}

#[test]
fn test_treatment_outcomes() {
    let ctx = context();
    let repo = repo(&ctx, &[CHC]);

    assert_months(&repo.controlled().unwrap(), CHC, [0, 0, 0, 0, 1, 1]);
    assert_months(&repo.uncontrolled().unwrap(), CHC, [1, 1, 1, 0, 0, 1]);
    assert_months(&repo.missed_visits().unwrap(), CHC, [2, 2, 1, 2, 2, 0]);
    assert_months(
        &repo.missed_visits_with_ltfu().unwrap(),
        CHC,
        [3, 3, 3, 4, 3, 1],
    );
    assert_months(
        &repo.visited_without_bp_taken().unwrap(),
        CHC,
        [0, 0, 0, 0, 0, 1],
    );
}

#[test]
fn test_rates_round_to_whole_percentages() {
    let ctx = context();
    let repo = repo(&ctx, &[CHC]);

    assert_eq!(at(&repo.controlled_rates().unwrap(), CHC, 6), 33);
    assert_eq!(at(&repo.uncontrolled_rates().unwrap(), CHC, 6), 33);
    assert_eq!(at(&repo.missed_visits_rates().unwrap(), CHC, 6), 0);
    assert_eq!(at(&repo.missed_visits_with_ltfu_rates().unwrap(), CHC, 6), 25);
    assert_eq!(at(&repo.visited_without_bp_taken_rates().unwrap(), CHC, 6), 33);
    assert_eq!(at(&repo.ltfu_rates().unwrap(), CHC, 6), 20);
    assert_eq!(at(&repo.controlled_rates().unwrap(), CHC, 1), 0);
}

#[test]
fn test_zero_denominator_yields_zero_rate() {
    let ctx = context();
    let repo = repo(&ctx, &[SC]);

    // p9 is too recent for any adjusted denominator, so every rate divides
    // by zero and must come out as 0, not an error
    assert_months(&repo.adjusted_patients_without_ltfu().unwrap(), SC, [0; 6]);
    assert_months(&repo.controlled_rates().unwrap(), SC, [0; 6]);
    assert_months(&repo.missed_visits_rates().unwrap(), SC, [0; 6]);
}

#[test]
fn test_region_without_data_yields_empty_mappings() {
    let ctx = context();
    let repo = repo(&ctx, &[PHC, CHC]);

    assert!(repo.monthly_registrations().unwrap()[PHC].is_empty());
    assert!(repo.controlled().unwrap()[PHC].is_empty());
    assert!(repo.controlled_rates().unwrap()[PHC].is_empty());
    assert!(repo.follow_ups().unwrap()[PHC].is_empty());
    assert!(repo.monthly_registrations_by_user().unwrap()[PHC].is_empty());
    assert_eq!(repo.earliest_patient_recorded_at().unwrap()[PHC], None);

    // The sibling with data is unaffected
    assert_eq!(repo.controlled().unwrap()[CHC].len(), 6);
}

#[test]
fn test_follow_ups_and_bp_measures() {
    let ctx = context();
    let repo = repo(&ctx, &[CHC]);

    // p2's January and June BPs and p1's May BP are follow-ups; p8's 2020
    // BP predates the range and p4's registration month has no BP at all
    assert_months(&repo.follow_ups().unwrap(), CHC, [1, 0, 0, 0, 1, 1]);
    assert_months(&repo.bp_measures().unwrap(), CHC, [1, 0, 0, 0, 1, 1]);

    let by_user = repo.follow_ups_by_user().unwrap();
    assert_eq!(by_user[CHC][&Period::Month(2021, 1)]["u2"], 1);
    assert_eq!(by_user[CHC][&Period::Month(2021, 5)]["u1"], 1);
    assert!(by_user[CHC][&Period::Month(2021, 2)].is_empty());

    let measures = repo.bp_measures_by_user().unwrap();
    assert_eq!(measures[CHC][&Period::Month(2021, 6)]["u2"], 1);
}

#[test]
fn test_registrations_by_user() {
    let ctx = context();
    let repo = repo(&ctx, &[CHC]);

    let monthly = repo.monthly_registrations_by_user().unwrap();
    assert_eq!(monthly[CHC][&Period::Month(2021, 4)]["u2"], 1);
    assert!(monthly[CHC][&Period::Month(2021, 1)].is_empty());

    // Every known user appears in every period of the cumulative view
    let cumulative = repo.cumulative_registrations_by_user().unwrap();
    assert_eq!(cumulative[CHC][&Period::Month(2021, 1)]["u1"], 3);
    assert_eq!(cumulative[CHC][&Period::Month(2021, 1)]["u2"], 2);
    assert_eq!(cumulative[CHC][&Period::Month(2021, 6)]["u2"], 3);
}

#[test]
fn test_earliest_patient_recorded_at() {
    let ctx = context();
    let repo = repo(&ctx, &[CHC, SC]);

    let earliest = repo.earliest_patient_recorded_at().unwrap();
    assert_eq!(earliest[CHC], Some(date(2020, 1, 15)));
    assert_eq!(earliest[SC], Some(date(2021, 4, 5)));

    let periods = repo.earliest_patient_recorded_at_period().unwrap();
    assert_eq!(periods[CHC], Some(Period::Month(2020, 1)));
}

#[test]
fn test_results_are_memoized_per_instance() {
    let ctx = context();
    let repo = repo(&ctx, &[CHC]);

    let first = repo.controlled().unwrap();
    assert!(!ctx.cache.is_empty().unwrap());

    // With the shared cache emptied, the memoized accessor must answer
    // without recomputing (the cache stays empty)
    ctx.cache.clear().unwrap();
    assert_eq!(repo.controlled().unwrap(), first);
    assert!(ctx.cache.is_empty().unwrap());
}

#[test]
fn test_cache_is_shared_across_instances() {
    let ctx = context();
    let repo_a = repo(&ctx, &[CHC]);
    let expected = repo_a.controlled().unwrap();
    let cached_entries = ctx.cache.len().unwrap();

    let repo_b = repo(&ctx, &[CHC]);
    assert_eq!(repo_b.controlled().unwrap(), expected);
    assert_eq!(ctx.cache.len().unwrap(), cached_entries);
}

#[test]
fn test_bypass_cache_recomputes_but_keeps_memo() {
    let ctx = context();
    let config = RepositoryConfig {
        bypass_cache: true,
        ..RepositoryConfig::default()
    };
    let repo = Repository::new(&ctx, &[CHC], report_range(), &config).unwrap();
    assert!(repo.bypass_cache());

    let first = repo.controlled().unwrap();
    ctx.cache.clear().unwrap();
    // Memoization is not defeated by the bypass flag
    assert_eq!(repo.controlled().unwrap(), first);
    assert!(ctx.cache.is_empty().unwrap());

    repo.set_bypass_cache(false);
    assert!(!repo.bypass_cache());
}

#[test]
fn test_district_aggregates_its_facilities() {
    let ctx = context();
    let repo = repo(&ctx, &[DISTRICT]);

    // p9 joins the under-care pool from April
    assert_months(&repo.under_care().unwrap(), DISTRICT, [3, 3, 2, 4, 5, 5]);
    assert_eq!(
        repo.earliest_patient_recorded_at().unwrap()[DISTRICT],
        Some(date(2020, 1, 15))
    );
}
