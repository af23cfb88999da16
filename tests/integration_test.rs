//! End-to-end scenarios: design → registry → assignment → results
//!
//! Covers the concrete acceptance scenarios: factorial enumeration order,
//! a 10% vs 13% A/B comparison, sample-size planning, and assignment against
//! inactive experiments.

use std::sync::Arc;

use abtest_engine::assignment::AssignmentService;
use abtest_engine::design::{enumerate_combinations, Design, Factor};
use abtest_engine::experiment::{ExperimentRegistry, ExperimentStatus, Treatment};
use abtest_engine::results::ResultsCalculator;
use abtest_engine::stats::{self, required_sample_size, z_score, Z_BETA};
use abtest_engine::Error;

/// Assign until every treatment has at least `min_participants`.
fn fill(service: &AssignmentService, experiment_id: &str, min_participants: u64) {
    let mut i = 0u64;
    while service
        .registry()
        .get_treatments(experiment_id)
        .unwrap()
        .iter()
        .any(|t| t.participants() < min_participants)
    {
        service.assign(experiment_id, &format!("user-{i}")).unwrap();
        i += 1;
    }
}

fn convert(service: &AssignmentService, experiment_id: &str, treatment_id: &str, count: u64) {
    for i in 0..count {
        service
            .record_conversion(experiment_id, treatment_id, &format!("user-{i}"))
            .unwrap();
    }
}

// =============================================================================
// Scenario A: two-factor enumeration
// =============================================================================

#[test]
fn test_two_factor_enumeration_order() {
    let combos = enumerate_combinations(&[
        Factor::new("color", ["red", "blue"]),
        Factor::new("size", ["S", "M", "L"]),
    ]);

    let pairs: Vec<(&str, &str)> = combos
        .iter()
        .map(|c| (c[0].value.as_str(), c[1].value.as_str()))
        .collect();
    assert_eq!(
        pairs,
        [
            ("red", "S"),
            ("red", "M"),
            ("red", "L"),
            ("blue", "S"),
            ("blue", "M"),
            ("blue", "L"),
        ]
    );
}

#[test]
fn test_factorial_experiment_end_to_end() {
    let registry = Arc::new(ExperimentRegistry::new());
    let experiment = registry
        .create_experiment(
            "Product tile",
            Design::factorial(vec![
                Factor::new("color", ["red", "blue"]),
                Factor::new("size", ["S", "M", "L"]),
            ]),
        )
        .unwrap();
    let id = experiment.experiment_id();
    registry.start(id).unwrap();

    let service = AssignmentService::with_seed(Arc::clone(&registry), 2024);
    fill(&service, id, 30);
    convert(&service, id, "color=blue,size=L", 25);
    convert(&service, id, "color=red,size=S", 3);

    let calc = ResultsCalculator::new(Arc::clone(&registry));
    let summary = calc.summarize(id).unwrap();
    assert_eq!(summary.len(), 6);
    assert_eq!(summary[0].treatment_id, "color=red,size=S");

    let ranking = calc.rank(id).unwrap();
    assert_eq!(ranking[0].treatment_id, "color=blue,size=L");

    let comparisons = calc.compare_to_control(id, "color=red,size=S", None).unwrap();
    assert_eq!(comparisons.len(), 5);
    let blue_large = comparisons
        .iter()
        .find(|c| c.treatment_id == "color=blue,size=L")
        .unwrap();
    assert!(blue_large.significant);
}

// =============================================================================
// Scenario B: 10% vs 13%
// =============================================================================

#[test]
fn test_ten_vs_thirteen_percent_is_significant() {
    let p = stats::two_proportion_p_value(1000, 100, 1000, 130).unwrap();
    assert!(p < 0.05, "p = {p}");
    assert_eq!(stats::is_significant(1000, 100, 1000, 130, 0.95), Some(true));
}

#[test]
fn test_ab_rank_places_better_variant_first() {
    let registry = Arc::new(ExperimentRegistry::new());
    registry
        .create_experiment_with_id("exp-b", "Scenario B", Design::variants(["A", "B"]))
        .unwrap();
    registry.start("exp-b").unwrap();

    let service = AssignmentService::with_seed(Arc::clone(&registry), 17);
    fill(&service, "exp-b", 1000);
    convert(&service, "exp-b", "A", 100);
    convert(&service, "exp-b", "B", 130);

    let calc = ResultsCalculator::new(Arc::clone(&registry));
    let ranking = calc.rank("exp-b").unwrap();
    assert_eq!(ranking[0].treatment_id, "B");
    assert_eq!(ranking[1].treatment_id, "A");

    let intervals = calc.confidence_intervals("exp-b", Some(0.95)).unwrap();
    assert_eq!(intervals.len(), 2);
    for (id, ci) in &intervals {
        let ci = ci.unwrap();
        let row = ranking.iter().find(|r| &r.treatment_id == id).unwrap();
        assert!(ci.contains(row.conversion_rate));
    }
}

// =============================================================================
// Scenario C: sample size
// =============================================================================

#[test]
fn test_required_sample_size_recomputed() {
    let n = required_sample_size(0.10, 0.02, 0.95, 0.80).unwrap();

    let baseline = 0.10_f64;
    let mde = 0.02_f64;
    let p_bar = baseline + mde / 2.0;
    let z = z_score(0.95) + Z_BETA;
    let expected = (2.0 * p_bar * (1.0 - p_bar) * z * z / (mde * mde)).ceil();

    assert!(n > 0);
    #[allow(clippy::cast_precision_loss)]
    let n_f = n as f64;
    assert!((n_f - expected).abs() < f64::EPSILON);
}

// =============================================================================
// Scenario D: inactive experiments
// =============================================================================

#[test]
fn test_assign_against_draft_and_completed() {
    let registry = Arc::new(ExperimentRegistry::new());
    registry
        .create_experiment_with_id("exp-d", "Scenario D", Design::variants(["a", "b"]))
        .unwrap();
    let service = AssignmentService::with_seed(Arc::clone(&registry), 9);

    let draft_err = service.assign("exp-d", "user-1").unwrap_err();
    assert!(matches!(
        draft_err,
        Error::InactiveExperiment { status: ExperimentStatus::Draft, .. }
    ));

    registry.start("exp-d").unwrap();
    service.assign("exp-d", "user-1").unwrap();
    let before = registry.get_treatments("exp-d").unwrap();
    registry.complete("exp-d").unwrap();

    let completed_err = service.assign("exp-d", "user-2").unwrap_err();
    assert!(matches!(
        completed_err,
        Error::InactiveExperiment { status: ExperimentStatus::Completed, .. }
    ));
    assert_eq!(registry.get_treatments("exp-d").unwrap(), before);

    let total: u64 = before.iter().map(Treatment::participants).sum();
    assert_eq!(total, 1);
}
