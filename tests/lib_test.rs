//! Tests for top-level Engine API

use abtest_engine::design::Design;
use abtest_engine::{Engine, EngineConfig};

#[test]
fn test_engine_builder() {
    let result = Engine::builder().build();
    assert!(result.is_ok(), "Engine build should succeed");
}

#[test]
fn test_engine_builder_chain() {
    let engine = Engine::builder()
        .default_confidence_level(0.99)
        .assignment_seed(7)
        .build()
        .unwrap();

    let config = engine.registry().config();
    assert!((config.default_confidence_level - 0.99).abs() < f64::EPSILON);
    assert_eq!(config.assignment_seed, Some(7));
}

#[test]
fn test_engine_builder_rejects_bad_level() {
    assert!(Engine::builder().default_confidence_level(1.0).build().is_err());
}

#[test]
fn test_engine_builder_with_config() {
    let config = EngineConfig::from_json_str(r#"{"allow_complete_from_draft": false}"#).unwrap();
    let engine = Engine::builder().config(config).build().unwrap();

    let experiment = engine
        .registry()
        .create_experiment("strict", Design::variants(["a", "b"]))
        .unwrap();
    assert!(engine.registry().complete(experiment.experiment_id()).is_err());
}

#[test]
fn test_engine_components_share_registry() {
    let engine = Engine::builder().assignment_seed(1).build().unwrap();
    let experiment = engine
        .registry()
        .create_experiment("shared", Design::variants(["a", "b"]))
        .unwrap();
    let id = experiment.experiment_id();
    engine.registry().start(id).unwrap();

    engine.assignments().assign(id, "user-1").unwrap();

    let total: u64 = engine
        .results()
        .summarize(id)
        .unwrap()
        .iter()
        .map(|row| row.participants)
        .sum();
    assert_eq!(total, 1);
}
