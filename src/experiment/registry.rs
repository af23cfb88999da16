//! Experiment Registry - concurrent in-memory home of all experiments
//!
//! Each experiment lives in one `DashMap` entry. Mutations run under that
//! entry's write guard, so concurrent increments against one experiment are
//! serialised and never lost; reads clone a snapshot under a read guard, so a
//! report never mixes counters from before and after an update.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use super::{Experiment, ExperimentStatus, Treatment};
use crate::config::EngineConfig;
use crate::design::Design;
use crate::targeting::TargetingRule;
use crate::{Error, Result};

/// In-memory registry of experiments.
///
/// Construct one per application (or per test) and share it by `Arc`;
/// there is no process-wide instance.
///
/// # Example
///
/// ```rust
/// use abtest_engine::design::Design;
/// use abtest_engine::experiment::{ExperimentRegistry, ExperimentStatus};
///
/// let registry = ExperimentRegistry::new();
/// let experiment = registry.create_experiment("Signup CTA", Design::variants(["control", "bold"]))?;
/// registry.start(experiment.experiment_id())?;
///
/// assert_eq!(registry.status(experiment.experiment_id())?, ExperimentStatus::Active);
/// assert_eq!(registry.get_treatments(experiment.experiment_id())?.len(), 2);
/// # Ok::<(), abtest_engine::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct ExperimentRegistry {
    experiments: DashMap<String, Experiment>,
    config: EngineConfig,
}

impl ExperimentRegistry {
    /// Create an empty registry with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with the given configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            experiments: DashMap::new(),
            config,
        }
    }

    /// Configuration this registry was built with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of registered experiments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    /// Check if the registry holds no experiments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Create a draft experiment with a generated id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the design is malformed.
    pub fn create_experiment(&self, name: impl Into<String>, design: Design) -> Result<Experiment> {
        self.create_experiment_with_id(Uuid::new_v4().to_string(), name, design)
    }

    /// Create a draft experiment with a caller-chosen id.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateExperiment` if the id is taken, `InvalidInput` if the
    /// design is malformed.
    pub fn create_experiment_with_id(
        &self,
        experiment_id: impl Into<String>,
        name: impl Into<String>,
        design: Design,
    ) -> Result<Experiment> {
        self.insert(Experiment::new(experiment_id, name, design)?)
    }

    /// Register a pre-built experiment (e.g. from [`Experiment::builder`]).
    ///
    /// # Errors
    ///
    /// Returns `DuplicateExperiment` if the id is taken.
    pub fn insert(&self, experiment: Experiment) -> Result<Experiment> {
        match self.experiments.entry(experiment.experiment_id().to_string()) {
            Entry::Occupied(entry) => Err(Error::DuplicateExperiment(entry.key().clone())),
            Entry::Vacant(entry) => {
                info!(
                    experiment_id = %experiment.experiment_id(),
                    name = %experiment.name(),
                    treatments = experiment.treatments().len(),
                    "Experiment created"
                );
                entry.insert(experiment.clone());
                Ok(experiment)
            }
        }
    }

    /// Move an experiment from draft to active.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentNotFound` or `InvalidTransition`.
    pub fn start(&self, experiment_id: &str) -> Result<()> {
        self.with_experiment_mut(experiment_id, Experiment::start)?;
        info!(experiment_id, "Experiment started");
        Ok(())
    }

    /// Move an experiment to completed. After this, assignments and
    /// conversions are rejected.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentNotFound` or `InvalidTransition`.
    pub fn complete(&self, experiment_id: &str) -> Result<()> {
        let allow_from_draft = self.config.allow_complete_from_draft;
        self.with_experiment_mut(experiment_id, |experiment| {
            experiment.complete(allow_from_draft)
        })?;
        info!(experiment_id, "Experiment completed");
        Ok(())
    }

    /// Replace the targeting rules of a draft experiment.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentNotFound`, or `InvalidTransition` once started.
    pub fn set_targeting(&self, experiment_id: &str, rules: Vec<TargetingRule>) -> Result<()> {
        self.with_experiment_mut(experiment_id, |experiment| experiment.set_targeting(rules))
    }

    /// Snapshot of one experiment.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentNotFound`.
    pub fn get_experiment(&self, experiment_id: &str) -> Result<Experiment> {
        self.experiments
            .get(experiment_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::ExperimentNotFound(experiment_id.to_string()))
    }

    /// Current status of an experiment.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentNotFound`.
    pub fn status(&self, experiment_id: &str) -> Result<ExperimentStatus> {
        self.experiments
            .get(experiment_id)
            .map(|entry| entry.status())
            .ok_or_else(|| Error::ExperimentNotFound(experiment_id.to_string()))
    }

    /// Snapshot of an experiment's treatments in creation order.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentNotFound`.
    pub fn get_treatments(&self, experiment_id: &str) -> Result<Vec<Treatment>> {
        self.experiments
            .get(experiment_id)
            .map(|entry| entry.treatments().to_vec())
            .ok_or_else(|| Error::ExperimentNotFound(experiment_id.to_string()))
    }

    /// Snapshots of every experiment, oldest first.
    #[must_use]
    pub fn list_experiments(&self) -> Vec<Experiment> {
        let mut experiments: Vec<Experiment> =
            self.experiments.iter().map(|entry| entry.value().clone()).collect();
        experiments.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.experiment_id().cmp(b.experiment_id()))
        });
        experiments
    }

    /// Run `f` with exclusive access to one experiment.
    ///
    /// `f` must not call back into the registry.
    pub(crate) fn with_experiment_mut<T>(
        &self,
        experiment_id: &str,
        f: impl FnOnce(&mut Experiment) -> Result<T>,
    ) -> Result<T> {
        let mut entry = self
            .experiments
            .get_mut(experiment_id)
            .ok_or_else(|| Error::ExperimentNotFound(experiment_id.to_string()))?;
        f(entry.value_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::Factor;

    #[test]
    fn test_registry_default() {
        let registry = ExperimentRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.list_experiments().is_empty());
    }

    #[test]
    fn test_create_and_get() {
        let registry = ExperimentRegistry::new();
        let design = Design::factorial(vec![
            Factor::new("color", ["red", "blue"]),
            Factor::new("size", ["S", "M", "L"]),
        ]);
        let created = registry.create_experiment("Banner", design).unwrap();

        assert_eq!(registry.len(), 1);
        let fetched = registry.get_experiment(created.experiment_id()).unwrap();
        assert_eq!(fetched.name(), "Banner");
        assert_eq!(fetched.status(), ExperimentStatus::Draft);
        assert_eq!(registry.get_treatments(created.experiment_id()).unwrap().len(), 6);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let registry = ExperimentRegistry::new();
        let a = registry.create_experiment("a", Design::variants(["x"])).unwrap();
        let b = registry.create_experiment("b", Design::variants(["x"])).unwrap();
        assert_ne!(a.experiment_id(), b.experiment_id());
        assert_eq!(registry.list_experiments().len(), 2);
    }

    #[test]
    fn test_duplicate_id() {
        let registry = ExperimentRegistry::new();
        registry
            .create_experiment_with_id("exp-1", "a", Design::variants(["x"]))
            .unwrap();
        let err = registry
            .create_experiment_with_id("exp-1", "b", Design::variants(["y"]))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateExperiment(id) if id == "exp-1"));
    }

    #[test]
    fn test_unknown_experiment() {
        let registry = ExperimentRegistry::new();
        assert!(matches!(registry.start("nope"), Err(Error::ExperimentNotFound(_))));
        assert!(matches!(registry.complete("nope"), Err(Error::ExperimentNotFound(_))));
        assert!(matches!(registry.get_treatments("nope"), Err(Error::ExperimentNotFound(_))));
        assert!(matches!(registry.status("nope"), Err(Error::ExperimentNotFound(_))));
    }

    #[test]
    fn test_lifecycle_through_registry() {
        let registry = ExperimentRegistry::new();
        registry
            .create_experiment_with_id("exp-1", "a", Design::variants(["x", "y"]))
            .unwrap();

        registry.start("exp-1").unwrap();
        assert!(registry.start("exp-1").is_err());
        registry.complete("exp-1").unwrap();
        assert_eq!(registry.status("exp-1").unwrap(), ExperimentStatus::Completed);
        assert!(registry.complete("exp-1").is_err());
    }

    #[test]
    fn test_strict_complete_from_draft() {
        let config = EngineConfig::builder().allow_complete_from_draft(false).build().unwrap();
        let registry = ExperimentRegistry::with_config(config);
        registry
            .create_experiment_with_id("exp-1", "a", Design::variants(["x"]))
            .unwrap();
        assert!(matches!(
            registry.complete("exp-1"),
            Err(Error::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_targeting_only_in_draft() {
        let registry = ExperimentRegistry::new();
        registry
            .create_experiment_with_id("exp-1", "a", Design::variants(["x"]))
            .unwrap();
        registry.set_targeting("exp-1", vec![]).unwrap();
        registry.start("exp-1").unwrap();
        assert!(registry.set_targeting("exp-1", vec![]).is_err());
    }
}
