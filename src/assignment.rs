//! Participant assignment and conversion recording
//!
//! Assignment is uniform at random over an active experiment's treatments and
//! is not sticky: calling [`AssignmentService::assign`] twice for the same
//! participant may return different treatments. Callers that need a stable
//! treatment per participant memoise `(experiment_id, participant_id)`
//! themselves.
//!
//! Each experiment draws from its own `StdRng`, seeded on first use from the
//! service's seeder, so experiments never contend for one generator. With a
//! fixed seed the per-experiment streams depend only on the order in which
//! experiments receive their first assignment.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::experiment::{ConversionEvent, Experiment, ExperimentRegistry, ExperimentStatus};
use crate::targeting::matches_all;
use crate::{Error, Result};

/// Assigns participants to treatments and records conversions.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use abtest_engine::assignment::AssignmentService;
/// use abtest_engine::design::Design;
/// use abtest_engine::experiment::ExperimentRegistry;
///
/// let registry = Arc::new(ExperimentRegistry::new());
/// registry.create_experiment_with_id("exp-1", "CTA", Design::variants(["control", "bold"]))?;
/// registry.start("exp-1")?;
///
/// let service = AssignmentService::with_seed(Arc::clone(&registry), 7);
/// let treatment = service.assign("exp-1", "user-1")?;
/// service.record_conversion("exp-1", &treatment, "user-1")?;
/// # Ok::<(), abtest_engine::Error>(())
/// ```
#[derive(Debug)]
pub struct AssignmentService {
    registry: Arc<ExperimentRegistry>,
    seeder: Mutex<StdRng>,
    rngs: DashMap<String, StdRng>,
}

impl AssignmentService {
    /// Create a service over `registry`, seeded from the registry config
    /// (`assignment_seed`) or OS entropy.
    #[must_use]
    pub fn new(registry: Arc<ExperimentRegistry>) -> Self {
        let seeder = match registry.config().assignment_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_seeder(registry, seeder)
    }

    /// Create a service with a fixed RNG seed (reproducible assignment).
    #[must_use]
    pub fn with_seed(registry: Arc<ExperimentRegistry>, seed: u64) -> Self {
        Self::with_seeder(registry, StdRng::seed_from_u64(seed))
    }

    fn with_seeder(registry: Arc<ExperimentRegistry>, seeder: StdRng) -> Self {
        Self {
            registry,
            seeder: Mutex::new(seeder),
            rngs: DashMap::new(),
        }
    }

    /// Registry this service writes to.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ExperimentRegistry> {
        &self.registry
    }

    /// Assign a participant to a uniformly random treatment and count them.
    ///
    /// Targeting rules are not evaluated here; use
    /// [`assign_with_attributes`](Self::assign_with_attributes) for targeted
    /// experiments.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentNotFound`, or `InactiveExperiment` (counters
    /// untouched) when the experiment is draft or completed.
    pub fn assign(&self, experiment_id: &str, participant_id: &str) -> Result<String> {
        self.registry.with_experiment_mut(experiment_id, |experiment| {
            ensure_active(experiment)?;
            self.enroll(experiment, participant_id)
        })
    }

    /// Assign a participant if their attributes satisfy the experiment's
    /// targeting rules.
    ///
    /// Returns `Ok(None)` for an ineligible participant; nothing is counted.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentNotFound` or `InactiveExperiment`.
    pub fn assign_with_attributes(
        &self,
        experiment_id: &str,
        participant_id: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<Option<String>> {
        self.registry.with_experiment_mut(experiment_id, |experiment| {
            ensure_active(experiment)?;
            if !matches_all(experiment.targeting(), attributes) {
                debug!(experiment_id, participant_id, "Participant excluded by targeting");
                return Ok(None);
            }
            self.enroll(experiment, participant_id).map(Some)
        })
    }

    /// Count a conversion against a treatment.
    ///
    /// Repeated calls for one participant each count; there is no
    /// deduplication. A treatment never records more conversions than
    /// participants.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentNotFound`, `TreatmentNotFound`, `InactiveExperiment`
    /// when the experiment is not active, or `ConversionLimit`.
    pub fn record_conversion(
        &self,
        experiment_id: &str,
        treatment_id: &str,
        participant_id: &str,
    ) -> Result<()> {
        self.registry.with_experiment_mut(experiment_id, |experiment| {
            if experiment.treatment(treatment_id).is_none() {
                return Err(Error::TreatmentNotFound {
                    experiment_id: experiment_id.to_string(),
                    treatment_id: treatment_id.to_string(),
                });
            }
            ensure_active(experiment)?;

            let recorded = experiment
                .treatment_mut(treatment_id)
                .is_some_and(|treatment| treatment.record_conversion());
            if !recorded {
                warn!(
                    experiment_id,
                    treatment_id,
                    participant_id,
                    "Conversion exceeds participants"
                );
                return Err(Error::ConversionLimit {
                    experiment_id: experiment_id.to_string(),
                    treatment_id: treatment_id.to_string(),
                });
            }

            debug!(experiment_id, treatment_id, participant_id, "Conversion recorded");
            Ok(())
        })
    }

    /// Record a [`ConversionEvent`].
    ///
    /// # Errors
    ///
    /// Same as [`record_conversion`](Self::record_conversion).
    pub fn record(&self, event: &ConversionEvent) -> Result<()> {
        self.record_conversion(
            event.experiment_id(),
            event.treatment_id(),
            event.participant_id(),
        )
    }

    fn enroll(&self, experiment: &mut Experiment, participant_id: &str) -> Result<String> {
        let count = experiment.treatments().len();
        if count == 0 {
            return Err(Error::InvalidInput(format!(
                "experiment '{}' has no treatments",
                experiment.experiment_id()
            )));
        }

        let experiment_id = experiment.experiment_id().to_string();
        let index = self.draw(&experiment_id, count);
        let treatment = experiment
            .treatment_at_mut(index)
            .ok_or_else(|| Error::InvalidInput(format!("treatment index {index} out of range")))?;
        treatment.record_participant();

        debug!(
            experiment_id = %experiment_id,
            participant_id,
            treatment_id = %treatment.treatment_id(),
            "Participant assigned"
        );
        Ok(treatment.treatment_id().to_string())
    }

    /// Uniform index in `0..count` from the experiment's own generator.
    ///
    /// Called under the registry's entry guard; `rngs` is only ever locked
    /// after that guard, never before.
    fn draw(&self, experiment_id: &str, count: usize) -> usize {
        if let Some(mut rng) = self.rngs.get_mut(experiment_id) {
            return rng.gen_range(0..count);
        }
        let mut rng = self
            .rngs
            .entry(experiment_id.to_string())
            .or_insert_with(|| {
                let seed = self.seeder.lock().unwrap_or_else(PoisonError::into_inner).gen();
                StdRng::seed_from_u64(seed)
            });
        rng.gen_range(0..count)
    }
}

fn ensure_active(experiment: &Experiment) -> Result<()> {
    let status = experiment.status();
    if status == ExperimentStatus::Active {
        return Ok(());
    }
    warn!(
        experiment_id = %experiment.experiment_id(),
        %status,
        "Rejected operation on inactive experiment"
    );
    Err(Error::InactiveExperiment {
        experiment_id: experiment.experiment_id().to_string(),
        status,
    })
}
