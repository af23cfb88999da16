//! Experiment Record - root entity owning an experiment's treatments

use std::fmt;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::Treatment;
use crate::design::{enumerate_combinations, Design, Factor};
use crate::targeting::TargetingRule;
use crate::{Error, Result};

/// Lifecycle status of an experiment.
///
/// Transitions are one-directional: `Draft → Active → Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    /// Defined but not accepting participants.
    Draft,
    /// Accepting assignments and conversions.
    Active,
    /// Finished; counters are frozen.
    Completed,
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// Experiment Record represents one A/B or factorial experiment.
///
/// The treatment set is derived once from the design when the record is
/// built and its key set never changes afterwards. Deserializing a snapshot
/// rebuilds the treatment index and rejects duplicate treatment ids or
/// counters with more conversions than participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ExperimentSnapshot")]
pub struct Experiment {
    experiment_id: String,
    name: String,
    design: Design,
    status: ExperimentStatus,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    treatments: Vec<Treatment>,
    targeting: Vec<TargetingRule>,
    #[serde(skip)]
    index: FxHashMap<String, usize>,
}

/// Wire form of [`Experiment`] without the derived index.
#[derive(Deserialize)]
struct ExperimentSnapshot {
    experiment_id: String,
    name: String,
    design: Design,
    status: ExperimentStatus,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    treatments: Vec<Treatment>,
    #[serde(default)]
    targeting: Vec<TargetingRule>,
}

impl TryFrom<ExperimentSnapshot> for Experiment {
    type Error = Error;

    fn try_from(snapshot: ExperimentSnapshot) -> Result<Self> {
        let mut index = FxHashMap::default();
        for (position, treatment) in snapshot.treatments.iter().enumerate() {
            if index.insert(treatment.treatment_id().to_string(), position).is_some() {
                return Err(Error::InvalidInput(format!(
                    "experiment '{}' lists treatment '{}' twice",
                    snapshot.experiment_id,
                    treatment.treatment_id()
                )));
            }
            if treatment.conversions() > treatment.participants() {
                return Err(Error::InvalidInput(format!(
                    "treatment '{}' has more conversions than participants",
                    treatment.treatment_id()
                )));
            }
        }

        Ok(Self {
            experiment_id: snapshot.experiment_id,
            name: snapshot.name,
            design: snapshot.design,
            status: snapshot.status,
            created_at: snapshot.created_at,
            started_at: snapshot.started_at,
            completed_at: snapshot.completed_at,
            treatments: snapshot.treatments,
            targeting: snapshot.targeting,
            index,
        })
    }
}

impl Experiment {
    /// Create a draft experiment with one zeroed treatment per combination.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the design is malformed or two combinations
    /// map to the same treatment id.
    pub fn new(
        experiment_id: impl Into<String>,
        name: impl Into<String>,
        design: Design,
    ) -> Result<Self> {
        ExperimentBuilder::new(experiment_id, name, design).build()
    }

    /// Create a builder for an experiment with optional fields.
    #[must_use]
    pub fn builder(
        experiment_id: impl Into<String>,
        name: impl Into<String>,
        design: Design,
    ) -> ExperimentBuilder {
        ExperimentBuilder::new(experiment_id, name, design)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the design the treatments were derived from.
    #[must_use]
    pub const fn design(&self) -> &Design {
        &self.design
    }

    /// Explicit factors; empty for a variant-list (A/B) design.
    #[must_use]
    pub fn factors(&self) -> &[Factor] {
        match &self.design {
            Design::Factorial(factors) => factors,
            Design::Variants(_) => &[],
        }
    }

    /// Variant names for an A/B design.
    #[must_use]
    pub fn variants(&self) -> Option<&[String]> {
        match &self.design {
            Design::Variants(variants) => Some(variants),
            Design::Factorial(_) => None,
        }
    }

    /// Get the current status.
    #[must_use]
    pub const fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the start timestamp, if started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the completion timestamp, if completed.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Treatments in factorial enumeration order.
    #[must_use]
    pub fn treatments(&self) -> &[Treatment] {
        &self.treatments
    }

    /// Look up a treatment by ID.
    #[must_use]
    pub fn treatment(&self, treatment_id: &str) -> Option<&Treatment> {
        self.index.get(treatment_id).map(|&i| &self.treatments[i])
    }

    /// Targeting rules a participant must satisfy.
    #[must_use]
    pub fn targeting(&self) -> &[TargetingRule] {
        &self.targeting
    }

    pub(crate) fn treatment_mut(&mut self, treatment_id: &str) -> Option<&mut Treatment> {
        let index = *self.index.get(treatment_id)?;
        self.treatments.get_mut(index)
    }

    pub(crate) fn treatment_at_mut(&mut self, index: usize) -> Option<&mut Treatment> {
        self.treatments.get_mut(index)
    }

    pub(crate) fn set_targeting(&mut self, rules: Vec<TargetingRule>) -> Result<()> {
        if self.status != ExperimentStatus::Draft {
            return Err(self.transition_error(self.status));
        }
        self.targeting = rules;
        Ok(())
    }

    /// Draft → Active.
    pub(crate) fn start(&mut self) -> Result<()> {
        if self.status != ExperimentStatus::Draft {
            return Err(self.transition_error(ExperimentStatus::Active));
        }
        self.status = ExperimentStatus::Active;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Active → Completed, or Draft → Completed when `allow_from_draft`.
    pub(crate) fn complete(&mut self, allow_from_draft: bool) -> Result<()> {
        match self.status {
            ExperimentStatus::Active => {}
            ExperimentStatus::Draft if allow_from_draft => {}
            _ => return Err(self.transition_error(ExperimentStatus::Completed)),
        }
        self.status = ExperimentStatus::Completed;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    fn transition_error(&self, to: ExperimentStatus) -> Error {
        Error::InvalidTransition {
            experiment_id: self.experiment_id.clone(),
            from: self.status,
            to,
        }
    }
}

/// Builder for `Experiment`.
#[derive(Debug)]
pub struct ExperimentBuilder {
    experiment_id: String,
    name: String,
    design: Design,
    created_at: DateTime<Utc>,
    targeting: Vec<TargetingRule>,
}

impl ExperimentBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, name: impl Into<String>, design: Design) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            name: name.into(),
            design,
            created_at: Utc::now(),
            targeting: Vec::new(),
        }
    }

    /// Restrict eligible participants.
    #[must_use]
    pub fn targeting(mut self, rules: Vec<TargetingRule>) -> Self {
        self.targeting = rules;
        self
    }

    /// Set a custom creation timestamp (useful for testing).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Build the `Experiment` in `Draft` status.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the design is malformed or treatment ids collide.
    pub fn build(self) -> Result<Experiment> {
        if self.experiment_id.trim().is_empty() {
            return Err(Error::InvalidInput("experiment id is empty".to_string()));
        }
        self.design.validate()?;

        let combinations = enumerate_combinations(&self.design.factors());
        let mut treatments = Vec::with_capacity(combinations.len());
        let mut index = FxHashMap::default();

        for combination in combinations {
            let treatment_id = self.design.treatment_id(&combination);
            if index.insert(treatment_id.clone(), treatments.len()).is_some() {
                return Err(Error::InvalidInput(format!(
                    "treatment id '{treatment_id}' is produced by more than one combination"
                )));
            }
            treatments.push(Treatment::new(treatment_id, combination));
        }

        Ok(Experiment {
            experiment_id: self.experiment_id,
            name: self.name,
            design: self.design,
            status: ExperimentStatus::Draft,
            created_at: self.created_at,
            started_at: None,
            completed_at: None,
            treatments,
            targeting: self.targeting,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experiment_new_ab() {
        let experiment =
            Experiment::new("exp-1", "Checkout button", Design::variants(["control", "green"]))
                .unwrap();

        assert_eq!(experiment.experiment_id(), "exp-1");
        assert_eq!(experiment.status(), ExperimentStatus::Draft);
        assert!(experiment.factors().is_empty());
        assert_eq!(experiment.variants().map(<[String]>::len), Some(2));
        assert_eq!(experiment.treatments().len(), 2);
        assert!(experiment.treatment("green").is_some());
        assert!(experiment.treatment("blue").is_none());
    }

    #[test]
    fn test_experiment_lifecycle() {
        let mut experiment = Experiment::new("exp-1", "x", Design::variants(["a", "b"])).unwrap();

        experiment.start().unwrap();
        assert_eq!(experiment.status(), ExperimentStatus::Active);
        assert!(experiment.started_at().is_some());
        assert!(experiment.start().is_err());

        experiment.complete(false).unwrap();
        assert_eq!(experiment.status(), ExperimentStatus::Completed);
        assert!(experiment.completed_at().is_some());
        assert!(experiment.complete(true).is_err());
        assert!(experiment.start().is_err());
    }

    #[test]
    fn test_complete_from_draft_is_configurable() {
        let mut strict = Experiment::new("exp-1", "x", Design::variants(["a"])).unwrap();
        let err = strict.complete(false).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: ExperimentStatus::Draft,
                to: ExperimentStatus::Completed,
                ..
            }
        ));

        let mut lenient = Experiment::new("exp-2", "x", Design::variants(["a"])).unwrap();
        lenient.complete(true).unwrap();
        assert_eq!(lenient.status(), ExperimentStatus::Completed);
    }

    #[test]
    fn test_treatment_id_collision() {
        // (x, "y,b=z") and ("x,b=y", z) both render as "a=x,b=y,b=z"
        let colliding = Design::factorial(vec![
            Factor::new("a", ["x", "x,b=y"]),
            Factor::new("b", ["y,b=z", "z"]),
        ]);
        let err = Experiment::new("exp-1", "x", colliding).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_factorial_treatments() {
        let design = Design::factorial(vec![
            Factor::new("color", ["red", "blue"]),
            Factor::new("size", ["S", "M", "L"]),
        ]);
        let experiment = Experiment::new("exp-1", "Hero banner", design).unwrap();
        assert_eq!(experiment.factors().len(), 2);
        assert!(experiment.variants().is_none());
        assert_eq!(experiment.treatments().len(), 6);
        assert_eq!(experiment.treatments()[0].treatment_id(), "color=red,size=S");
        assert_eq!(experiment.treatments()[5].treatment_id(), "color=blue,size=L");
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(Experiment::new(" ", "x", Design::variants(["a"])).is_err());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ExperimentStatus::Draft.to_string(), "draft");
        assert_eq!(ExperimentStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn test_snapshot_round_trip_rebuilds_index() {
        let mut experiment = Experiment::new("exp-1", "x", Design::variants(["a", "b"])).unwrap();
        experiment.start().unwrap();
        let treatment = experiment.treatment_mut("b").unwrap();
        treatment.record_participant();
        treatment.record_participant();
        assert!(treatment.record_conversion());

        let json = serde_json::to_string(&experiment).unwrap();
        let mut loaded: Experiment = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.status(), ExperimentStatus::Active);
        assert_eq!(loaded.started_at(), experiment.started_at());
        assert_eq!(loaded.treatments(), experiment.treatments());
        let b = loaded.treatment("b").unwrap();
        assert_eq!((b.participants(), b.conversions()), (2, 1));
        assert!(loaded.treatment_mut("a").is_some());
        assert!(loaded.treatment("zzz").is_none());
    }

    #[test]
    fn test_snapshot_rejects_bad_treatments() {
        let experiment = Experiment::new("exp-1", "x", Design::variants(["a", "b"])).unwrap();
        let snapshot = serde_json::to_value(&experiment).unwrap();

        let mut duplicated = snapshot.clone();
        duplicated["treatments"][1]["treatment_id"] = "a".into();
        assert!(serde_json::from_value::<Experiment>(duplicated).is_err());

        let mut overcounted = snapshot;
        overcounted["treatments"][0]["conversions"] = 3.into();
        assert!(serde_json::from_value::<Experiment>(overcounted).is_err());
    }
}
