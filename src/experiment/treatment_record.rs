//! Treatment Record - one assignable combination of factor levels

use serde::{Deserialize, Serialize};

use crate::design::FactorLevel;

/// Treatment Record holds the counters for one treatment of an experiment.
///
/// Created once alongside its experiment with zeroed counters; only the
/// assignment path mutates it. `conversions <= participants` always holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Treatment {
    treatment_id: String,
    assignment: Vec<FactorLevel>,
    participants: u64,
    conversions: u64,
}

impl Treatment {
    /// Create a treatment with zeroed counters.
    ///
    /// # Arguments
    ///
    /// * `treatment_id` - Identifier, unique within the experiment
    /// * `assignment` - Factor levels this treatment applies
    #[must_use]
    pub fn new(treatment_id: impl Into<String>, assignment: Vec<FactorLevel>) -> Self {
        Self {
            treatment_id: treatment_id.into(),
            assignment,
            participants: 0,
            conversions: 0,
        }
    }

    /// Get the treatment ID.
    #[must_use]
    pub fn treatment_id(&self) -> &str {
        &self.treatment_id
    }

    /// Get the factor levels of this treatment.
    #[must_use]
    pub fn assignment(&self) -> &[FactorLevel] {
        &self.assignment
    }

    /// Level chosen for `factor`, if the treatment sets it.
    #[must_use]
    pub fn level(&self, factor: &str) -> Option<&str> {
        self.assignment
            .iter()
            .find(|level| level.factor == factor)
            .map(|level| level.value.as_str())
    }

    /// Number of participants assigned so far.
    #[must_use]
    pub const fn participants(&self) -> u64 {
        self.participants
    }

    /// Number of conversions recorded so far.
    #[must_use]
    pub const fn conversions(&self) -> u64 {
        self.conversions
    }

    /// `conversions / participants`, or 0 with no participants.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn conversion_rate(&self) -> f64 {
        if self.participants == 0 {
            0.0
        } else {
            self.conversions as f64 / self.participants as f64
        }
    }

    pub(crate) fn record_participant(&mut self) {
        self.participants += 1;
    }

    /// Returns `false` (and leaves the counter alone) when every participant
    /// has already converted.
    pub(crate) fn record_conversion(&mut self) -> bool {
        if self.conversions >= self.participants {
            return false;
        }
        self.conversions += 1;
        true
    }
}
