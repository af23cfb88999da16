//! Conversion Event - a success signal attributed to a treatment
//!
//! Events are ephemeral: only their effect on treatment counters is kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversion Event represents one conversion reported by a caller.
///
/// Repeated events for the same participant are not deduplicated; each one
/// counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversionEvent {
    experiment_id: String,
    treatment_id: String,
    participant_id: String,
    timestamp: DateTime<Utc>,
}

impl ConversionEvent {
    /// Create a conversion event stamped with the current time.
    ///
    /// # Arguments
    ///
    /// * `experiment_id` - Experiment the participant is enrolled in
    /// * `treatment_id` - Treatment the participant was assigned to
    /// * `participant_id` - Participant reporting the conversion
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        treatment_id: impl Into<String>,
        participant_id: impl Into<String>,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            treatment_id: treatment_id.into(),
            participant_id: participant_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Replace the timestamp (e.g. when replaying events from a log).
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the treatment ID.
    #[must_use]
    pub fn treatment_id(&self) -> &str {
        &self.treatment_id
    }

    /// Get the participant ID.
    #[must_use]
    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    /// Get the time of the conversion.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
