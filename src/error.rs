//! Error types for abtest-engine
//!
//! Statistical degeneracy (zero samples, zero variance) is not an error:
//! kernel functions return `None` for "not enough data yet".

use thiserror::Error;

use crate::experiment::ExperimentStatus;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// abtest-engine error types
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced experiment does not exist
    #[error("Experiment not found: {0}")]
    ExperimentNotFound(String),

    /// Referenced treatment is not part of the experiment
    #[error("Treatment '{treatment_id}' not found in experiment '{experiment_id}'")]
    TreatmentNotFound {
        /// Experiment that was searched
        experiment_id: String,
        /// Treatment id that was not found
        treatment_id: String,
    },

    /// Assignment or conversion attempted while the experiment is not running
    #[error("Experiment '{experiment_id}' is {status}, not active\nStart the experiment before assigning participants")]
    InactiveExperiment {
        /// Experiment id
        experiment_id: String,
        /// Status at the time of the call
        status: ExperimentStatus,
    },

    /// Lifecycle transition not allowed from the current status
    #[error("Experiment '{experiment_id}' cannot move from {from} to {to}")]
    InvalidTransition {
        /// Experiment id
        experiment_id: String,
        /// Current status
        from: ExperimentStatus,
        /// Requested status
        to: ExperimentStatus,
    },

    /// A conversion would exceed the treatment's participant count
    #[error("Treatment '{treatment_id}' in experiment '{experiment_id}' has as many conversions as participants")]
    ConversionLimit {
        /// Experiment id
        experiment_id: String,
        /// Treatment id
        treatment_id: String,
    },

    /// Experiment id already registered
    #[error("Experiment already exists: {0}")]
    DuplicateExperiment(String),

    /// Invalid input (malformed design, out-of-range statistical parameter)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}
