//! # abtest-engine: Experiment Assignment and Inference
//!
//! Fixed-horizon frequentist engine for online controlled experiments:
//! A/B(/n) tests and full-factorial multivariate tests.
//!
//! ## Components
//!
//! - [`stats`]: normal CDF, two-proportion z-test, Wald intervals, sample size
//! - [`design`]: factorial enumeration of treatment combinations
//! - [`experiment`]: experiment lifecycle and per-treatment counters
//! - [`assignment`]: uniform random assignment and conversion recording
//! - [`results`]: summaries, rankings, control comparisons, reports
//!
//! ## Example Usage
//!
//! ```rust
//! use abtest_engine::design::Design;
//! use abtest_engine::Engine;
//!
//! let engine = Engine::builder().assignment_seed(42).build()?;
//! let experiment = engine
//!     .registry()
//!     .create_experiment("Checkout CTA", Design::variants(["control", "green"]))?;
//! let id = experiment.experiment_id();
//! engine.registry().start(id)?;
//!
//! let treatment = engine.assignments().assign(id, "user-1")?;
//! engine.assignments().record_conversion(id, &treatment, "user-1")?;
//!
//! let ranking = engine.results().rank(id)?;
//! assert_eq!(ranking.len(), 2);
//! # Ok::<(), abtest_engine::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod assignment;
pub mod config;
pub mod design;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod results;
pub mod stats;
pub mod targeting;

use std::sync::Arc;

pub use config::EngineConfig;
pub use error::{Error, Result};

use assignment::AssignmentService;
use experiment::ExperimentRegistry;
use results::ResultsCalculator;

/// Registry, assignment service, and results calculator sharing one
/// experiment store.
#[derive(Debug)]
pub struct Engine {
    registry: Arc<ExperimentRegistry>,
    assignments: AssignmentService,
    results: ResultsCalculator,
}

impl Engine {
    /// Create a new engine builder
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Experiment definitions and lifecycle
    #[must_use]
    pub const fn registry(&self) -> &Arc<ExperimentRegistry> {
        &self.registry
    }

    /// Participant assignment and conversions
    #[must_use]
    pub const fn assignments(&self) -> &AssignmentService {
        &self.assignments
    }

    /// Reporting
    #[must_use]
    pub const fn results(&self) -> &ResultsCalculator {
        &self.results
    }
}

/// Engine builder
#[derive(Debug, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    /// Replace the whole configuration
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default confidence level for reports
    #[must_use]
    pub const fn default_confidence_level(mut self, level: f64) -> Self {
        self.config.default_confidence_level = level;
        self
    }

    /// Seed assignment for reproducible runs
    #[must_use]
    pub const fn assignment_seed(mut self, seed: u64) -> Self {
        self.config.assignment_seed = Some(seed);
        self
    }

    /// Build the engine
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the configuration is out of range
    pub fn build(self) -> Result<Engine> {
        self.config.validate()?;
        let registry = Arc::new(ExperimentRegistry::with_config(self.config));
        Ok(Engine {
            assignments: AssignmentService::new(Arc::clone(&registry)),
            results: ResultsCalculator::new(Arc::clone(&registry)),
            registry,
        })
    }
}
