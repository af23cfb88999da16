//! Experiment definitions, lifecycle, and counters
//!
//! ## Schema Overview
//!
//! ```text
//! Experiment (1) ──< Treatment (N)    [one per factorial combination]
//!                        │
//!                        └── participants / conversions counters
//!                                 ▲
//!                        ConversionEvent (ephemeral)
//! ```
//!
//! ## Lifecycle
//!
//! `Draft → Active → Completed`, one direction only. Treatments are
//! materialised at creation and their key set never changes.
//!
//! ## Usage
//!
//! ```rust
//! use abtest_engine::design::{Design, Factor};
//! use abtest_engine::experiment::ExperimentRegistry;
//!
//! let registry = ExperimentRegistry::new();
//! let experiment = registry.create_experiment(
//!     "Product page",
//!     Design::factorial(vec![
//!         Factor::new("color", ["red", "blue"]),
//!         Factor::new("size", ["S", "M", "L"]),
//!     ]),
//! )?;
//! assert_eq!(experiment.treatments().len(), 6);
//! # Ok::<(), abtest_engine::Error>(())
//! ```

mod conversion_event;
mod experiment_record;
mod registry;
mod treatment_record;

pub use conversion_event::ConversionEvent;
pub use experiment_record::{Experiment, ExperimentBuilder, ExperimentStatus};
pub use registry::ExperimentRegistry;
pub use treatment_record::Treatment;
