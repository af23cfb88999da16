//! Experiment results: conversion rates, rankings, and significance
//!
//! Every call reads one snapshot of the experiment, so all treatments in a
//! report reflect the same moment. Nothing here formats output; results are
//! plain `serde` structures for whatever reporting surface consumes them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::design::FactorLevel;
use crate::experiment::{Experiment, ExperimentRegistry, ExperimentStatus, Treatment};
use crate::stats::{self, ConfidenceInterval};
use crate::{Error, Result};

/// Counters and observed rate for one treatment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentSummary {
    /// Treatment ID
    pub treatment_id: String,
    /// Factor levels of the treatment
    pub assignment: Vec<FactorLevel>,
    /// Participants assigned
    pub participants: u64,
    /// Conversions recorded
    pub conversions: u64,
    /// `conversions / participants`, 0 without participants
    pub conversion_rate: f64,
}

impl From<&Treatment> for TreatmentSummary {
    fn from(treatment: &Treatment) -> Self {
        Self {
            treatment_id: treatment.treatment_id().to_string(),
            assignment: treatment.assignment().to_vec(),
            participants: treatment.participants(),
            conversions: treatment.conversions(),
            conversion_rate: treatment.conversion_rate(),
        }
    }
}

/// Comparison of one treatment against a reference treatment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceResult {
    /// Treatment ID
    pub treatment_id: String,
    /// Participants assigned
    pub participants: u64,
    /// Conversions recorded
    pub conversions: u64,
    /// Observed conversion rate
    pub conversion_rate: f64,
    /// Interval for the rate; `None` without participants
    pub confidence_interval: Option<ConfidenceInterval>,
    /// Two-proportion p-value against the reference; `None` when undefined
    pub p_value_vs_control: Option<f64>,
    /// `p < 1 - confidence_level`; false when the p-value is undefined
    pub significant: bool,
    /// Relative lift over the reference rate; `None` when that rate is 0
    pub lift: Option<f64>,
}

/// Ranked summary plus control comparisons for one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    /// Experiment ID
    pub experiment_id: String,
    /// Experiment name
    pub name: String,
    /// Status when the snapshot was taken
    pub status: ExperimentStatus,
    /// Confidence level used for intervals and significance
    pub confidence_level: f64,
    /// Reference treatment for `comparisons`
    pub control_treatment_id: String,
    /// Treatments by descending conversion rate
    pub ranking: Vec<TreatmentSummary>,
    /// Every non-control treatment against the control
    pub comparisons: Vec<SignificanceResult>,
}

/// Computes reports from the registry's counters.
#[derive(Debug, Clone)]
pub struct ResultsCalculator {
    registry: Arc<ExperimentRegistry>,
}

impl ResultsCalculator {
    /// Create a calculator reading from `registry`.
    #[must_use]
    pub const fn new(registry: Arc<ExperimentRegistry>) -> Self {
        Self { registry }
    }

    /// Per-treatment counters and rates in creation order.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentNotFound`.
    pub fn summarize(&self, experiment_id: &str) -> Result<Vec<TreatmentSummary>> {
        let experiment = self.registry.get_experiment(experiment_id)?;
        Ok(summaries(&experiment))
    }

    /// Treatments by descending conversion rate; ties keep creation order.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentNotFound`.
    pub fn rank(&self, experiment_id: &str) -> Result<Vec<TreatmentSummary>> {
        let experiment = self.registry.get_experiment(experiment_id)?;
        Ok(ranked(&experiment))
    }

    /// Compare every non-control treatment against `control_treatment_id`.
    ///
    /// `confidence_level` defaults to the registry config.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentNotFound`, `TreatmentNotFound` for an unknown control,
    /// or `InvalidInput` for a confidence level outside (0, 1).
    pub fn compare_to_control(
        &self,
        experiment_id: &str,
        control_treatment_id: &str,
        confidence_level: Option<f64>,
    ) -> Result<Vec<SignificanceResult>> {
        let level = self.level(confidence_level)?;
        let experiment = self.registry.get_experiment(experiment_id)?;
        compare(&experiment, control_treatment_id, level)
    }

    /// Compare the current leader against every other treatment.
    ///
    /// Returns the leader's ID and the comparisons.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentNotFound`, or `InvalidInput` for a confidence level
    /// outside (0, 1).
    pub fn best_vs_rest(
        &self,
        experiment_id: &str,
        confidence_level: Option<f64>,
    ) -> Result<(String, Vec<SignificanceResult>)> {
        let level = self.level(confidence_level)?;
        let experiment = self.registry.get_experiment(experiment_id)?;
        let best = ranked(&experiment)
            .into_iter()
            .next()
            .map(|summary| summary.treatment_id)
            .ok_or_else(|| {
                Error::InvalidInput(format!("experiment '{experiment_id}' has no treatments"))
            })?;

        let comparisons = compare(&experiment, &best, level)?;
        Ok((best, comparisons))
    }

    /// Interval for each treatment's rate in creation order; `None` for
    /// treatments without participants.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentNotFound`, or `InvalidInput` for a confidence level
    /// outside (0, 1).
    pub fn confidence_intervals(
        &self,
        experiment_id: &str,
        confidence_level: Option<f64>,
    ) -> Result<Vec<(String, Option<ConfidenceInterval>)>> {
        let level = self.level(confidence_level)?;
        let experiment = self.registry.get_experiment(experiment_id)?;
        Ok(experiment
            .treatments()
            .iter()
            .map(|t| {
                (
                    t.treatment_id().to_string(),
                    stats::confidence_interval(t.participants(), t.conversions(), level),
                )
            })
            .collect())
    }

    /// Ranking and control comparisons from a single snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentNotFound`, `TreatmentNotFound`, or `InvalidInput`
    /// for a confidence level outside (0, 1).
    pub fn report(
        &self,
        experiment_id: &str,
        control_treatment_id: &str,
        confidence_level: Option<f64>,
    ) -> Result<ExperimentReport> {
        let level = self.level(confidence_level)?;
        let experiment = self.registry.get_experiment(experiment_id)?;
        let comparisons = compare(&experiment, control_treatment_id, level)?;

        debug!(
            experiment_id,
            control_treatment_id,
            significant = comparisons.iter().filter(|c| c.significant).count(),
            "Report generated"
        );

        Ok(ExperimentReport {
            experiment_id: experiment.experiment_id().to_string(),
            name: experiment.name().to_string(),
            status: experiment.status(),
            confidence_level: level,
            control_treatment_id: control_treatment_id.to_string(),
            ranking: ranked(&experiment),
            comparisons,
        })
    }

    fn level(&self, confidence_level: Option<f64>) -> Result<f64> {
        confidence_level.map_or(
            Ok(self.registry.config().default_confidence_level),
            stats::check_confidence_level,
        )
    }
}

fn summaries(experiment: &Experiment) -> Vec<TreatmentSummary> {
    experiment.treatments().iter().map(TreatmentSummary::from).collect()
}

fn ranked(experiment: &Experiment) -> Vec<TreatmentSummary> {
    let mut rows = summaries(experiment);
    // stable: equal rates keep creation order
    rows.sort_by(|a, b| b.conversion_rate.total_cmp(&a.conversion_rate));
    rows
}

fn compare(
    experiment: &Experiment,
    control_id: &str,
    level: f64,
) -> Result<Vec<SignificanceResult>> {
    let control = experiment
        .treatment(control_id)
        .ok_or_else(|| Error::TreatmentNotFound {
            experiment_id: experiment.experiment_id().to_string(),
            treatment_id: control_id.to_string(),
        })?;

    Ok(experiment
        .treatments()
        .iter()
        .filter(|t| t.treatment_id() != control_id)
        .map(|t| {
            let p_value = stats::two_proportion_p_value(
                t.participants(),
                t.conversions(),
                control.participants(),
                control.conversions(),
            );
            let control_has_data = control.participants() > 0;

            SignificanceResult {
                treatment_id: t.treatment_id().to_string(),
                participants: t.participants(),
                conversions: t.conversions(),
                conversion_rate: t.conversion_rate(),
                confidence_interval: stats::confidence_interval(
                    t.participants(),
                    t.conversions(),
                    level,
                ),
                p_value_vs_control: p_value,
                significant: p_value.is_some_and(|p| p < 1.0 - level),
                lift: if control_has_data {
                    stats::lift(control.conversion_rate(), t.conversion_rate())
                } else {
                    None
                },
            }
        })
        .collect())
}
