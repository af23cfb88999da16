//! Statistics kernel for fixed-horizon conversion experiments
//!
//! Pure functions over participant/conversion counts:
//! - Standard normal CDF (Abramowitz & Stegun 26.2.17, |error| < 7.5e-8)
//! - Two-proportion z-test (pooled variance, two-tailed)
//! - Wald confidence interval for a single proportion
//! - Per-treatment sample size for a target minimum detectable effect
//!
//! Degenerate inputs (no samples, no variance) yield `None` rather than an
//! error: "not enough data yet" is an expected state while an experiment runs.
//!
//! References:
//! - Abramowitz & Stegun (1964), Handbook of Mathematical Functions, 26.2.17
//! - Kohavi, Tang & Xu (2020): Trustworthy Online Controlled Experiments

mod z_table;

pub use z_table::{z_score, DEFAULT_Z, Z_TABLE};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default confidence level for significance decisions and intervals
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Default statistical power for sample-size planning
pub const DEFAULT_POWER: f64 = 0.80;

/// Fixed z value for the power term of [`required_sample_size`]
pub const Z_BETA: f64 = 1.28;

// A&S 26.2.17 coefficients
const P: f64 = 0.231_641_9;
const B1: f64 = 0.319_381_530;
const B2: f64 = -0.356_563_782;
const B3: f64 = 1.781_477_937;
const B4: f64 = -1.821_255_978;
const B5: f64 = 1.330_274_429;
const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Interval estimate for a conversion rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Lower bound, clipped to 0
    pub lower: f64,
    /// Upper bound, clipped to 1
    pub upper: f64,
    /// Point estimate (observed rate)
    pub point: f64,
}

impl ConfidenceInterval {
    /// Interval width (`upper - lower`).
    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Whether `rate` lies inside the interval (inclusive).
    #[must_use]
    pub fn contains(&self, rate: f64) -> bool {
        (self.lower..=self.upper).contains(&rate)
    }
}

/// Standard normal cumulative distribution function.
///
/// Closed-form rational approximation; symmetric by construction
/// (`normal_cdf(-z) == 1 - normal_cdf(z)`).
///
/// ```rust
/// use abtest_engine::stats::normal_cdf;
///
/// assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
/// assert!((normal_cdf(1.96) - 0.975).abs() < 1e-4);
/// ```
#[must_use]
pub fn normal_cdf(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    let x = z.abs();
    let t = 1.0 / P.mul_add(x, 1.0);
    let poly = t * B5.mul_add(t, B4).mul_add(t, B3).mul_add(t, B2).mul_add(t, B1);
    let pdf = INV_SQRT_2PI * (-0.5 * x * x).exp();
    let upper = (1.0 - pdf * poly).clamp(0.0, 1.0);

    if z >= 0.0 {
        upper
    } else {
        1.0 - upper
    }
}

/// Two-tailed p-value of the pooled two-proportion z-test.
///
/// Returns `None` when either arm has no participants, an arm has more
/// conversions than participants, or the pooled standard error is zero (both
/// arms all-converted or none-converted).
///
/// # Arguments
/// * `n1`, `x1` - participants and conversions of the first arm
/// * `n2`, `x2` - participants and conversions of the second arm
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn two_proportion_p_value(n1: u64, x1: u64, n2: u64, x2: u64) -> Option<f64> {
    if n1 == 0 || n2 == 0 || x1 > n1 || x2 > n2 {
        return None;
    }
    let (n1, x1, n2, x2) = (n1 as f64, x1 as f64, n2 as f64, x2 as f64);

    let pooled = (x1 + x2) / (n1 + n2);
    let se = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
    if se == 0.0 || !se.is_finite() {
        return None;
    }

    let z = (x1 / n1 - x2 / n2) / se;
    Some((2.0 * (1.0 - normal_cdf(z.abs()))).clamp(0.0, 1.0))
}

/// Whether the two arms differ at `confidence_level`.
///
/// `p < 1 - confidence_level`; `None` when the p-value is undefined.
#[must_use]
pub fn is_significant(n1: u64, x1: u64, n2: u64, x2: u64, confidence_level: f64) -> Option<bool> {
    two_proportion_p_value(n1, x1, n2, x2).map(|p| p < 1.0 - confidence_level)
}

/// Wald interval `p ± z·sqrt(p(1-p)/n)` clipped to `[0, 1]`.
///
/// Returns `None` when `n == 0` or `x > n`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn confidence_interval(n: u64, x: u64, confidence_level: f64) -> Option<ConfidenceInterval> {
    if n == 0 || x > n {
        return None;
    }
    let point = x as f64 / n as f64;
    let margin = z_score(confidence_level) * (point * (1.0 - point) / n as f64).sqrt();

    Some(ConfidenceInterval {
        lower: (point - margin).max(0.0),
        upper: (point + margin).min(1.0),
        point,
    })
}

/// Relative lift of `treatment_rate` over `control_rate`.
///
/// `None` when the control rate is zero.
#[must_use]
pub fn lift(control_rate: f64, treatment_rate: f64) -> Option<f64> {
    if control_rate == 0.0 {
        None
    } else {
        Some((treatment_rate - control_rate) / control_rate)
    }
}

/// Check that `confidence_level` lies strictly inside (0, 1).
///
/// # Errors
///
/// Returns `InvalidInput` otherwise, including for NaN.
pub fn check_confidence_level(confidence_level: f64) -> Result<f64> {
    if confidence_level > 0.0 && confidence_level < 1.0 {
        Ok(confidence_level)
    } else {
        Err(Error::InvalidInput(format!(
            "confidence level must be in (0, 1), got {confidence_level}"
        )))
    }
}

/// Minimum participants per treatment to detect an absolute lift of
/// `minimum_detectable_effect` over `baseline_rate`.
///
/// `n = 2·p̄(1-p̄)·(zα + zβ)² / mde²` with `p̄ = baseline + mde/2`,
/// `zα` from [`z_score`] and `zβ` fixed at [`Z_BETA`]. Rounded up, never
/// below 1.
///
/// # Errors
///
/// Returns `InvalidInput` if `baseline_rate` is not in (0, 1), the effect is
/// not positive, `baseline_rate + minimum_detectable_effect > 1`, or the
/// confidence level or power is not in (0, 1).
///
/// # Examples
///
/// ```rust
/// use abtest_engine::stats::required_sample_size;
///
/// let n = required_sample_size(0.10, 0.02, 0.95, 0.80)?;
/// assert!(n > 1000);
/// # Ok::<(), abtest_engine::Error>(())
/// ```
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn required_sample_size(
    baseline_rate: f64,
    minimum_detectable_effect: f64,
    confidence_level: f64,
    power: f64,
) -> Result<u64> {
    if !(baseline_rate > 0.0 && baseline_rate < 1.0) {
        return Err(Error::InvalidInput(format!(
            "baseline rate must be in (0, 1), got {baseline_rate}"
        )));
    }
    if !(minimum_detectable_effect > 0.0 && minimum_detectable_effect.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "minimum detectable effect must be positive, got {minimum_detectable_effect}"
        )));
    }
    if baseline_rate + minimum_detectable_effect > 1.0 {
        return Err(Error::InvalidInput(format!(
            "baseline {baseline_rate} + effect {minimum_detectable_effect} exceeds 1"
        )));
    }
    if !(confidence_level > 0.0 && confidence_level < 1.0) || !(power > 0.0 && power < 1.0) {
        return Err(Error::InvalidInput(format!(
            "confidence level and power must be in (0, 1), got {confidence_level} and {power}"
        )));
    }

    let p_bar = baseline_rate + minimum_detectable_effect / 2.0;
    let z_sum = z_score(confidence_level) + Z_BETA;
    let n = 2.0 * p_bar * (1.0 - p_bar) * z_sum * z_sum
        / (minimum_detectable_effect * minimum_detectable_effect);

    Ok((n.ceil() as u64).max(1))
}
