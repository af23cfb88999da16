//! Two-tailed critical values for common confidence levels

/// Critical value used when a confidence level is not in [`Z_TABLE`].
pub const DEFAULT_Z: f64 = 1.96;

/// Supported (confidence level, z) pairs.
pub const Z_TABLE: [(f64, f64); 3] = [(0.90, 1.645), (0.95, 1.96), (0.99, 2.576)];

const LEVEL_TOLERANCE: f64 = 1e-9;

/// Critical z value for a two-tailed interval at `confidence_level`.
///
/// Levels outside the table fall back to [`DEFAULT_Z`].
///
/// ```rust
/// use abtest_engine::stats::z_score;
///
/// assert_eq!(z_score(0.99), 2.576);
/// assert_eq!(z_score(0.80), 1.96);
/// ```
#[must_use]
pub fn z_score(confidence_level: f64) -> f64 {
    Z_TABLE
        .iter()
        .find(|(level, _)| (level - confidence_level).abs() < LEVEL_TOLERANCE)
        .map_or(DEFAULT_Z, |&(_, z)| z)
}
