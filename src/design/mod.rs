//! Factorial design enumeration
//!
//! Turns a set of independent factors into the full list of treatment
//! combinations. Classic A/B tests are the degenerate one-factor case: a flat
//! list of variants becomes the synthetic factor [`VARIANT_FACTOR`].
//!
//! ## Ordering
//!
//! Combinations follow factor order first, then level order, with the last
//! factor varying fastest:
//!
//! ```text
//! color: [red, blue], size: [S, M]
//!   → (red,S) (red,M) (blue,S) (blue,M)
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Name of the synthetic factor used for flat variant lists
pub const VARIANT_FACTOR: &str = "variant";

/// Treatment id used for the single combination of a factor-less design
pub const DEFAULT_TREATMENT_ID: &str = "default";

/// Largest number of treatments a design may expand to
pub const MAX_TREATMENTS: usize = 10_000;

/// An independent experimental dimension with ordered levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Factor {
    /// Factor name (e.g. "color")
    pub name: String,
    /// Ordered levels (e.g. ["red", "blue"])
    pub levels: Vec<String>,
}

impl Factor {
    /// Create a factor from a name and its levels.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            levels: levels.into_iter().map(Into::into).collect(),
        }
    }
}

/// One `{factor, value}` pair of a treatment's assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactorLevel {
    /// Factor name
    pub factor: String,
    /// Chosen level
    pub value: String,
}

impl FactorLevel {
    /// Create a factor/value pair.
    #[must_use]
    pub fn new(factor: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            factor: factor.into(),
            value: value.into(),
        }
    }
}

/// A full cross-product tuple: one level per factor, in factor order.
pub type Combination = Vec<FactorLevel>;

/// How an experiment's treatments are described.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Design {
    /// Classic A/B(/n): named variants
    Variants(Vec<String>),
    /// Multivariate: independent factors crossed into a full factorial
    Factorial(Vec<Factor>),
}

impl Design {
    /// A/B(/n) design from variant names.
    #[must_use]
    pub fn variants<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Variants(variants.into_iter().map(Into::into).collect())
    }

    /// Full factorial design from factors.
    #[must_use]
    pub fn factorial(factors: Vec<Factor>) -> Self {
        Self::Factorial(factors)
    }

    /// Factors of the design, with variants normalised to one synthetic factor.
    #[must_use]
    pub fn factors(&self) -> Vec<Factor> {
        match self {
            Self::Variants(variants) => vec![variants_as_factor(variants.iter().cloned())],
            Self::Factorial(factors) => factors.clone(),
        }
    }

    /// Number of treatments the design produces, `None` on `usize` overflow.
    #[must_use]
    pub fn treatment_count(&self) -> Option<usize> {
        self.factors()
            .iter()
            .try_fold(1usize, |count, factor| count.checked_mul(factor.levels.len()))
    }

    /// Check the design can be materialised into distinct treatments.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty variant list, a factor without
    /// levels, blank names, duplicate factor names or levels, or a design
    /// expanding to more than [`MAX_TREATMENTS`] treatments.
    pub fn validate(&self) -> Result<()> {
        if let Self::Variants(variants) = self {
            if variants.is_empty() {
                return Err(Error::InvalidInput(
                    "an A/B design needs at least one variant".to_string(),
                ));
            }
        }

        let mut names = HashSet::new();
        for factor in self.factors() {
            if factor.name.trim().is_empty() {
                return Err(Error::InvalidInput("factor name is empty".to_string()));
            }
            if !names.insert(factor.name.clone()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate factor '{}'",
                    factor.name
                )));
            }
            if factor.levels.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "factor '{}' has no levels",
                    factor.name
                )));
            }

            let mut levels = HashSet::new();
            for level in &factor.levels {
                if level.trim().is_empty() {
                    return Err(Error::InvalidInput(format!(
                        "factor '{}' has an empty level",
                        factor.name
                    )));
                }
                if !levels.insert(level.as_str()) {
                    return Err(Error::InvalidInput(format!(
                        "factor '{}' repeats level '{level}'",
                        factor.name
                    )));
                }
            }
        }

        match self.treatment_count() {
            Some(count) if count <= MAX_TREATMENTS => Ok(()),
            Some(count) => Err(Error::InvalidInput(format!(
                "design expands to {count} treatments, limit is {MAX_TREATMENTS}"
            ))),
            None => Err(Error::InvalidInput(format!(
                "design treatment count overflows, limit is {MAX_TREATMENTS}"
            ))),
        }
    }

    /// Treatment id for one of this design's combinations.
    ///
    /// Variants use the variant name; factorial designs join `factor=value`
    /// pairs with `,`; the empty combination maps to [`DEFAULT_TREATMENT_ID`].
    #[must_use]
    pub fn treatment_id(&self, combination: &[FactorLevel]) -> String {
        match (self, combination) {
            (_, []) => DEFAULT_TREATMENT_ID.to_string(),
            (Self::Variants(_), [only]) => only.value.clone(),
            _ => combination
                .iter()
                .map(|level| format!("{}={}", level.factor, level.value))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Wrap a flat variant list as the synthetic `"variant"` factor.
#[must_use]
pub fn variants_as_factor<I, S>(variants: I) -> Factor
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Factor::new(VARIANT_FACTOR, variants)
}

/// Enumerate the full factorial set of combinations.
///
/// The result has `∏ levels.len()` entries; `factors = []` yields exactly one
/// empty combination.
///
/// ```rust
/// use abtest_engine::design::{enumerate_combinations, Factor};
///
/// let combos = enumerate_combinations(&[
///     Factor::new("color", ["red", "blue"]),
///     Factor::new("size", ["S", "M", "L"]),
/// ]);
/// assert_eq!(combos.len(), 6);
/// assert_eq!(combos[1][1].value, "M");
/// ```
#[must_use]
pub fn enumerate_combinations(factors: &[Factor]) -> Vec<Combination> {
    let mut combinations: Vec<Combination> = vec![Vec::new()];

    for factor in factors {
        let mut next = Vec::with_capacity(combinations.len() * factor.levels.len());
        for prefix in &combinations {
            for level in &factor.levels {
                let mut combination = prefix.clone();
                combination.push(FactorLevel::new(factor.name.clone(), level.clone()));
                next.push(combination);
            }
        }
        combinations = next;
    }

    combinations
}
