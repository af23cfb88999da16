//! Participant targeting rules
//!
//! A closed set of comparison operators evaluated against string attributes
//! supplied by the caller. Rules are data, matched with `match`; nothing is
//! ever evaluated as code.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Comparison applied to a single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Condition {
    /// Exact string equality
    Equals(String),
    /// Attribute parses as a number strictly greater than the operand
    GreaterThan(f64),
    /// Attribute parses as a number strictly less than the operand
    LessThan(f64),
    /// Attribute contains the operand as a substring
    Contains(String),
}

impl Condition {
    /// Evaluate the condition against an attribute value.
    ///
    /// Numeric comparisons are false for values that do not parse as `f64`.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Equals(expected) => value == expected,
            Self::GreaterThan(bound) => parse_number(value).is_some_and(|v| v > *bound),
            Self::LessThan(bound) => parse_number(value).is_some_and(|v| v < *bound),
            Self::Contains(needle) => value.contains(needle.as_str()),
        }
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

/// A condition bound to a named participant attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetingRule {
    /// Attribute name (e.g. "country", "age")
    pub attribute: String,
    /// Condition the attribute must satisfy
    pub condition: Condition,
}

impl TargetingRule {
    /// Create a rule.
    #[must_use]
    pub fn new(attribute: impl Into<String>, condition: Condition) -> Self {
        Self {
            attribute: attribute.into(),
            condition,
        }
    }

    /// Whether `attributes` satisfy this rule. A missing attribute never matches.
    #[must_use]
    pub fn matches(&self, attributes: &HashMap<String, String>) -> bool {
        attributes
            .get(&self.attribute)
            .is_some_and(|value| self.condition.matches(value))
    }
}

/// All rules must match; an empty rule set admits everyone.
#[must_use]
pub fn matches_all(rules: &[TargetingRule], attributes: &HashMap<String, String>) -> bool {
    rules.iter().all(|rule| rule.matches(attributes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_condition_operators() {
        assert!(Condition::Equals("US".into()).matches("US"));
        assert!(!Condition::Equals("US".into()).matches("us"));
        assert!(Condition::GreaterThan(18.0).matches("21"));
        assert!(!Condition::GreaterThan(18.0).matches("18"));
        assert!(Condition::LessThan(5.0).matches(" 4.5 "));
        assert!(!Condition::LessThan(5.0).matches("abc"));
        assert!(Condition::Contains("chrome".into()).matches("mobile-chrome-120"));
    }

    #[test]
    fn test_missing_attribute_does_not_match() {
        let rule = TargetingRule::new("country", Condition::Equals("US".into()));
        assert!(!rule.matches(&attrs(&[("age", "30")])));
    }

    #[test]
    fn test_matches_all() {
        let rules = vec![
            TargetingRule::new("country", Condition::Equals("US".into())),
            TargetingRule::new("age", Condition::GreaterThan(18.0)),
        ];
        assert!(matches_all(&rules, &attrs(&[("country", "US"), ("age", "30")])));
        assert!(!matches_all(&rules, &attrs(&[("country", "US"), ("age", "12")])));
        assert!(matches_all(&[], &HashMap::new()));
    }

    #[test]
    fn test_rule_serialization() {
        let rule = TargetingRule::new("plan", Condition::Contains("pro".into()));
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains("\"op\":\"contains\""));
        let back: TargetingRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);
    }
}
