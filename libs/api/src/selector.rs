//! Label and claim selectors.
//!
//! Both selectors evaluate against a string-to-string map. A label selector
//! combines exact-match requirements with set-based expressions; a claim
//! selector supports expressions only. An empty selector matches everything.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error describing why a selector is malformed.
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("operator {operator:?} on key {key:?} requires at least one value")]
    MissingValues { key: String, operator: MatchOperator },

    #[error("operator {operator:?} on key {key:?} must not carry values")]
    UnexpectedValues { key: String, operator: MatchOperator },

    #[error("selector requirement has an empty key")]
    EmptyKey,
}

/// Set-based operators for a single selector requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// One requirement over a single key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchExpression {
    pub key: String,
    pub operator: MatchOperator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl MatchExpression {
    fn validate(&self) -> Result<(), SelectorError> {
        if self.key.is_empty() {
            return Err(SelectorError::EmptyKey);
        }
        match self.operator {
            MatchOperator::In | MatchOperator::NotIn if self.values.is_empty() => {
                Err(SelectorError::MissingValues {
                    key: self.key.clone(),
                    operator: self.operator,
                })
            }
            MatchOperator::Exists | MatchOperator::DoesNotExist if !self.values.is_empty() => {
                Err(SelectorError::UnexpectedValues {
                    key: self.key.clone(),
                    operator: self.operator,
                })
            }
            _ => Ok(()),
        }
    }

    fn matches(&self, values: &BTreeMap<String, String>) -> bool {
        match self.operator {
            MatchOperator::In => values
                .get(&self.key)
                .is_some_and(|v| self.values.contains(v)),
            MatchOperator::NotIn => values
                .get(&self.key)
                .is_none_or(|v| !self.values.contains(v)),
            MatchOperator::Exists => values.contains_key(&self.key),
            MatchOperator::DoesNotExist => !values.contains_key(&self.key),
        }
    }
}

/// Selector over a labels map. All requirements must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<MatchExpression>,
}

impl LabelSelector {
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_labels.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }

    pub fn validate(&self) -> Result<(), SelectorError> {
        for expr in &self.match_expressions {
            expr.validate()?;
        }
        Ok(())
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        for (key, value) in &self.match_labels {
            if labels.get(key) != Some(value) {
                return false;
            }
        }
        self.match_expressions.iter().all(|e| e.matches(labels))
    }
}

/// Selector over a claims map. All expressions must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSelector {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<MatchExpression>,
}

impl ClaimSelector {
    pub fn is_empty(&self) -> bool {
        self.match_expressions.is_empty()
    }

    pub fn validate(&self) -> Result<(), SelectorError> {
        for expr in &self.match_expressions {
            expr.validate()?;
        }
        Ok(())
    }

    pub fn matches(&self, claims: &BTreeMap<String, String>) -> bool {
        self.match_expressions.iter().all(|e| e.matches(claims))
    }
}
