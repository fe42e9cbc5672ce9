//! Externally published add-on scores.
//!
//! An add-on score object lives in the namespace named after its cluster,
//! one per resource name. Publishers refresh it before `validUntil` passes;
//! expired scores are ignored by the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub name: String,
    /// Raw score in `[-100, 100]`.
    pub value: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOnScoreStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scores: Vec<ScoreEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOnScore {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub status: AddOnScoreStatus,
}

impl AddOnScore {
    /// Value of the named score entry, if present.
    pub fn score(&self, name: &str) -> Option<i32> {
        self.status
            .scores
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.value)
    }
}
