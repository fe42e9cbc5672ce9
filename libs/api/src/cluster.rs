//! Managed cluster resource: labels, claims, taints, and resource capacity.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

/// A rational resource quantity (cores, bytes, or an arbitrary unit).
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(pub f64);

impl Quantity {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for Quantity {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

/// Effect of a taint on placement selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaintEffect {
    /// Clusters with this taint are not selected unless tolerated.
    NoSelect,
    /// Like `NoSelect`, but clusters already named in the placement's
    /// decisions stay selected.
    NoSelectIfNew,
    /// Advisory only; never filters.
    PreferNoSelect,
}

/// A negative-affinity marker carried by a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    pub effect: TaintEffect,
    pub time_added: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<Taint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Self-reported facts about the cluster, keyed by claim name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub claims: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub allocatable: BTreeMap<String, Quantity>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capacity: BTreeMap<String, Quantity>,
}

/// A cluster registered with the fleet. The scheduler only reads these; an
/// external registration loop owns their lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub spec: ClusterSpec,
    #[serde(default)]
    pub status: ClusterStatus,
}

impl Cluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::cluster_scoped(name),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.meta.labels
    }

    /// Allocatable quantity of the named resource, zero when absent.
    pub fn allocatable(&self, resource: &str) -> f64 {
        self.status
            .allocatable
            .get(resource)
            .copied()
            .unwrap_or_default()
            .value()
    }

    /// Capacity of the named resource, zero when absent.
    pub fn capacity(&self, resource: &str) -> f64 {
        self.status
            .capacity
            .get(resource)
            .copied()
            .unwrap_or_default()
            .value()
    }
}
