//! Decision pages: the published output of the scheduler.

use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

/// One selected cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDecision {
    pub cluster_name: String,
}

impl ClusterDecision {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementDecisionStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decisions: Vec<ClusterDecision>,
}

/// A page of cluster selections for one placement. Pages are named
/// `<placement>-decision-<ordinal>` and chunked at a fixed size so very
/// large placements stay consumable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementDecision {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub status: PlacementDecisionStatus,
}
