//! Cluster groups and the namespace bindings that authorize their use.

use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;
use crate::meta::ObjectMeta;
use crate::selector::LabelSelector;

/// How a group selects its member clusters: an explicit name list, or a
/// label selector over the fleet. A selector with neither set selects
/// nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,
}

impl GroupSelector {
    pub fn matches(&self, cluster: &Cluster) -> bool {
        if let Some(names) = &self.cluster_names {
            return names.iter().any(|n| n == cluster.name());
        }
        match &self.label_selector {
            Some(selector) => selector.matches(cluster.labels()),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterGroupSpec {
    #[serde(default)]
    pub selector: GroupSelector,
}

/// A named, cluster-scoped grouping of clusters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterGroup {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub spec: ClusterGroupSpec,
}

impl ClusterGroup {
    pub fn name(&self) -> &str {
        &self.meta.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBindingSpec {
    /// Name of the bound cluster group. The binding is valid only while a
    /// group of this name exists.
    pub group: String,
}

/// Authorizes placements in the binding's namespace to consider the clusters
/// of one group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBinding {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub spec: GroupBindingSpec,
}
