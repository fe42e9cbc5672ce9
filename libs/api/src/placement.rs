//! The placement resource: a declarative request for a set of clusters.

use serde::{Deserialize, Serialize};

use crate::cluster::TaintEffect;
use crate::condition::Condition;
use crate::meta::ObjectMeta;
use crate::selector::{ClaimSelector, LabelSelector};

/// Condition type set when the placement's desired count is met.
pub const CONDITION_SATISFIED: &str = "PlacementSatisfied";

/// Condition type set when the placement's policy is malformed.
pub const CONDITION_MISCONFIGURED: &str = "PlacementMisconfigured";

pub const REASON_ALL_DECISIONS_SCHEDULED: &str = "AllDecisionsScheduled";
pub const REASON_NOT_ALL_DECISIONS_SCHEDULED: &str = "NotAllDecisionsScheduled";
pub const REASON_NO_BINDINGS: &str = "NoManagedClusterSetBindings";
pub const REASON_NO_INTERSECTION: &str = "NoIntersection";
pub const REASON_ALL_GROUPS_EMPTY: &str = "AllManagedClusterSetsEmpty";
pub const REASON_NO_CLUSTER_MATCHED: &str = "NoManagedClusterMatched";
pub const REASON_MISCONFIGURED: &str = "Misconfigured";
pub const REASON_CORRECT_CONFIGURATION: &str = "CorrectConfiguration";

/// One predicate term. A cluster matches the term when both the label
/// selector matches its labels and the claim selector matches its claims;
/// empty selectors match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Predicate {
    #[serde(default)]
    pub label_selector: LabelSelector,
    #[serde(default)]
    pub claim_selector: ClaimSelector,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TolerationOperator {
    #[default]
    Equal,
    Exists,
}

/// Opt-in to accept a matching taint, optionally for a limited time after
/// the taint was added.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toleration {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default)]
    pub operator: TolerationOperator,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<TaintEffect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toleration_seconds: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrioritizerMode {
    /// Overlay the policy's configurations on the built-in defaults.
    #[default]
    Additive,
    /// Use only the policy's configurations.
    Exact,
}

/// Names one score source: a built-in prioritizer or an externally
/// published add-on score.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScoreCoordinate {
    #[serde(rename_all = "camelCase")]
    BuiltIn { built_in: String },
    #[serde(rename_all = "camelCase")]
    AddOn {
        resource_name: String,
        score_name: String,
    },
}

impl ScoreCoordinate {
    pub fn built_in(name: impl Into<String>) -> Self {
        Self::BuiltIn {
            built_in: name.into(),
        }
    }

    pub fn add_on(resource_name: impl Into<String>, score_name: impl Into<String>) -> Self {
        Self::AddOn {
            resource_name: resource_name.into(),
            score_name: score_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizerConfig {
    pub score_coordinate: ScoreCoordinate,
    /// Multiplier in `[-10, 10]`; zero disables the prioritizer.
    pub weight: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizerPolicy {
    #[serde(default)]
    pub mode: PrioritizerMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configurations: Vec<PrioritizerConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopologyKeyType {
    Label,
    Claim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnsatisfiableAction {
    /// Hard constraint: violating clusters are filtered out.
    DoNotSelect,
    /// Soft constraint: never filters.
    SelectAnyway,
}

/// A diversity requirement over a topology key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadConstraint {
    pub topology_key: String,
    pub topology_key_type: TopologyKeyType,
    pub max_skew: u32,
    pub when_unsatisfiable: UnsatisfiableAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementSpec {
    /// Desired number of clusters; absent means select every eligible one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_count: Option<u32>,
    /// Group names to consider; empty means every group bound to the
    /// placement's namespace.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_refs: Vec<String>,
    /// Disjunction of predicate terms; empty matches every cluster.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predicates: Vec<Predicate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
    #[serde(default)]
    pub prioritizer_policy: PrioritizerPolicy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spread_policy: Vec<SpreadConstraint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementStatus {
    #[serde(default)]
    pub number_of_selected_clusters: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub spec: PlacementSpec,
    #[serde(default)]
    pub status: PlacementStatus,
}

impl Placement {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::namespaced(namespace, name),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn namespace(&self) -> &str {
        &self.meta.namespace
    }
}

/// Name of the decision page with the given 1-based ordinal.
pub fn decision_page_name(placement: &str, ordinal: usize) -> String {
    format!("{placement}-decision-{ordinal}")
}

/// Ordinal of a decision page, parsed back out of its name.
pub fn decision_page_ordinal(placement: &str, page_name: &str) -> Option<usize> {
    let suffix = page_name.strip_prefix(placement)?.strip_prefix("-decision-")?;
    suffix.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_name_roundtrip() {
        let name = decision_page_name("placement1", 2);
        assert_eq!(name, "placement1-decision-2");
        assert_eq!(decision_page_ordinal("placement1", &name), Some(2));
        assert_eq!(decision_page_ordinal("other", &name), None);
        assert_eq!(decision_page_ordinal("placement1", "placement1-decision-x"), None);
    }

    #[test]
    fn score_coordinate_serialization() {
        let built_in = ScoreCoordinate::built_in("Balance");
        let json = serde_json::to_value(&built_in).unwrap();
        assert_eq!(json["type"], "builtIn");
        assert_eq!(json["builtIn"], "Balance");

        let add_on = ScoreCoordinate::add_on("demo", "cpuratio");
        let json = serde_json::to_value(&add_on).unwrap();
        assert_eq!(json["type"], "addOn");
        assert_eq!(json["resourceName"], "demo");
    }
}
