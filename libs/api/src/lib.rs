//! Typed resource model for the fleetplace placement scheduler.
//!
//! Every resource the scheduler reads or writes is defined here as plain
//! data: clusters and their taints, cluster groups and bindings, placements
//! with their selection policy, decision pages, and add-on scores. The types
//! carry the matching logic that belongs to them (selectors, tolerations,
//! conditions) but perform no I/O.

pub mod cluster;
pub mod condition;
pub mod decision;
pub mod event;
pub mod group;
pub mod meta;
pub mod placement;
pub mod score;
pub mod selector;

pub use cluster::{Cluster, ClusterSpec, ClusterStatus, Quantity, Taint, TaintEffect};
pub use condition::{Condition, ConditionStatus};
pub use decision::{ClusterDecision, PlacementDecision, PlacementDecisionStatus};
pub use event::{Event, EventType};
pub use group::{ClusterGroup, ClusterGroupSpec, GroupBinding, GroupBindingSpec, GroupSelector};
pub use meta::{ObjectMeta, OwnerReference, ResourceKey};
pub use placement::{
    decision_page_name, decision_page_ordinal, Placement, PlacementSpec, PlacementStatus,
    Predicate, PrioritizerConfig, PrioritizerMode, PrioritizerPolicy, ScoreCoordinate,
    SpreadConstraint, Toleration, TolerationOperator, TopologyKeyType, UnsatisfiableAction,
};
pub use score::{AddOnScore, AddOnScoreStatus, ScoreEntry};
pub use selector::{ClaimSelector, LabelSelector, MatchExpression, MatchOperator, SelectorError};

/// Label key linking a decision page to its owning placement.
pub const PLACEMENT_LABEL: &str = "placement";

/// Well-known resource name for CPU quantities.
pub const RESOURCE_CPU: &str = "cpu";

/// Well-known resource name for memory quantities.
pub const RESOURCE_MEMORY: &str = "memory";
