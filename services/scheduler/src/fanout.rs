//! Event fan-out: translate resource changes into placement keys to
//! re-reconcile.
//!
//! Handlers are registered on the informers and run after the local index
//! has been updated. Cluster changes use a conservative over-approximation
//! (every placement in a namespace with at least one valid binding); the
//! extra reconciles are cheap and converge to no-ops.

use std::collections::BTreeSet;
use std::sync::Arc;

use fleetplace_api::{
    AddOnScore, Cluster, ClusterGroup, GroupBinding, Placement, PlacementDecision, ResourceKey,
    ScoreCoordinate, PLACEMENT_LABEL,
};
use fleetplace_store::{Informer, Lister, WatchEvent, WorkQueue};

use crate::scheduler::PRIORITIZER_CUSTOMIZE_PREFIX;

/// Routes change events onto the placement work queue.
pub struct FanOut {
    queue: Arc<WorkQueue>,
    placements: Lister<Placement>,
    bindings: Lister<GroupBinding>,
}

impl FanOut {
    pub fn new(
        queue: Arc<WorkQueue>,
        placements: Lister<Placement>,
        bindings: Lister<GroupBinding>,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            placements,
            bindings,
        })
    }

    /// Register handlers on every informer feeding the scheduler.
    pub fn register(
        self: &Arc<Self>,
        placements: &Informer<Placement>,
        bindings: &Informer<GroupBinding>,
        groups: &Informer<ClusterGroup>,
        clusters: &Informer<Cluster>,
        scores: &Informer<AddOnScore>,
        decisions: &Informer<PlacementDecision>,
    ) {
        let fanout = Arc::clone(self);
        placements.add_handler(move |event| fanout.on_placement(event));
        let fanout = Arc::clone(self);
        bindings.add_handler(move |event| fanout.on_binding(event));
        let fanout = Arc::clone(self);
        groups.add_handler(move |event| fanout.on_group(event));
        let fanout = Arc::clone(self);
        clusters.add_handler(move |event| fanout.on_cluster(event));
        let fanout = Arc::clone(self);
        scores.add_handler(move |event| fanout.on_score(event));
        let fanout = Arc::clone(self);
        decisions.add_handler(move |event| fanout.on_decision(event));
    }

    fn enqueue(&self, key: ResourceKey) {
        self.queue.add(key.to_string());
    }

    /// A placement change re-reconciles the placement itself.
    fn on_placement(&self, event: &WatchEvent<Placement>) {
        self.enqueue(event.object().meta.key());
    }

    /// A binding change affects every placement in the binding's namespace.
    fn on_binding(&self, event: &WatchEvent<GroupBinding>) {
        let namespace = &event.object().meta.namespace;
        for placement in self.placements.list(Some(namespace)) {
            self.enqueue(placement.meta.key());
        }
    }

    /// A group change affects placements whose effective group set may
    /// include it: those naming the group in their refs, and those with
    /// empty refs in a namespace bound to it.
    fn on_group(&self, event: &WatchEvent<ClusterGroup>) {
        let group = event.object().name();
        let bound_namespaces: BTreeSet<String> = self
            .bindings
            .list(None)
            .into_iter()
            .filter(|binding| binding.spec.group == group)
            .map(|binding| binding.meta.namespace)
            .collect();
        for placement in self.placements.list(None) {
            let affected = if placement.spec.group_refs.is_empty() {
                bound_namespaces.contains(placement.namespace())
            } else {
                placement.spec.group_refs.iter().any(|r| r == group)
            };
            if affected {
                self.enqueue(placement.meta.key());
            }
        }
    }

    /// A cluster change may affect any placement whose groups could include
    /// it. Membership depends on mutable labels, so over-approximate: every
    /// placement in a namespace holding at least one binding.
    fn on_cluster(&self, _event: &WatchEvent<Cluster>) {
        let bound_namespaces: BTreeSet<String> = self
            .bindings
            .list(None)
            .into_iter()
            .map(|binding| binding.meta.namespace)
            .collect();
        for namespace in bound_namespaces {
            for placement in self.placements.list(Some(&namespace)) {
                self.enqueue(placement.meta.key());
            }
        }
    }

    /// A score change affects placements referencing that coordinate. The
    /// score object's name is the coordinate's resource name; its namespace
    /// is the owning cluster.
    fn on_score(&self, event: &WatchEvent<AddOnScore>) {
        let score_name = &event.object().meta.name;
        for placement in self.placements.list(None) {
            let referenced = placement
                .spec
                .prioritizer_policy
                .configurations
                .iter()
                .any(|config| match &config.score_coordinate {
                    ScoreCoordinate::AddOn { resource_name, .. } => resource_name == score_name,
                    ScoreCoordinate::BuiltIn { built_in } => {
                        built_in.starts_with(PRIORITIZER_CUSTOMIZE_PREFIX)
                            && built_in.to_lowercase() == *score_name
                    }
                });
            if referenced {
                self.enqueue(placement.meta.key());
            }
        }
    }

    /// A decision change routes to the placement named by its owner label.
    fn on_decision(&self, event: &WatchEvent<PlacementDecision>) {
        let page = event.object();
        if let Some(owner) = page.meta.labels.get(PLACEMENT_LABEL) {
            self.enqueue(ResourceKey::namespaced(page.meta.namespace.clone(), owner));
        }
    }
}
