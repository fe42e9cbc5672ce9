//! Shared fixture for scheduler integration tests.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};

use fleetplace_api::{
    Cluster, ClusterGroup, ClusterGroupSpec, Condition, GroupBinding, GroupBindingSpec,
    GroupSelector, LabelSelector, ObjectMeta, Placement, PlacementStatus, ResourceKey,
    PLACEMENT_LABEL,
};
use fleetplace_scheduler::{Config, Engine};
use fleetplace_store::{Clock, ManualClock};

/// Label used by test groups to select their member clusters.
pub const GROUP_LABEL: &str = "group";

pub struct TestEngine {
    pub engine: Arc<Engine>,
    pub clock: Arc<ManualClock>,
}

pub fn test_engine() -> TestEngine {
    let clock = Arc::new(ManualClock::new(
        DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
    ));
    let engine = Engine::new(Config::default(), Arc::clone(&clock) as Arc<dyn Clock>);
    TestEngine { engine, clock }
}

impl TestEngine {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create a cluster carrying the group membership label.
    pub fn add_cluster(&self, name: &str, group: &str) -> Cluster {
        let mut cluster = Cluster::new(name);
        cluster
            .meta
            .labels
            .insert(GROUP_LABEL.to_string(), group.to_string());
        self.engine.stores.clusters.create(cluster).unwrap()
    }

    /// Create a group selecting clusters by the membership label, plus a
    /// binding authorizing the namespace to use it.
    pub fn add_bound_group(&self, namespace: &str, group: &str) {
        self.engine
            .stores
            .groups
            .create(ClusterGroup {
                meta: ObjectMeta::cluster_scoped(group),
                spec: ClusterGroupSpec {
                    selector: GroupSelector {
                        cluster_names: None,
                        label_selector: Some(
                            LabelSelector::default().with_label(GROUP_LABEL, group),
                        ),
                    },
                },
            })
            .unwrap();
        self.engine
            .stores
            .bindings
            .create(GroupBinding {
                meta: ObjectMeta::namespaced(namespace, group),
                spec: GroupBindingSpec {
                    group: group.to_string(),
                },
            })
            .unwrap();
    }

    /// Pump the caches and reconcile the placement once.
    pub fn reconcile(&self, namespace: &str, name: &str) {
        self.engine.sync_informers();
        self.engine
            .controller
            .sync(&format!("{namespace}/{name}"))
            .expect("reconcile failed");
        self.engine.sync_informers();
    }

    /// Pop and discard every immediately ready key, leaving only delayed
    /// entries in the queue.
    pub fn drain_ready(&self) {
        while let Some(key) = self.engine.queue.try_get() {
            self.engine.queue.done(&key);
        }
    }

    /// Cluster names across the placement's decision pages, in page order.
    pub fn decisions_of(&self, namespace: &str, placement: &str) -> Vec<String> {
        let mut pages: Vec<_> = self
            .engine
            .stores
            .decisions
            .list(Some(namespace))
            .into_iter()
            .filter(|page| {
                page.meta.labels.get(PLACEMENT_LABEL).map(String::as_str) == Some(placement)
            })
            .collect();
        pages.sort_by_key(|page| {
            fleetplace_api::decision_page_ordinal(placement, &page.meta.name).unwrap_or(usize::MAX)
        });
        pages
            .iter()
            .flat_map(|page| page.status.decisions.iter())
            .map(|d| d.cluster_name.clone())
            .collect()
    }

    pub fn decision_pages(&self, namespace: &str, placement: &str) -> Vec<usize> {
        let mut sizes: Vec<(usize, usize)> = self
            .engine
            .stores
            .decisions
            .list(Some(namespace))
            .into_iter()
            .filter(|page| {
                page.meta.labels.get(PLACEMENT_LABEL).map(String::as_str) == Some(placement)
            })
            .map(|page| {
                (
                    fleetplace_api::decision_page_ordinal(placement, &page.meta.name)
                        .unwrap_or(usize::MAX),
                    page.status.decisions.len(),
                )
            })
            .collect();
        sizes.sort();
        sizes.into_iter().map(|(_, len)| len).collect()
    }

    pub fn placement_status(&self, namespace: &str, name: &str) -> PlacementStatus {
        self.engine
            .stores
            .placements
            .get(&ResourceKey::namespaced(namespace, name))
            .unwrap()
            .status
    }

    pub fn condition(&self, namespace: &str, name: &str, condition_type: &str) -> Condition {
        let status = self.placement_status(namespace, name);
        fleetplace_api::condition::find_condition(&status.conditions, condition_type)
            .unwrap_or_else(|| panic!("condition {condition_type} not set"))
            .clone()
    }
}

/// A placement in the fixture namespace; callers adjust the spec in place.
pub fn placement(namespace: &str, name: &str) -> Placement {
    Placement::new(namespace, name)
}
