//! The scheduling controller: reconcile one placement key at a time.
//!
//! Workers dequeue `namespace/name` keys from the shared work queue; within
//! a single key, reconciliation is strictly sequential. Policy errors are
//! absorbed into the placement's conditions so only transient backend
//! failures reach the queue's retry path.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use fleetplace_api::{
    condition::set_condition, placement, Cluster, ClusterGroup, Condition, ConditionStatus,
    GroupBinding, Placement, ResourceKey,
};
use fleetplace_store::{Clock, Lister, MemoryStore, WorkQueue};

use crate::binder::DecisionBinder;
use crate::error::{SchedulingError, SchedulingResult};
use crate::events::EventRecorder;
use crate::metrics::SchedulerMetrics;
use crate::scheduler::PluginScheduler;

pub const REASON_SCHEDULING_FAILED: &str = "SchedulingFailed";

pub struct SchedulingController {
    placements: MemoryStore<Placement>,
    placement_lister: Lister<Placement>,
    group_lister: Lister<ClusterGroup>,
    binding_lister: Lister<GroupBinding>,
    cluster_lister: Lister<Cluster>,
    scheduler: PluginScheduler,
    binder: DecisionBinder,
    queue: Arc<WorkQueue>,
    metrics: Arc<SchedulerMetrics>,
    recorder: EventRecorder,
    clock: Arc<dyn Clock>,
}

#[allow(clippy::too_many_arguments)]
impl SchedulingController {
    pub fn new(
        placements: MemoryStore<Placement>,
        placement_lister: Lister<Placement>,
        group_lister: Lister<ClusterGroup>,
        binding_lister: Lister<GroupBinding>,
        cluster_lister: Lister<Cluster>,
        scheduler: PluginScheduler,
        binder: DecisionBinder,
        queue: Arc<WorkQueue>,
        metrics: Arc<SchedulerMetrics>,
        recorder: EventRecorder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            placements,
            placement_lister,
            group_lister,
            binding_lister,
            cluster_lister,
            scheduler,
            binder,
            queue,
            metrics,
            recorder,
            clock,
        }
    }

    /// Process keys until the queue shuts down.
    pub async fn run_worker(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let key = tokio::select! {
                key = self.queue.get() => key,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };
            let Some(key) = key else { break };

            match self.sync(&key) {
                Ok(()) => self.queue.forget(&key),
                Err(SchedulingError::Cancelled) => {}
                Err(e) if e.is_retryable() => {
                    warn!(placement = %key, error = %e, "reconcile failed, requeueing");
                    self.queue.add_rate_limited(&key);
                }
                Err(e) => error!(placement = %key, error = %e, "reconcile failed"),
            }
            self.queue.done(&key);
        }
        debug!("worker drained");
    }

    /// Reconcile a single placement key.
    #[instrument(skip(self), fields(placement = %key))]
    pub fn sync(&self, key: &str) -> SchedulingResult<()> {
        let resource_key: ResourceKey = match key.parse() {
            Ok(key) => key,
            Err(_) => {
                // Not a namespace/name key; drop it.
                warn!("ignoring malformed queue key");
                return Ok(());
            }
        };

        let Some(placement) = self.placement_lister.get(&resource_key) else {
            // The placement is gone; its decision pages go with it.
            return self
                .binder
                .delete_all(&resource_key.namespace, &resource_key.name);
        };
        if placement.meta.deletion_timestamp.is_some() {
            return Ok(());
        }

        let scheduling_started = Instant::now();

        let bindings = self.valid_bindings(placement.namespace());
        let eligible_groups = self.eligible_groups(&placement, &bindings);

        if eligible_groups.is_empty() {
            self.binder.bind(&placement, &[])?;
            let satisfied = satisfied_condition(
                &eligible_groups,
                bindings.len(),
                0,
                0,
                0,
                self.clock.now(),
            );
            return self.write_status(&placement, 0, satisfied, correct_configuration(self.clock.now()));
        }

        let eligible = self.eligible_clusters(&eligible_groups);

        let result = match self.scheduler.schedule(&placement, eligible.clone()) {
            Ok(result) => result,
            Err(e) => {
                self.recorder.warning(
                    &placement.meta.key(),
                    REASON_SCHEDULING_FAILED,
                    format!("failed to schedule placement: {e}"),
                );
                if e.is_config() {
                    // Bad policy: surface it in status and stop retrying;
                    // re-reconcile happens when the spec changes.
                    let misconfigured = Condition::new(
                        placement::CONDITION_MISCONFIGURED,
                        ConditionStatus::True,
                        placement::REASON_MISCONFIGURED,
                        e.to_string(),
                        self.clock.now(),
                    );
                    let mut status = placement.status.clone();
                    set_condition(&mut status.conditions, misconfigured);
                    if status != placement.status {
                        let mut updated = placement.clone();
                        updated.status = status;
                        self.placements.update_status(updated)?;
                    }
                    return Ok(());
                }
                return Err(e);
            }
        };
        self.metrics
            .observe_scheduling(placement.name(), scheduling_started.elapsed());

        let bind_started = Instant::now();
        self.binder.bind(&placement, &result.decisions)?;
        self.metrics
            .observe_bind(placement.name(), bind_started.elapsed());

        let satisfied = satisfied_condition(
            &eligible_groups,
            bindings.len(),
            eligible.len(),
            result.feasible,
            result.unscheduled,
            self.clock.now(),
        );
        self.write_status(
            &placement,
            result.decisions.len() as u32,
            satisfied,
            correct_configuration(self.clock.now()),
        )?;

        if let Some(at) = result.requeue_at {
            let delta = (at - self.clock.now())
                .to_std()
                .unwrap_or_default();
            debug!(placement = %key, delay = ?delta, "scheduling timed requeue");
            self.queue.add_after(key, delta);
        }

        Ok(())
    }

    /// Bindings in the namespace whose group actually exists.
    fn valid_bindings(&self, namespace: &str) -> Vec<GroupBinding> {
        self.binding_lister
            .list(Some(namespace))
            .into_iter()
            .filter(|binding| {
                self.group_lister
                    .get(&ResourceKey::cluster_scoped(binding.spec.group.clone()))
                    .is_some()
            })
            .collect()
    }

    /// Bound groups the placement may use: every bound group when the spec
    /// names none, otherwise the intersection with the spec's refs.
    fn eligible_groups(&self, placement: &Placement, bindings: &[GroupBinding]) -> Vec<String> {
        let mut bound: Vec<String> = bindings.iter().map(|b| b.spec.group.clone()).collect();
        bound.sort();
        bound.dedup();
        if placement.spec.group_refs.is_empty() {
            bound
        } else {
            bound
                .into_iter()
                .filter(|group| placement.spec.group_refs.contains(group))
                .collect()
        }
    }

    /// Union of the member clusters of the given groups, sorted by name.
    fn eligible_clusters(&self, group_names: &[String]) -> Vec<Cluster> {
        let groups: Vec<ClusterGroup> = group_names
            .iter()
            .filter_map(|name| {
                self.group_lister
                    .get(&ResourceKey::cluster_scoped(name.clone()))
            })
            .collect();
        self.cluster_lister
            .list(None)
            .into_iter()
            .filter(|cluster| groups.iter().any(|g| g.spec.selector.matches(cluster)))
            .collect()
    }

    fn write_status(
        &self,
        placement: &Placement,
        selected: u32,
        satisfied: Condition,
        misconfigured: Condition,
    ) -> SchedulingResult<()> {
        let mut status = placement.status.clone();
        status.number_of_selected_clusters = selected;
        set_condition(&mut status.conditions, satisfied);
        set_condition(&mut status.conditions, misconfigured);

        if status == placement.status {
            return Ok(());
        }
        let mut updated = placement.clone();
        updated.status = status;
        self.placements.update_status(updated)?;
        info!(
            placement = %placement.meta.key(),
            selected,
            "placement status updated"
        );
        Ok(())
    }
}

fn correct_configuration(now: chrono::DateTime<chrono::Utc>) -> Condition {
    Condition::new(
        placement::CONDITION_MISCONFIGURED,
        ConditionStatus::False,
        placement::REASON_CORRECT_CONFIGURATION,
        "placement configuration is valid",
        now,
    )
}

/// The `Satisfied` condition per the reason taxonomy: missing bindings, an
/// empty intersection, empty groups, nothing feasible, or a (partially)
/// filled selection.
fn satisfied_condition(
    eligible_groups: &[String],
    bindings: usize,
    available: usize,
    feasible: usize,
    unscheduled: usize,
    now: chrono::DateTime<chrono::Utc>,
) -> Condition {
    let (status, reason, message) = if bindings == 0 {
        (
            ConditionStatus::False,
            placement::REASON_NO_BINDINGS,
            "no valid group bindings found in placement namespace".to_string(),
        )
    } else if eligible_groups.is_empty() {
        (
            ConditionStatus::False,
            placement::REASON_NO_INTERSECTION,
            "none of the referenced groups are bound to the placement namespace".to_string(),
        )
    } else if available == 0 {
        (
            ConditionStatus::False,
            placement::REASON_ALL_GROUPS_EMPTY,
            "no clusters in the bound cluster groups".to_string(),
        )
    } else if feasible == 0 {
        (
            ConditionStatus::False,
            placement::REASON_NO_CLUSTER_MATCHED,
            "no cluster matches the placement policy".to_string(),
        )
    } else if unscheduled == 0 {
        (
            ConditionStatus::True,
            placement::REASON_ALL_DECISIONS_SCHEDULED,
            "all cluster decisions scheduled".to_string(),
        )
    } else {
        (
            ConditionStatus::False,
            placement::REASON_NOT_ALL_DECISIONS_SCHEDULED,
            format!("{unscheduled} cluster decisions unscheduled"),
        )
    };
    Condition::new(placement::CONDITION_SATISFIED, status, reason, message, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn condition_for(
        eligible: &[&str],
        bindings: usize,
        available: usize,
        feasible: usize,
        unscheduled: usize,
    ) -> Condition {
        let eligible: Vec<String> = eligible.iter().map(|s| s.to_string()).collect();
        satisfied_condition(&eligible, bindings, available, feasible, unscheduled, Utc::now())
    }

    #[test]
    fn satisfied_reason_taxonomy() {
        let c = condition_for(&[], 0, 0, 0, 5);
        assert_eq!(c.status, ConditionStatus::False);
        assert_eq!(c.reason, placement::REASON_NO_BINDINGS);

        let c = condition_for(&[], 1, 0, 0, 0);
        assert_eq!(c.reason, placement::REASON_NO_INTERSECTION);

        let c = condition_for(&["group1"], 1, 0, 0, 0);
        assert_eq!(c.reason, placement::REASON_ALL_GROUPS_EMPTY);

        let c = condition_for(&["group1"], 1, 1, 0, 0);
        assert_eq!(c.reason, placement::REASON_NO_CLUSTER_MATCHED);

        let c = condition_for(&["group1"], 1, 1, 1, 0);
        assert_eq!(c.status, ConditionStatus::True);
        assert_eq!(c.reason, placement::REASON_ALL_DECISIONS_SCHEDULED);

        let c = condition_for(&["group1"], 1, 1, 1, 1);
        assert_eq!(c.status, ConditionStatus::False);
        assert_eq!(c.reason, placement::REASON_NOT_ALL_DECISIONS_SCHEDULED);
    }
}
