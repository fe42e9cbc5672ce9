//! Balance prioritizer: spread load across the fleet.
//!
//! Clusters named by fewer other placements' decisions score higher. With
//! `c(x)` the count of decisions naming cluster `x` across all placements in
//! the namespace except the current one, and `m` the maximum count, the
//! score is 100 when `m` is zero and `round(100 * (1 - c(x)/m))` otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use fleetplace_api::{Cluster, Placement, PLACEMENT_LABEL};

use crate::error::SchedulingResult;

use super::{Prioritizer, SchedulerHandle, ScoreResult, MAX_CLUSTER_SCORE};

pub struct BalancePrioritizer {
    handle: Arc<SchedulerHandle>,
}

impl BalancePrioritizer {
    pub fn new(handle: Arc<SchedulerHandle>) -> Self {
        Self { handle }
    }
}

impl Prioritizer for BalancePrioritizer {
    fn name(&self) -> String {
        "Balance".to_string()
    }

    fn score(
        &self,
        placement: &Placement,
        clusters: &[Cluster],
    ) -> SchedulingResult<ScoreResult> {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        let pages = self.handle.decisions.list(Some(placement.namespace()));
        for page in &pages {
            if page
                .meta
                .labels
                .get(PLACEMENT_LABEL)
                .is_some_and(|owner| owner == placement.name())
            {
                continue;
            }
            for decision in &page.status.decisions {
                if !decision.cluster_name.is_empty() {
                    *counts.entry(decision.cluster_name.as_str()).or_insert(0) += 1;
                }
            }
        }
        let max = counts.values().copied().max().unwrap_or(0);

        let scores = clusters
            .iter()
            .map(|cluster| {
                let score = if max == 0 {
                    MAX_CLUSTER_SCORE
                } else {
                    let count = counts.get(cluster.name()).copied().unwrap_or(0);
                    (MAX_CLUSTER_SCORE as f64 * (1.0 - count as f64 / max as f64)).round()
                        as i64
                };
                (cluster.name().to_string(), score)
            })
            .collect();

        Ok(ScoreResult::new(scores))
    }
}
