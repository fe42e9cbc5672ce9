//! Steady prioritizer: stabilize existing decisions.
//!
//! Clusters the placement has already selected score the maximum; everything
//! else scores zero, so an established selection only changes when something
//! else outweighs it.

use std::sync::Arc;

use fleetplace_api::{Cluster, Placement};

use crate::error::SchedulingResult;

use super::{Prioritizer, SchedulerHandle, ScoreResult, MAX_CLUSTER_SCORE};

pub struct SteadyPrioritizer {
    handle: Arc<SchedulerHandle>,
}

impl SteadyPrioritizer {
    pub fn new(handle: Arc<SchedulerHandle>) -> Self {
        Self { handle }
    }
}

impl Prioritizer for SteadyPrioritizer {
    fn name(&self) -> String {
        "Steady".to_string()
    }

    fn score(
        &self,
        placement: &Placement,
        clusters: &[Cluster],
    ) -> SchedulingResult<ScoreResult> {
        let existing = self.handle.existing_decisions(placement);
        let scores = clusters
            .iter()
            .map(|cluster| {
                let score = if existing.contains(cluster.name()) {
                    MAX_CLUSTER_SCORE
                } else {
                    0
                };
                (cluster.name().to_string(), score)
            })
            .collect();
        Ok(ScoreResult::new(scores))
    }
}
