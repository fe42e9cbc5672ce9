//! Resource prioritizer: score clusters by allocatable resources.
//!
//! Parameterized by a resource name and one of two modes: `MostAllocatable`
//! scores by the allocatable quantity alone, `MostAllocatableToCapacityRatio`
//! by allocatable over capacity. Raw values are min-max normalized onto
//! `[-100, 100]` across the candidate set.

use std::collections::HashMap;

use fleetplace_api::{Cluster, Placement, RESOURCE_CPU, RESOURCE_MEMORY};

use crate::error::SchedulingResult;

use super::{normalize_scores, Prioritizer, ScoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceMode {
    MostAllocatable,
    MostAllocatableToCapacityRatio,
}

pub struct ResourcePrioritizer {
    name: String,
    resource: String,
    mode: ResourceMode,
}

impl ResourcePrioritizer {
    pub fn new(name: impl Into<String>, resource: impl Into<String>, mode: ResourceMode) -> Self {
        Self {
            name: name.into(),
            resource: resource.into(),
            mode,
        }
    }

    /// Parse a `Resource*` built-in name.
    ///
    /// `ResourceAllocatableCPU` and `ResourceAllocatableMemory` are the
    /// canonical spellings; any other suffix after `ResourceAllocatable` or
    /// `ResourceRatio` is taken as a resource key, lowercased.
    pub fn parse(built_in: &str) -> Option<Self> {
        let (mode, rest) = if let Some(rest) = built_in.strip_prefix("ResourceAllocatable") {
            (ResourceMode::MostAllocatable, rest)
        } else if let Some(rest) = built_in.strip_prefix("ResourceRatio") {
            (ResourceMode::MostAllocatableToCapacityRatio, rest)
        } else {
            return None;
        };
        if rest.is_empty() {
            return None;
        }
        let resource = match rest {
            "CPU" => RESOURCE_CPU.to_string(),
            "Memory" => RESOURCE_MEMORY.to_string(),
            other => other.to_lowercase(),
        };
        Some(Self::new(built_in, resource, mode))
    }

    fn raw_score(&self, cluster: &Cluster) -> f64 {
        match self.mode {
            ResourceMode::MostAllocatable => cluster.allocatable(&self.resource),
            ResourceMode::MostAllocatableToCapacityRatio => {
                let capacity = cluster.capacity(&self.resource);
                if capacity == 0.0 {
                    0.0
                } else {
                    100.0 * cluster.allocatable(&self.resource) / capacity
                }
            }
        }
    }
}

impl Prioritizer for ResourcePrioritizer {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn score(
        &self,
        _placement: &Placement,
        clusters: &[Cluster],
    ) -> SchedulingResult<ScoreResult> {
        let raw: HashMap<String, f64> = clusters
            .iter()
            .map(|cluster| (cluster.name().to_string(), self.raw_score(cluster)))
            .collect();
        Ok(ScoreResult::new(normalize_scores(&raw)))
    }
}
