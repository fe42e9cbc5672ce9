//! Scheduling plugins.
//!
//! Plugins come in two capability variants: filters narrow the candidate
//! set, prioritizers score what survives. Both are stateless across
//! placements and pure over their inputs plus the shared [`SchedulerHandle`],
//! which grants read-only cache access, an event recorder, and the clock.

pub mod addon;
pub mod balance;
pub mod predicate;
pub mod resource;
pub mod spread;
pub mod steady;
pub mod taint;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use fleetplace_api::{AddOnScore, Cluster, Placement, PlacementDecision, PLACEMENT_LABEL};
use fleetplace_store::{Clock, Lister};

use crate::error::SchedulingResult;
use crate::events::EventRecorder;

pub use addon::AddOnPrioritizer;
pub use balance::BalancePrioritizer;
pub use predicate::PredicateFilter;
pub use resource::ResourcePrioritizer;
pub use spread::SpreadFilter;
pub use steady::SteadyPrioritizer;
pub use taint::TaintTolerationFilter;

/// Maximum score a prioritizer may emit for a cluster.
pub const MAX_CLUSTER_SCORE: i64 = 100;

/// Minimum score a prioritizer may emit for a cluster.
pub const MIN_CLUSTER_SCORE: i64 = -100;

/// Shared read-only environment for plugins.
pub struct SchedulerHandle {
    pub decisions: Lister<PlacementDecision>,
    pub scores: Lister<AddOnScore>,
    pub recorder: EventRecorder,
    pub clock: Arc<dyn Clock>,
}

impl SchedulerHandle {
    /// Names of the clusters currently in the placement's decisions.
    pub fn existing_decisions(&self, placement: &Placement) -> HashSet<String> {
        let pages = self.decisions.list_labeled(
            Some(placement.namespace()),
            PLACEMENT_LABEL,
            placement.name(),
        );
        pages
            .iter()
            .flat_map(|page| page.status.decisions.iter())
            .filter(|d| !d.cluster_name.is_empty())
            .map(|d| d.cluster_name.clone())
            .collect()
    }
}

/// Per-schedule state passed explicitly into filters: the clusters the
/// placement has already selected, seeded from its current decisions.
#[derive(Debug, Default)]
pub struct FilterContext {
    pub existing: HashSet<String>,
}

/// Result of one filter invocation.
#[derive(Debug)]
pub struct FilterOutcome {
    pub filtered: Vec<Cluster>,
    /// Earliest moment a currently passing cluster stops passing, if the
    /// filter's verdict is time-dependent.
    pub requeue_at: Option<DateTime<Utc>>,
}

impl FilterOutcome {
    pub fn new(filtered: Vec<Cluster>) -> Self {
        Self {
            filtered,
            requeue_at: None,
        }
    }
}

/// Result of one prioritizer invocation.
#[derive(Debug)]
pub struct ScoreResult {
    /// Score per cluster name, in `[-100, 100]`.
    pub scores: HashMap<String, i64>,
    /// Earliest moment a score input expires, if any.
    pub requeue_at: Option<DateTime<Utc>>,
}

impl ScoreResult {
    pub fn new(scores: HashMap<String, i64>) -> Self {
        Self {
            scores,
            requeue_at: None,
        }
    }
}

/// Narrows the candidate cluster set.
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    fn filter(
        &self,
        ctx: &FilterContext,
        placement: &Placement,
        clusters: Vec<Cluster>,
    ) -> SchedulingResult<FilterOutcome>;
}

/// Scores candidate clusters.
pub trait Prioritizer: Send + Sync {
    fn name(&self) -> String;

    fn score(&self, placement: &Placement, clusters: &[Cluster])
        -> SchedulingResult<ScoreResult>;
}

/// Min-max normalize raw values onto `[-100, 100]`.
///
/// When every raw value is equal, all clusters score 100 unless the common
/// value is zero, in which case they score 0.
pub fn normalize_scores(raw: &HashMap<String, f64>) -> HashMap<String, i64> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in raw.values() {
        min = min.min(*value);
        max = max.max(*value);
    }

    raw.iter()
        .map(|(name, value)| {
            let score = if min < max {
                (2.0 * MAX_CLUSTER_SCORE as f64 * ((value - min) / (max - min) - 0.5)).round()
                    as i64
            } else if min == 0.0 {
                0
            } else {
                MAX_CLUSTER_SCORE
            };
            (name.clone(), score)
        })
        .collect()
}
