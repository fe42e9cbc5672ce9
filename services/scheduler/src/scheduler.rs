//! The plugin scheduler: filters, weighted scoring, ranked selection.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use fleetplace_api::{
    Cluster, ClusterDecision, Placement, PrioritizerMode, ScoreCoordinate,
};

use crate::error::{SchedulingError, SchedulingResult};
use crate::plugins::{
    AddOnPrioritizer, BalancePrioritizer, Filter, FilterContext, PredicateFilter, Prioritizer,
    ResourcePrioritizer, SchedulerHandle, SpreadFilter, SteadyPrioritizer, TaintTolerationFilter,
};

pub const PRIORITIZER_BALANCE: &str = "Balance";
pub const PRIORITIZER_STEADY: &str = "Steady";
pub const PRIORITIZER_RESOURCE_PREFIX: &str = "Resource";
pub const PRIORITIZER_CUSTOMIZE_PREFIX: &str = "Customize";

const MIN_PRIORITIZER_WEIGHT: i32 = -10;
const MAX_PRIORITIZER_WEIGHT: i32 = 10;

/// Survivors of one filter, for the diagnostic trace.
#[derive(Debug, Clone)]
pub struct FilterRecord {
    pub name: String,
    pub filtered: Vec<String>,
}

/// One prioritizer's weight and per-cluster scores, for the diagnostic
/// trace.
#[derive(Debug, Clone)]
pub struct PrioritizerRecord {
    pub name: String,
    pub weight: i32,
    pub scores: HashMap<String, i64>,
}

/// Output of one scheduling pass.
#[derive(Debug, Clone)]
pub struct ScheduleResult {
    /// Ranked cluster selections, already truncated to the desired count.
    pub decisions: Vec<ClusterDecision>,
    /// Size of the feasible set (after filters, before truncation).
    pub feasible: usize,
    /// How many desired slots went unfilled.
    pub unscheduled: usize,
    /// Earliest moment a time-dependent input changes the outcome.
    pub requeue_at: Option<DateTime<Utc>>,
    pub filter_records: Vec<FilterRecord>,
    pub prioritizer_records: Vec<PrioritizerRecord>,
    /// Weighted score sum per feasible cluster.
    pub score_sum: HashMap<String, i64>,
}

/// Runs the plugin pipeline for one placement over one candidate list.
pub struct PluginScheduler {
    handle: Arc<SchedulerHandle>,
    filters: Vec<Box<dyn Filter>>,
}

impl PluginScheduler {
    pub fn new(handle: Arc<SchedulerHandle>) -> Self {
        let filters: Vec<Box<dyn Filter>> = vec![
            Box::new(PredicateFilter::new()),
            Box::new(TaintTolerationFilter::new(Arc::clone(&handle.clock))),
            Box::new(SpreadFilter::new()),
        ];
        Self { handle, filters }
    }

    pub fn schedule(
        &self,
        placement: &Placement,
        clusters: Vec<Cluster>,
    ) -> SchedulingResult<ScheduleResult> {
        let ctx = FilterContext {
            existing: self.handle.existing_decisions(placement),
        };

        // Filters run in order and short-circuit once nothing survives.
        let mut filtered = clusters;
        let mut filter_records = Vec::with_capacity(self.filters.len());
        let mut requeue_at: Option<DateTime<Utc>> = None;
        for filter in &self.filters {
            let outcome = filter.filter(&ctx, placement, filtered)?;
            filtered = outcome.filtered;
            requeue_at = merge_requeue(requeue_at, outcome.requeue_at);
            filter_records.push(FilterRecord {
                name: filter.name().to_string(),
                filtered: filtered.iter().map(|c| c.name().to_string()).collect(),
            });
            if filtered.is_empty() {
                break;
            }
        }

        // Resolve effective weights and instantiate the prioritizers. Every
        // configured coordinate is built so a malformed one is rejected even
        // at weight zero; zero-weight prioritizers are then dropped.
        let weights = resolve_weights(placement)?;
        let mut prioritizers: Vec<(Box<dyn Prioritizer>, i32)> = Vec::new();
        for (coordinate, weight) in &weights {
            let prioritizer = self.build_prioritizer(coordinate)?;
            if *weight == 0 {
                continue;
            }
            prioritizers.push((prioritizer, *weight));
        }
        prioritizers.sort_by_key(|(p, _)| p.name());

        let mut score_sum: HashMap<String, i64> =
            filtered.iter().map(|c| (c.name().to_string(), 0)).collect();
        let mut prioritizer_records = Vec::with_capacity(prioritizers.len());
        for (prioritizer, weight) in &prioritizers {
            let result = prioritizer.score(placement, &filtered)?;
            requeue_at = merge_requeue(requeue_at, result.requeue_at);
            for (cluster, score) in &result.scores {
                if let Some(sum) = score_sum.get_mut(cluster) {
                    *sum += score * i64::from(*weight);
                }
            }
            prioritizer_records.push(PrioritizerRecord {
                name: prioritizer.name(),
                weight: *weight,
                scores: result.scores,
            });
        }

        // Rank by weighted sum, ties broken by name.
        filtered.sort_by(|a, b| {
            let score_a = score_sum.get(a.name()).copied().unwrap_or(0);
            let score_b = score_sum.get(b.name()).copied().unwrap_or(0);
            score_b.cmp(&score_a).then_with(|| a.name().cmp(b.name()))
        });

        let feasible = filtered.len();
        let selected = match placement.spec.desired_count {
            Some(count) => (count as usize).min(feasible),
            None => feasible,
        };
        let unscheduled = placement
            .spec
            .desired_count
            .map(|count| (count as usize).saturating_sub(selected))
            .unwrap_or(0);

        let decisions = filtered[..selected]
            .iter()
            .map(|c| ClusterDecision::new(c.name()))
            .collect();

        debug!(
            placement = %placement.meta.key(),
            feasible,
            selected,
            unscheduled,
            "scheduling pass complete"
        );

        Ok(ScheduleResult {
            decisions,
            feasible,
            unscheduled,
            requeue_at,
            filter_records,
            prioritizer_records,
            score_sum,
        })
    }

    fn build_prioritizer(
        &self,
        coordinate: &ScoreCoordinate,
    ) -> SchedulingResult<Box<dyn Prioritizer>> {
        match coordinate {
            ScoreCoordinate::BuiltIn { built_in } => match built_in.as_str() {
                PRIORITIZER_BALANCE => {
                    Ok(Box::new(BalancePrioritizer::new(Arc::clone(&self.handle))))
                }
                PRIORITIZER_STEADY => {
                    Ok(Box::new(SteadyPrioritizer::new(Arc::clone(&self.handle))))
                }
                name if name.starts_with(PRIORITIZER_CUSTOMIZE_PREFIX) => Ok(Box::new(
                    AddOnPrioritizer::customize(Arc::clone(&self.handle), name),
                )),
                name if name.starts_with(PRIORITIZER_RESOURCE_PREFIX) => {
                    ResourcePrioritizer::parse(name)
                        .map(|p| Box::new(p) as Box<dyn Prioritizer>)
                        .ok_or_else(|| {
                            SchedulingError::Config(format!(
                                "unrecognized resource prioritizer {name:?}"
                            ))
                        })
                }
                name => Err(SchedulingError::Config(format!(
                    "unknown built-in prioritizer {name:?}"
                ))),
            },
            ScoreCoordinate::AddOn {
                resource_name,
                score_name,
            } => {
                if resource_name.is_empty() || score_name.is_empty() {
                    return Err(SchedulingError::Config(
                        "add-on score coordinate requires a resource name and a score name"
                            .to_string(),
                    ));
                }
                Ok(Box::new(AddOnPrioritizer::new(
                    Arc::clone(&self.handle),
                    resource_name.clone(),
                    score_name.clone(),
                )))
            }
        }
    }
}

fn merge_requeue(
    current: Option<DateTime<Utc>>,
    candidate: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Effective prioritizer weights: the defaults (`Balance` and `Steady` at 1)
/// overlaid with the policy in `Additive` mode, or the policy alone in
/// `Exact` mode.
fn resolve_weights(placement: &Placement) -> SchedulingResult<HashMap<ScoreCoordinate, i32>> {
    let policy = &placement.spec.prioritizer_policy;
    for config in &policy.configurations {
        if !(MIN_PRIORITIZER_WEIGHT..=MAX_PRIORITIZER_WEIGHT).contains(&config.weight) {
            return Err(SchedulingError::Config(format!(
                "prioritizer weight {} out of range [{MIN_PRIORITIZER_WEIGHT}, {MAX_PRIORITIZER_WEIGHT}]",
                config.weight
            )));
        }
    }

    let mut weights = HashMap::new();
    if policy.mode == PrioritizerMode::Additive {
        weights.insert(ScoreCoordinate::built_in(PRIORITIZER_BALANCE), 1);
        weights.insert(ScoreCoordinate::built_in(PRIORITIZER_STEADY), 1);
    }
    for config in &policy.configurations {
        weights.insert(config.score_coordinate.clone(), config.weight);
    }
    Ok(weights)
}
