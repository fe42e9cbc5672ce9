//! Topology spread filter.
//!
//! Hard constraints (`DoNotSelect`) filter: a cluster must carry every hard
//! topology key, and selecting it must not push the per-value occupancy
//! above the constraint's `maxSkew`. Occupancy accumulates over the clusters
//! accepted in the current pass, seeded from the placement's existing
//! decisions so a stable selection never evicts itself. Soft constraints
//! (`SelectAnyway`) never filter.

use std::collections::HashMap;

use fleetplace_api::{Cluster, Placement, SpreadConstraint, TopologyKeyType, UnsatisfiableAction};

use crate::error::SchedulingResult;

use super::{Filter, FilterContext, FilterOutcome};

pub struct SpreadFilter;

impl SpreadFilter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SpreadFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(PartialEq, Eq, Hash)]
struct TopologyPair {
    key_type: TopologyKeyType,
    key: String,
    value: String,
}

fn topology_value<'a>(cluster: &'a Cluster, constraint: &SpreadConstraint) -> Option<&'a String> {
    match constraint.topology_key_type {
        TopologyKeyType::Label => cluster.labels().get(&constraint.topology_key),
        TopologyKeyType::Claim => cluster.status.claims.get(&constraint.topology_key),
    }
}

impl Filter for SpreadFilter {
    fn name(&self) -> &'static str {
        "Spread"
    }

    fn filter(
        &self,
        ctx: &FilterContext,
        placement: &Placement,
        clusters: Vec<Cluster>,
    ) -> SchedulingResult<FilterOutcome> {
        let hard: Vec<&SpreadConstraint> = placement
            .spec
            .spread_policy
            .iter()
            .filter(|c| c.when_unsatisfiable == UnsatisfiableAction::DoNotSelect)
            .collect();
        if hard.is_empty() {
            return Ok(FilterOutcome::new(clusters));
        }

        // Seed occupancy from the clusters this placement already selected.
        let mut occupancy: HashMap<TopologyPair, u32> = HashMap::new();
        for cluster in clusters.iter().filter(|c| ctx.existing.contains(c.name())) {
            for constraint in &hard {
                if let Some(value) = topology_value(cluster, constraint) {
                    *occupancy
                        .entry(TopologyPair {
                            key_type: constraint.topology_key_type,
                            key: constraint.topology_key.clone(),
                            value: value.clone(),
                        })
                        .or_insert(0) += 1;
                }
            }
        }

        let mut filtered = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            let Some(values) = hard
                .iter()
                .map(|c| topology_value(&cluster, c).cloned())
                .collect::<Option<Vec<String>>>()
            else {
                // Missing a hard topology key.
                continue;
            };

            if ctx.existing.contains(cluster.name()) {
                // Already counted in the seed.
                filtered.push(cluster);
                continue;
            }

            let within_skew = hard.iter().zip(&values).all(|(constraint, value)| {
                let count = occupancy
                    .get(&TopologyPair {
                        key_type: constraint.topology_key_type,
                        key: constraint.topology_key.clone(),
                        value: value.clone(),
                    })
                    .copied()
                    .unwrap_or(0);
                count + 1 <= constraint.max_skew
            });
            if !within_skew {
                continue;
            }

            for (constraint, value) in hard.iter().zip(&values) {
                *occupancy
                    .entry(TopologyPair {
                        key_type: constraint.topology_key_type,
                        key: constraint.topology_key.clone(),
                        value: value.clone(),
                    })
                    .or_insert(0) += 1;
            }
            filtered.push(cluster);
        }

        Ok(FilterOutcome::new(filtered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetplace_api::PlacementSpec;

    fn cluster_with_label(name: &str, key: &str, value: &str) -> Cluster {
        let mut cluster = Cluster::new(name);
        cluster.meta.labels.insert(key.into(), value.into());
        cluster
    }

    fn hard_constraint(key: &str, max_skew: u32) -> SpreadConstraint {
        SpreadConstraint {
            topology_key: key.into(),
            topology_key_type: TopologyKeyType::Label,
            max_skew,
            when_unsatisfiable: UnsatisfiableAction::DoNotSelect,
        }
    }

    fn placement_with_spread(constraints: Vec<SpreadConstraint>) -> Placement {
        Placement {
            spec: PlacementSpec {
                spread_policy: constraints,
                ..Default::default()
            },
            ..Placement::new("ns1", "placement1")
        }
    }

    fn run(placement: &Placement, clusters: Vec<Cluster>, existing: &[&str]) -> Vec<String> {
        let ctx = FilterContext {
            existing: existing.iter().map(|s| s.to_string()).collect(),
        };
        SpreadFilter::new()
            .filter(&ctx, placement, clusters)
            .unwrap()
            .filtered
            .into_iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    #[test]
    fn one_cluster_per_value_with_max_skew_one() {
        let placement = placement_with_spread(vec![hard_constraint("cloud", 1)]);
        let clusters = vec![
            cluster_with_label("c1", "cloud", "Amazon"),
            cluster_with_label("c2", "cloud", "Amazon"),
            cluster_with_label("c3", "cloud", "Google"),
            cluster_with_label("c4", "cloud", "Google"),
            cluster_with_label("c5", "cloud", "Azure"),
        ];
        assert_eq!(run(&placement, clusters, &[]), vec!["c1", "c3", "c5"]);
    }

    #[test]
    fn missing_topology_key_is_ineligible() {
        let placement = placement_with_spread(vec![hard_constraint("cloud", 2)]);
        let clusters = vec![
            cluster_with_label("c1", "cloud", "Amazon"),
            Cluster::new("c2"),
        ];
        assert_eq!(run(&placement, clusters, &[]), vec!["c1"]);
    }

    #[test]
    fn existing_decisions_seed_occupancy() {
        let placement = placement_with_spread(vec![hard_constraint("cloud", 1)]);
        let clusters = vec![
            cluster_with_label("c1", "cloud", "Amazon"),
            cluster_with_label("c2", "cloud", "Amazon"),
            cluster_with_label("c3", "cloud", "Google"),
        ];
        // c2 is already selected, so the Amazon slot is taken and c1 is out.
        assert_eq!(run(&placement, clusters, &["c2"]), vec!["c2", "c3"]);
    }

    #[test]
    fn soft_constraints_do_not_filter() {
        let placement = placement_with_spread(vec![SpreadConstraint {
            topology_key: "cloud".into(),
            topology_key_type: TopologyKeyType::Label,
            max_skew: 1,
            when_unsatisfiable: UnsatisfiableAction::SelectAnyway,
        }]);
        let clusters = vec![
            cluster_with_label("c1", "cloud", "Amazon"),
            cluster_with_label("c2", "cloud", "Amazon"),
            Cluster::new("c3"),
        ];
        assert_eq!(run(&placement, clusters, &[]), vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn claim_keyed_constraint_reads_claims() {
        let placement = placement_with_spread(vec![SpreadConstraint {
            topology_key: "region".into(),
            topology_key_type: TopologyKeyType::Claim,
            max_skew: 1,
            when_unsatisfiable: UnsatisfiableAction::DoNotSelect,
        }]);
        let mut c1 = Cluster::new("c1");
        c1.status.claims.insert("region".into(), "us".into());
        let mut c2 = Cluster::new("c2");
        c2.status.claims.insert("region".into(), "us".into());
        let mut c3 = Cluster::new("c3");
        c3.status.claims.insert("region".into(), "eu".into());
        assert_eq!(run(&placement, vec![c1, c2, c3], &[]), vec!["c1", "c3"]);
    }
}
