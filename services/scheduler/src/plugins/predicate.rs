//! Predicate filter: label and claim selectors over candidate clusters.

use fleetplace_api::{Cluster, Placement, Predicate};

use crate::error::{SchedulingError, SchedulingResult};

use super::{Filter, FilterContext, FilterOutcome};

/// Keeps clusters matching at least one predicate term. A term matches when
/// both its label selector matches the cluster's labels and its claim
/// selector matches the cluster's claims. No terms means every cluster
/// passes.
pub struct PredicateFilter;

impl PredicateFilter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PredicateFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(predicates: &[Predicate]) -> SchedulingResult<()> {
    for predicate in predicates {
        predicate
            .label_selector
            .validate()
            .map_err(|e| SchedulingError::Config(format!("invalid label selector: {e}")))?;
        predicate
            .claim_selector
            .validate()
            .map_err(|e| SchedulingError::Config(format!("invalid claim selector: {e}")))?;
    }
    Ok(())
}

fn matches_any(predicates: &[Predicate], cluster: &Cluster) -> bool {
    predicates.iter().any(|p| {
        p.label_selector.matches(cluster.labels()) && p.claim_selector.matches(&cluster.status.claims)
    })
}

impl Filter for PredicateFilter {
    fn name(&self) -> &'static str {
        "Predicate"
    }

    fn filter(
        &self,
        _ctx: &FilterContext,
        placement: &Placement,
        clusters: Vec<Cluster>,
    ) -> SchedulingResult<FilterOutcome> {
        let predicates = &placement.spec.predicates;
        validate(predicates)?;
        if predicates.is_empty() {
            return Ok(FilterOutcome::new(clusters));
        }
        let filtered = clusters
            .into_iter()
            .filter(|cluster| matches_any(predicates, cluster))
            .collect();
        Ok(FilterOutcome::new(filtered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetplace_api::{
        ClaimSelector, LabelSelector, MatchExpression, MatchOperator, PlacementSpec,
    };

    fn cluster_with_label(name: &str, key: &str, value: &str) -> Cluster {
        let mut cluster = Cluster::new(name);
        cluster.meta.labels.insert(key.into(), value.into());
        cluster
    }

    fn cluster_with_claim(name: &str, key: &str, value: &str) -> Cluster {
        let mut cluster = Cluster::new(name);
        cluster.status.claims.insert(key.into(), value.into());
        cluster
    }

    fn placement_with_predicates(predicates: Vec<Predicate>) -> Placement {
        Placement {
            spec: PlacementSpec {
                predicates,
                ..Default::default()
            },
            ..Placement::new("ns1", "placement1")
        }
    }

    #[test]
    fn no_terms_pass_everything() {
        let placement = placement_with_predicates(vec![]);
        let clusters = vec![Cluster::new("c1"), Cluster::new("c2")];
        let outcome = PredicateFilter::new()
            .filter(&FilterContext::default(), &placement, clusters)
            .unwrap();
        assert_eq!(outcome.filtered.len(), 2);
    }

    #[test]
    fn label_term_filters() {
        let placement = placement_with_predicates(vec![Predicate {
            label_selector: LabelSelector::default().with_label("cloud", "Amazon"),
            claim_selector: ClaimSelector::default(),
        }]);
        let clusters = vec![
            cluster_with_label("c1", "cloud", "Amazon"),
            cluster_with_label("c2", "cloud", "Google"),
        ];
        let outcome = PredicateFilter::new()
            .filter(&FilterContext::default(), &placement, clusters)
            .unwrap();
        assert_eq!(outcome.filtered.len(), 1);
        assert_eq!(outcome.filtered[0].name(), "c1");
    }

    #[test]
    fn claim_term_filters() {
        let placement = placement_with_predicates(vec![Predicate {
            label_selector: LabelSelector::default(),
            claim_selector: ClaimSelector {
                match_expressions: vec![MatchExpression {
                    key: "cloud".into(),
                    operator: MatchOperator::In,
                    values: vec!["Amazon".into()],
                }],
            },
        }]);
        let clusters = vec![
            cluster_with_claim("c1", "cloud", "Amazon"),
            cluster_with_claim("c2", "cloud", "Google"),
            cluster_with_claim("c3", "cloud", "Google"),
        ];
        let outcome = PredicateFilter::new()
            .filter(&FilterContext::default(), &placement, clusters)
            .unwrap();
        assert_eq!(outcome.filtered.len(), 1);
        assert_eq!(outcome.filtered[0].name(), "c1");
    }

    #[test]
    fn terms_are_disjunctive() {
        let placement = placement_with_predicates(vec![
            Predicate {
                label_selector: LabelSelector::default().with_label("cloud", "Amazon"),
                claim_selector: ClaimSelector::default(),
            },
            Predicate {
                label_selector: LabelSelector::default().with_label("cloud", "Google"),
                claim_selector: ClaimSelector::default(),
            },
        ]);
        let clusters = vec![
            cluster_with_label("c1", "cloud", "Amazon"),
            cluster_with_label("c2", "cloud", "Google"),
            cluster_with_label("c3", "cloud", "Azure"),
        ];
        let outcome = PredicateFilter::new()
            .filter(&FilterContext::default(), &placement, clusters)
            .unwrap();
        let names: Vec<&str> = outcome.filtered.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["c1", "c2"]);
    }

    #[test]
    fn invalid_selector_is_a_config_error() {
        let placement = placement_with_predicates(vec![Predicate {
            label_selector: LabelSelector {
                match_labels: Default::default(),
                match_expressions: vec![MatchExpression {
                    key: "cloud".into(),
                    operator: MatchOperator::In,
                    values: vec![],
                }],
            },
            claim_selector: ClaimSelector::default(),
        }]);
        let err = PredicateFilter::new()
            .filter(&FilterContext::default(), &placement, vec![Cluster::new("c1")])
            .unwrap_err();
        assert!(err.is_config());
    }
}
