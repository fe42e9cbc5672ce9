//! End-to-end scheduling scenarios: reconcile placements against an
//! in-process fleet and verify decisions, status, and conditions.

mod common;

use common::{placement, test_engine};

use fleetplace_api::{
    placement::{
        CONDITION_MISCONFIGURED, CONDITION_SATISFIED, REASON_ALL_DECISIONS_SCHEDULED,
        REASON_CORRECT_CONFIGURATION, REASON_MISCONFIGURED, REASON_NO_BINDINGS,
        REASON_NOT_ALL_DECISIONS_SCHEDULED,
    },
    ClaimSelector, ClusterDecision, ConditionStatus, MatchExpression, MatchOperator, ObjectMeta,
    PlacementDecision, PlacementDecisionStatus, Predicate, ResourceKey, SpreadConstraint,
    Toleration, TolerationOperator, TopologyKeyType, UnsatisfiableAction, PLACEMENT_LABEL,
};

#[tokio::test]
async fn new_placement_is_satisfied() {
    let fixture = test_engine();
    fixture.add_bound_group("ns1", "group1");
    fixture.add_cluster("cluster1", "group1");
    fixture
        .engine
        .stores
        .placements
        .create(placement("ns1", "placement1"))
        .unwrap();

    fixture.reconcile("ns1", "placement1");

    assert_eq!(fixture.decisions_of("ns1", "placement1"), vec!["cluster1"]);
    let status = fixture.placement_status("ns1", "placement1");
    assert_eq!(status.number_of_selected_clusters, 1);

    let satisfied = fixture.condition("ns1", "placement1", CONDITION_SATISFIED);
    assert_eq!(satisfied.status, ConditionStatus::True);
    assert_eq!(satisfied.reason, REASON_ALL_DECISIONS_SCHEDULED);

    let misconfigured = fixture.condition("ns1", "placement1", CONDITION_MISCONFIGURED);
    assert_eq!(misconfigured.status, ConditionStatus::False);
    assert_eq!(misconfigured.reason, REASON_CORRECT_CONFIGURATION);
}

#[tokio::test]
async fn short_fleet_is_unsatisfied() {
    let fixture = test_engine();
    fixture.add_bound_group("ns1", "group1");
    fixture.add_cluster("cluster1", "group1");
    let mut p = placement("ns1", "placement1");
    p.spec.desired_count = Some(3);
    fixture.engine.stores.placements.create(p).unwrap();

    fixture.reconcile("ns1", "placement1");

    assert_eq!(fixture.decisions_of("ns1", "placement1"), vec!["cluster1"]);
    let status = fixture.placement_status("ns1", "placement1");
    assert_eq!(status.number_of_selected_clusters, 1);

    let satisfied = fixture.condition("ns1", "placement1", CONDITION_SATISFIED);
    assert_eq!(satisfied.status, ConditionStatus::False);
    assert_eq!(satisfied.reason, REASON_NOT_ALL_DECISIONS_SCHEDULED);
    assert!(satisfied.message.contains('2'));
}

#[tokio::test]
async fn missing_bindings_surface_in_status() {
    let fixture = test_engine();
    fixture
        .engine
        .stores
        .placements
        .create(placement("ns1", "placement1"))
        .unwrap();

    fixture.reconcile("ns1", "placement1");

    let satisfied = fixture.condition("ns1", "placement1", CONDITION_SATISFIED);
    assert_eq!(satisfied.status, ConditionStatus::False);
    assert_eq!(satisfied.reason, REASON_NO_BINDINGS);
    // One empty decision page still exists.
    assert_eq!(fixture.decision_pages("ns1", "placement1"), vec![0]);
    assert_eq!(
        fixture
            .placement_status("ns1", "placement1")
            .number_of_selected_clusters,
        0
    );
}

#[tokio::test]
async fn hard_affinity_by_claim() {
    let fixture = test_engine();
    fixture.add_bound_group("ns1", "group1");
    for (name, cloud) in [("c1", "Amazon"), ("c2", "Google"), ("c3", "Google")] {
        let mut cluster = fixture.add_cluster(name, "group1");
        cluster
            .status
            .claims
            .insert("cloud".to_string(), cloud.to_string());
        fixture.engine.stores.clusters.update(cluster).unwrap();
    }

    let mut p = placement("ns1", "placement1");
    p.spec.desired_count = Some(2);
    p.spec.predicates = vec![Predicate {
        label_selector: Default::default(),
        claim_selector: ClaimSelector {
            match_expressions: vec![MatchExpression {
                key: "cloud".into(),
                operator: MatchOperator::In,
                values: vec!["Amazon".into()],
            }],
        },
    }];
    fixture.engine.stores.placements.create(p).unwrap();

    fixture.reconcile("ns1", "placement1");

    assert_eq!(fixture.decisions_of("ns1", "placement1"), vec!["c1"]);
    let satisfied = fixture.condition("ns1", "placement1", CONDITION_SATISFIED);
    assert_eq!(satisfied.status, ConditionStatus::False);
}

#[tokio::test]
async fn hard_spread_selects_one_per_topology_value() {
    let fixture = test_engine();
    fixture.add_bound_group("ns1", "group1");
    for (name, cloud) in [
        ("c1", "Amazon"),
        ("c2", "Amazon"),
        ("c3", "Google"),
        ("c4", "Google"),
        ("c5", "Azure"),
    ] {
        let mut cluster = fixture.add_cluster(name, "group1");
        cluster
            .meta
            .labels
            .insert("cloud".to_string(), cloud.to_string());
        fixture.engine.stores.clusters.update(cluster).unwrap();
    }

    let mut p = placement("ns1", "placement1");
    p.spec.desired_count = Some(3);
    p.spec.spread_policy = vec![SpreadConstraint {
        topology_key: "cloud".into(),
        topology_key_type: TopologyKeyType::Label,
        max_skew: 1,
        when_unsatisfiable: UnsatisfiableAction::DoNotSelect,
    }];
    fixture.engine.stores.placements.create(p).unwrap();

    fixture.reconcile("ns1", "placement1");

    assert_eq!(
        fixture.decisions_of("ns1", "placement1"),
        vec!["c1", "c3", "c5"]
    );
    let satisfied = fixture.condition("ns1", "placement1", CONDITION_SATISFIED);
    assert_eq!(satisfied.status, ConditionStatus::True);
}

#[tokio::test]
async fn balance_avoids_heavily_used_clusters() {
    let fixture = test_engine();
    fixture.add_bound_group("ns1", "group1");
    for name in ["c1", "c2", "c3"] {
        fixture.add_cluster(name, "group1");
    }

    // Two other placements already point at {c1, c2} and {c1, c3}.
    for (owner, clusters) in [("other1", ["c1", "c2"]), ("other2", ["c1", "c3"])] {
        fixture
            .engine
            .stores
            .decisions
            .create(PlacementDecision {
                meta: ObjectMeta::namespaced("ns1", format!("{owner}-decision-1"))
                    .with_label(PLACEMENT_LABEL, owner),
                status: PlacementDecisionStatus {
                    decisions: clusters.iter().map(|c| ClusterDecision::new(*c)).collect(),
                },
            })
            .unwrap();
    }

    let mut p = placement("ns1", "placement1");
    p.spec.desired_count = Some(1);
    fixture.engine.stores.placements.create(p).unwrap();

    fixture.reconcile("ns1", "placement1");

    // c1 is named twice elsewhere; c2 and c3 tie and the name breaks it.
    assert_eq!(fixture.decisions_of("ns1", "placement1"), vec!["c2"]);
}

#[tokio::test]
async fn steady_keeps_existing_selection() {
    let fixture = test_engine();
    fixture.add_bound_group("ns1", "group1");
    for name in ["c1", "c2", "c3"] {
        fixture.add_cluster(name, "group1");
    }
    let mut p = placement("ns1", "placement1");
    p.spec.desired_count = Some(1);
    fixture.engine.stores.placements.create(p).unwrap();

    // The placement already points at c2; without Steady the fresh ranking
    // would pick c1 on the name tie-break.
    fixture
        .engine
        .stores
        .decisions
        .create(PlacementDecision {
            meta: ObjectMeta::namespaced("ns1", "placement1-decision-1")
                .with_label(PLACEMENT_LABEL, "placement1"),
            status: PlacementDecisionStatus {
                decisions: vec![ClusterDecision::new("c2")],
            },
        })
        .unwrap();

    fixture.reconcile("ns1", "placement1");
    assert_eq!(fixture.decisions_of("ns1", "placement1"), vec!["c2"]);
}

#[tokio::test]
async fn invalid_toleration_sets_misconfigured() {
    let fixture = test_engine();
    fixture.add_bound_group("ns1", "group1");
    fixture.add_cluster("c1", "group1");

    let mut p = placement("ns1", "placement1");
    p.spec.tolerations = vec![Toleration {
        key: "k".into(),
        operator: TolerationOperator::Exists,
        value: "not-allowed".into(),
        ..Default::default()
    }];
    fixture.engine.stores.placements.create(p).unwrap();

    fixture.reconcile("ns1", "placement1");

    let misconfigured = fixture.condition("ns1", "placement1", CONDITION_MISCONFIGURED);
    assert_eq!(misconfigured.status, ConditionStatus::True);
    assert_eq!(misconfigured.reason, REASON_MISCONFIGURED);
    // No decisions were written for the malformed placement.
    assert!(fixture.decision_pages("ns1", "placement1").is_empty());

    // The failure was recorded as a warning event.
    let events = fixture.engine.stores.events.list(Some("ns1"));
    assert!(events.iter().any(|e| e.reason == "SchedulingFailed"));
}

#[tokio::test]
async fn unchanged_inputs_write_nothing() {
    let fixture = test_engine();
    fixture.add_bound_group("ns1", "group1");
    fixture.add_cluster("cluster1", "group1");
    fixture
        .engine
        .stores
        .placements
        .create(placement("ns1", "placement1"))
        .unwrap();

    fixture.reconcile("ns1", "placement1");
    let placement_version = fixture
        .engine
        .stores
        .placements
        .get(&ResourceKey::namespaced("ns1", "placement1"))
        .unwrap()
        .meta
        .resource_version;
    let page_version = fixture
        .engine
        .stores
        .decisions
        .get(&ResourceKey::namespaced("ns1", "placement1-decision-1"))
        .unwrap()
        .meta
        .resource_version;

    fixture.reconcile("ns1", "placement1");

    assert_eq!(
        fixture
            .engine
            .stores
            .placements
            .get(&ResourceKey::namespaced("ns1", "placement1"))
            .unwrap()
            .meta
            .resource_version,
        placement_version
    );
    assert_eq!(
        fixture
            .engine
            .stores
            .decisions
            .get(&ResourceKey::namespaced("ns1", "placement1-decision-1"))
            .unwrap()
            .meta
            .resource_version,
        page_version
    );
}
