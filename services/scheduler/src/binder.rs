//! Decision binder: persist a ranked cluster list as sharded decision pages.
//!
//! Pages hold at most 100 decisions each and are named
//! `<placement>-decision-<ordinal>` with 1-based ordinals. The binder does a
//! minimal diff: unchanged pages are never rewritten, so resource-version
//! stability doubles as an idempotence check.

use tracing::debug;

use fleetplace_api::{
    decision_page_name, decision_page_ordinal, ClusterDecision, ObjectMeta, OwnerReference,
    Placement, PlacementDecision, PlacementDecisionStatus, PLACEMENT_LABEL,
};
use fleetplace_store::{Lister, MemoryStore};

use crate::error::SchedulingResult;

/// Maximum number of decisions per page.
pub const DECISIONS_PER_PAGE: usize = 100;

pub struct DecisionBinder {
    store: MemoryStore<PlacementDecision>,
    lister: Lister<PlacementDecision>,
}

impl DecisionBinder {
    pub fn new(store: MemoryStore<PlacementDecision>, lister: Lister<PlacementDecision>) -> Self {
        Self { store, lister }
    }

    /// Persist the ranked list as decision pages, creating, updating, and
    /// deleting the minimum set of pages.
    ///
    /// An empty list still yields exactly one empty page, so consumers can
    /// distinguish "scheduled to nothing" from "never scheduled".
    pub fn bind(
        &self,
        placement: &Placement,
        decisions: &[ClusterDecision],
    ) -> SchedulingResult<()> {
        let existing = self.lister.list_labeled(
            Some(placement.namespace()),
            PLACEMENT_LABEL,
            placement.name(),
        );

        let chunks: Vec<&[ClusterDecision]> = if decisions.is_empty() {
            vec![&[]]
        } else {
            decisions.chunks(DECISIONS_PER_PAGE).collect()
        };

        for (index, chunk) in chunks.iter().enumerate() {
            let ordinal = index + 1;
            let page_name = decision_page_name(placement.name(), ordinal);
            match existing.iter().find(|page| page.meta.name == page_name) {
                None => {
                    let page = PlacementDecision {
                        meta: ObjectMeta {
                            owner_references: vec![OwnerReference {
                                kind: "Placement".to_string(),
                                name: placement.name().to_string(),
                            }],
                            ..ObjectMeta::namespaced(placement.namespace(), page_name.clone())
                                .with_label(PLACEMENT_LABEL, placement.name())
                        },
                        status: PlacementDecisionStatus {
                            decisions: chunk.to_vec(),
                        },
                    };
                    self.store.create(page)?;
                    debug!(page = %page_name, count = chunk.len(), "created decision page");
                }
                Some(page) if page.status.decisions != **chunk => {
                    let mut updated = page.clone();
                    updated.status.decisions = chunk.to_vec();
                    self.store.update_status(updated)?;
                    debug!(page = %page_name, count = chunk.len(), "updated decision page");
                }
                Some(_) => {}
            }
        }

        // Drop pages past the end of the desired list.
        for page in &existing {
            let stale = match decision_page_ordinal(placement.name(), &page.meta.name) {
                Some(ordinal) => ordinal > chunks.len(),
                None => true,
            };
            if stale {
                self.store.delete(&page.meta.key())?;
                debug!(page = %page.meta.name, "deleted stale decision page");
            }
        }

        Ok(())
    }

    /// Delete every decision page owned by the named placement. Used when
    /// the placement itself is gone.
    pub fn delete_all(&self, namespace: &str, placement_name: &str) -> SchedulingResult<()> {
        for page in self
            .lister
            .list_labeled(Some(namespace), PLACEMENT_LABEL, placement_name)
        {
            self.store.delete(&page.meta.key())?;
            debug!(page = %page.meta.name, "deleted orphaned decision page");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetplace_store::Informer;

    struct BinderFixture {
        store: MemoryStore<PlacementDecision>,
        informer: Informer<PlacementDecision>,
        binder: DecisionBinder,
    }

    impl BinderFixture {
        fn new() -> Self {
            let store = MemoryStore::<PlacementDecision>::new();
            let informer = Informer::new(store.clone());
            informer.start();
            let binder = DecisionBinder::new(store.clone(), informer.lister());
            Self {
                store,
                informer,
                binder,
            }
        }

        fn pages(&self, placement: &str) -> Vec<PlacementDecision> {
            self.store
                .list(Some("ns1"))
                .into_iter()
                .filter(|p| p.meta.labels.get(PLACEMENT_LABEL).map(String::as_str) == Some(placement))
                .collect()
        }
    }

    fn ranked(count: usize) -> Vec<ClusterDecision> {
        (1..=count)
            .map(|i| ClusterDecision::new(format!("cluster{i}")))
            .collect()
    }

    #[test]
    fn single_page_create() {
        let fixture = BinderFixture::new();
        let placement = Placement::new("ns1", "placement1");

        fixture.binder.bind(&placement, &ranked(10)).unwrap();

        let pages = fixture.pages("placement1");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].meta.name, "placement1-decision-1");
        assert_eq!(pages[0].status.decisions.len(), 10);
        assert_eq!(pages[0].meta.owner_references[0].name, "placement1");
    }

    #[test]
    fn rolls_over_at_page_size() {
        let fixture = BinderFixture::new();
        let placement = Placement::new("ns1", "placement1");

        fixture.binder.bind(&placement, &ranked(101)).unwrap();

        let pages = fixture.pages("placement1");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].status.decisions.len(), 100);
        assert_eq!(pages[1].status.decisions.len(), 1);
        assert_eq!(pages[1].status.decisions[0].cluster_name, "cluster101");
    }

    #[test]
    fn unchanged_pages_are_not_rewritten() {
        let fixture = BinderFixture::new();
        let placement = Placement::new("ns1", "placement1");

        fixture.binder.bind(&placement, &ranked(5)).unwrap();
        let before = fixture.pages("placement1")[0].meta.resource_version;

        fixture.informer.poll_once();
        fixture.binder.bind(&placement, &ranked(5)).unwrap();
        let after = fixture.pages("placement1")[0].meta.resource_version;
        assert_eq!(before, after);
    }

    #[test]
    fn shrinking_deletes_trailing_pages() {
        let fixture = BinderFixture::new();
        let placement = Placement::new("ns1", "placement1");

        fixture.binder.bind(&placement, &ranked(128)).unwrap();
        fixture.informer.poll_once();
        assert_eq!(fixture.pages("placement1").len(), 2);

        fixture.binder.bind(&placement, &ranked(10)).unwrap();
        let pages = fixture.pages("placement1");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].status.decisions.len(), 10);
    }

    #[test]
    fn empty_list_keeps_one_empty_page() {
        let fixture = BinderFixture::new();
        let placement = Placement::new("ns1", "placement1");

        fixture.binder.bind(&placement, &ranked(128)).unwrap();
        fixture.informer.poll_once();

        fixture.binder.bind(&placement, &[]).unwrap();
        let pages = fixture.pages("placement1");
        assert_eq!(pages.len(), 1);
        assert!(pages[0].status.decisions.is_empty());
    }

    #[test]
    fn concatenation_preserves_ranked_order() {
        let fixture = BinderFixture::new();
        let placement = Placement::new("ns1", "placement1");
        let list = ranked(150);

        fixture.binder.bind(&placement, &list).unwrap();

        let mut concatenated = Vec::new();
        for page in fixture.pages("placement1") {
            concatenated.extend(page.status.decisions.clone());
        }
        assert_eq!(concatenated, list);
    }

    #[test]
    fn delete_all_removes_every_page() {
        let fixture = BinderFixture::new();
        let placement = Placement::new("ns1", "placement1");

        fixture.binder.bind(&placement, &ranked(128)).unwrap();
        fixture.informer.poll_once();

        fixture.binder.delete_all("ns1", "placement1").unwrap();
        assert!(fixture.pages("placement1").is_empty());
    }
}
