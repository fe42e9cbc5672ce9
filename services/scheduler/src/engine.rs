//! Wires stores, informers, fan-out, and the controller into one engine.
//!
//! The binary builds an engine and calls [`Engine::run`]; integration tests
//! build the same engine, mutate the stores, and drive it by hand with
//! [`Engine::sync_informers`] and direct `sync` calls.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use fleetplace_api::{
    AddOnScore, Cluster, ClusterGroup, Event, GroupBinding, Placement, PlacementDecision,
};
use fleetplace_store::{Clock, Informer, MemoryStore, WorkQueue};

use crate::binder::DecisionBinder;
use crate::config::Config;
use crate::controller::SchedulingController;
use crate::events::EventRecorder;
use crate::fanout::FanOut;
use crate::metrics::SchedulerMetrics;
use crate::plugins::SchedulerHandle;
use crate::scheduler::PluginScheduler;

/// One in-process state backend per resource kind.
pub struct Stores {
    pub clusters: MemoryStore<Cluster>,
    pub groups: MemoryStore<ClusterGroup>,
    pub bindings: MemoryStore<GroupBinding>,
    pub placements: MemoryStore<Placement>,
    pub decisions: MemoryStore<PlacementDecision>,
    pub scores: MemoryStore<AddOnScore>,
    pub events: MemoryStore<Event>,
}

impl Stores {
    pub fn new() -> Self {
        Self {
            clusters: MemoryStore::new(),
            groups: MemoryStore::new(),
            bindings: MemoryStore::new(),
            placements: MemoryStore::new(),
            decisions: MemoryStore::new(),
            scores: MemoryStore::new(),
            events: MemoryStore::new(),
        }
    }
}

impl Default for Stores {
    fn default() -> Self {
        Self::new()
    }
}

struct Informers {
    clusters: Arc<Informer<Cluster>>,
    groups: Arc<Informer<ClusterGroup>>,
    bindings: Arc<Informer<GroupBinding>>,
    placements: Arc<Informer<Placement>>,
    decisions: Arc<Informer<PlacementDecision>>,
    scores: Arc<Informer<AddOnScore>>,
}

/// The assembled scheduler.
pub struct Engine {
    pub stores: Stores,
    pub queue: Arc<WorkQueue>,
    pub controller: Arc<SchedulingController>,
    pub metrics: Arc<SchedulerMetrics>,
    config: Config,
    informers: Informers,
}

impl Engine {
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Arc<Self> {
        let stores = Stores::new();
        let queue = Arc::new(WorkQueue::new(config.backoff_base, config.backoff_max));
        let metrics = Arc::new(SchedulerMetrics::new());

        let informers = Informers {
            clusters: Arc::new(Informer::new(stores.clusters.clone())),
            groups: Arc::new(Informer::new(stores.groups.clone())),
            bindings: Arc::new(Informer::new(stores.bindings.clone())),
            placements: Arc::new(Informer::new(stores.placements.clone())),
            decisions: Arc::new(Informer::new(stores.decisions.clone())),
            scores: Arc::new(Informer::new(stores.scores.clone())),
        };

        let recorder = EventRecorder::new(stores.events.clone(), Arc::clone(&clock));
        let handle = Arc::new(SchedulerHandle {
            decisions: informers.decisions.lister(),
            scores: informers.scores.lister(),
            recorder: recorder.clone(),
            clock: Arc::clone(&clock),
        });

        let controller = Arc::new(SchedulingController::new(
            stores.placements.clone(),
            informers.placements.lister(),
            informers.groups.lister(),
            informers.bindings.lister(),
            informers.clusters.lister(),
            PluginScheduler::new(handle),
            DecisionBinder::new(stores.decisions.clone(), informers.decisions.lister()),
            Arc::clone(&queue),
            Arc::clone(&metrics),
            recorder,
            clock,
        ));

        let fanout = FanOut::new(
            Arc::clone(&queue),
            informers.placements.lister(),
            informers.bindings.lister(),
        );
        fanout.register(
            &informers.placements,
            &informers.bindings,
            &informers.groups,
            &informers.clusters,
            &informers.scores,
            &informers.decisions,
        );

        informers.clusters.start();
        informers.groups.start();
        informers.bindings.start();
        informers.placements.start();
        informers.decisions.start();
        informers.scores.start();

        Arc::new(Self {
            stores,
            queue,
            controller,
            metrics,
            config,
            informers,
        })
    }

    /// Drain every informer until no pending watch events remain. Test
    /// entry point for deterministic cache convergence.
    pub fn sync_informers(&self) {
        loop {
            let applied = self.informers.clusters.poll_once()
                + self.informers.groups.poll_once()
                + self.informers.bindings.poll_once()
                + self.informers.placements.poll_once()
                + self.informers.decisions.poll_once()
                + self.informers.scores.poll_once();
            if applied == 0 {
                break;
            }
        }
    }

    /// Run informers and reconcile workers until shutdown.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        let mut tasks = Vec::new();

        macro_rules! spawn_informer {
            ($field:ident) => {{
                let informer = Arc::clone(&self.informers.$field);
                let resync = self.config.resync_interval;
                let shutdown = shutdown.clone();
                tasks.push(tokio::spawn(async move {
                    informer.run(resync, shutdown).await;
                }));
            }};
        }
        spawn_informer!(clusters);
        spawn_informer!(groups);
        spawn_informer!(bindings);
        spawn_informer!(placements);
        spawn_informer!(decisions);
        spawn_informer!(scores);

        for _ in 0..self.config.workers {
            let controller = Arc::clone(&self.controller);
            let shutdown = shutdown.clone();
            tasks.push(tokio::spawn(controller.run_worker(shutdown)));
        }

        // Release waiting workers once shutdown is signaled.
        {
            let queue = Arc::clone(&self.queue);
            let mut shutdown = shutdown.clone();
            tasks.push(tokio::spawn(async move {
                while shutdown.changed().await.is_ok() {
                    if *shutdown.borrow() {
                        queue.shut_down();
                        break;
                    }
                }
            }));
        }

        info!(workers = self.config.workers, "scheduler engine running");
        for task in tasks {
            let _ = task.await;
        }
        info!("scheduler engine stopped");
    }
}
