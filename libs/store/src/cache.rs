//! Local indexed views over the backend's watch stream.
//!
//! An [`Informer`] subscribes to one store, keeps an index of the current
//! objects, and invokes registered change handlers after the index has been
//! updated. [`Lister`]s are cheap read handles onto the index; controllers
//! and plugins read through them instead of hitting the backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::watch;
use tracing::{debug, warn};

use fleetplace_api::ResourceKey;

use crate::memory::MemoryStore;
use crate::object::{StoredObject, WatchEvent};

type Handler<T> = Arc<dyn Fn(&WatchEvent<T>) + Send + Sync>;
type Index<T> = Arc<RwLock<HashMap<ResourceKey, T>>>;

/// Read-only handle onto an informer's index.
pub struct Lister<T> {
    index: Index<T>,
}

impl<T> Clone for Lister<T> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
        }
    }
}

impl<T: StoredObject> Lister<T> {
    pub fn get(&self, key: &ResourceKey) -> Option<T> {
        self.index.read().unwrap().get(key).cloned()
    }

    pub fn get_named(&self, namespace: &str, name: &str) -> Option<T> {
        self.get(&ResourceKey {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    /// Objects, optionally restricted to one namespace, sorted by key.
    pub fn list(&self, namespace: Option<&str>) -> Vec<T> {
        let index = self.index.read().unwrap();
        let mut items: Vec<T> = index
            .values()
            .filter(|obj| namespace.is_none_or(|ns| obj.meta().namespace == ns))
            .cloned()
            .collect();
        items.sort_by_key(|obj| obj.key());
        items
    }

    /// Objects carrying the given label, sorted by key.
    pub fn list_labeled(&self, namespace: Option<&str>, label: &str, value: &str) -> Vec<T> {
        let index = self.index.read().unwrap();
        let mut items: Vec<T> = index
            .values()
            .filter(|obj| namespace.is_none_or(|ns| obj.meta().namespace == ns))
            .filter(|obj| obj.meta().labels.get(label).is_some_and(|v| v == value))
            .cloned()
            .collect();
        items.sort_by_key(|obj| obj.key());
        items
    }
}

/// Maintains a locally consistent view of one resource kind and fans change
/// events out to handlers.
pub struct Informer<T: StoredObject> {
    store: MemoryStore<T>,
    index: Index<T>,
    handlers: RwLock<Vec<Handler<T>>>,
    receiver: Mutex<Option<broadcast::Receiver<WatchEvent<T>>>>,
}

impl<T: StoredObject> Informer<T> {
    pub fn new(store: MemoryStore<T>) -> Self {
        Self {
            store,
            index: Arc::new(RwLock::new(HashMap::new())),
            handlers: RwLock::new(Vec::new()),
            receiver: Mutex::new(None),
        }
    }

    /// Register a change handler. Handlers run on the dispatch thread after
    /// the index has been updated; they must not block.
    pub fn add_handler(&self, handler: impl Fn(&WatchEvent<T>) + Send + Sync + 'static) {
        self.handlers.write().unwrap().push(Arc::new(handler));
    }

    pub fn lister(&self) -> Lister<T> {
        Lister {
            index: Arc::clone(&self.index),
        }
    }

    /// Take the initial snapshot, seed the index, and dispatch an `Added`
    /// event per existing object. Must be called once before `run` or
    /// `poll_once`.
    pub fn start(&self) {
        let (snapshot, rx) = self.store.watch();
        *self.receiver.lock().unwrap() = Some(rx);
        for obj in snapshot {
            self.apply(WatchEvent::Added(obj));
        }
    }

    /// Drain every event currently available, without blocking. Returns the
    /// number of events applied. Used by tests and the resync path.
    pub fn poll_once(&self) -> usize {
        let Some(mut rx) = self.receiver.lock().unwrap().take() else {
            return 0;
        };
        let mut applied = 0;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    self.apply(event);
                    applied += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(kind = T::KIND, missed, "watch stream lagged, resyncing");
                    rx = self.resync();
                    applied += 1;
                }
            }
        }
        *self.receiver.lock().unwrap() = Some(rx);
        applied
    }

    /// Consume the watch stream until shutdown, resyncing on lag and on a
    /// periodic interval.
    pub async fn run(&self, resync_interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut rx = match self.receiver.lock().unwrap().take() {
            Some(rx) => rx,
            None => {
                let (snapshot, rx) = self.store.watch();
                for obj in snapshot {
                    self.apply(WatchEvent::Added(obj));
                }
                rx
            }
        };

        let mut resync = tokio::time::interval(resync_interval);
        resync.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        resync.tick().await;

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Ok(event) => self.apply(event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(kind = T::KIND, missed, "watch stream lagged, resyncing");
                        rx = self.resync();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = resync.tick() => {
                    rx = self.resync();
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!(kind = T::KIND, "informer shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Re-list from the store and reconcile the index against the snapshot,
    /// synthesizing the events the stream would have carried.
    fn resync(&self) -> broadcast::Receiver<WatchEvent<T>> {
        let (snapshot, rx) = self.store.watch();

        let stale: Vec<T> = {
            let index = self.index.read().unwrap();
            index.values().cloned().collect()
        };
        let snapshot_keys: std::collections::HashSet<ResourceKey> =
            snapshot.iter().map(|obj| obj.key()).collect();

        for obj in stale {
            if !snapshot_keys.contains(&obj.key()) {
                self.apply(WatchEvent::Deleted(obj));
            }
        }
        for obj in snapshot {
            let known = self.index.read().unwrap().get(&obj.key()).cloned();
            match known {
                None => self.apply(WatchEvent::Added(obj)),
                Some(current)
                    if current.meta().resource_version != obj.meta().resource_version =>
                {
                    self.apply(WatchEvent::Modified(obj))
                }
                Some(_) => {}
            }
        }
        rx
    }

    fn apply(&self, event: WatchEvent<T>) {
        {
            let mut index = self.index.write().unwrap();
            match &event {
                WatchEvent::Added(obj) | WatchEvent::Modified(obj) => {
                    index.insert(obj.key(), obj.clone());
                }
                WatchEvent::Deleted(obj) => {
                    index.remove(&obj.key());
                }
            }
        }
        let handlers: Vec<Handler<T>> = self.handlers.read().unwrap().clone();
        for handler in handlers {
            handler(&event);
        }
    }
}
