//! In-process implementation of the state backend contract.
//!
//! One `MemoryStore` holds one resource kind. Mutations go through
//! compare-and-update on the resource version, exactly like the remote
//! backend they stand in for; watchers receive every change in order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::broadcast;

use fleetplace_api::ResourceKey;

use crate::object::{StoredObject, WatchEvent};

const WATCH_CHANNEL_CAPACITY: usize = 1024;

/// Errors from state backend operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: ResourceKey },

    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ResourceKey },

    #[error("{kind} {key} version conflict (expected {expected}, got {actual})")]
    Conflict {
        kind: &'static str,
        key: ResourceKey,
        expected: u64,
        actual: u64,
    },
}

impl StoreError {
    /// Conflicts are retryable; the rest indicate a stale or wrong request.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

struct Inner<T> {
    objects: RwLock<HashMap<ResourceKey, T>>,
    version: AtomicU64,
    watch: broadcast::Sender<WatchEvent<T>>,
}

/// Typed in-memory store for one resource kind.
pub struct MemoryStore<T: StoredObject> {
    inner: Arc<Inner<T>>,
}

impl<T: StoredObject> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: StoredObject> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StoredObject> MemoryStore<T> {
    pub fn new() -> Self {
        let (watch, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                objects: RwLock::new(HashMap::new()),
                version: AtomicU64::new(0),
                watch,
            }),
        }
    }

    /// All objects, optionally restricted to one namespace, sorted by key.
    pub fn list(&self, namespace: Option<&str>) -> Vec<T> {
        let objects = self.inner.objects.read().unwrap();
        let mut items: Vec<T> = objects
            .values()
            .filter(|obj| namespace.is_none_or(|ns| obj.meta().namespace == ns))
            .cloned()
            .collect();
        items.sort_by_key(|obj| obj.key());
        items
    }

    pub fn get(&self, key: &ResourceKey) -> Result<T, StoreError> {
        self.inner
            .objects
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: T::KIND,
                key: key.clone(),
            })
    }

    /// Persist a new object. The server assigns the resource version.
    pub fn create(&self, mut obj: T) -> Result<T, StoreError> {
        let key = obj.key();
        let mut objects = self.inner.objects.write().unwrap();
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists { kind: T::KIND, key });
        }
        obj.meta_mut().resource_version = self.next_version();
        objects.insert(key, obj.clone());
        let _ = self.inner.watch.send(WatchEvent::Added(obj.clone()));
        Ok(obj)
    }

    /// Replace an existing object. Fails with a conflict when the caller's
    /// copy is stale.
    pub fn update(&self, obj: T) -> Result<T, StoreError> {
        self.compare_and_swap(obj)
    }

    /// Replace the status sub-resource. The in-process backend has no
    /// separate status storage, so this shares the CAS path with `update`;
    /// it exists so call sites read like the remote contract.
    pub fn update_status(&self, obj: T) -> Result<T, StoreError> {
        self.compare_and_swap(obj)
    }

    pub fn delete(&self, key: &ResourceKey) -> Result<T, StoreError> {
        let mut objects = self.inner.objects.write().unwrap();
        match objects.remove(key) {
            Some(obj) => {
                let _ = self.inner.watch.send(WatchEvent::Deleted(obj.clone()));
                Ok(obj)
            }
            None => Err(StoreError::NotFound {
                kind: T::KIND,
                key: key.clone(),
            }),
        }
    }

    /// Atomically take a snapshot and register a watcher. Every event sent
    /// after the snapshot is visible on the receiver, none before it.
    pub fn watch(&self) -> (Vec<T>, broadcast::Receiver<WatchEvent<T>>) {
        let objects = self.inner.objects.read().unwrap();
        let rx = self.inner.watch.subscribe();
        let mut snapshot: Vec<T> = objects.values().cloned().collect();
        snapshot.sort_by_key(|obj| obj.key());
        (snapshot, rx)
    }

    fn compare_and_swap(&self, mut obj: T) -> Result<T, StoreError> {
        let key = obj.key();
        let mut objects = self.inner.objects.write().unwrap();
        let current = objects.get(&key).ok_or_else(|| StoreError::NotFound {
            kind: T::KIND,
            key: key.clone(),
        })?;
        let expected = obj.meta().resource_version;
        let actual = current.meta().resource_version;
        if expected != actual {
            return Err(StoreError::Conflict {
                kind: T::KIND,
                key,
                expected,
                actual,
            });
        }
        obj.meta_mut().resource_version = self.next_version();
        objects.insert(key, obj.clone());
        let _ = self.inner.watch.send(WatchEvent::Modified(obj.clone()));
        Ok(obj)
    }

    fn next_version(&self) -> u64 {
        self.inner.version.fetch_add(1, Ordering::SeqCst) + 1
    }
}
