//! The object contract every stored resource kind satisfies.

use fleetplace_api::{
    AddOnScore, Cluster, ClusterGroup, Event, GroupBinding, ObjectMeta, Placement,
    PlacementDecision, ResourceKey,
};

/// A resource kind the state backend can hold.
pub trait StoredObject: Clone + Send + Sync + 'static {
    /// Kind name used in errors and logs.
    const KIND: &'static str;

    fn meta(&self) -> &ObjectMeta;
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> ResourceKey {
        self.meta().key()
    }
}

macro_rules! stored_object {
    ($ty:ty, $kind:literal) => {
        impl StoredObject for $ty {
            const KIND: &'static str = $kind;

            fn meta(&self) -> &ObjectMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut ObjectMeta {
                &mut self.meta
            }
        }
    };
}

stored_object!(Cluster, "Cluster");
stored_object!(ClusterGroup, "ClusterGroup");
stored_object!(GroupBinding, "GroupBinding");
stored_object!(Placement, "Placement");
stored_object!(PlacementDecision, "PlacementDecision");
stored_object!(AddOnScore, "AddOnScore");
stored_object!(Event, "Event");

/// A change observed on the watch stream.
#[derive(Debug, Clone)]
pub enum WatchEvent<T> {
    Added(T),
    Modified(T),
    Deleted(T),
}

impl<T> WatchEvent<T> {
    pub fn object(&self) -> &T {
        match self {
            Self::Added(obj) | Self::Modified(obj) | Self::Deleted(obj) => obj,
        }
    }
}
