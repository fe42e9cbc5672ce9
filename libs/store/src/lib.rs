//! State backend contract and runtime substrate for the scheduler.
//!
//! The backend exposes list/get/create/update/delete with compare-and-update
//! semantics on a resource version, plus a watch stream. [`MemoryStore`]
//! implements that contract in-process; [`Informer`] maintains a locally
//! consistent indexed view on top of the watch stream and fans change
//! callbacks out to registered handlers; [`WorkQueue`] provides the
//! deduplicating, rate-limited queues controllers consume.

pub mod cache;
pub mod clock;
pub mod memory;
pub mod object;
pub mod queue;

pub use cache::{Informer, Lister};
pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::{MemoryStore, StoreError};
pub use object::{StoredObject, WatchEvent};
pub use queue::WorkQueue;
