//! Deduplicating, rate-limited work queue keyed by `namespace/name` strings.
//!
//! Contract:
//! - duplicate enqueues coalesce while a key is waiting;
//! - a key re-enqueued while it is being processed is queued again exactly
//!   once after `done`;
//! - `add_rate_limited` applies per-key exponential backoff (base delay,
//!   doubling, capped);
//! - `add_after` schedules a delayed enqueue without coalescing into the
//!   ready set.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

/// Default base delay for the exponential retry backoff.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(5);

/// Default cap for the exponential retry backoff.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1000);

#[derive(PartialEq, Eq)]
struct DelayedEntry {
    deadline: Instant,
    key: String,
}

impl Ord for DelayedEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for DelayedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct State {
    ready: VecDeque<String>,
    /// Keys that need processing: everything in `ready`, plus keys re-added
    /// while being processed.
    dirty: HashSet<String>,
    processing: HashSet<String>,
    delayed: BinaryHeap<Reverse<DelayedEntry>>,
    failures: HashMap<String, u32>,
    shutting_down: bool,
}

/// Work queue with per-key serialization and delayed re-enqueue.
pub struct WorkQueue {
    state: Mutex<State>,
    notify: Notify,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl WorkQueue {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            base_delay,
            max_delay,
        }
    }

    /// Enqueue a key for immediate processing. No-op if the key is already
    /// waiting; a key currently being processed is re-queued after `done`.
    pub fn add(&self, key: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        self.add_locked(&mut state, key.into());
        drop(state);
        self.notify.notify_waiters();
    }

    /// Enqueue a key after the given delay. A zero or negative delay behaves
    /// like `add`.
    pub fn add_after(&self, key: impl Into<String>, delay: Duration) {
        let key = key.into();
        if delay.is_zero() {
            self.add(key);
            return;
        }
        let mut state = self.state.lock().unwrap();
        if state.shutting_down {
            return;
        }
        state.delayed.push(Reverse(DelayedEntry {
            deadline: Instant::now() + delay,
            key,
        }));
        drop(state);
        // Wake a waiter so it can adopt the (possibly earlier) deadline.
        self.notify.notify_waiters();
    }

    /// Enqueue a key with exponential backoff based on its failure count.
    pub fn add_rate_limited(&self, key: impl Into<String>) {
        let key = key.into();
        let delay = {
            let mut state = self.state.lock().unwrap();
            let failures = state.failures.entry(key.clone()).or_insert(0);
            *failures += 1;
            let exp = failures.saturating_sub(1).min(63);
            self.base_delay
                .saturating_mul(1u32.checked_shl(exp).unwrap_or(u32::MAX))
                .min(self.max_delay)
        };
        self.add_after(key, delay);
    }

    /// Clear the failure count for a key after a successful reconcile.
    pub fn forget(&self, key: &str) {
        self.state.lock().unwrap().failures.remove(key);
    }

    /// Mark a key as processed. If the key was re-added in the meantime it
    /// goes back onto the ready queue.
    pub fn done(&self, key: &str) {
        let mut state = self.state.lock().unwrap();
        state.processing.remove(key);
        if state.dirty.contains(key) {
            state.ready.push_back(key.to_string());
            drop(state);
            self.notify.notify_waiters();
        }
    }

    /// Await the next key. Returns `None` once the queue is shut down.
    pub async fn get(&self) -> Option<String> {
        loop {
            // Register for notifications before inspecting the state, so a
            // concurrent `add` between the check and the await is not lost.
            let mut notified = std::pin::pin!(self.notify.notified());
            notified.as_mut().enable();
            let next_deadline = {
                let mut state = self.state.lock().unwrap();
                self.promote_due(&mut state);
                if let Some(key) = state.ready.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
                state.delayed.peek().map(|entry| entry.0.deadline)
            };
            match next_deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Non-blocking variant of `get`, for tests and draining.
    pub fn try_get(&self) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        self.promote_due(&mut state);
        let key = state.ready.pop_front()?;
        state.dirty.remove(&key);
        state.processing.insert(key.clone());
        Some(key)
    }

    /// Number of keys ready or scheduled.
    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.ready.len() + state.delayed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop handing out keys; waiting `get` calls return `None`.
    pub fn shut_down(&self) {
        self.state.lock().unwrap().shutting_down = true;
        self.notify.notify_waiters();
    }

    fn add_locked(&self, state: &mut State, key: String) {
        if state.shutting_down || state.dirty.contains(&key) {
            return;
        }
        state.dirty.insert(key.clone());
        if state.processing.contains(&key) {
            // Re-queued by `done`.
            return;
        }
        state.ready.push_back(key);
    }

    fn promote_due(&self, state: &mut State) {
        let now = Instant::now();
        while let Some(Reverse(entry)) = state.delayed.peek() {
            if entry.deadline > now {
                break;
            }
            let Some(Reverse(entry)) = state.delayed.pop() else {
                break;
            };
            self.add_locked(state, entry.key);
        }
    }
}
