//! Query cache
//!
//! Client-side cache of server resources keyed by [`QueryKey`]. Invalidation
//! works on key prefixes and marks entries stale; refetches are de-duplicated
//! so a burst of invalidations for the same key yields one network round trip.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::debug;

/// Hierarchical key, e.g. `wallet-balance/U1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Every tournament query: lists, details and aggregates.
    pub fn tournaments_all() -> Self {
        Self::new(["tournaments"])
    }

    pub fn tournament(id: &str) -> Self {
        Self::new(["tournaments", id])
    }

    pub fn wallet_balance(user_id: &str) -> Self {
        Self::new(["wallet-balance", user_id])
    }

    pub fn wallet_history(user_id: &str) -> Self {
        Self::new(["wallet-history", user_id])
    }

    pub fn support_tickets_list() -> Self {
        Self::new(["support-tickets-list"])
    }

    pub fn support_ticket(id: &str) -> Self {
        Self::new(["support-ticket", id])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Segment-wise prefix test; `tournaments` covers `tournaments/T1` but not `tournaments-x`.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// The invalidation primitive the bridge relies on.
pub trait DataCache: Send + Sync {
    /// Marks every entry under `prefix` stale and schedules refetches.
    fn invalidate(&self, prefix: &QueryKey);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchState {
    Idle,
    /// Scheduled, not yet picked up.
    Queued,
    /// Picked up; `dirty` when invalidated again mid-flight.
    InFlight { dirty: bool },
}

#[derive(Debug)]
struct Entry {
    data: Option<Value>,
    stale: bool,
    fetch: FetchState,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: BTreeMap<QueryKey, Entry>,
    refetches: VecDeque<QueryKey>,
    scheduled_total: usize,
}

impl CacheState {
    fn schedule(&mut self, key: &QueryKey) {
        self.refetches.push_back(key.clone());
        self.scheduled_total += 1;
    }
}

#[derive(Debug, Default)]
pub struct QueryCache {
    state: Mutex<CacheState>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts tracking `key` and schedules its first fetch. No-op if tracked.
    pub fn register(&self, key: QueryKey) {
        let mut state = self.lock();
        if state.entries.contains_key(&key) {
            return;
        }
        state.entries.insert(
            key.clone(),
            Entry {
                data: None,
                stale: true,
                fetch: FetchState::Queued,
            },
        );
        state.schedule(&key);
    }

    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        self.lock().entries.get(key).and_then(|e| e.data.clone())
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.lock().entries.get(key).is_some_and(|e| e.stale)
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Hands out the refetches to perform, marking them in flight.
    pub fn take_refetches(&self) -> Vec<QueryKey> {
        let mut state = self.lock();
        let keys: Vec<QueryKey> = state.refetches.drain(..).collect();
        for key in &keys {
            if let Some(entry) = state.entries.get_mut(key) {
                entry.fetch = FetchState::InFlight { dirty: false };
            }
        }
        keys
    }

    /// Stores a fetch result. A key invalidated while its fetch was in flight
    /// stays stale and is scheduled once more.
    pub fn complete_refetch(&self, key: &QueryKey, data: Value) {
        let mut state = self.lock();
        let Some(entry) = state.entries.get_mut(key) else {
            debug!("dropping result for untracked query {key}");
            return;
        };
        entry.data = Some(data);
        let again = matches!(entry.fetch, FetchState::InFlight { dirty: true });
        if again {
            entry.fetch = FetchState::Queued;
            state.schedule(key);
        } else {
            entry.stale = false;
            entry.fetch = FetchState::Idle;
        }
    }

    /// Tracks `key` with fresh data, as after a successful initial fetch.
    pub fn set_data(&self, key: QueryKey, data: Value) {
        self.lock().entries.insert(
            key,
            Entry {
                data: Some(data),
                stale: false,
                fetch: FetchState::Idle,
            },
        );
    }

    /// Removes a query whose last observer went away.
    pub fn remove(&self, key: &QueryKey) {
        let mut state = self.lock();
        state.entries.remove(key);
        state.refetches.retain(|k| k != key);
    }

    /// Refetches scheduled since creation, for diagnostics.
    pub fn scheduled_total(&self) -> usize {
        self.lock().scheduled_total
    }
}

impl DataCache for QueryCache {
    fn invalidate(&self, prefix: &QueryKey) {
        let mut state = self.lock();
        let mut to_schedule = Vec::new();

        for (key, entry) in state.entries.range_mut(prefix.clone()..) {
            if !key.starts_with(prefix) {
                break;
            }
            entry.stale = true;
            match entry.fetch {
                FetchState::Idle => {
                    entry.fetch = FetchState::Queued;
                    to_schedule.push(key.clone());
                }
                FetchState::Queued => {}
                FetchState::InFlight { .. } => entry.fetch = FetchState::InFlight { dirty: true },
            }
        }

        debug!("invalidated {prefix}: {} refetch(es) scheduled", to_schedule.len());
        for key in &to_schedule {
            state.schedule(key);
        }
    }
}
