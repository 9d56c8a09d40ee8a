//! # Query Cache
//!
//! Bounded cache of query results keyed by entity and tenant. Invalidation
//! marks an entry stale and notifies subscribers; the data stays readable until
//! the next fetch replaces it. `cancel` bumps a per-key fetch epoch so a read
//! that was in flight when an optimistic write began cannot overwrite it.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;
use metrics::counter;
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::CompanyId;

const INVALIDATION_CAPACITY: usize = 64;

/// Cache key: entity namespace plus owning company
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub entity: &'static str,
    pub company_id: Option<CompanyId>,
}

impl QueryKey {
    pub fn new(entity: &'static str, company_id: Option<CompanyId>) -> Self {
        Self { entity, company_id }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.company_id {
            Some(company_id) => write!(f, "{}/{}", self.entity, company_id),
            None => write!(f, "{}/-", self.entity),
        }
    }
}

/// Proof that a fetch started at a given epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    key: QueryKey,
    epoch: u64,
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    stale: bool,
}

struct CacheState<V> {
    entries: LruCache<QueryKey, Entry<V>>,
    epochs: HashMap<QueryKey, u64>,
}

pub struct QueryCache<V> {
    state: Arc<Mutex<CacheState<V>>>,
    invalidations: broadcast::Sender<QueryKey>,
}

impl<V> Clone for QueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            invalidations: self.invalidations.clone(),
        }
    }
}

impl<V: Clone> QueryCache<V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let (invalidations, _) = broadcast::channel(INVALIDATION_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                epochs: HashMap::new(),
            })),
            invalidations,
        }
    }

    /// Capacity from configuration; zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Cached value, stale or not.
    pub fn get(&self, key: &QueryKey) -> Option<V> {
        self.lock().entries.get(key).map(|entry| entry.value.clone())
    }

    /// Cached value only if it has not been invalidated.
    pub fn get_fresh(&self, key: &QueryKey) -> Option<V> {
        self.lock()
            .entries
            .get(key)
            .filter(|entry| !entry.stale)
            .map(|entry| entry.value.clone())
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.lock()
            .entries
            .peek(key)
            .is_none_or(|entry| entry.stale)
    }

    pub fn set(&self, key: QueryKey, value: V) {
        self.lock()
            .entries
            .put(key, Entry { value, stale: false });
    }

    /// Replace the value with `update(previous)`; returns the previous value.
    pub fn update(&self, key: QueryKey, update: impl FnOnce(Option<V>) -> V) -> Option<V> {
        let mut state = self.lock();
        let previous = state.entries.pop(&key).map(|entry| entry.value);
        let value = update(previous.clone());
        state.entries.put(key, Entry { value, stale: false });
        previous
    }

    /// Put back a snapshot taken before an update; `None` removes the entry.
    pub fn restore(&self, key: QueryKey, snapshot: Option<V>) {
        let mut state = self.lock();
        match snapshot {
            Some(value) => {
                state.entries.put(key, Entry { value, stale: false });
            }
            None => {
                state.entries.pop(&key);
            }
        }
    }

    /// Mark stale and notify subscribers so active readers refetch.
    pub fn invalidate(&self, key: &QueryKey) {
        if let Some(entry) = self.lock().entries.peek_mut(key) {
            entry.stale = true;
        }
        counter!("query_cache_invalidations_total").increment(1);
        debug!(%key, "Query invalidated");
        let _ = self.invalidations.send(*key);
    }

    /// Discard the result of any fetch currently in flight for `key`.
    pub fn cancel(&self, key: &QueryKey) {
        *self.lock().epochs.entry(*key).or_insert(0) += 1;
    }

    pub fn begin_fetch(&self, key: &QueryKey) -> FetchTicket {
        let epoch = *self.lock().epochs.entry(*key).or_insert(0);
        FetchTicket { key: *key, epoch }
    }

    /// Store a fetch result unless the fetch was cancelled meanwhile.
    pub fn finish_fetch(&self, ticket: FetchTicket, value: V) -> bool {
        let mut state = self.lock();
        let current = state.epochs.get(&ticket.key).copied().unwrap_or(0);
        if current != ticket.epoch {
            debug!(key = %ticket.key, "Dropping cancelled fetch");
            return false;
        }
        state
            .entries
            .put(ticket.key, Entry { value, stale: false });
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueryKey> {
        self.invalidations.subscribe()
    }
}
