use super::IndexedCollection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Bounded per-collection cache of indexed snapshots
///
/// Entries are keyed by collection name and tagged with the write generation
/// they were built from; a lookup with any other generation misses and drops
/// the entry. When full, the least recently used collection is evicted.
#[derive(Debug)]
pub struct RetrievalCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    clock: u64,
}

#[derive(Debug)]
struct CacheEntry {
    collection: Arc<IndexedCollection>,
    last_used: u64,
}

impl RetrievalCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Entries are immutable Arcs, so a poisoned map is still consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cached collection if it was built at `generation`
    pub fn get(&self, name: &str, generation: u64) -> Option<Arc<IndexedCollection>> {
        let mut state = self.lock();
        state.clock += 1;
        let now = state.clock;

        let current = state
            .entries
            .get(name)
            .map(|e| e.collection.generation == generation)?;

        if !current {
            tracing::debug!("Dropping stale retrieval cache entry for '{}'", name);
            state.entries.remove(name);
            return None;
        }

        let entry = state.entries.get_mut(name)?;
        entry.last_used = now;
        Some(entry.collection.clone())
    }

    /// Cache a collection, replacing any entry with the same name
    pub fn insert(&self, collection: Arc<IndexedCollection>) {
        let mut state = self.lock();
        state.clock += 1;
        let now = state.clock;

        if !state.entries.contains_key(&collection.name) && state.entries.len() >= self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(name, _)| name.clone());
            if let Some(oldest) = oldest {
                tracing::debug!("Evicting '{}' from retrieval cache", oldest);
                state.entries.remove(&oldest);
            }
        }

        state.entries.insert(
            collection.name.clone(),
            CacheEntry {
                collection,
                last_used: now,
            },
        );
    }

    /// Drop the entry for a collection
    pub fn invalidate(&self, name: &str) {
        self.lock().entries.remove(name);
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
