//! Storage backends for rate-limit entries.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::RateLimitEntry;

/// Key/value store holding one [`RateLimitEntry`] per `action:identifier`.
///
/// `upsert` must apply the closure atomically with respect to other
/// calls on the same key.
pub trait RateLimitStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Option<RateLimitEntry>> + Send;

    /// Replace the entry under `key` with `f(current)` and return the new value.
    fn upsert<F>(&self, key: &str, f: F) -> impl Future<Output = RateLimitEntry> + Send
    where
        F: FnOnce(Option<&RateLimitEntry>) -> RateLimitEntry + Send;

    fn remove(&self, key: &str) -> impl Future<Output = ()> + Send;

    /// Keep only entries for which `keep` returns true. Returns the number
    /// of removed entries.
    fn retain<F>(&self, keep: F) -> impl Future<Output = usize> + Send
    where
        F: FnMut(&str, &RateLimitEntry) -> bool + Send;

    fn entries(&self) -> impl Future<Output = Vec<(String, RateLimitEntry)>> + Send;
}

/// Process-local store. Counters are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    async fn get(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    async fn upsert<F>(&self, key: &str, f: F) -> RateLimitEntry
    where
        F: FnOnce(Option<&RateLimitEntry>) -> RateLimitEntry + Send,
    {
        // The shard lock is held for the whole read-modify-write.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let next = f(Some(occupied.get()));
                occupied.insert(next.clone());
                next
            }
            Entry::Vacant(vacant) => {
                let next = f(None);
                vacant.insert(next.clone());
                next
            }
        }
    }

    async fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    async fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&str, &RateLimitEntry) -> bool + Send,
    {
        let mut removed = 0;
        self.entries.retain(|key, entry| {
            let kept = keep(key, entry);
            if !kept {
                removed += 1;
            }
            kept
        });
        removed
    }

    async fn entries(&self) -> Vec<(String, RateLimitEntry)> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}
