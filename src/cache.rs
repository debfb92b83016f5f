use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

/// Why an entry left a [`ComputingCache`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RemovalCause {
    /// The entry outlived the expiration timeout.
    Expired,
    /// The cache overflowed its maximum size.
    Size,
    /// Removed by [`ComputingCache::clear`] or [`ComputingCache::invalidate`].
    Explicit,
}

/// What to do when a new key arrives while the cache is full.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum OverflowPolicy {
    /// Drop every entry, then store the new one.
    #[default]
    Clear,
    /// Compute the value for the new key but do not store it.
    Reject,
}

pub type RemovalListener<K, V> = Arc<dyn Fn(&K, &V, RemovalCause) + Send + Sync>;

type ComputeFn<K, V, E> = Box<dyn Fn(&K) -> Result<V, E> + Send + Sync>;

struct Entry<V> {
    value: RwLock<Option<(V, Instant)>>,
    /// Held while the value is computed, so each key is computed once.
    compute: Mutex<()>,
}

impl<V: Clone> Entry<V> {
    fn new() -> Self {
        Self {
            value: RwLock::new(None),
            compute: Mutex::new(()),
        }
    }

    fn fresh(&self, expiration: Option<Duration>) -> Option<V> {
        match &*self.value.read() {
            Some((value, stored)) if !is_expired(*stored, expiration) => Some(value.clone()),
            _ => None,
        }
    }

    fn is_filled(&self) -> bool {
        self.value.read().is_some()
    }

    fn take(&self) -> Option<V> {
        self.value.write().take().map(|(value, _)| value)
    }
}

fn is_expired(stored: Instant, expiration: Option<Duration>) -> bool {
    expiration.is_some_and(|timeout| stored.elapsed() >= timeout)
}

/// A concurrent memoizing map.
///
/// `get` computes the value of a missing key with the function the cache was
/// built with. Concurrent callers asking for the same missing key block until
/// the first one has stored its value and then share it. Failed computations
/// are not stored.
///
/// Expired entries are only noticed when read. The size limit is checked when a
/// new key is inserted; see [`OverflowPolicy`].
pub struct ComputingCache<K, V, E> {
    consumer_id: String,
    compute: ComputeFn<K, V, E>,
    entries: RwLock<HashMap<K, Arc<Entry<V>>>>,
    expiration: Option<Duration>,
    max_size: Option<usize>,
    overflow_policy: OverflowPolicy,
    listener: Option<RemovalListener<K, V>>,
}

pub struct ComputingCacheBuilder<K, V> {
    consumer_id: String,
    expiration: Option<Duration>,
    max_size: Option<usize>,
    overflow_policy: OverflowPolicy,
    listener: Option<RemovalListener<K, V>>,
}

impl<K, V> ComputingCacheBuilder<K, V> {
    /// Starts building a cache; `consumer_id` names it in log events.
    pub fn new<S: Into<String>>(consumer_id: S) -> Self {
        Self {
            consumer_id: consumer_id.into(),
            expiration: None,
            max_size: None,
            overflow_policy: OverflowPolicy::default(),
            listener: None,
        }
    }

    pub fn expiration(mut self, timeout: Option<Duration>) -> Self {
        self.expiration = timeout;
        self
    }

    pub fn max_size(mut self, max_size: Option<usize>) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    pub fn listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&K, &V, RemovalCause) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn build<E, F>(self, compute: F) -> ComputingCache<K, V, E>
    where
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        ComputingCache {
            consumer_id: self.consumer_id,
            compute: Box::new(compute),
            entries: RwLock::new(HashMap::new()),
            expiration: self.expiration,
            max_size: self.max_size,
            overflow_policy: self.overflow_policy,
            listener: self.listener,
        }
    }
}

impl<K, V, E> ComputingCache<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Returns the value for `key`, computing and storing it if needed.
    ///
    /// # Errors
    /// Returns whatever the compute function returned; nothing is stored.
    pub fn get(&self, key: &K) -> Result<V, E> {
        let Some(entry) = self.entry(key) else {
            return (self.compute)(key);
        };
        if let Some(value) = entry.fresh(self.expiration) {
            return Ok(value);
        }

        let computing = entry.compute.lock();
        // Another caller may have finished while this one waited.
        let expired = {
            let slot = entry.value.read();
            match &*slot {
                Some((value, stored)) if !is_expired(*stored, self.expiration) => {
                    return Ok(value.clone());
                }
                Some(_) => true,
                None => false,
            }
        };
        if !expired && !self.is_current(key, &entry) {
            // The computation this caller waited for failed and dropped the slot.
            drop(computing);
            return self.get(key);
        }
        if expired {
            if let Some(old) = entry.take() {
                tracing::debug!(cache = %self.consumer_id, "cache entry expired");
                self.notify(key, &old, RemovalCause::Expired);
            }
        }

        let value = match (self.compute)(key) {
            Ok(value) => value,
            Err(err) => {
                self.discard_empty(key, &entry);
                return Err(err);
            }
        };
        *entry.value.write() = Some((value.clone(), Instant::now()));
        Ok(value)
    }

    /// Returns the stored, unexpired value for `key` without computing it.
    pub fn get_if_present(&self, key: &K) -> Option<V> {
        self.entries
            .read()
            .get(key)
            .and_then(|entry| entry.fresh(self.expiration))
    }

    /// A snapshot of every stored, unexpired entry.
    pub fn get_all_present(&self) -> HashMap<K, V> {
        self.entries
            .read()
            .iter()
            .filter_map(|(key, entry)| {
                entry
                    .fresh(self.expiration)
                    .map(|value| (key.clone(), value))
            })
            .collect()
    }

    /// Number of stored, unexpired entries.
    pub fn size(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.fresh(self.expiration).is_some())
            .count()
    }

    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.entries.write());
        tracing::debug!(cache = %self.consumer_id, entries = removed.len(), "cache cleared");
        self.notify_all(removed, RemovalCause::Explicit);
    }

    /// Removes every entry whose key matches `predicate`.
    pub fn invalidate<P: Fn(&K) -> bool>(&self, predicate: P) {
        let removed: Vec<(K, Arc<Entry<V>>)> = {
            let mut entries = self.entries.write();
            let keys: Vec<K> = entries.keys().filter(|k| predicate(k)).cloned().collect();
            keys.into_iter()
                .filter_map(|key| entries.remove(&key).map(|entry| (key, entry)))
                .collect()
        };
        if !removed.is_empty() {
            tracing::debug!(cache = %self.consumer_id, entries = removed.len(), "cache entries invalidated");
        }
        self.notify_all(removed, RemovalCause::Explicit);
    }

    /// Looks up the entry for `key`, inserting an empty one if needed.
    ///
    /// Returns `None` when the cache is full and rejects new keys.
    fn entry(&self, key: &K) -> Option<Arc<Entry<V>>> {
        if let Some(entry) = self.entries.read().get(key) {
            return Some(Arc::clone(entry));
        }

        let mut evicted = HashMap::new();
        let entry = {
            let mut entries = self.entries.write();
            if let Some(entry) = entries.get(key) {
                return Some(Arc::clone(entry));
            }
            // Slots still being computed take no part in the size limit.
            let filled = entries.values().filter(|entry| entry.is_filled()).count();
            if self.max_size.is_some_and(|max| filled >= max) {
                match self.overflow_policy {
                    OverflowPolicy::Clear => {
                        let (pending, stored): (HashMap<_, _>, HashMap<_, _>) = std::mem::take(&mut *entries)
                            .into_iter()
                            .partition(|(_, entry)| !entry.is_filled());
                        *entries = pending;
                        evicted = stored;
                    }
                    OverflowPolicy::Reject => return None,
                }
            }
            let entry = Arc::new(Entry::new());
            entries.insert(key.clone(), Arc::clone(&entry));
            entry
        };

        if !evicted.is_empty() {
            tracing::debug!(cache = %self.consumer_id, entries = evicted.len(), "cache overflowed, cleared");
            self.notify_all(evicted, RemovalCause::Size);
        }
        Some(entry)
    }

    fn is_current(&self, key: &K, entry: &Arc<Entry<V>>) -> bool {
        self.entries
            .read()
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, entry))
    }

    /// Drops the slot of a failed computation unless it was replaced or filled meanwhile.
    fn discard_empty(&self, key: &K, entry: &Arc<Entry<V>>) {
        let mut entries = self.entries.write();
        if entries
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, entry) && !current.is_filled())
        {
            entries.remove(key);
        }
    }

    fn notify(&self, key: &K, value: &V, cause: RemovalCause) {
        if let Some(listener) = &self.listener {
            listener(key, value, cause);
        }
    }

    fn notify_all<I>(&self, removed: I, cause: RemovalCause)
    where
        I: IntoIterator<Item = (K, Arc<Entry<V>>)>,
    {
        if self.listener.is_none() {
            return;
        }
        for (key, entry) in removed {
            if let Some(value) = entry.take() {
                self.notify(&key, &value, cause);
            }
        }
    }
}

impl<K, V, E> fmt::Debug for ComputingCache<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputingCache")
            .field("consumer_id", &self.consumer_id)
            .field("entries", &self.entries.read().len())
            .field("expiration", &self.expiration)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}
