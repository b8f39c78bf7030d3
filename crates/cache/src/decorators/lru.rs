use hashlink::LinkedHashMap;
use parking_lot::Mutex;

use super::DEFAULT_EVICTION_CAPACITY;
use crate::{Cache, CacheError, CacheKey, CacheValue};

/// Least-recently-used eviction decorator.
///
/// Keeps an access-ordered index of keys alongside the delegate. A `put` that
/// pushes the index past capacity evicts exactly one entry - the least
/// recently touched key - from the delegate; a `get` refreshes a key's
/// recency without fetching twice.
#[derive(Debug)]
pub struct LruCache {
    delegate: Box<dyn Cache>,
    capacity: usize,
    keys: Mutex<LinkedHashMap<CacheKey, ()>>,
}

impl LruCache {
    /// Wrap a delegate with the default capacity.
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self::with_capacity(delegate, DEFAULT_EVICTION_CAPACITY)
    }

    /// Wrap a delegate with an explicit capacity.
    pub fn with_capacity(delegate: Box<dyn Cache>, capacity: usize) -> Self {
        Self {
            delegate,
            capacity: capacity.max(1),
            keys: Mutex::new(LinkedHashMap::new()),
        }
    }

    fn touch(&self, key: &CacheKey) {
        let mut keys = self.keys.lock();
        if keys.remove(key).is_some() {
            keys.insert(key.clone(), ());
        }
    }

    fn cycle(&self, key: &CacheKey) -> Result<(), CacheError> {
        let eldest = {
            let mut keys = self.keys.lock();
            keys.remove(key);
            keys.insert(key.clone(), ());
            if keys.len() > self.capacity {
                keys.pop_front().map(|(eldest, _)| eldest)
            } else {
                None
            }
        };
        if let Some(eldest) = eldest {
            self.delegate.remove(&eldest)?;
        }
        Ok(())
    }
}

impl Cache for LruCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }

    fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
        self.delegate.put(key.clone(), value)?;
        self.cycle(&key)
    }

    fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        self.touch(key);
        self.delegate.get(key)
    }

    fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        self.keys.lock().remove(key);
        self.delegate.remove(key)
    }

    fn clear(&self) {
        self.delegate.clear();
        self.keys.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PerpetualCache;
    use strata_types::Value;

    fn key(n: i64) -> CacheKey {
        let mut key = CacheKey::new();
        key.update(Value::Integer(n));
        key
    }

    fn lru(capacity: usize) -> LruCache {
        LruCache::with_capacity(Box::new(PerpetualCache::new("lru")), capacity)
    }

    #[test]
    fn test_exactly_one_eviction_past_capacity() {
        let cache = lru(4);
        for n in 0..5 {
            cache.put(key(n), CacheValue::rows(vec![])).unwrap();
        }
        // The first-inserted, never-touched key is gone; the other four stay.
        assert!(cache.get(&key(0)).unwrap().is_none());
        for n in 1..5 {
            assert!(cache.get(&key(n)).unwrap().is_some(), "key {n} evicted");
        }
        assert_eq!(cache.size(), 4);
    }

    #[test]
    fn test_get_counts_as_touch() {
        let cache = lru(4);
        for n in 0..4 {
            cache.put(key(n), CacheValue::rows(vec![])).unwrap();
        }
        cache.get(&key(0)).unwrap();
        cache.put(key(4), CacheValue::rows(vec![])).unwrap();
        // key 1 is now the least recently touched, not key 0.
        assert!(cache.get(&key(0)).unwrap().is_some());
        assert!(cache.get(&key(1)).unwrap().is_none());
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = lru(2);
        cache.put(key(1), CacheValue::rows(vec![])).unwrap();
        cache.put(key(2), CacheValue::rows(vec![])).unwrap();
        cache.put(key(1), CacheValue::Null).unwrap();
        assert!(cache.get(&key(2)).unwrap().is_some());
        assert_eq!(cache.size(), 2);
    }
}
