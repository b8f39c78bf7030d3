use std::collections::VecDeque;

use parking_lot::Mutex;

use super::DEFAULT_EVICTION_CAPACITY;
use crate::{Cache, CacheError, CacheKey, CacheValue};

/// First-in-first-out eviction decorator.
///
/// Keys are tracked in insertion order; a `put` past capacity evicts exactly
/// the oldest inserted key from the delegate. Unlike [`super::LruCache`],
/// reads do not affect eviction order.
#[derive(Debug)]
pub struct FifoCache {
    delegate: Box<dyn Cache>,
    capacity: usize,
    keys: Mutex<VecDeque<CacheKey>>,
}

impl FifoCache {
    /// Wrap a delegate with the default capacity.
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self::with_capacity(delegate, DEFAULT_EVICTION_CAPACITY)
    }

    /// Wrap a delegate with an explicit capacity.
    pub fn with_capacity(delegate: Box<dyn Cache>, capacity: usize) -> Self {
        Self {
            delegate,
            capacity: capacity.max(1),
            keys: Mutex::new(VecDeque::new()),
        }
    }
}

impl Cache for FifoCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }

    fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
        self.delegate.put(key.clone(), value)?;
        let oldest = {
            let mut keys = self.keys.lock();
            if !keys.contains(&key) {
                keys.push_back(key);
            }
            if keys.len() > self.capacity {
                keys.pop_front()
            } else {
                None
            }
        };
        if let Some(oldest) = oldest {
            self.delegate.remove(&oldest)?;
        }
        Ok(())
    }

    fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        self.delegate.get(key)
    }

    fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        self.keys.lock().retain(|k| k != key);
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

    #[test]
    fn test_oldest_insertion_evicted() {
        let cache = FifoCache::with_capacity(Box::new(PerpetualCache::new("fifo")), 3);
        for n in 0..3 {
            cache.put(key(n), CacheValue::rows(vec![])).unwrap();
        }
        // Reads do not refresh insertion order.
        cache.get(&key(0)).unwrap();
        cache.put(key(3), CacheValue::rows(vec![])).unwrap();
        assert!(cache.get(&key(0)).unwrap().is_none());
        assert!(cache.get(&key(1)).unwrap().is_some());
    }
}
