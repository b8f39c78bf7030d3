use parking_lot::Mutex;

use crate::{Cache, CacheError, CacheKey, CacheValue};

/// Coarse mutual-exclusion decorator.
///
/// Every operation runs under one lock scoped to the whole chain. Inner
/// decorators keep their own indexes consistent per call, but only this
/// wrapper makes a compound chain safe for concurrently active sessions -
/// it must sit outside every other decorator it protects.
#[derive(Debug)]
pub struct SynchronizedCache {
    delegate: Box<dyn Cache>,
    lock: Mutex<()>,
}

impl SynchronizedCache {
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self { delegate, lock: Mutex::new(()) }
    }
}

impl Cache for SynchronizedCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn size(&self) -> usize {
        let _guard = self.lock.lock();
        self.delegate.size()
    }

    fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
        let _guard = self.lock.lock();
        self.delegate.put(key, value)
    }

    fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        let _guard = self.lock.lock();
        self.delegate.get(key)
    }

    fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        let _guard = self.lock.lock();
        self.delegate.remove(key)
    }

    fn clear(&self) {
        let _guard = self.lock.lock();
        self.delegate.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::PerpetualCache;
    use strata_types::Value;

    #[test]
    fn test_concurrent_puts_all_land() {
        let cache: Arc<dyn Cache> =
            Arc::new(SynchronizedCache::new(Box::new(PerpetualCache::new("sync"))));
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        let mut key = CacheKey::new();
                        key.update(Value::Integer(n * 1000 + i));
                        cache.put(key, CacheValue::rows(vec![])).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.size(), 400);
    }
}
