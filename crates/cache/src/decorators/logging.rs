use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::{Cache, CacheError, CacheKey, CacheValue};

pub(crate) const LOG_TARGET: &str = "strata::cache::logging";

/// Observability decorator counting hits against requests.
#[derive(Debug)]
pub struct LoggingCache {
    delegate: Box<dyn Cache>,
    requests: AtomicU64,
    hits: AtomicU64,
}

impl LoggingCache {
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self {
            delegate,
            requests: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// Hits as a fraction of requests so far.
    pub fn hit_ratio(&self) -> f64 {
        let requests = self.requests.load(Ordering::Relaxed);
        if requests == 0 {
            return 0.0;
        }
        self.hits.load(Ordering::Relaxed) as f64 / requests as f64
    }
}

impl Cache for LoggingCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }

    fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
        self.delegate.put(key, value)
    }

    fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let value = self.delegate.get(key)?;
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            target: LOG_TARGET,
            id = %self.id(),
            hit_ratio = self.hit_ratio(),
            "Cache hit ratio"
        );
        Ok(value)
    }

    fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        self.delegate.remove(key)
    }

    fn clear(&self) {
        self.delegate.clear();
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
    fn test_hit_ratio() {
        let cache = LoggingCache::new(Box::new(PerpetualCache::new("log")));
        cache.put(key(1), CacheValue::rows(vec![])).unwrap();
        cache.get(&key(1)).unwrap();
        cache.get(&key(2)).unwrap();
        assert!((cache.hit_ratio() - 0.5).abs() < f64::EPSILON);
    }
}
