use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::decorators::{
    BlockingCache, FifoCache, LoggingCache, LruCache, ScheduledCache, SerializedCache,
    SynchronizedCache,
};
use crate::{Cache, PerpetualCache};

/// Which bounded-eviction decorator, if any, sits just above the base store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    #[default]
    Lru,
    Fifo,
    None,
}

/// Assembles a decorator chain for one namespace cache.
///
/// Composition order (inner to outer) is fixed: base store, eviction,
/// scheduled flush, serialized copy-out, logging, synchronization, blocking.
/// The synchronizing wrapper sits outside every decorator whose auxiliary
/// state is not independently thread-safe; only the per-key blocking latch
/// lives outside it.
#[derive(Debug)]
pub struct CacheBuilder {
    id: String,
    eviction: EvictionPolicy,
    size: Option<usize>,
    clear_interval: Option<Duration>,
    read_write: bool,
    blocking: bool,
    blocking_timeout: Option<Duration>,
    properties: HashMap<String, String>,
}

impl CacheBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            eviction: EvictionPolicy::default(),
            size: None,
            clear_interval: None,
            read_write: true,
            blocking: false,
            blocking_timeout: None,
            properties: HashMap::new(),
        }
    }

    pub fn eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn clear_interval(mut self, interval: Duration) -> Self {
        self.clear_interval = Some(interval);
        self
    }

    /// Read-write caches hand out serialized copies; read-only caches share
    /// one instance with every caller.
    pub fn read_write(mut self, read_write: bool) -> Self {
        self.read_write = read_write;
        self
    }

    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn blocking_timeout(mut self, timeout: Duration) -> Self {
        self.blocking_timeout = Some(timeout);
        self
    }

    /// Open property bag from configuration. `size` and `clear_interval_ms`
    /// are recognized; unknown keys are retained untouched for custom
    /// decorators layered by the caller.
    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn build(mut self) -> Arc<dyn Cache> {
        self.apply_properties();
        let mut cache: Box<dyn Cache> = Box::new(PerpetualCache::new(self.id));
        cache = match self.eviction {
            EvictionPolicy::Lru => match self.size {
                Some(size) => Box::new(LruCache::with_capacity(cache, size)),
                None => Box::new(LruCache::new(cache)),
            },
            EvictionPolicy::Fifo => match self.size {
                Some(size) => Box::new(FifoCache::with_capacity(cache, size)),
                None => Box::new(FifoCache::new(cache)),
            },
            EvictionPolicy::None => cache,
        };
        if let Some(interval) = self.clear_interval {
            cache = Box::new(ScheduledCache::new(cache, interval));
        }
        if self.read_write {
            cache = Box::new(SerializedCache::new(cache));
        }
        cache = Box::new(LoggingCache::new(cache));
        cache = Box::new(SynchronizedCache::new(cache));
        if self.blocking {
            cache = Box::new(BlockingCache::with_timeout(cache, self.blocking_timeout));
        }
        Arc::from(cache)
    }

    fn apply_properties(&mut self) {
        if let Some(size) = self.properties.get("size").and_then(|v| v.parse().ok()) {
            self.size = Some(size);
        }
        if let Some(millis) = self
            .properties
            .get("clear_interval_ms")
            .and_then(|v| v.parse().ok())
        {
            self.clear_interval = Some(Duration::from_millis(millis));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheKey, CacheValue};
    use strata_types::{Row, Value};

    fn key(n: i64) -> CacheKey {
        let mut key = CacheKey::new();
        key.update(Value::Integer(n));
        key
    }

    #[test]
    fn test_chain_forwards_the_namespace_id() {
        let cache = CacheBuilder::new("app.UserMapper").blocking(true).build();
        assert_eq!(cache.id(), "app.UserMapper");
    }

    #[test]
    fn test_read_write_chain_round_trips() {
        let cache = CacheBuilder::new("rw").size(8).build();
        let rows = vec![Row::from_iter([("id", Value::Integer(1))])];
        cache.put(key(1), CacheValue::rows(rows.clone())).unwrap();
        let fetched = cache.get(&key(1)).unwrap().unwrap();
        assert_eq!(fetched.as_rows().unwrap().as_ref(), &rows);
    }

    #[test]
    fn test_size_property_bounds_the_chain() {
        let cache = CacheBuilder::new("bounded")
            .property("size", "2")
            .build();
        for n in 0..3 {
            cache.put(key(n), CacheValue::rows(vec![])).unwrap();
        }
        assert_eq!(cache.size(), 2);
    }
}
