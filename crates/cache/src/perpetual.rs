use dashmap::DashMap;

use crate::{Cache, CacheError, CacheKey, CacheValue};

/// The unbounded, map-backed terminal node of every decorator chain.
///
/// No eviction, no expiry. Atomicity across compound operations (an eviction
/// index update plus the matching store write, say) is the synchronizing
/// decorator's job, not this one's.
#[derive(Debug)]
pub struct PerpetualCache {
    id: String,
    entries: DashMap<CacheKey, CacheValue>,
}

impl PerpetualCache {
    /// Create an empty cache with the given namespace id.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), entries: DashMap::new() }
    }
}

impl Cache for PerpetualCache {
    fn id(&self) -> &str {
        &self.id
    }

    fn size(&self) -> usize {
        self.entries.len()
    }

    fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
        self.entries.insert(key, value);
        Ok(())
    }

    fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        Ok(self.entries.remove(key).map(|(_, value)| value))
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::Value;

    fn key(n: i64) -> CacheKey {
        let mut key = CacheKey::new();
        key.update(Value::Integer(n));
        key
    }

    #[test]
    fn test_put_get_remove() {
        let cache = PerpetualCache::new("test");
        assert_eq!(cache.id(), "test");
        assert!(cache.get(&key(1)).unwrap().is_none());

        cache.put(key(1), CacheValue::rows(vec![])).unwrap();
        assert!(cache.get(&key(1)).unwrap().is_some());
        assert_eq!(cache.size(), 1);

        assert!(cache.remove(&key(1)).unwrap().is_some());
        assert!(cache.get(&key(1)).unwrap().is_none());
    }

    #[test]
    fn test_clear() {
        let cache = PerpetualCache::new("test");
        cache.put(key(1), CacheValue::Null).unwrap();
        cache.put(key(2), CacheValue::Placeholder).unwrap();
        cache.clear();
        assert_eq!(cache.size(), 0);
    }
}
