use std::sync::Arc;

use strata_types::Row;

use crate::{Cache, CacheError, CacheKey, CacheValue};

/// Copy-out decorator for read-write caches.
///
/// The delegate holds an encoded byte form of each result list rather than
/// the live value, so one session can never observe in-place mutation of a
/// value another session cached. Every `get` decodes a fresh instance.
#[derive(Debug)]
pub struct SerializedCache {
    delegate: Box<dyn Cache>,
}

impl SerializedCache {
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self { delegate }
    }

    fn encode(&self, rows: &[Row]) -> Result<Vec<u8>, CacheError> {
        bincode::serialize(rows).map_err(|source| CacheError::Serialize {
            id: self.id().to_string(),
            source,
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Row>, CacheError> {
        bincode::deserialize(bytes).map_err(|source| CacheError::Deserialize {
            id: self.id().to_string(),
            source,
        })
    }
}

impl Cache for SerializedCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }

    fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
        match value {
            CacheValue::Null => self.delegate.put(key, CacheValue::Null),
            CacheValue::Rows(rows) => {
                let bytes = self.encode(&rows)?;
                self.delegate.put(key, CacheValue::Bytes(Arc::new(bytes)))
            }
            _ => Err(CacheError::NotSerializable { id: self.id().to_string() }),
        }
    }

    fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        match self.delegate.get(key)? {
            Some(CacheValue::Bytes(bytes)) => {
                let rows = self.decode(&bytes)?;
                Ok(Some(CacheValue::rows(rows)))
            }
            other => Ok(other),
        }
    }

    fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        // Callers discard the payload on removal; the encoded form is fine.
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

    fn serialized() -> SerializedCache {
        SerializedCache::new(Box::new(PerpetualCache::new("serialized")))
    }

    #[test]
    fn test_round_trip_returns_equal_rows() {
        let cache = serialized();
        let rows = vec![Row::from_iter([("id", Value::Integer(7))])];
        cache.put(key(1), CacheValue::rows(rows.clone())).unwrap();

        let fetched = cache.get(&key(1)).unwrap().unwrap();
        assert_eq!(fetched.as_rows().unwrap().as_ref(), &rows);
    }

    #[test]
    fn test_get_returns_a_fresh_instance_each_call() {
        let cache = serialized();
        cache
            .put(key(1), CacheValue::rows(vec![Row::new()]))
            .unwrap();
        let first = cache.get(&key(1)).unwrap().unwrap();
        let second = cache.get(&key(1)).unwrap().unwrap();
        assert!(!Arc::ptr_eq(
            first.as_rows().unwrap(),
            second.as_rows().unwrap()
        ));
    }

    #[test]
    fn test_null_passes_through() {
        let cache = serialized();
        cache.put(key(1), CacheValue::Null).unwrap();
        assert!(matches!(
            cache.get(&key(1)).unwrap(),
            Some(CacheValue::Null)
        ));
    }

    #[test]
    fn test_non_serializable_value_is_rejected() {
        let cache = serialized();
        let err = cache.put(key(1), CacheValue::Placeholder).unwrap_err();
        assert!(matches!(err, CacheError::NotSerializable { .. }));
    }
}
