use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::warn;

use crate::{Cache, CacheError, CacheKey, CacheValue};

pub(crate) const LOG_TARGET: &str = "strata::cache::transactional";

/// The second-level cache transactional buffer.
///
/// Holds every entry one unit of work intends to add to a shared cache;
/// entries reach the delegate only on commit and are discarded on rollback.
/// Reads always go to the delegate, never to the pending buffer, so a
/// session observes only committed state (read-committed semantics; dirty
/// reads are impossible, non-repeatable reads remain possible). Any `get`
/// that misses is recorded so a later commit can write an explicit null and
/// release whatever blocking-cache latch the miss left behind.
#[derive(Debug)]
pub struct TransactionalCache {
    delegate: Arc<dyn Cache>,
    clear_on_commit: bool,
    entries_to_add_on_commit: HashMap<CacheKey, CacheValue>,
    entries_missed_in_cache: HashSet<CacheKey>,
}

impl TransactionalCache {
    pub fn new(delegate: Arc<dyn Cache>) -> Self {
        Self {
            delegate,
            clear_on_commit: false,
            entries_to_add_on_commit: HashMap::new(),
            entries_missed_in_cache: HashSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        self.delegate.id()
    }

    pub fn size(&self) -> usize {
        self.delegate.size()
    }

    /// Fetch from the delegate, recording a miss. A pending clear poisons
    /// every read until the next commit or rollback.
    pub fn get(&mut self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        let value = self.delegate.get(key)?;
        if value.is_none() {
            self.entries_missed_in_cache.insert(key.clone());
        }
        if self.clear_on_commit {
            return Ok(None);
        }
        Ok(value)
    }

    /// Buffer a pending write. The delegate is untouched until commit, so a
    /// read-after-write within the same transaction still misses.
    pub fn put(&mut self, key: CacheKey, value: CacheValue) {
        self.entries_to_add_on_commit.insert(key, value);
    }

    /// Drop the pending writes and mark the delegate for clearing on commit.
    pub fn clear(&mut self) {
        self.clear_on_commit = true;
        self.entries_to_add_on_commit.clear();
    }

    /// Apply the buffered state to the delegate and reset.
    pub fn commit(&mut self) -> Result<(), CacheError> {
        if self.clear_on_commit {
            self.delegate.clear();
        }
        self.flush_pending_entries()?;
        self.reset();
        Ok(())
    }

    /// Discard the buffered state, releasing any latches the misses hold.
    pub fn rollback(&mut self) {
        self.unlock_missed_entries();
        self.reset();
    }

    fn reset(&mut self) {
        self.clear_on_commit = false;
        self.entries_to_add_on_commit.clear();
        self.entries_missed_in_cache.clear();
    }

    fn flush_pending_entries(&mut self) -> Result<(), CacheError> {
        for (key, value) in &self.entries_to_add_on_commit {
            self.delegate.put(key.clone(), value.clone())?;
        }
        for key in &self.entries_missed_in_cache {
            if !self.entries_to_add_on_commit.contains_key(key) {
                self.delegate.put(key.clone(), CacheValue::Null)?;
            }
        }
        Ok(())
    }

    fn unlock_missed_entries(&mut self) {
        for key in &self.entries_missed_in_cache {
            if let Err(error) = self.delegate.remove(key) {
                warn!(
                    target: LOG_TARGET,
                    id = %self.delegate.id(),
                    key = %key,
                    %error,
                    "Failed to notify a rollback to the cache; continuing"
                );
            }
        }
    }
}

/// Maps each distinct cache identity to exactly one [`TransactionalCache`]
/// for the lifetime of a caching executor, fanning commit and rollback out
/// to every buffer touched by the unit of work.
#[derive(Debug, Default)]
pub struct TransactionalCacheManager {
    transactional_caches: HashMap<String, TransactionalCache>,
}

impl TransactionalCacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self, cache: &Arc<dyn Cache>) {
        self.transactional_cache(cache).clear();
    }

    pub fn get(
        &mut self,
        cache: &Arc<dyn Cache>,
        key: &CacheKey,
    ) -> Result<Option<CacheValue>, CacheError> {
        self.transactional_cache(cache).get(key)
    }

    pub fn put(&mut self, cache: &Arc<dyn Cache>, key: CacheKey, value: CacheValue) {
        self.transactional_cache(cache).put(key, value);
    }

    pub fn commit(&mut self) -> Result<(), CacheError> {
        for tx_cache in self.transactional_caches.values_mut() {
            tx_cache.commit()?;
        }
        Ok(())
    }

    pub fn rollback(&mut self) {
        for tx_cache in self.transactional_caches.values_mut() {
            tx_cache.rollback();
        }
    }

    fn transactional_cache(&mut self, cache: &Arc<dyn Cache>) -> &mut TransactionalCache {
        self.transactional_caches
            .entry(cache.id().to_string())
            .or_insert_with(|| TransactionalCache::new(cache.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::decorators::BlockingCache;
    use crate::PerpetualCache;
    use strata_types::{Row, Value};

    fn key(n: i64) -> CacheKey {
        let mut key = CacheKey::new();
        key.update(Value::Integer(n));
        key
    }

    fn shared() -> Arc<dyn Cache> {
        Arc::new(PerpetualCache::new("tx"))
    }

    fn rows(n: i64) -> CacheValue {
        CacheValue::rows(vec![Row::from_iter([("id", Value::Integer(n))])])
    }

    #[test]
    fn test_no_read_your_own_writes() {
        let delegate = shared();
        let mut tx = TransactionalCache::new(delegate.clone());
        tx.put(key(1), rows(1));
        // The pending write is invisible until commit.
        assert!(tx.get(&key(1)).unwrap().is_none());
        assert!(delegate.get(&key(1)).unwrap().is_none());

        tx.commit().unwrap();
        assert!(delegate.get(&key(1)).unwrap().is_some());
    }

    #[test]
    fn test_pending_clear_poisons_reads() {
        let delegate = shared();
        delegate.put(key(1), rows(1)).unwrap();
        let mut tx = TransactionalCache::new(delegate.clone());

        tx.clear();
        assert!(tx.get(&key(1)).unwrap().is_none());
        // The delegate itself is cleared only at commit.
        assert!(delegate.get(&key(1)).unwrap().is_some());

        tx.commit().unwrap();
        assert!(delegate.get(&key(1)).unwrap().is_none());
    }

    #[test]
    fn test_clear_drops_pending_writes() {
        let delegate = shared();
        let mut tx = TransactionalCache::new(delegate.clone());
        tx.put(key(1), rows(1));
        tx.clear();
        tx.commit().unwrap();
        // Only the miss-release null of the cleared read path could exist;
        // the buffered write must not survive the clear.
        assert!(!matches!(
            delegate.get(&key(1)).unwrap(),
            Some(CacheValue::Rows(_))
        ));
    }

    #[test]
    fn test_commit_stores_null_for_pure_misses() {
        let delegate = shared();
        let mut tx = TransactionalCache::new(delegate.clone());
        assert!(tx.get(&key(1)).unwrap().is_none());
        tx.commit().unwrap();
        assert!(matches!(
            delegate.get(&key(1)).unwrap(),
            Some(CacheValue::Null)
        ));
    }

    #[test]
    fn test_rollback_leaves_no_residue_for_misses() {
        let delegate = shared();
        let mut tx = TransactionalCache::new(delegate.clone());
        assert!(tx.get(&key(1)).unwrap().is_none());
        tx.put(key(2), rows(2));
        tx.rollback();
        assert!(delegate.get(&key(1)).unwrap().is_none());
        assert!(delegate.get(&key(2)).unwrap().is_none());
    }

    #[test]
    fn test_commit_opens_blocking_latches_for_missed_keys() {
        let delegate: Arc<dyn Cache> =
            Arc::new(BlockingCache::new(Box::new(PerpetualCache::new("tx"))));
        let mut tx = TransactionalCache::new(delegate.clone());
        // The miss leaves the key's latch held in the blocking delegate.
        assert!(tx.get(&key(1)).unwrap().is_none());

        let other = delegate.clone();
        let reader = thread::spawn(move || other.get(&key(1)).unwrap());

        thread::sleep(Duration::from_millis(50));
        // Commit writes the explicit null for the miss, opening the latch.
        tx.commit().unwrap();
        assert!(matches!(reader.join().unwrap(), Some(CacheValue::Null)));
    }

    #[test]
    fn test_rollback_opens_blocking_latches_for_missed_keys() {
        let delegate: Arc<dyn Cache> =
            Arc::new(BlockingCache::new(Box::new(PerpetualCache::new("tx"))));
        let mut tx = TransactionalCache::new(delegate.clone());
        assert!(tx.get(&key(1)).unwrap().is_none());

        let other = delegate.clone();
        let reader = thread::spawn(move || other.get(&key(1)).unwrap());

        thread::sleep(Duration::from_millis(50));
        tx.rollback();
        // The rolled-back miss stores nothing; the reader just stops waiting.
        assert!(reader.join().unwrap().is_none());
    }

    #[test]
    fn test_manager_reuses_one_buffer_per_cache_identity() {
        let delegate = shared();
        let mut manager = TransactionalCacheManager::new();
        manager.put(&delegate, key(1), rows(1));
        assert!(manager.get(&delegate, &key(1)).unwrap().is_none());
        manager.commit().unwrap();
        assert!(manager.get(&delegate, &key(1)).unwrap().is_some());
    }
}
