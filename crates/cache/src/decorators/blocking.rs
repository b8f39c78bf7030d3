use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::{Cache, CacheError, CacheKey, CacheValue};

/// Per-key blocking decorator.
///
/// A `get` acquires the key's latch before consulting the delegate. On a hit
/// the latch is released immediately; on a miss it stays held, so concurrent
/// readers of the same key wait instead of racing to the store, until a
/// subsequent `put` (the fetched value) or `remove` (a rollback) for that key
/// releases it. The transactional buffer's commit writes an explicit null for
/// every missed key precisely so these latches open even on a pure-miss
/// transaction.
///
/// The latch is not reentrant. A session that misses a key holds its latch
/// until its own `put` (or a transactional commit or rollback) for that key;
/// reading the same key again before then waits on the session's own latch,
/// forever when no timeout is configured.
pub struct BlockingCache {
    delegate: Box<dyn Cache>,
    timeout: Option<Duration>,
    latches: Mutex<HashMap<CacheKey, Arc<KeyLatch>>>,
}

impl BlockingCache {
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self::with_timeout(delegate, None)
    }

    /// Wrap a delegate with an acquisition timeout. `None` waits forever.
    pub fn with_timeout(delegate: Box<dyn Cache>, timeout: Option<Duration>) -> Self {
        Self {
            delegate,
            timeout,
            latches: Mutex::new(HashMap::new()),
        }
    }

    fn acquire_latch(&self, key: &CacheKey) -> Result<(), CacheError> {
        loop {
            let held = {
                let mut latches = self.latches.lock();
                match latches.get(key) {
                    None => {
                        latches.insert(key.clone(), Arc::new(KeyLatch::new()));
                        return Ok(());
                    }
                    Some(latch) => latch.clone(),
                }
            };
            if !held.wait(self.timeout) {
                return Err(CacheError::LockTimeout {
                    id: self.id().to_string(),
                    key: key.to_string(),
                });
            }
            // Contend again for the freed key.
        }
    }

    fn release_latch(&self, key: &CacheKey) {
        if let Some(latch) = self.latches.lock().remove(key) {
            latch.open();
        }
    }
}

impl fmt::Debug for BlockingCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingCache")
            .field("delegate", &self.delegate)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Cache for BlockingCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }

    fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
        let result = self.delegate.put(key.clone(), value);
        self.release_latch(&key);
        result
    }

    fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        self.acquire_latch(key)?;
        let value = self.delegate.get(key)?;
        if value.is_some() {
            self.release_latch(key);
        }
        Ok(value)
    }

    fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        // Only releases the miss latch; the delegate entry is left alone.
        self.release_latch(key);
        Ok(None)
    }

    fn clear(&self) {
        self.delegate.clear();
    }
}

struct KeyLatch {
    open: Mutex<bool>,
    cond: Condvar,
}

impl KeyLatch {
    fn new() -> Self {
        Self { open: Mutex::new(false), cond: Condvar::new() }
    }

    /// Wait for the latch to open; false on timeout.
    fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut open = self.open.lock();
        while !*open {
            match timeout {
                Some(timeout) => {
                    if self.cond.wait_for(&mut open, timeout).timed_out() && !*open {
                        return false;
                    }
                }
                None => self.cond.wait(&mut open),
            }
        }
        true
    }

    fn open(&self) {
        *self.open.lock() = true;
        self.cond.notify_all();
    }
}
