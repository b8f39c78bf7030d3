use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::{Cache, CacheError, CacheKey, CacheValue};

/// Interval-flush decorator.
///
/// There is no background thread; the first operation past the deadline
/// clears the delegate before proceeding.
#[derive(Debug)]
pub struct ScheduledCache {
    delegate: Box<dyn Cache>,
    clear_interval: Duration,
    last_clear: Mutex<Instant>,
}

impl ScheduledCache {
    pub fn new(delegate: Box<dyn Cache>, clear_interval: Duration) -> Self {
        Self {
            delegate,
            clear_interval,
            last_clear: Mutex::new(Instant::now()),
        }
    }

    fn clear_when_stale(&self) {
        let mut last_clear = self.last_clear.lock();
        if last_clear.elapsed() >= self.clear_interval {
            self.delegate.clear();
            *last_clear = Instant::now();
        }
    }
}

impl Cache for ScheduledCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn size(&self) -> usize {
        self.clear_when_stale();
        self.delegate.size()
    }

    fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
        self.clear_when_stale();
        self.delegate.put(key, value)
    }

    fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        self.clear_when_stale();
        self.delegate.get(key)
    }

    fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
        self.clear_when_stale();
        self.delegate.remove(key)
    }

    fn clear(&self) {
        *self.last_clear.lock() = Instant::now();
        self.delegate.clear();
    }
}
