//! Cache decorators. Each wraps exclusive ownership of one delegate and adds
//! a single behavior; `id()` always forwards to the innermost store.

mod blocking;
mod fifo;
mod logging;
mod lru;
mod scheduled;
mod serialized;
mod synchronized;
mod transactional;

pub use blocking::BlockingCache;
pub use fifo::FifoCache;
pub use logging::LoggingCache;
pub use lru::LruCache;
pub use scheduled::ScheduledCache;
pub use serialized::SerializedCache;
pub use synchronized::SynchronizedCache;
pub use transactional::{TransactionalCache, TransactionalCacheManager};

/// Default capacity for the bounded eviction decorators.
pub const DEFAULT_EVICTION_CAPACITY: usize = 1024;
