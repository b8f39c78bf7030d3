//! Cache primitives for strata.
//!
//! A `Cache` is a single capability set - id, size, put, get, remove, clear -
//! implemented by one terminal store ([`PerpetualCache`]) and a chain of
//! decorators that each add one cross-cutting behavior (synchronization,
//! bounded eviction, copy-out serialization, scheduled flushing, per-key
//! blocking, hit logging). Chains are composed by wrapping at configuration
//! time, never rewired afterwards; see [`builder::CacheBuilder`].
//!
//! [`decorators::TransactionalCache`] buffers one unit of work's writes
//! against a shared chain and commits or rolls them back atomically.

use std::fmt;
use std::sync::Arc;

use strata_types::Row;

pub mod builder;
pub mod decorators;
pub mod error;
pub mod key;
pub mod perpetual;

pub use builder::{CacheBuilder, EvictionPolicy};
pub use decorators::{TransactionalCache, TransactionalCacheManager};
pub use error::CacheError;
pub use key::CacheKey;
pub use perpetual::PerpetualCache;

/// A value held by a cache entry.
///
/// This is the typed rendition of an entry's full lifecycle: a key is either
/// absent, in flight ([`CacheValue::Placeholder`]), or resolved to a result
/// list. The remaining variants exist for specific spots in the chain: an
/// explicit [`CacheValue::Null`] is written on commit for keys that missed
/// during the transaction, [`CacheValue::Bytes`] is what a serializing
/// decorator stores in its delegate, and [`CacheValue::Object`] snapshots a
/// parameter object for OUT-parameter reconciliation.
#[derive(Debug, Clone)]
pub enum CacheValue {
    /// Explicit absent marker.
    Null,
    /// A materialized result list.
    Rows(Arc<Vec<Row>>),
    /// A parameter-object snapshot.
    Object(Row),
    /// An encoded value, as stored beneath a serializing decorator.
    Bytes(Arc<Vec<u8>>),
    /// A query round-trip for this key is in flight.
    Placeholder,
}

impl CacheValue {
    /// Wrap a result list.
    pub fn rows(rows: Vec<Row>) -> Self {
        CacheValue::Rows(Arc::new(rows))
    }

    /// Get the result list, if this entry is resolved to one.
    pub fn as_rows(&self) -> Option<&Arc<Vec<Row>>> {
        match self {
            CacheValue::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    /// Check if this entry marks an in-flight round-trip.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, CacheValue::Placeholder)
    }
}

/// The cache capability.
///
/// One instance backs each statement namespace; decorators wrap a single
/// delegate and forward [`Cache::id`] to the innermost store so a chain is
/// interchangeable with a bare cache.
pub trait Cache: Send + Sync + fmt::Debug {
    /// Stable identifier, one per logical namespace.
    fn id(&self) -> &str;

    /// Number of entries in the underlying store.
    fn size(&self) -> usize;

    /// Store a value under a key.
    fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError>;

    /// Fetch the value for a key.
    fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError>;

    /// Remove the entry for a key, returning it as stored.
    fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError>;

    /// Drop every entry.
    fn clear(&self);
}
