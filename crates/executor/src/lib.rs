//! Session executors with two tiers of query-result caching.
//!
//! A session obtains an [`Executor`] from the [`Configuration`] and runs
//! [`MappedStatement`](mapping::MappedStatement)s through it against a
//! pluggable [store](store). Query results pass through a session-local
//! first-level cache always, and through a shared second-level cache when
//! the statement opts in; second-level entries become visible to other
//! sessions only once the owning transaction commits.

pub mod config;
pub mod cursor;
pub mod error;
pub mod executor;
pub mod mapping;
pub mod store;
pub mod test_utils;

pub use config::{Configuration, ExecutorType, LocalCacheScope};
pub use cursor::Cursor;
pub use error::{ErrorContext, ExecutorError};
pub use executor::{
    BatchExecutor, BatchResult, CachingExecutor, Executor, ResultHandler, ReuseExecutor,
    SimpleExecutor,
};
pub use store::{Connection, Statement, StoreError, Transaction};
