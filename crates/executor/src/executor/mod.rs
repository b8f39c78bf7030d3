//! The executor stack.
//!
//! [`BaseExecutor`] owns the session-local cache and the transaction and
//! delegates the actual statement work to a [`StatementDriver`]. The three
//! driver flavors trade statement reuse for simplicity: [`SimpleExecutor`]
//! prepares a fresh statement per execution, [`ReuseExecutor`] keeps
//! prepared statements keyed by SQL text, and [`BatchExecutor`] queues
//! writes until they are flushed. [`CachingExecutor`] wraps any of them
//! with the transaction-aware second-level cache.

mod base;
mod batch;
mod caching;
mod driver;
mod reuse;
mod simple;

pub use base::BaseExecutor;
pub use batch::{BatchDriver, BatchExecutor};
pub use caching::CachingExecutor;
pub use driver::StatementDriver;
pub use reuse::{ReuseDriver, ReuseExecutor};
pub use simple::{SimpleDriver, SimpleExecutor};

use std::sync::Arc;

use strata_cache::CacheKey;
use strata_types::{Row, RowBounds, SharedRow, Value};

use crate::cursor::Cursor;
use crate::error::ExecutorError;
use crate::mapping::{BoundSql, MappedStatement};

pub(crate) const LOG_TARGET: &str = "strata::executor";

/// Receives rows one at a time instead of a materialized list. Queries
/// routed through a handler bypass every cache.
pub trait ResultHandler {
    fn handle_row(&mut self, row: &Row);
}

/// The outcome of one batched statement after a flush: the argument sets
/// that were queued and the per-set update counts the store reported.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub statement_id: String,
    pub sql: String,
    pub parameter_sets: Vec<Vec<Value>>,
    pub update_counts: Vec<u64>,
}

impl BatchResult {
    pub(crate) fn new(statement_id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            statement_id: statement_id.into(),
            sql: sql.into(),
            parameter_sets: Vec::new(),
            update_counts: Vec::new(),
        }
    }
}

/// One session's gateway to the store.
///
/// Every method except [`Executor::rollback`] and [`Executor::close`] fails
/// with [`ExecutorError::Closed`] once the executor is closed.
pub trait Executor: Send {
    /// Runs a query, serving it from cache when possible.
    fn query(
        &mut self,
        statement: &MappedStatement,
        parameter: Option<SharedRow>,
        bounds: RowBounds,
        handler: Option<&mut dyn ResultHandler>,
    ) -> Result<Arc<Vec<Row>>, ExecutorError> {
        let bound_sql = statement.bound_sql();
        let key = self.create_cache_key(statement, parameter.as_ref(), bounds, &bound_sql)?;
        self.query_with_key(statement, parameter, bounds, handler, key, &bound_sql)
    }

    /// Runs a query under a pre-computed cache key. Used by the caching
    /// layer so both cache tiers see the same key.
    fn query_with_key(
        &mut self,
        statement: &MappedStatement,
        parameter: Option<SharedRow>,
        bounds: RowBounds,
        handler: Option<&mut dyn ResultHandler>,
        key: CacheKey,
        bound_sql: &BoundSql,
    ) -> Result<Arc<Vec<Row>>, ExecutorError>;

    /// Runs a query and returns a lazily consumed cursor. Cursor results
    /// never enter any cache.
    fn query_cursor(
        &mut self,
        statement: &MappedStatement,
        parameter: Option<SharedRow>,
        bounds: RowBounds,
    ) -> Result<Cursor, ExecutorError>;

    /// Executes a write. Batching executors queue the work and return 0;
    /// real counts arrive with [`Executor::flush_statements`].
    fn update(
        &mut self,
        statement: &MappedStatement,
        parameter: Option<SharedRow>,
    ) -> Result<u64, ExecutorError>;

    /// Executes any queued batch work and reports per-statement counts.
    fn flush_statements(&mut self) -> Result<Vec<BatchResult>, ExecutorError>;

    /// Clears session caches, flushes pending work, and commits the
    /// transaction when `required`.
    fn commit(&mut self, required: bool) -> Result<(), ExecutorError>;

    /// Clears session caches, discards pending batch work, and rolls the
    /// transaction back when `required`. A no-op on a closed executor.
    fn rollback(&mut self, required: bool) -> Result<(), ExecutorError>;

    /// Releases the transaction. Errors during the final rollback are
    /// logged and swallowed; close itself always succeeds.
    fn close(&mut self, force_rollback: bool) -> Result<(), ExecutorError>;

    fn is_closed(&self) -> bool;

    /// Derives the cache key identifying one logical query: statement id,
    /// row bounds, SQL text, bound arguments, and the environment.
    fn create_cache_key(
        &self,
        statement: &MappedStatement,
        parameter: Option<&SharedRow>,
        bounds: RowBounds,
        bound_sql: &BoundSql,
    ) -> Result<CacheKey, ExecutorError>;

    /// Whether the session-local cache holds an entry for the key,
    /// including in-flight placeholders.
    fn is_cached(&self, statement: &MappedStatement, key: &CacheKey) -> bool;

    /// Queues a nested property load to run once the outermost query
    /// finishes, or applies it immediately if the result is already cached.
    fn defer_load(
        &mut self,
        statement: &MappedStatement,
        target: SharedRow,
        property: &str,
        key: CacheKey,
    ) -> Result<(), ExecutorError>;

    fn clear_local_cache(&mut self);
}
