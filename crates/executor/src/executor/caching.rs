use std::sync::Arc;

use strata_cache::{CacheKey, CacheValue, TransactionalCacheManager};
use strata_types::{Row, RowBounds, SharedRow};
use tracing::debug;

use crate::cursor::Cursor;
use crate::error::{ErrorContext, ExecutorError};
use crate::executor::{BatchResult, Executor, ResultHandler, LOG_TARGET};
use crate::mapping::{has_out_parameters, BoundSql, MappedStatement, StatementKind};

/// Adds the second-level cache in front of a delegate executor.
///
/// Reads consult the statement's shared cache through a transactional
/// buffer, so values written during this session become visible to other
/// sessions only after commit. Writes on flushing statements clear the
/// buffer immediately and schedule the shared cache to clear on commit.
pub struct CachingExecutor {
    delegate: Box<dyn Executor>,
    tx_cache_manager: TransactionalCacheManager,
}

impl CachingExecutor {
    pub fn new(delegate: Box<dyn Executor>) -> Self {
        Self { delegate, tx_cache_manager: TransactionalCacheManager::new() }
    }

    fn flush_cache_if_required(&mut self, statement: &MappedStatement) {
        if let Some(cache) = statement.cache() {
            if statement.flush_cache_required() {
                self.tx_cache_manager.clear(cache);
            }
        }
    }
}

/// A statement whose results may be shared across sessions cannot carry OUT
/// parameters; those are reconciled per session and would leak otherwise.
fn ensure_no_out_params(
    statement: &MappedStatement,
    bound_sql: &BoundSql,
) -> Result<(), ExecutorError> {
    if statement.statement_kind() == StatementKind::Callable
        && has_out_parameters(bound_sql.parameter_mappings())
    {
        return Err(ExecutorError::OutParamsNotCacheable(statement.id().to_string()));
    }
    Ok(())
}

impl Executor for CachingExecutor {
    fn query_with_key(
        &mut self,
        statement: &MappedStatement,
        parameter: Option<SharedRow>,
        bounds: RowBounds,
        handler: Option<&mut dyn ResultHandler>,
        key: CacheKey,
        bound_sql: &BoundSql,
    ) -> Result<Arc<Vec<Row>>, ExecutorError> {
        let cache = match statement.cache() {
            Some(cache) => cache.clone(),
            None => {
                return self
                    .delegate
                    .query_with_key(statement, parameter, bounds, handler, key, bound_sql);
            }
        };

        self.flush_cache_if_required(statement);
        if !statement.use_cache() || handler.is_some() {
            return self
                .delegate
                .query_with_key(statement, parameter, bounds, handler, key, bound_sql);
        }

        ensure_no_out_params(statement, bound_sql)?;
        let context = ErrorContext::statement("querying the second-level cache", statement.id());
        let cached = self.tx_cache_manager.get(&cache, &key).map_err(|e| context.clone().cache(e))?;
        if let Some(CacheValue::Rows(rows)) = cached {
            debug!(target: LOG_TARGET, statement = statement.id(), "Second-level cache hit.");
            return Ok(rows);
        }

        let rows =
            self.delegate.query_with_key(statement, parameter, bounds, handler, key.clone(), bound_sql)?;
        self.tx_cache_manager.put(&cache, key, CacheValue::Rows(rows.clone()));
        Ok(rows)
    }

    fn query_cursor(
        &mut self,
        statement: &MappedStatement,
        parameter: Option<SharedRow>,
        bounds: RowBounds,
    ) -> Result<Cursor, ExecutorError> {
        // cursors bypass the cache, but flushing statements still clear it
        self.flush_cache_if_required(statement);
        self.delegate.query_cursor(statement, parameter, bounds)
    }

    fn update(
        &mut self,
        statement: &MappedStatement,
        parameter: Option<SharedRow>,
    ) -> Result<u64, ExecutorError> {
        self.flush_cache_if_required(statement);
        self.delegate.update(statement, parameter)
    }

    fn flush_statements(&mut self) -> Result<Vec<BatchResult>, ExecutorError> {
        self.delegate.flush_statements()
    }

    /// The store commits before the buffered entries become visible, so no
    /// other session can read a cached value its database cannot yet serve.
    fn commit(&mut self, required: bool) -> Result<(), ExecutorError> {
        self.delegate.commit(required)?;
        self.tx_cache_manager
            .commit()
            .map_err(|e| ErrorContext::session("committing the second-level cache").cache(e))
    }

    fn rollback(&mut self, required: bool) -> Result<(), ExecutorError> {
        let result = self.delegate.rollback(required);
        if required {
            self.tx_cache_manager.rollback();
        }
        result
    }

    fn close(&mut self, force_rollback: bool) -> Result<(), ExecutorError> {
        // abandoned sessions must not publish their buffered entries
        if force_rollback {
            self.tx_cache_manager.rollback();
        } else if let Err(error) = self.tx_cache_manager.commit() {
            tracing::warn!(
                target: LOG_TARGET,
                %error,
                "Unexpected error committing the second-level cache while closing."
            );
        }
        self.delegate.close(force_rollback)
    }

    fn is_closed(&self) -> bool {
        self.delegate.is_closed()
    }

    fn create_cache_key(
        &self,
        statement: &MappedStatement,
        parameter: Option<&SharedRow>,
        bounds: RowBounds,
        bound_sql: &BoundSql,
    ) -> Result<CacheKey, ExecutorError> {
        self.delegate.create_cache_key(statement, parameter, bounds, bound_sql)
    }

    fn is_cached(&self, statement: &MappedStatement, key: &CacheKey) -> bool {
        self.delegate.is_cached(statement, key)
    }

    fn defer_load(
        &mut self,
        statement: &MappedStatement,
        target: SharedRow,
        property: &str,
        key: CacheKey,
    ) -> Result<(), ExecutorError> {
        self.delegate.defer_load(statement, target, property, key)
    }

    fn clear_local_cache(&mut self) {
        self.delegate.clear_local_cache();
    }
}
