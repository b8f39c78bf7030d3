use std::collections::VecDeque;
use std::sync::Arc;

use strata_cache::{Cache, CacheKey, CacheValue, PerpetualCache};
use strata_types::{Row, RowBounds, SharedRow, Value};
use tracing::{trace, warn};

use crate::config::{Configuration, LocalCacheScope};
use crate::cursor::Cursor;
use crate::error::{ErrorContext, ExecutorError};
use crate::executor::driver::bind_shared;
use crate::executor::{BatchResult, Executor, ResultHandler, StatementDriver, LOG_TARGET};
use crate::mapping::{BoundSql, MappedStatement, ParameterMode, StatementKind};
use crate::store::Transaction;

/// Session-scoped executor skeleton shared by every driver flavor.
///
/// Owns the first-level (session-local) result cache, the OUT-parameter
/// cache for callable statements, the deferred-load queue, and the
/// transaction. Queries landing on a key that is already resolved are
/// served from the local cache; a key that is still in flight (its
/// placeholder is present) means a deferred load re-entered the same query
/// and is rejected.
pub struct BaseExecutor<D: StatementDriver> {
    config: Arc<Configuration>,
    transaction: Option<Box<dyn Transaction>>,
    driver: D,
    local_cache: PerpetualCache,
    local_output_parameter_cache: PerpetualCache,
    deferred_loads: VecDeque<DeferredLoad>,
    query_stack: usize,
    closed: bool,
}

struct DeferredLoad {
    target: SharedRow,
    property: String,
    key: CacheKey,
}

impl<D: StatementDriver> BaseExecutor<D> {
    pub fn with_driver(
        config: Arc<Configuration>,
        transaction: Box<dyn Transaction>,
        driver: D,
    ) -> Self {
        Self {
            config,
            transaction: Some(transaction),
            driver,
            local_cache: PerpetualCache::new("LocalCache"),
            local_output_parameter_cache: PerpetualCache::new("LocalOutputParameterCache"),
            deferred_loads: VecDeque::new(),
            query_stack: 0,
            closed: false,
        }
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.config
    }

    fn transaction_mut(&mut self) -> Result<&mut dyn Transaction, ExecutorError> {
        match self.transaction.as_mut() {
            Some(transaction) => Ok(transaction.as_mut()),
            None => Err(ExecutorError::Closed),
        }
    }

    fn lookup_or_query(
        &mut self,
        statement: &MappedStatement,
        parameter: Option<SharedRow>,
        bounds: RowBounds,
        handler: Option<&mut dyn ResultHandler>,
        key: &CacheKey,
        bound_sql: &BoundSql,
    ) -> Result<Arc<Vec<Row>>, ExecutorError> {
        if handler.is_some() {
            // streamed rows cannot be replayed from a cache
            return self.query_from_database(statement, parameter, bounds, handler, key, bound_sql);
        }
        match self.local_cache.get(key) {
            Ok(Some(CacheValue::Rows(rows))) => {
                trace!(target: LOG_TARGET, statement = statement.id(), "Local cache hit.");
                self.restore_cached_output_parameters(statement, key, parameter.as_ref(), bound_sql);
                Ok(rows)
            }
            Ok(Some(CacheValue::Placeholder)) => {
                Err(ExecutorError::QueryInProgress(statement.id().to_string()))
            }
            _ => self.query_from_database(statement, parameter, bounds, handler, key, bound_sql),
        }
    }

    fn query_from_database(
        &mut self,
        statement: &MappedStatement,
        parameter: Option<SharedRow>,
        bounds: RowBounds,
        handler: Option<&mut dyn ResultHandler>,
        key: &CacheKey,
        bound_sql: &BoundSql,
    ) -> Result<Arc<Vec<Row>>, ExecutorError> {
        let context = ErrorContext::statement("executing a query", statement.id());

        // mark the key as in flight so re-entrant loads for the same query fail fast
        self.local_cache
            .put(key.clone(), CacheValue::Placeholder)
            .map_err(|e| context.clone().cache(e))?;
        let transaction = match self.transaction.as_mut() {
            Some(transaction) => transaction,
            None => return Err(ExecutorError::Closed),
        };
        let queried = self.driver.do_query(
            transaction.as_mut(),
            statement,
            bound_sql,
            parameter.as_ref(),
            bounds,
            handler,
        );
        // the placeholder comes out on success and failure alike
        if let Err(error) = self.local_cache.remove(key) {
            warn!(
                target: LOG_TARGET,
                %error,
                "Failed to drop the in-flight marker from the local cache."
            );
        }

        let rows = Arc::new(queried.map_err(|e| context.clone().store(e))?);
        self.local_cache
            .put(key.clone(), CacheValue::Rows(rows.clone()))
            .map_err(|e| context.clone().cache(e))?;
        if statement.statement_kind() == StatementKind::Callable {
            if let Some(parameter) = parameter.as_ref() {
                let snapshot = parameter.lock().clone();
                self.local_output_parameter_cache
                    .put(key.clone(), CacheValue::Object(snapshot))
                    .map_err(|e| context.cache(e))?;
            }
        }
        Ok(rows)
    }

    /// On a local cache hit for a callable statement, replays the OUT and
    /// INOUT values captured at execution time onto the live parameter.
    fn restore_cached_output_parameters(
        &self,
        statement: &MappedStatement,
        key: &CacheKey,
        parameter: Option<&SharedRow>,
        bound_sql: &BoundSql,
    ) {
        if statement.statement_kind() != StatementKind::Callable {
            return;
        }
        let (Ok(Some(CacheValue::Object(cached))), Some(parameter)) =
            (self.local_output_parameter_cache.get(key), parameter)
        else {
            return;
        };
        let mut live = parameter.lock();
        for mapping in bound_sql.parameter_mappings() {
            if mapping.mode == ParameterMode::In {
                continue;
            }
            if let Some(value) = cached.get(&mapping.property) {
                live.set(mapping.property.clone(), value.clone());
            }
        }
    }

    fn drain_deferred_loads(&mut self) -> Result<(), ExecutorError> {
        while let Some(load) = self.deferred_loads.pop_front() {
            self.apply_deferred_load(&load)?;
        }
        Ok(())
    }

    fn can_apply(&self, load: &DeferredLoad) -> bool {
        matches!(self.local_cache.get(&load.key), Ok(Some(CacheValue::Rows(_))))
    }

    fn apply_deferred_load(&self, load: &DeferredLoad) -> Result<(), ExecutorError> {
        let rows = match self.local_cache.get(&load.key) {
            Ok(Some(CacheValue::Rows(rows))) => rows,
            _ => Arc::new(Vec::new()),
        };
        let value = extract_scalar(&rows, &load.property)?;
        load.target.lock().set(load.property.clone(), value);
        Ok(())
    }

    fn flush_inner(&mut self, is_rollback: bool) -> Result<Vec<BatchResult>, ExecutorError> {
        if self.closed {
            return Err(ExecutorError::Closed);
        }
        let context = ErrorContext::session("flushing batched statements");
        let transaction = match self.transaction.as_mut() {
            Some(transaction) => transaction,
            None => return Err(ExecutorError::Closed),
        };
        self.driver.do_flush(transaction.as_mut(), is_rollback).map_err(|e| context.store(e))
    }
}

/// An empty result reads as null, a single single-column row reads as its
/// value, anything else has no scalar shape.
fn extract_scalar(rows: &[Row], property: &str) -> Result<Value, ExecutorError> {
    match rows {
        [] => Ok(Value::Null),
        [row] if row.len() == 1 => Ok(row.values().next().cloned().unwrap_or(Value::Null)),
        _ => Err(ExecutorError::DeferredLoadShape { property: property.to_string() }),
    }
}

impl<D: StatementDriver> Executor for BaseExecutor<D> {
    fn query_with_key(
        &mut self,
        statement: &MappedStatement,
        parameter: Option<SharedRow>,
        bounds: RowBounds,
        handler: Option<&mut dyn ResultHandler>,
        key: CacheKey,
        bound_sql: &BoundSql,
    ) -> Result<Arc<Vec<Row>>, ExecutorError> {
        if self.closed {
            return Err(ExecutorError::Closed);
        }
        if self.query_stack == 0 && statement.flush_cache_required() {
            self.clear_local_cache();
        }

        self.query_stack += 1;
        let result = self.lookup_or_query(statement, parameter, bounds, handler, &key, bound_sql);
        self.query_stack -= 1;

        if self.query_stack == 0 {
            if result.is_ok() {
                self.drain_deferred_loads()?;
            } else {
                self.deferred_loads.clear();
            }
            if self.config.local_cache_scope() == LocalCacheScope::Statement {
                self.clear_local_cache();
            }
        }
        result
    }

    fn query_cursor(
        &mut self,
        statement: &MappedStatement,
        parameter: Option<SharedRow>,
        bounds: RowBounds,
    ) -> Result<Cursor, ExecutorError> {
        if self.closed {
            return Err(ExecutorError::Closed);
        }
        let context = ErrorContext::statement("executing a cursor query", statement.id());
        let bound_sql = statement.bound_sql();
        let transaction = match self.transaction.as_mut() {
            Some(transaction) => transaction,
            None => return Err(ExecutorError::Closed),
        };
        let rows = self
            .driver
            .do_query_cursor(transaction.as_mut(), statement, &bound_sql, parameter.as_ref())
            .map_err(|e| context.store(e))?;
        Ok(Cursor::new(rows, bounds))
    }

    fn update(
        &mut self,
        statement: &MappedStatement,
        parameter: Option<SharedRow>,
    ) -> Result<u64, ExecutorError> {
        if self.closed {
            return Err(ExecutorError::Closed);
        }
        let context = ErrorContext::statement("executing an update", statement.id());
        // any write invalidates every locally cached result
        self.clear_local_cache();
        let bound_sql = statement.bound_sql();
        let transaction = match self.transaction.as_mut() {
            Some(transaction) => transaction,
            None => return Err(ExecutorError::Closed),
        };
        self.driver
            .do_update(transaction.as_mut(), statement, &bound_sql, parameter.as_ref())
            .map_err(|e| context.store(e))
    }

    fn flush_statements(&mut self) -> Result<Vec<BatchResult>, ExecutorError> {
        self.flush_inner(false)
    }

    fn commit(&mut self, required: bool) -> Result<(), ExecutorError> {
        if self.closed {
            return Err(ExecutorError::Closed);
        }
        self.clear_local_cache();
        self.flush_inner(false)?;
        if required {
            let context = ErrorContext::session("committing the transaction");
            self.transaction_mut()?.commit().map_err(|e| context.store(e))?;
        }
        Ok(())
    }

    fn rollback(&mut self, required: bool) -> Result<(), ExecutorError> {
        if self.closed {
            return Ok(());
        }
        self.clear_local_cache();
        // discard batch work even if the transaction rollback fails too
        let flushed = self.flush_inner(true).map(|_| ());
        let rolled_back = if required {
            let context = ErrorContext::session("rolling back the transaction");
            self.transaction_mut()?.rollback().map_err(|e| context.store(e))
        } else {
            Ok(())
        };
        flushed.and(rolled_back)
    }

    fn close(&mut self, force_rollback: bool) -> Result<(), ExecutorError> {
        if let Err(error) = self.rollback(force_rollback) {
            warn!(
                target: LOG_TARGET,
                %error,
                "Unexpected error rolling back while closing the executor."
            );
        }
        if let Some(mut transaction) = self.transaction.take() {
            if let Err(error) = transaction.close() {
                warn!(target: LOG_TARGET, %error, "Unexpected error closing the transaction.");
            }
        }
        self.deferred_loads.clear();
        self.local_cache.clear();
        self.local_output_parameter_cache.clear();
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn create_cache_key(
        &self,
        statement: &MappedStatement,
        parameter: Option<&SharedRow>,
        bounds: RowBounds,
        bound_sql: &BoundSql,
    ) -> Result<CacheKey, ExecutorError> {
        if self.closed {
            return Err(ExecutorError::Closed);
        }
        let mut key = CacheKey::new();
        key.update(Value::from(statement.id()));
        key.update(Value::Integer(bounds.offset.min(i64::MAX as usize) as i64));
        key.update(Value::Integer(bounds.limit.min(i64::MAX as usize) as i64));
        key.update(Value::from(bound_sql.sql()));
        key.update_all(bind_shared(bound_sql, parameter));
        if let Some(environment_id) = self.config.environment_id() {
            key.update(Value::from(environment_id));
        }
        Ok(key)
    }

    fn is_cached(&self, _statement: &MappedStatement, key: &CacheKey) -> bool {
        matches!(self.local_cache.get(key), Ok(Some(_)))
    }

    fn defer_load(
        &mut self,
        statement: &MappedStatement,
        target: SharedRow,
        property: &str,
        key: CacheKey,
    ) -> Result<(), ExecutorError> {
        if self.closed {
            return Err(ExecutorError::Closed);
        }
        let load = DeferredLoad { target, property: property.to_string(), key };
        if self.can_apply(&load) {
            self.apply_deferred_load(&load)
        } else {
            trace!(
                target: LOG_TARGET,
                statement = statement.id(),
                property,
                "Deferring nested load until the outermost query completes."
            );
            self.deferred_loads.push_back(load);
            Ok(())
        }
    }

    fn clear_local_cache(&mut self) {
        if !self.closed {
            self.local_cache.clear();
            self.local_output_parameter_cache.clear();
        }
    }
}
