use std::fmt;
use std::sync::Arc;

use strata_types::{Row, RowBounds, SharedRow};

use crate::config::Configuration;
use crate::executor::driver::{bind_shared, effective_timeout, execute_query};
use crate::executor::{BaseExecutor, BatchResult, ResultHandler, StatementDriver};
use crate::mapping::{BoundSql, MappedStatement};
use crate::store::{Statement, StoreError, Transaction};

/// Queues writes as store-level batches and runs them on flush. Consecutive
/// updates for the same statement and SQL text share one batch; each update
/// reports a count of 0 until the flush delivers the real numbers.
pub type BatchExecutor = BaseExecutor<BatchDriver>;

impl BatchExecutor {
    pub fn new(config: Arc<Configuration>, transaction: Box<dyn Transaction>) -> Self {
        BaseExecutor::with_driver(config, transaction, BatchDriver::default())
    }
}

#[derive(Default)]
pub struct BatchDriver {
    statements: Vec<Box<dyn Statement>>,
    results: Vec<BatchResult>,
    current_sql: Option<String>,
    current_statement_id: Option<String>,
}

impl BatchDriver {
    fn reset(&mut self) {
        self.statements.clear();
        self.results.clear();
        self.current_sql = None;
        self.current_statement_id = None;
    }

    fn run_batches(&mut self) -> Result<Vec<BatchResult>, StoreError> {
        let statements = std::mem::take(&mut self.statements);
        let pending = std::mem::take(&mut self.results);
        self.current_sql = None;
        self.current_statement_id = None;

        let mut results = Vec::with_capacity(pending.len());
        for (mut prepared, mut result) in statements.into_iter().zip(pending) {
            let counts = prepared.execute_batch().map_err(|source| StoreError::Batch {
                statement_id: result.statement_id.clone(),
                source: Box::new(source),
            })?;
            result.update_counts = counts;
            results.push(result);
        }
        Ok(results)
    }
}

impl fmt::Debug for BatchDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchDriver")
            .field("pending_batches", &self.results.len())
            .field("current_sql", &self.current_sql)
            .finish()
    }
}

impl StatementDriver for BatchDriver {
    fn do_update(
        &mut self,
        transaction: &mut dyn Transaction,
        statement: &MappedStatement,
        bound_sql: &BoundSql,
        parameter: Option<&SharedRow>,
    ) -> Result<u64, StoreError> {
        let sql = bound_sql.sql();
        let args = bind_shared(bound_sql, parameter);

        let reusable = self.current_sql.as_deref() == Some(sql)
            && self.current_statement_id.as_deref() == Some(statement.id());
        if !reusable {
            let timeout = effective_timeout(statement, transaction);
            let mut prepared = transaction.connection()?.prepare(sql)?;
            prepared.set_timeout(timeout);
            self.statements.push(prepared);
            self.results.push(BatchResult::new(statement.id(), sql));
            self.current_sql = Some(sql.to_string());
            self.current_statement_id = Some(statement.id().to_string());
        }
        if let (Some(prepared), Some(result)) = (self.statements.last_mut(), self.results.last_mut())
        {
            prepared.add_batch(&args)?;
            result.parameter_sets.push(args);
        }
        // real counts arrive with the flush
        Ok(0)
    }

    fn do_query(
        &mut self,
        transaction: &mut dyn Transaction,
        statement: &MappedStatement,
        bound_sql: &BoundSql,
        parameter: Option<&SharedRow>,
        bounds: RowBounds,
        handler: Option<&mut dyn ResultHandler>,
    ) -> Result<Vec<Row>, StoreError> {
        // queued writes must reach the store before the query runs
        self.run_batches()?;
        let timeout = effective_timeout(statement, transaction);
        let mut prepared = transaction.connection()?.prepare(bound_sql.sql())?;
        prepared.set_timeout(timeout);
        execute_query(prepared.as_mut(), statement, bound_sql, parameter, bounds, handler)
    }

    fn do_query_cursor(
        &mut self,
        transaction: &mut dyn Transaction,
        statement: &MappedStatement,
        bound_sql: &BoundSql,
        parameter: Option<&SharedRow>,
    ) -> Result<Vec<Row>, StoreError> {
        self.do_query(transaction, statement, bound_sql, parameter, RowBounds::default(), None)
    }

    fn do_flush(
        &mut self,
        _transaction: &mut dyn Transaction,
        is_rollback: bool,
    ) -> Result<Vec<BatchResult>, StoreError> {
        if is_rollback {
            self.reset();
            return Ok(Vec::new());
        }
        self.run_batches()
    }
}
