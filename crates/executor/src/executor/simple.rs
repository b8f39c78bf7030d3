use std::sync::Arc;

use strata_types::{Row, RowBounds, SharedRow};

use crate::config::Configuration;
use crate::executor::driver::{effective_timeout, execute_query, execute_update};
use crate::executor::{BaseExecutor, BatchResult, ResultHandler, StatementDriver};
use crate::mapping::{BoundSql, MappedStatement};
use crate::store::{StoreError, Transaction};

/// Prepares a fresh statement for every execution and drops it as soon as
/// the execution finishes.
pub type SimpleExecutor = BaseExecutor<SimpleDriver>;

impl SimpleExecutor {
    pub fn new(config: Arc<Configuration>, transaction: Box<dyn Transaction>) -> Self {
        BaseExecutor::with_driver(config, transaction, SimpleDriver)
    }
}

#[derive(Debug, Default)]
pub struct SimpleDriver;

impl StatementDriver for SimpleDriver {
    fn do_update(
        &mut self,
        transaction: &mut dyn Transaction,
        statement: &MappedStatement,
        bound_sql: &BoundSql,
        parameter: Option<&SharedRow>,
    ) -> Result<u64, StoreError> {
        let timeout = effective_timeout(statement, transaction);
        let mut prepared = transaction.connection()?.prepare(bound_sql.sql())?;
        prepared.set_timeout(timeout);
        execute_update(prepared.as_mut(), statement, bound_sql, parameter)
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
        _is_rollback: bool,
    ) -> Result<Vec<BatchResult>, StoreError> {
        Ok(Vec::new())
    }
}
