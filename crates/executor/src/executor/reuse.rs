use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use strata_types::{Row, RowBounds, SharedRow};

use crate::config::Configuration;
use crate::executor::driver::{effective_timeout, execute_query, execute_update};
use crate::executor::{BaseExecutor, BatchResult, ResultHandler, StatementDriver};
use crate::mapping::{BoundSql, MappedStatement};
use crate::store::{Statement, StoreError, Transaction};

/// Keeps prepared statements keyed by SQL text and reuses them across
/// executions. The pool empties on flush, commit, and rollback.
pub type ReuseExecutor = BaseExecutor<ReuseDriver>;

impl ReuseExecutor {
    pub fn new(config: Arc<Configuration>, transaction: Box<dyn Transaction>) -> Self {
        BaseExecutor::with_driver(config, transaction, ReuseDriver::default())
    }
}

#[derive(Default)]
pub struct ReuseDriver {
    statements: HashMap<String, Box<dyn Statement>>,
}

impl ReuseDriver {
    fn prepared<'a>(
        &'a mut self,
        transaction: &mut dyn Transaction,
        statement: &MappedStatement,
        sql: &str,
    ) -> Result<&'a mut (dyn Statement + 'static), StoreError> {
        let timeout = effective_timeout(statement, transaction);
        let prepared = match self.statements.entry(sql.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(transaction.connection()?.prepare(sql)?),
        };
        prepared.set_timeout(timeout);
        Ok(prepared.as_mut())
    }
}

impl fmt::Debug for ReuseDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReuseDriver").field("statements", &self.statements.len()).finish()
    }
}

impl StatementDriver for ReuseDriver {
    fn do_update(
        &mut self,
        transaction: &mut dyn Transaction,
        statement: &MappedStatement,
        bound_sql: &BoundSql,
        parameter: Option<&SharedRow>,
    ) -> Result<u64, StoreError> {
        let prepared = self.prepared(transaction, statement, bound_sql.sql())?;
        execute_update(prepared, statement, bound_sql, parameter)
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
        let prepared = self.prepared(transaction, statement, bound_sql.sql())?;
        execute_query(prepared, statement, bound_sql, parameter, bounds, handler)
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

    /// Drops every pooled statement. There is no batch work to run, so
    /// rollback and flush behave identically.
    fn do_flush(
        &mut self,
        _transaction: &mut dyn Transaction,
        _is_rollback: bool,
    ) -> Result<Vec<BatchResult>, StoreError> {
        self.statements.clear();
        Ok(Vec::new())
    }
}
