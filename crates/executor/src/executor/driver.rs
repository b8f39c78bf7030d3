use std::time::Duration;

use strata_types::{Row, RowBounds, SharedRow, Value};

use crate::executor::{BatchResult, ResultHandler};
use crate::mapping::{bind_arguments, out_properties, BoundSql, MappedStatement, StatementKind};
use crate::store::{Statement, StoreError, Transaction};

/// Statement-level strategy plugged into [`BaseExecutor`](super::BaseExecutor).
///
/// The base executor handles caching, deferred loads, and transaction
/// bookkeeping; drivers only decide how statements are prepared, reused,
/// and executed.
pub trait StatementDriver: Send {
    fn do_update(
        &mut self,
        transaction: &mut dyn Transaction,
        statement: &MappedStatement,
        bound_sql: &BoundSql,
        parameter: Option<&SharedRow>,
    ) -> Result<u64, StoreError>;

    fn do_query(
        &mut self,
        transaction: &mut dyn Transaction,
        statement: &MappedStatement,
        bound_sql: &BoundSql,
        parameter: Option<&SharedRow>,
        bounds: RowBounds,
        handler: Option<&mut dyn ResultHandler>,
    ) -> Result<Vec<Row>, StoreError>;

    /// Like [`StatementDriver::do_query`] but without bounds or handlers;
    /// the caller wraps the rows in a cursor.
    fn do_query_cursor(
        &mut self,
        transaction: &mut dyn Transaction,
        statement: &MappedStatement,
        bound_sql: &BoundSql,
        parameter: Option<&SharedRow>,
    ) -> Result<Vec<Row>, StoreError>;

    /// Executes queued batch work, or discards it when `is_rollback`.
    /// Non-batching drivers return an empty result.
    fn do_flush(
        &mut self,
        transaction: &mut dyn Transaction,
        is_rollback: bool,
    ) -> Result<Vec<BatchResult>, StoreError>;
}

/// Binds the positional arguments while holding the parameter lock only for
/// the duration of the snapshot.
pub(crate) fn bind_shared(bound_sql: &BoundSql, parameter: Option<&SharedRow>) -> Vec<Value> {
    let guard = parameter.map(|row| row.lock());
    bind_arguments(bound_sql, guard.as_deref())
}

/// The smaller of the statement timeout and the transaction timeout.
pub(crate) fn effective_timeout(
    statement: &MappedStatement,
    transaction: &dyn Transaction,
) -> Option<Duration> {
    match (statement.timeout(), transaction.timeout()) {
        (Some(own), Some(outer)) => Some(own.min(outer)),
        (own, outer) => own.or(outer),
    }
}

/// Runs one query on a prepared statement: binds arguments, dispatches on
/// the statement kind, writes OUT parameters back, and applies bounds. With
/// a handler the rows are streamed out and the returned list is empty.
pub(crate) fn execute_query(
    prepared: &mut dyn Statement,
    statement: &MappedStatement,
    bound_sql: &BoundSql,
    parameter: Option<&SharedRow>,
    bounds: RowBounds,
    handler: Option<&mut dyn ResultHandler>,
) -> Result<Vec<Row>, StoreError> {
    let args = bind_shared(bound_sql, parameter);
    let rows = match statement.statement_kind() {
        StatementKind::Prepared => prepared.query(&args)?,
        StatementKind::Callable => {
            let outs = out_properties(bound_sql.parameter_mappings());
            let (rows, out_values) = prepared.call(&args, &outs)?;
            write_back_out_values(parameter, out_values);
            rows
        }
    };
    let rows = bounds.apply(rows);
    match handler {
        Some(handler) => {
            for row in &rows {
                handler.handle_row(row);
            }
            Ok(Vec::new())
        }
        None => Ok(rows),
    }
}

/// Runs one write on a prepared statement. Callable writes report no row
/// count; their effect is carried by the OUT parameters.
pub(crate) fn execute_update(
    prepared: &mut dyn Statement,
    statement: &MappedStatement,
    bound_sql: &BoundSql,
    parameter: Option<&SharedRow>,
) -> Result<u64, StoreError> {
    let args = bind_shared(bound_sql, parameter);
    match statement.statement_kind() {
        StatementKind::Prepared => prepared.update(&args),
        StatementKind::Callable => {
            let outs = out_properties(bound_sql.parameter_mappings());
            let (_, out_values) = prepared.call(&args, &outs)?;
            write_back_out_values(parameter, out_values);
            Ok(0)
        }
    }
}

fn write_back_out_values(parameter: Option<&SharedRow>, out_values: Vec<(String, Value)>) {
    if let Some(parameter) = parameter {
        let mut row = parameter.lock();
        for (property, value) in out_values {
            row.set(property, value);
        }
    }
}
