//! Storage abstraction the executors run against.
//!
//! The executor stack never talks to a concrete database. It drives these
//! three traits, which mirror the lifecycle of a transactional connection:
//! a [`Transaction`] hands out its [`Connection`], the connection prepares
//! [`Statement`]s, and statements execute with positional [`Value`]
//! arguments. Implementations decide what "database" means.

use std::time::Duration;

use strata_types::{Row, Value};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connection failure: {0}")]
    Connection(String),
    #[error("statement failure: {0}")]
    Statement(String),
    #[error("transaction failure: {0}")]
    Transaction(String),
    #[error("batch for statement '{statement_id}' failed: {source}")]
    Batch {
        statement_id: String,
        #[source]
        source: Box<StoreError>,
    },
    #[error("operation not supported by this store: {0}")]
    Unsupported(&'static str),
}

/// A unit of work against the store. Owns the connection for its lifetime
/// and decides what commit and rollback mean.
pub trait Transaction: Send {
    /// The live connection. Called lazily so a session that only reads
    /// from cache never touches the store.
    fn connection(&mut self) -> Result<&mut dyn Connection, StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;

    fn close(&mut self) -> Result<(), StoreError>;

    /// Transaction-level timeout, combined with per-statement timeouts by
    /// taking the smaller of the two.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

pub trait Connection: Send {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Statement>, StoreError>;
}

pub trait Statement: Send {
    /// Executes a query and materializes every row.
    fn query(&mut self, args: &[Value]) -> Result<Vec<Row>, StoreError>;

    /// Executes a write and returns the affected-row count.
    fn update(&mut self, args: &[Value]) -> Result<u64, StoreError>;

    /// Invokes a stored procedure. Returns the result rows plus the values
    /// of the requested OUT parameters, in no particular order.
    fn call(
        &mut self,
        _args: &[Value],
        _out_properties: &[String],
    ) -> Result<(Vec<Row>, Vec<(String, Value)>), StoreError> {
        Err(StoreError::Unsupported("callable statements"))
    }

    /// Queues the arguments for a later [`Statement::execute_batch`].
    fn add_batch(&mut self, _args: &[Value]) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("batched statements"))
    }

    /// Executes every queued argument set and returns one count per set.
    fn execute_batch(&mut self) -> Result<Vec<u64>, StoreError> {
        Err(StoreError::Unsupported("batched statements"))
    }

    fn set_timeout(&mut self, _timeout: Option<Duration>) {}
}
