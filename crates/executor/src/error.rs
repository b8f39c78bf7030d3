use std::fmt;

use strata_cache::CacheError;

use crate::store::StoreError;

/// Describes what the session was doing when a lower layer failed, so a
/// store error surfaces with the statement it belongs to.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    activity: &'static str,
    statement_id: Option<String>,
}

impl ErrorContext {
    pub fn statement(activity: &'static str, statement_id: impl Into<String>) -> Self {
        Self { activity, statement_id: Some(statement_id.into()) }
    }

    pub fn session(activity: &'static str) -> Self {
        Self { activity, statement_id: None }
    }

    pub fn store(self, source: StoreError) -> ExecutorError {
        ExecutorError::Store { context: self, source }
    }

    pub fn cache(self, source: CacheError) -> ExecutorError {
        ExecutorError::Cache { context: self, source }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "while {}", self.activity)?;
        if let Some(id) = &self.statement_id {
            write!(f, " for statement '{id}'")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("executor is closed")]
    Closed,
    #[error("unknown mapped statement '{0}'")]
    UnknownStatement(String),
    #[error(
        "statement '{0}' maps OUT parameters and cannot use the second-level cache; \
         disable cache use for it"
    )]
    OutParamsNotCacheable(String),
    #[error("a query for statement '{0}' with the same cache key is already in flight")]
    QueryInProgress(String),
    #[error(
        "deferred load for property '{property}' expects an empty result or a single \
         single-column row"
    )]
    DeferredLoadShape { property: String },
    #[error("store failure {context}: {source}")]
    Store {
        context: ErrorContext,
        #[source]
        source: StoreError,
    },
    #[error("cache failure {context}: {source}")]
    Cache {
        context: ErrorContext,
        #[source]
        source: CacheError,
    },
}
