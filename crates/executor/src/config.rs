use std::collections::HashMap;
use std::sync::Arc;

use strata_cache::Cache;

use crate::error::ExecutorError;
use crate::executor::{
    BatchExecutor, CachingExecutor, Executor, ReuseExecutor, SimpleExecutor,
};
use crate::mapping::MappedStatement;
use crate::store::Transaction;

/// Where locally cached query results live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalCacheScope {
    /// Results survive across queries until a write, commit, or rollback.
    #[default]
    Session,
    /// Results are dropped as soon as the outermost query returns.
    Statement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorType {
    #[default]
    Simple,
    Reuse,
    Batch,
}

/// Shared registry of mapped statements, named caches, and session
/// defaults. Built once at startup and shared read-only by every session.
#[derive(Debug, Default)]
pub struct Configuration {
    statements: HashMap<String, Arc<MappedStatement>>,
    caches: HashMap<String, Arc<dyn Cache>>,
    local_cache_scope: LocalCacheScope,
    cache_enabled: bool,
    environment_id: Option<String>,
    default_executor_type: ExecutorType,
}

impl Configuration {
    pub fn new() -> Self {
        Self { cache_enabled: true, ..Self::default() }
    }

    pub fn add_statement(&mut self, statement: MappedStatement) {
        self.statements.insert(statement.id().to_string(), Arc::new(statement));
    }

    pub fn mapped_statement(&self, id: &str) -> Result<Arc<MappedStatement>, ExecutorError> {
        self.statements
            .get(id)
            .cloned()
            .ok_or_else(|| ExecutorError::UnknownStatement(id.to_string()))
    }

    pub fn add_cache(&mut self, cache: Arc<dyn Cache>) {
        self.caches.insert(cache.id().to_string(), cache);
    }

    pub fn cache(&self, id: &str) -> Option<Arc<dyn Cache>> {
        self.caches.get(id).cloned()
    }

    pub fn local_cache_scope(&self) -> LocalCacheScope {
        self.local_cache_scope
    }

    pub fn set_local_cache_scope(&mut self, scope: LocalCacheScope) {
        self.local_cache_scope = scope;
    }

    /// Master switch for the second-level cache. Statement-level `use_cache`
    /// settings have no effect while this is off.
    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
    }

    pub fn environment_id(&self) -> Option<&str> {
        self.environment_id.as_deref()
    }

    pub fn set_environment_id(&mut self, id: impl Into<String>) {
        self.environment_id = Some(id.into());
    }

    pub fn default_executor_type(&self) -> ExecutorType {
        self.default_executor_type
    }

    pub fn set_default_executor_type(&mut self, executor_type: ExecutorType) {
        self.default_executor_type = executor_type;
    }

    /// Builds an executor for one session over the given transaction,
    /// wrapped with second-level caching when the cache is enabled.
    pub fn build_executor(
        self: &Arc<Self>,
        transaction: Box<dyn Transaction>,
        executor_type: Option<ExecutorType>,
    ) -> Box<dyn Executor> {
        let executor_type = executor_type.unwrap_or(self.default_executor_type);
        let executor: Box<dyn Executor> = match executor_type {
            ExecutorType::Simple => Box::new(SimpleExecutor::new(self.clone(), transaction)),
            ExecutorType::Reuse => Box::new(ReuseExecutor::new(self.clone(), transaction)),
            ExecutorType::Batch => Box::new(BatchExecutor::new(self.clone(), transaction)),
        };
        if self.cache_enabled {
            Box::new(CachingExecutor::new(executor))
        } else {
            executor
        }
    }
}
