//! Static descriptions of executable statements.
//!
//! A [`MappedStatement`] is the precompiled form of one named SQL command:
//! its text, its parameter bindings, and its caching policy. Statements are
//! registered once in the [`Configuration`](crate::config::Configuration)
//! and shared read-only across sessions.

use std::sync::Arc;
use std::time::Duration;

use strata_cache::Cache;
use strata_types::{Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Prepared,
    Callable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterMode {
    In,
    Out,
    InOut,
}

/// One placeholder in a statement, bound to a parameter-object property.
#[derive(Debug, Clone)]
pub struct ParameterMapping {
    pub property: String,
    pub mode: ParameterMode,
}

impl ParameterMapping {
    pub fn new(property: impl Into<String>, mode: ParameterMode) -> Self {
        Self { property: property.into(), mode }
    }

    pub fn input(property: impl Into<String>) -> Self {
        Self::new(property, ParameterMode::In)
    }
}

#[derive(Debug)]
pub struct MappedStatement {
    id: String,
    sql: String,
    command_kind: CommandKind,
    statement_kind: StatementKind,
    parameter_mappings: Vec<ParameterMapping>,
    flush_cache_required: bool,
    use_cache: bool,
    timeout: Option<Duration>,
    cache: Option<Arc<dyn Cache>>,
}

impl MappedStatement {
    pub fn builder(id: impl Into<String>, sql: impl Into<String>) -> MappedStatementBuilder {
        MappedStatementBuilder::new(id, sql)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn command_kind(&self) -> CommandKind {
        self.command_kind
    }

    pub fn statement_kind(&self) -> StatementKind {
        self.statement_kind
    }

    pub fn parameter_mappings(&self) -> &[ParameterMapping] {
        &self.parameter_mappings
    }

    /// Whether executing this statement evicts cached results first.
    pub fn flush_cache_required(&self) -> bool {
        self.flush_cache_required
    }

    /// Whether results of this statement go through the second-level cache.
    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The second-level cache this statement belongs to, if any.
    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        self.cache.as_ref()
    }

    /// Resolves the statement text for one execution. Parameter values never
    /// change the text here, so this is a plain snapshot of the mapping.
    pub fn bound_sql(&self) -> BoundSql {
        BoundSql {
            sql: self.sql.clone(),
            parameter_mappings: self.parameter_mappings.clone(),
            additional_parameters: Row::new(),
        }
    }
}

/// The resolved statement text plus its bindings for one execution.
#[derive(Debug)]
pub struct BoundSql {
    sql: String,
    parameter_mappings: Vec<ParameterMapping>,
    additional_parameters: Row,
}

impl BoundSql {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameter_mappings(&self) -> &[ParameterMapping] {
        &self.parameter_mappings
    }

    /// Overrides one binding for this execution only, shadowing the value
    /// carried by the parameter object.
    pub fn set_additional_parameter(&mut self, name: impl Into<String>, value: Value) {
        self.additional_parameters.set(name, value);
    }

    pub fn additional_parameter(&self, name: &str) -> Option<&Value> {
        self.additional_parameters.get(name)
    }

    pub fn has_additional_parameter(&self, name: &str) -> bool {
        self.additional_parameters.contains(name)
    }
}

/// Resolves the positional argument list for one execution. Pure OUT
/// placeholders carry no input and are skipped; missing properties bind as
/// [`Value::Null`].
pub fn bind_arguments(bound_sql: &BoundSql, parameter: Option<&Row>) -> Vec<Value> {
    let mut args = Vec::with_capacity(bound_sql.parameter_mappings.len());
    for mapping in &bound_sql.parameter_mappings {
        if mapping.mode == ParameterMode::Out {
            continue;
        }
        let value = bound_sql
            .additional_parameter(&mapping.property)
            .or_else(|| parameter.and_then(|row| row.get(&mapping.property)))
            .cloned()
            .unwrap_or(Value::Null);
        args.push(value);
    }
    args
}

/// Properties that receive values back from the store after a call.
pub fn out_properties(mappings: &[ParameterMapping]) -> Vec<String> {
    mappings
        .iter()
        .filter(|mapping| mapping.mode != ParameterMode::In)
        .map(|mapping| mapping.property.clone())
        .collect()
}

pub fn has_out_parameters(mappings: &[ParameterMapping]) -> bool {
    mappings.iter().any(|mapping| mapping.mode != ParameterMode::In)
}

pub struct MappedStatementBuilder {
    id: String,
    sql: String,
    command_kind: CommandKind,
    statement_kind: StatementKind,
    parameter_mappings: Vec<ParameterMapping>,
    flush_cache: Option<bool>,
    use_cache: Option<bool>,
    timeout: Option<Duration>,
    cache: Option<Arc<dyn Cache>>,
}

impl MappedStatementBuilder {
    pub fn new(id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sql: sql.into(),
            command_kind: CommandKind::Select,
            statement_kind: StatementKind::Prepared,
            parameter_mappings: Vec::new(),
            flush_cache: None,
            use_cache: None,
            timeout: None,
            cache: None,
        }
    }

    pub fn command(mut self, kind: CommandKind) -> Self {
        self.command_kind = kind;
        self
    }

    pub fn statement_kind(mut self, kind: StatementKind) -> Self {
        self.statement_kind = kind;
        self
    }

    pub fn parameter(mut self, mapping: ParameterMapping) -> Self {
        self.parameter_mappings.push(mapping);
        self
    }

    pub fn parameters(mut self, mappings: impl IntoIterator<Item = ParameterMapping>) -> Self {
        self.parameter_mappings.extend(mappings);
        self
    }

    pub fn flush_cache(mut self, flush: bool) -> Self {
        self.flush_cache = Some(flush);
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = Some(use_cache);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Defaults the cache policy from the command kind: selects are served
    /// from cache, writes flush it.
    pub fn build(self) -> MappedStatement {
        let is_select = self.command_kind == CommandKind::Select;
        MappedStatement {
            id: self.id,
            sql: self.sql,
            command_kind: self.command_kind,
            statement_kind: self.statement_kind,
            parameter_mappings: self.parameter_mappings,
            flush_cache_required: self.flush_cache.unwrap_or(!is_select),
            use_cache: self.use_cache.unwrap_or(is_select),
            timeout: self.timeout,
            cache: self.cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_policy_defaults_follow_command_kind() {
        let select = MappedStatement::builder("users.find", "SELECT * FROM users").build();
        assert!(!select.flush_cache_required());
        assert!(select.use_cache());

        let update = MappedStatement::builder("users.touch", "UPDATE users SET seen = ?")
            .command(CommandKind::Update)
            .build();
        assert!(update.flush_cache_required());
        assert!(!update.use_cache());
    }

    #[test]
    fn test_bind_arguments_skips_out_and_defaults_missing_to_null() {
        let statement = MappedStatement::builder("proc.run", "CALL run(?, ?, ?)")
            .statement_kind(StatementKind::Callable)
            .parameters([
                ParameterMapping::input("name"),
                ParameterMapping::new("result", ParameterMode::Out),
                ParameterMapping::input("missing"),
            ])
            .build();

        let parameter: Row = [("name".to_string(), Value::from("ada"))].into_iter().collect();
        let args = bind_arguments(&statement.bound_sql(), Some(&parameter));
        assert_eq!(args, vec![Value::from("ada"), Value::Null]);
    }

    #[test]
    fn test_additional_parameters_shadow_the_parameter_object() {
        let statement = MappedStatement::builder("users.page", "SELECT * FROM users LIMIT ?")
            .parameter(ParameterMapping::input("limit"))
            .build();

        let parameter: Row = [("limit".to_string(), Value::Integer(10))].into_iter().collect();
        let mut bound_sql = statement.bound_sql();
        bound_sql.set_additional_parameter("limit", Value::Integer(3));

        let args = bind_arguments(&bound_sql, Some(&parameter));
        assert_eq!(args, vec![Value::Integer(3)]);
    }

    #[test]
    fn test_out_properties_include_inout() {
        let mappings = vec![
            ParameterMapping::input("a"),
            ParameterMapping::new("b", ParameterMode::Out),
            ParameterMapping::new("c", ParameterMode::InOut),
        ];
        assert!(has_out_parameters(&mappings));
        assert_eq!(out_properties(&mappings), vec!["b".to_string(), "c".to_string()]);
    }
}
