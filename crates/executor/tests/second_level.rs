//! Shared (second-level) caching across sessions through the caching
//! executor.

use std::sync::Arc;

use strata_cache::{Cache, CacheBuilder, EvictionPolicy};
use strata_executor::mapping::{
    CommandKind, MappedStatement, ParameterMapping, ParameterMode, StatementKind,
};
use strata_executor::test_utils::ScriptedStore;
use strata_executor::{Configuration, Executor, ExecutorError};
use strata_types::{shared_row, Row, RowBounds, Value};

const FIND_SQL: &str = "SELECT id, title FROM posts WHERE id = ?";
const TOUCH_SQL: &str = "UPDATE posts SET edited = 1 WHERE id = ?";
const PROC_SQL: &str = "CALL post_stats(?, ?)";

fn post_row(id: i64, title: &str) -> Row {
    [("id".to_string(), Value::Integer(id)), ("title".to_string(), Value::from(title))]
        .into_iter()
        .collect()
}

fn shared_cache() -> Arc<dyn Cache> {
    CacheBuilder::new("posts").eviction(EvictionPolicy::Lru).size(64).build()
}

fn config_with_cache(cache: Arc<dyn Cache>) -> Arc<Configuration> {
    let mut config = Configuration::new();
    config.add_cache(cache.clone());
    config.add_statement(
        MappedStatement::builder("posts.find", FIND_SQL)
            .parameter(ParameterMapping::input("id"))
            .cache(cache.clone())
            .build(),
    );
    config.add_statement(
        MappedStatement::builder("posts.touch", TOUCH_SQL)
            .command(CommandKind::Update)
            .parameter(ParameterMapping::input("id"))
            .cache(cache.clone())
            .build(),
    );
    config.add_statement(
        MappedStatement::builder("posts.stats", PROC_SQL)
            .statement_kind(StatementKind::Callable)
            .parameters([
                ParameterMapping::input("id"),
                ParameterMapping::new("views", ParameterMode::Out),
            ])
            .cache(cache)
            .build(),
    );
    Arc::new(config)
}

fn find_post(executor: &mut dyn Executor, config: &Configuration, id: i64) -> Arc<Vec<Row>> {
    let statement = config.mapped_statement("posts.find").unwrap();
    let parameter = shared_row([("id".to_string(), Value::Integer(id))].into_iter().collect());
    executor.query(&statement, Some(parameter), RowBounds::default(), None).unwrap()
}

fn touch_post(executor: &mut dyn Executor, config: &Configuration, id: i64) {
    let statement = config.mapped_statement("posts.touch").unwrap();
    let parameter = shared_row([("id".to_string(), Value::Integer(id))].into_iter().collect());
    executor.update(&statement, Some(parameter)).unwrap();
}

#[test]
fn test_results_become_visible_to_other_sessions_only_after_commit() -> anyhow::Result<()> {
    let store = ScriptedStore::new();
    store.script_rows(FIND_SQL, vec![post_row(1, "hello")]);
    let config = config_with_cache(shared_cache());

    let mut writer = config.build_executor(store.transaction(), None);
    find_post(writer.as_mut(), &config, 1);
    assert_eq!(store.query_count(FIND_SQL), 1);

    // uncommitted: a second session still has to hit the store
    let mut reader = config.build_executor(store.transaction(), None);
    find_post(reader.as_mut(), &config, 1);
    assert_eq!(store.query_count(FIND_SQL), 2);

    writer.commit(true)?;

    let mut late_reader = config.build_executor(store.transaction(), None);
    find_post(late_reader.as_mut(), &config, 1);
    assert_eq!(store.query_count(FIND_SQL), 2);
    Ok(())
}

#[test]
fn test_rolled_back_session_publishes_nothing() -> anyhow::Result<()> {
    let store = ScriptedStore::new();
    store.script_rows(FIND_SQL, vec![post_row(1, "hello")]);
    let config = config_with_cache(shared_cache());

    let mut writer = config.build_executor(store.transaction(), None);
    find_post(writer.as_mut(), &config, 1);
    writer.rollback(true)?;

    let mut reader = config.build_executor(store.transaction(), None);
    find_post(reader.as_mut(), &config, 1);
    assert_eq!(store.query_count(FIND_SQL), 2);
    Ok(())
}

#[test]
fn test_committed_write_clears_the_shared_cache() {
    let store = ScriptedStore::new();
    store.script_rows(FIND_SQL, vec![post_row(1, "hello")]);
    let config = config_with_cache(shared_cache());

    let mut seeder = config.build_executor(store.transaction(), None);
    find_post(seeder.as_mut(), &config, 1);
    seeder.commit(true).unwrap();

    let mut writer = config.build_executor(store.transaction(), None);
    touch_post(writer.as_mut(), &config, 1);
    writer.commit(true).unwrap();

    let mut reader = config.build_executor(store.transaction(), None);
    find_post(reader.as_mut(), &config, 1);
    assert_eq!(store.query_count(FIND_SQL), 2);
}

#[test]
fn test_uncommitted_write_still_evicts_for_the_writing_session_only() {
    let store = ScriptedStore::new();
    store.script_rows(FIND_SQL, vec![post_row(1, "hello")]);
    let cache = shared_cache();
    let config = config_with_cache(cache.clone());

    let mut seeder = config.build_executor(store.transaction(), None);
    find_post(seeder.as_mut(), &config, 1);
    seeder.commit(true).unwrap();
    assert_eq!(cache.size(), 1);

    let mut writer = config.build_executor(store.transaction(), None);
    touch_post(writer.as_mut(), &config, 1);
    // the committed entry is still served to other sessions
    let mut reader = config.build_executor(store.transaction(), None);
    find_post(reader.as_mut(), &config, 1);
    assert_eq!(store.query_count(FIND_SQL), 1);
    // but the writer itself no longer reads it
    find_post(writer.as_mut(), &config, 1);
    assert_eq!(store.query_count(FIND_SQL), 2);
}

#[test]
fn test_close_without_force_publishes_buffered_entries() {
    let store = ScriptedStore::new();
    store.script_rows(FIND_SQL, vec![post_row(1, "hello")]);
    let config = config_with_cache(shared_cache());

    let mut writer = config.build_executor(store.transaction(), None);
    find_post(writer.as_mut(), &config, 1);
    writer.close(false).unwrap();

    let mut reader = config.build_executor(store.transaction(), None);
    find_post(reader.as_mut(), &config, 1);
    assert_eq!(store.query_count(FIND_SQL), 1);
}

#[test]
fn test_forced_close_abandons_buffered_entries() {
    let store = ScriptedStore::new();
    store.script_rows(FIND_SQL, vec![post_row(1, "hello")]);
    let config = config_with_cache(shared_cache());

    let mut writer = config.build_executor(store.transaction(), None);
    find_post(writer.as_mut(), &config, 1);
    writer.close(true).unwrap();

    let mut reader = config.build_executor(store.transaction(), None);
    find_post(reader.as_mut(), &config, 1);
    assert_eq!(store.query_count(FIND_SQL), 2);
}

#[test]
fn test_out_parameters_cannot_go_through_the_shared_cache() {
    let store = ScriptedStore::new();
    let config = config_with_cache(shared_cache());

    let mut executor = config.build_executor(store.transaction(), None);
    let statement = config.mapped_statement("posts.stats").unwrap();
    let parameter = shared_row([("id".to_string(), Value::Integer(1))].into_iter().collect());
    let error = executor
        .query(&statement, Some(parameter), RowBounds::default(), None)
        .unwrap_err();
    assert!(matches!(error, ExecutorError::OutParamsNotCacheable(id) if id == "posts.stats"));
}

#[test]
fn test_statements_without_a_cache_skip_the_shared_tier() {
    let store = ScriptedStore::new();
    store.script_rows(FIND_SQL, vec![post_row(1, "hello")]);
    let mut config = Configuration::new();
    config.add_statement(
        MappedStatement::builder("posts.find", FIND_SQL)
            .parameter(ParameterMapping::input("id"))
            .build(),
    );
    let config = Arc::new(config);

    let mut first = config.build_executor(store.transaction(), None);
    find_post(first.as_mut(), &config, 1);
    first.commit(true).unwrap();

    let mut second = config.build_executor(store.transaction(), None);
    find_post(second.as_mut(), &config, 1);
    assert_eq!(store.query_count(FIND_SQL), 2);
}

#[test]
fn test_disabling_the_cache_globally_builds_a_plain_executor() {
    let store = ScriptedStore::new();
    store.script_rows(FIND_SQL, vec![post_row(1, "hello")]);
    let cache = shared_cache();
    let mut config = Configuration::new();
    config.set_cache_enabled(false);
    config.add_cache(cache.clone());
    config.add_statement(
        MappedStatement::builder("posts.find", FIND_SQL)
            .parameter(ParameterMapping::input("id"))
            .cache(cache.clone())
            .build(),
    );
    let config = Arc::new(config);

    let mut executor = config.build_executor(store.transaction(), None);
    find_post(executor.as_mut(), &config, 1);
    executor.commit(true).unwrap();

    assert_eq!(cache.size(), 0);
}
