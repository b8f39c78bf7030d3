//! In-memory store doubles for exercising the executor stack.
//!
//! A [`ScriptedStore`] is scripted with canned result rows per SQL text and
//! records every prepare, execution, commit, and rollback, so tests can
//! assert on how often the store was actually hit.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use strata_types::{Row, Value};

use crate::store::{Connection, Statement, StoreError, Transaction};

#[derive(Debug, Default)]
struct StoreState {
    results: HashMap<String, Vec<Row>>,
    out_values: HashMap<String, Vec<(String, Value)>>,
    failing: HashSet<String>,
    queries: Vec<(String, Vec<Value>)>,
    updates: Vec<(String, Vec<Value>)>,
    prepares: HashMap<String, usize>,
    commits: usize,
    rollbacks: usize,
    closes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedStore {
    state: Arc<Mutex<StoreState>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the rows every query with this SQL text returns.
    pub fn script_rows(&self, sql: impl Into<String>, rows: Vec<Row>) {
        self.state.lock().results.insert(sql.into(), rows);
    }

    /// Scripts the OUT-parameter values a call with this SQL text produces.
    pub fn script_out_values(&self, sql: impl Into<String>, values: Vec<(String, Value)>) {
        self.state.lock().out_values.insert(sql.into(), values);
    }

    /// Makes every execution of this SQL text fail.
    pub fn fail_on(&self, sql: impl Into<String>) {
        self.state.lock().failing.insert(sql.into());
    }

    /// Lets a previously failing SQL text succeed again.
    pub fn clear_failure(&self, sql: &str) {
        self.state.lock().failing.remove(sql);
    }

    /// Opens a transaction over this store. Every transaction shares the
    /// same scripted state.
    pub fn transaction(&self) -> Box<dyn Transaction> {
        Box::new(StubTransaction {
            connection: StubConnection { store: self.clone() },
            store: self.clone(),
        })
    }

    pub fn query_count(&self, sql: &str) -> usize {
        self.state.lock().queries.iter().filter(|(executed, _)| executed == sql).count()
    }

    pub fn update_count(&self, sql: &str) -> usize {
        self.state.lock().updates.iter().filter(|(executed, _)| executed == sql).count()
    }

    pub fn prepare_count(&self, sql: &str) -> usize {
        self.state.lock().prepares.get(sql).copied().unwrap_or(0)
    }

    pub fn commits(&self) -> usize {
        self.state.lock().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().rollbacks
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }
}

#[derive(Debug)]
struct StubTransaction {
    store: ScriptedStore,
    connection: StubConnection,
}

impl Transaction for StubTransaction {
    fn connection(&mut self) -> Result<&mut dyn Connection, StoreError> {
        Ok(&mut self.connection)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.store.state.lock().commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.store.state.lock().rollbacks += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.store.state.lock().closes += 1;
        Ok(())
    }
}

#[derive(Debug)]
struct StubConnection {
    store: ScriptedStore,
}

impl Connection for StubConnection {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Statement>, StoreError> {
        *self.store.state.lock().prepares.entry(sql.to_string()).or_insert(0) += 1;
        Ok(Box::new(StubStatement {
            store: self.store.clone(),
            sql: sql.to_string(),
            batched: Vec::new(),
        }))
    }
}

#[derive(Debug)]
struct StubStatement {
    store: ScriptedStore,
    sql: String,
    batched: Vec<Vec<Value>>,
}

impl StubStatement {
    fn fail_if_scripted(&self, state: &StoreState) -> Result<(), StoreError> {
        if state.failing.contains(&self.sql) {
            return Err(StoreError::Statement(format!("scripted failure for '{}'", self.sql)));
        }
        Ok(())
    }
}

impl Statement for StubStatement {
    fn query(&mut self, args: &[Value]) -> Result<Vec<Row>, StoreError> {
        let mut state = self.store.state.lock();
        self.fail_if_scripted(&state)?;
        state.queries.push((self.sql.clone(), args.to_vec()));
        Ok(state.results.get(&self.sql).cloned().unwrap_or_default())
    }

    fn update(&mut self, args: &[Value]) -> Result<u64, StoreError> {
        let mut state = self.store.state.lock();
        self.fail_if_scripted(&state)?;
        state.updates.push((self.sql.clone(), args.to_vec()));
        Ok(1)
    }

    fn call(
        &mut self,
        args: &[Value],
        out_properties: &[String],
    ) -> Result<(Vec<Row>, Vec<(String, Value)>), StoreError> {
        let mut state = self.store.state.lock();
        self.fail_if_scripted(&state)?;
        state.queries.push((self.sql.clone(), args.to_vec()));
        let rows = state.results.get(&self.sql).cloned().unwrap_or_default();
        let out_values = state
            .out_values
            .get(&self.sql)
            .map(|values| {
                values
                    .iter()
                    .filter(|(property, _)| out_properties.contains(property))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok((rows, out_values))
    }

    fn add_batch(&mut self, args: &[Value]) -> Result<(), StoreError> {
        self.batched.push(args.to_vec());
        Ok(())
    }

    fn execute_batch(&mut self) -> Result<Vec<u64>, StoreError> {
        let mut state = self.store.state.lock();
        self.fail_if_scripted(&state)?;
        let counts = vec![1; self.batched.len()];
        for args in self.batched.drain(..) {
            state.updates.push((self.sql.clone(), args));
        }
        Ok(counts)
    }
}
