//! Scripted in-memory backend for protocol tests.
//!
//! Records every statement it is handed and returns scripted outcomes, so
//! tests can observe statement order, short-circuits and rollback behavior
//! without a live database. Queries always return zero rows (driver rows
//! cannot be fabricated outside a real connection).

#![allow(dead_code)]

use pgsift::{GenericClient, SiftError, SiftResult, TxClient};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

pub struct MockDb {
    log: Arc<Mutex<Vec<String>>>,
    exec_outcomes: Mutex<VecDeque<SiftResult<u64>>>,
    rollback_failure: Mutex<Option<SiftError>>,
}

impl MockDb {
    /// Create a backend that records into the shared log and succeeds at
    /// everything.
    pub fn new(log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            log,
            exec_outcomes: Mutex::new(VecDeque::new()),
            rollback_failure: Mutex::new(None),
        }
    }

    /// Script the outcomes of successive execute calls, in order. Once the
    /// script runs out, executes succeed with 1 affected row.
    pub fn with_exec_outcomes(self, outcomes: Vec<SiftResult<u64>>) -> Self {
        *self.exec_outcomes.lock().unwrap() = outcomes.into();
        self
    }

    /// Make the next rollback fail with the given error.
    pub fn failing_rollback(self, err: SiftError) -> Self {
        *self.rollback_failure.lock().unwrap() = Some(err);
        self
    }

    fn record(&self, statement: impl Into<String>) {
        self.log.lock().unwrap().push(statement.into());
    }

    fn next_exec(&self) -> SiftResult<u64> {
        self.exec_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(1))
    }
}

impl GenericClient for MockDb {
    type Prepared = String;

    async fn query(&self, sql: &str, _params: &[&(dyn ToSql + Sync)]) -> SiftResult<Vec<Row>> {
        self.record(sql);
        Ok(Vec::new())
    }

    async fn execute(&self, sql: &str, _params: &[&(dyn ToSql + Sync)]) -> SiftResult<u64> {
        self.record(sql);
        self.next_exec()
    }

    async fn prepare(&self, sql: &str) -> SiftResult<String> {
        self.record(format!("PREPARE {sql}"));
        Ok(sql.to_string())
    }

    async fn query_prepared(
        &self,
        stmt: &String,
        _params: &[&(dyn ToSql + Sync)],
    ) -> SiftResult<Vec<Row>> {
        self.record(stmt.as_str());
        Ok(Vec::new())
    }

    async fn execute_prepared(
        &self,
        stmt: &String,
        _params: &[&(dyn ToSql + Sync)],
    ) -> SiftResult<u64> {
        self.record(stmt.as_str());
        self.next_exec()
    }
}

impl TxClient for MockDb {
    async fn commit(&mut self) -> SiftResult<()> {
        self.record("COMMIT");
        Ok(())
    }

    async fn rollback(&mut self) -> SiftResult<()> {
        self.record("ROLLBACK");
        match self.rollback_failure.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
