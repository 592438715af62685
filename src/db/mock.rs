//! Mock daemons for testing.
//!
//! Provides an in-memory daemon with scripted responses and a daemon whose
//! connections always fail, for exercising the toolkit without a server.

use super::{ColumnInfo, Connection, Daemon, Dialect, Row, Statement, Value};
use crate::error::{Db2iError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Scripted reply to statements containing a given text.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// A result set.
    Rows {
        columns: Vec<ColumnInfo>,
        rows: Vec<Row>,
    },
    /// A statement with no result set (DDL, UPDATE, ...).
    NoResults,
    /// An execution failure with the daemon's message.
    Error(String),
}

#[derive(Debug, Default)]
struct MockCounters {
    connections_opened: AtomicUsize,
    connections_closed: AtomicUsize,
    statements_executed: AtomicUsize,
    statements_closed: AtomicUsize,
    last_params: Mutex<Vec<Value>>,
}

/// A mock daemon that returns predefined results.
///
/// Statements are matched against the scripted patterns in insertion order;
/// the first pattern contained in the SQL text wins. Unmatched statements
/// behave like statements without a result set.
#[derive(Debug, Clone)]
pub struct MockDaemon {
    dialect: Dialect,
    responses: Vec<(String, MockResponse)>,
    batch_limit: usize,
    counters: Arc<MockCounters>,
}

impl MockDaemon {
    /// Creates a mock daemon with no scripted responses.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            responses: Vec::new(),
            batch_limit: usize::MAX,
            counters: Arc::new(MockCounters::default()),
        }
    }

    /// Scripts a result set; columns are taken from the first row.
    pub fn with_rows(self, pattern: impl Into<String>, rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|row| {
                row.iter()
                    .map(|(name, value)| ColumnInfo::new(name.as_str(), type_name(value)))
                    .collect()
            })
            .unwrap_or_default();
        self.with_response(pattern, MockResponse::Rows { columns, rows })
    }

    /// Scripts an execution failure.
    pub fn with_error(self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.with_response(pattern, MockResponse::Error(message.into()))
    }

    /// Scripts an arbitrary response.
    pub fn with_response(mut self, pattern: impl Into<String>, response: MockResponse) -> Self {
        self.responses.push((pattern.into(), response));
        self
    }

    /// Caps the number of rows sent per reply, to exercise continuation fetches.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    /// Number of connections opened so far.
    pub fn connections_opened(&self) -> usize {
        self.counters.connections_opened.load(Ordering::SeqCst)
    }

    /// Number of connections closed so far.
    pub fn connections_closed(&self) -> usize {
        self.counters.connections_closed.load(Ordering::SeqCst)
    }

    /// Number of statements executed so far.
    pub fn statements_executed(&self) -> usize {
        self.counters.statements_executed.load(Ordering::SeqCst)
    }

    /// Number of statements released before their end of data.
    pub fn statements_closed(&self) -> usize {
        self.counters.statements_closed.load(Ordering::SeqCst)
    }

    /// Parameters bound to the most recent statement.
    pub fn last_params(&self) -> Vec<Value> {
        self.counters
            .last_params
            .lock()
            .map(|params| params.clone())
            .unwrap_or_default()
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Bool(_) => "BOOLEAN",
        Value::Int(_) => "INTEGER",
        Value::Float(_) => "DOUBLE",
        Value::String(_) => "VARCHAR",
    }
}

#[async_trait]
impl Daemon for MockDaemon {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        self.counters
            .connections_opened
            .fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            responses: self.responses.clone(),
            batch_limit: self.batch_limit,
            counters: Arc::clone(&self.counters),
            pending: HashMap::new(),
            next_id: 0,
        }))
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn describe(&self) -> String {
        format!("mock daemon ({:?})", self.dialect)
    }
}

struct MockConnection {
    responses: Vec<(String, MockResponse)>,
    batch_limit: usize,
    counters: Arc<MockCounters>,
    pending: HashMap<String, VecDeque<Row>>,
    next_id: usize,
}

impl MockConnection {
    fn take_batch(&self, remaining: &mut VecDeque<Row>, requested: usize) -> Vec<Row> {
        let count = requested.min(self.batch_limit).max(1).min(remaining.len());
        remaining.drain(..count).collect()
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&mut self, sql: &str, params: &[Value], rows: usize) -> Result<Statement> {
        self.counters
            .statements_executed
            .fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.counters.last_params.lock() {
            *last = params.to_vec();
        }

        self.next_id += 1;
        let id = format!("mock{}", self.next_id);

        let response = self
            .responses
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, response)| response.clone());

        match response {
            None | Some(MockResponse::NoResults) => Ok(Statement::without_results(id)),
            Some(MockResponse::Error(message)) => Err(Db2iError::query(message)),
            Some(MockResponse::Rows { columns, rows: all }) => {
                let mut remaining: VecDeque<Row> = all.into();
                let batch = self.take_batch(&mut remaining, rows);
                let is_done = remaining.is_empty();
                if !is_done {
                    self.pending.insert(id.clone(), remaining);
                }
                Ok(Statement {
                    id,
                    has_results: true,
                    columns,
                    rows: batch.into(),
                    is_done,
                })
            }
        }
    }

    async fn fetch_more(&mut self, statement: &mut Statement, rows: usize) -> Result<()> {
        let Some(mut remaining) = self.pending.remove(&statement.id) else {
            statement.is_done = true;
            return Ok(());
        };

        let batch = self.take_batch(&mut remaining, rows);
        statement.rows.extend(batch);

        if remaining.is_empty() {
            statement.is_done = true;
        } else {
            self.pending.insert(statement.id.clone(), remaining);
        }
        Ok(())
    }

    async fn close_statement(&mut self, statement: &Statement) -> Result<()> {
        self.counters
            .statements_closed
            .fetch_add(1, Ordering::SeqCst);
        self.pending.remove(&statement.id);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.counters
            .connections_closed
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A daemon whose every connection attempt fails.
#[derive(Debug, Clone)]
pub struct FailingDaemon {
    message: String,
}

impl FailingDaemon {
    /// Creates a failing daemon reporting `message` on connect.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Daemon for FailingDaemon {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        Err(Db2iError::connection(self.message.clone()))
    }

    fn dialect(&self) -> Dialect {
        Dialect::Db2i
    }

    fn describe(&self) -> String {
        "failing daemon".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_unmatched_statement_has_no_results() {
        let daemon = MockDaemon::new(Dialect::Db2i);
        let mut conn = daemon.connect().await.unwrap();
        let statement = conn.execute("UPDATE T SET A = 1", &[], 10).await.unwrap();
        assert!(!statement.has_results);
        assert!(statement.is_done);
    }

    #[tokio::test]
    async fn test_mock_error_response() {
        let daemon = MockDaemon::new(Dialect::Db2i).with_error("NOPE", "SQL0204 NOPE not found");
        let mut conn = daemon.connect().await.unwrap();
        let err = conn.execute("SELECT * FROM NOPE", &[], 10).await.unwrap_err();
        assert!(err.to_string().contains("SQL0204"));
    }

    #[tokio::test]
    async fn test_failing_daemon() {
        let daemon = FailingDaemon::new("unreachable");
        let err = daemon.connect().await.err().unwrap();
        assert!(matches!(err, Db2iError::Connection(_)));
    }
}
