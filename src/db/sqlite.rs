//! SQLite daemon implementation.
//!
//! Lets the toolkit run against a local SQLite file through sqlx, one fresh
//! connection per statement like the remote daemon.

use super::{ColumnInfo, Connection, Daemon, Dialect, Row, Statement, Value};
use crate::error::{Db2iError, Result};
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{
    Column as SqlxColumn, ConnectOptions, Connection as SqlxConnection, Executor, Row as SqlxRow,
    TypeInfo, ValueRef,
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A SQLite database file reached through fresh connections.
#[derive(Debug, Clone)]
pub struct SqliteDaemon {
    path: PathBuf,
    options: SqliteConnectOptions,
}

impl SqliteDaemon {
    /// Targets an existing database file.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Db2iError::config(format!(
                "SQLite database {} does not exist",
                path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false);

        Ok(Self {
            path: path.to_path_buf(),
            options,
        })
    }
}

#[async_trait]
impl Daemon for SqliteDaemon {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let conn = self.options.connect().await.map_err(|e| {
            Db2iError::connection(format!(
                "Cannot open SQLite database {}: {e}",
                self.path.display()
            ))
        })?;

        Ok(Box::new(SqliteBackendConnection {
            conn: Some(conn),
            next_id: 0,
        }))
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

/// An open SQLite connection. Result sets are buffered whole on execute.
pub struct SqliteBackendConnection {
    conn: Option<SqliteConnection>,
    next_id: u64,
}

impl SqliteBackendConnection {
    fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| Db2iError::internal("SQLite connection already closed"))
    }

    /// Column metadata for statements that returned no rows.
    async fn describe_columns(&mut self, sql: &str) -> Vec<ColumnInfo> {
        let Ok(conn) = self.conn() else {
            return Vec::new();
        };
        match conn.describe(sql).await {
            Ok(describe) => describe
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect(),
            Err(e) => {
                debug!("Could not describe statement: {e}");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Connection for SqliteBackendConnection {
    async fn execute(&mut self, sql: &str, params: &[Value], _rows: usize) -> Result<Statement> {
        self.next_id += 1;
        let id = format!("sqlite{}", self.next_id);

        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param);
        }

        let conn = self.conn()?;
        let result: Vec<SqliteRow> = query
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| Db2iError::query(format_query_error(e)))?;

        let columns: Vec<ColumnInfo> = match result.first() {
            Some(first) => first
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect(),
            None => self.describe_columns(sql).await,
        };

        if columns.is_empty() {
            return Ok(Statement::without_results(id));
        }

        let rows: Vec<Row> = result.iter().map(convert_row).collect();

        Ok(Statement {
            id,
            has_results: true,
            columns,
            rows: rows.into(),
            is_done: true,
        })
    }

    async fn fetch_more(&mut self, statement: &mut Statement, _rows: usize) -> Result<()> {
        statement.is_done = true;
        Ok(())
    }

    async fn close_statement(&mut self, _statement: &Statement) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| Db2iError::connection(format!("Failed to close SQLite database: {e}")))?;
        }
        Ok(())
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
    }
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| (col.name().to_string(), convert_value(row, i)))
        .collect()
}

/// Converts a single cell, dispatching on the storage class of the value.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };

    match type_name.as_str() {
        "BOOLEAN" => row
            .try_get::<bool, _>(index)
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INTEGER" | "INT" | "INT8" | "BIGINT" => row
            .try_get::<i64, _>(index)
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row
            .try_get::<f64, _>(index)
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|bytes| Value::String(format!("<{} bytes>", bytes.len())))
            .unwrap_or(Value::Null),

        _ => row
            .try_get::<String, _>(index)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Formats a query error, preferring the database's own message.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    }
}
