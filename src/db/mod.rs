//! Daemon abstraction layer for db2i-tools.
//!
//! Provides a trait-based interface to the remote database daemon, allowing
//! the Mapepire client, SQLite and test doubles to be used interchangeably.
//! Every execution opens its own connection and closes it before returning.

mod cursor;
mod dialect;
mod mapepire;
mod mock;
mod sqlite;
mod types;

pub use cursor::Cursor;
pub use dialect::{CatalogQuery, Dialect, NAME_COLUMN, SOURCE_COLUMN};
pub use mapepire::{MapepireConnection, MapepireDaemon};
pub use mock::{FailingDaemon, MockDaemon, MockResponse};
pub use sqlite::{SqliteBackendConnection, SqliteDaemon};
pub use types::{ColumnInfo, FetchMode, Row, Value};

use crate::error::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Rows requested per round trip when fetching a whole result set.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// State of one executed statement on an open connection.
#[derive(Debug, Clone, Default)]
pub struct Statement {
    /// Correlation id used to continue or close the statement.
    pub id: String,

    /// Whether the statement produced a result set.
    pub has_results: bool,

    /// Result set columns, in definition order.
    pub columns: Vec<ColumnInfo>,

    /// Rows received from the daemon and not yet handed out.
    pub rows: VecDeque<Row>,

    /// Whether the daemon has sent the last row.
    pub is_done: bool,
}

impl Statement {
    /// Creates the state for a statement that produced no result set.
    pub fn without_results(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_done: true,
            ..Default::default()
        }
    }
}

/// An open connection to the daemon.
#[async_trait]
pub trait Connection: Send {
    /// Executes a statement, binding `params` positionally when non-empty.
    ///
    /// `rows` is the number of rows the daemon should send with the first reply.
    async fn execute(&mut self, sql: &str, params: &[Value], rows: usize) -> Result<Statement>;

    /// Requests up to `rows` more rows, appending them to the statement buffer.
    async fn fetch_more(&mut self, statement: &mut Statement, rows: usize) -> Result<()>;

    /// Releases a statement the caller stopped reading before its end.
    async fn close_statement(&mut self, statement: &Statement) -> Result<()>;

    /// Closes the connection.
    async fn close(&mut self) -> Result<()>;
}

/// A remote database daemon that hands out fresh connections.
#[async_trait]
pub trait Daemon: Send + Sync {
    /// Opens a new connection.
    async fn connect(&self) -> Result<Box<dyn Connection>>;

    /// SQL dialect used for catalog queries.
    fn dialect(&self) -> Dialect;

    /// Display-safe description (no password) for logs.
    fn describe(&self) -> String;
}

/// Executes a statement on a fresh connection and fetches rows per `fetch`.
///
/// Statements that produce no result set yield no rows. The connection is
/// closed before returning, whether or not execution succeeded.
pub async fn execute(
    daemon: &dyn Daemon,
    sql: &str,
    params: &[Value],
    fetch: FetchMode,
) -> Result<Vec<Row>> {
    debug!("Connecting to {}", daemon.describe());
    let mut connection = daemon.connect().await?;

    let result = run_statement(connection.as_mut(), sql, params, fetch).await;

    if let Err(e) = connection.close().await {
        warn!("Failed to close daemon connection: {e}");
    }

    result
}

async fn run_statement(
    connection: &mut dyn Connection,
    sql: &str,
    params: &[Value],
    fetch: FetchMode,
) -> Result<Vec<Row>> {
    let mut cursor = Cursor::open(connection, sql, params, batch_size(fetch)).await?;

    if !cursor.has_results() {
        return Ok(Vec::new());
    }

    let rows = match fetch {
        FetchMode::All => cursor.fetch_all().await?,
        FetchMode::One => cursor.fetch_one().await?.into_iter().collect(),
        FetchMode::Count(n) => cursor.fetch_many(n).await?,
    };

    if let Err(e) = cursor.close().await {
        warn!("Failed to close statement: {e}");
    }

    Ok(rows)
}

fn batch_size(fetch: FetchMode) -> usize {
    match fetch {
        FetchMode::All => DEFAULT_BATCH_SIZE,
        FetchMode::One => 1,
        FetchMode::Count(n) => n.clamp(1, DEFAULT_BATCH_SIZE),
    }
}
