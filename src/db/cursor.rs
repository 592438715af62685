//! Cursor over a single executed statement.

use super::{ColumnInfo, Connection, Row, Statement, Value};
use crate::error::{Db2iError, Result};

/// Reads the rows of one statement, pulling further batches from the daemon on demand.
pub struct Cursor<'c> {
    connection: &'c mut dyn Connection,
    statement: Statement,
    batch_size: usize,
}

impl<'c> Cursor<'c> {
    /// Executes `sql` on `connection` and positions the cursor before the first row.
    pub async fn open(
        connection: &'c mut dyn Connection,
        sql: &str,
        params: &[Value],
        batch_size: usize,
    ) -> Result<Cursor<'c>> {
        let batch_size = batch_size.max(1);
        let statement = connection.execute(sql, params, batch_size).await?;
        Ok(Self {
            connection,
            statement,
            batch_size,
        })
    }

    /// Whether the statement produced a result set.
    pub fn has_results(&self) -> bool {
        self.statement.has_results
    }

    /// Result set columns.
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.statement.columns
    }

    /// Returns the next row, or `None` at the end of the result set.
    pub async fn fetch_one(&mut self) -> Result<Option<Row>> {
        if !self.statement.has_results {
            return Ok(None);
        }

        if self.statement.rows.is_empty() && !self.statement.is_done {
            self.connection
                .fetch_more(&mut self.statement, self.batch_size)
                .await?;

            if self.statement.rows.is_empty() && !self.statement.is_done {
                return Err(Db2iError::internal(format!(
                    "Daemon sent an empty batch for statement {} before the end of data",
                    self.statement.id
                )));
            }
        }

        Ok(self.statement.rows.pop_front())
    }

    /// Returns up to `n` rows, fewer if the result set ends first.
    pub async fn fetch_many(&mut self, n: usize) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(n.min(self.batch_size));
        while rows.len() < n {
            match self.fetch_one().await? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Returns every remaining row.
    pub async fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch_one().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Releases the statement on the daemon if rows are still pending.
    pub async fn close(self) -> Result<()> {
        if self.statement.is_done {
            return Ok(());
        }
        self.connection.close_statement(&self.statement).await
    }
}
