//! The query toolkit exposed to a language-model agent.
//!
//! [`Db2iTools`] turns three intents (list tables, describe a table, run a
//! statement) into daemon executions and shapes the rows as text. Public
//! operations always return a string; failures are logged and rendered as
//! fallback values so an agent loop never has to handle an error.

mod registry;
mod render;
mod truncate;

pub use registry::{
    definition, parse_arguments, DescribeTableInput, RunSqlInput, ToolDefinition, ToolName,
};
pub use render::{render_records, render_tuples, repr_value};
pub use truncate::{truncate_value, truncate_word, TRUNCATION_SUFFIX};

use crate::config::{ToolsConfig, DEFAULT_MAX_STRING_LENGTH};
use crate::db::{self, Daemon, FetchMode, Row, Value, NAME_COLUMN, SOURCE_COLUMN};
use crate::error::{Db2iError, Result};
use std::sync::Arc;
use tracing::{debug, error};

/// Settings fixed when the toolkit is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolsOptions {
    /// Static table list returned by `list_tables` without querying the catalog.
    pub tables: Option<Vec<String>>,

    /// Maximum characters kept from any string cell returned by `run_sql`.
    pub max_string_length: usize,

    pub list_tables: bool,
    pub describe_table: bool,
    pub run_sql: bool,
}

impl Default for ToolsOptions {
    fn default() -> Self {
        Self {
            tables: None,
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            list_tables: true,
            describe_table: true,
            run_sql: true,
        }
    }
}

impl ToolsOptions {
    pub fn with_tables(mut self, tables: Vec<String>) -> Self {
        self.tables = Some(tables);
        self
    }

    pub fn with_max_string_length(mut self, length: usize) -> Self {
        self.max_string_length = length;
        self
    }

    /// Enables or disables a single tool.
    pub fn with_tool(mut self, tool: ToolName, enabled: bool) -> Self {
        match tool {
            ToolName::ListTables => self.list_tables = enabled,
            ToolName::DescribeTable => self.describe_table = enabled,
            ToolName::RunSql => self.run_sql = enabled,
        }
        self
    }

    /// Whether the tool is exposed to the agent.
    pub fn is_enabled(&self, tool: ToolName) -> bool {
        match tool {
            ToolName::ListTables => self.list_tables,
            ToolName::DescribeTable => self.describe_table,
            ToolName::RunSql => self.run_sql,
        }
    }

    /// Enabled tools, in registration order.
    pub fn enabled_tools(&self) -> Vec<ToolName> {
        ToolName::ALL
            .into_iter()
            .filter(|tool| self.is_enabled(*tool))
            .collect()
    }

    /// Function-calling definitions of the enabled tools.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.enabled_tools().into_iter().map(definition).collect()
    }
}

impl From<&ToolsConfig> for ToolsOptions {
    fn from(config: &ToolsConfig) -> Self {
        Self {
            tables: config.tables.clone(),
            max_string_length: config.max_string_length,
            list_tables: config.list_tables,
            describe_table: config.describe_table,
            run_sql: config.run_sql,
        }
    }
}

/// Query toolkit bound to one daemon and one schema.
///
/// Holds no connection: every operation connects, runs one statement and
/// disconnects, so concurrent calls never share session state.
#[derive(Clone)]
pub struct Db2iTools {
    daemon: Arc<dyn Daemon>,
    schema: String,
    options: ToolsOptions,
}

impl std::fmt::Debug for Db2iTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db2iTools")
            .field("daemon", &self.daemon.describe())
            .field("schema", &self.schema)
            .field("options", &self.options)
            .finish()
    }
}

impl Db2iTools {
    pub fn new(daemon: Arc<dyn Daemon>, schema: impl Into<String>, options: ToolsOptions) -> Self {
        Self {
            daemon,
            schema: schema.into(),
            options,
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn options(&self) -> &ToolsOptions {
        &self.options
    }

    /// Lists the base tables of the schema as a JSON array of names.
    ///
    /// A static table list, even an empty one, is returned as-is without
    /// contacting the daemon.
    pub async fn list_tables(&self) -> String {
        if let Some(tables) = &self.options.tables {
            return to_json_array(tables);
        }

        match self.table_names().await {
            Ok(names) => to_json_array(&names),
            Err(e) => format!("Error getting tables: {e}"),
        }
    }

    /// Returns the CREATE TABLE source of a table in the schema.
    pub async fn describe_table(&self, table_name: &str) -> String {
        match self.table_definition(table_name).await {
            Ok(ddl) => ddl,
            Err(e) => format!("Error getting table schema: {e}"),
        }
    }

    /// Runs a statement and renders its rows.
    ///
    /// Returns an empty string both when the statement produced no rows and
    /// when it failed; failures are logged with the statement text.
    pub async fn run_sql(
        &self,
        sql: &str,
        parameters: &[Value],
        include_columns: bool,
        fetch: FetchMode,
    ) -> String {
        let rows = match self.query_rows(sql, parameters, fetch).await {
            Ok(rows) => rows,
            Err(_) => return String::new(),
        };

        if rows.is_empty() {
            return String::new();
        }

        let max = self.options.max_string_length;
        let rows: Vec<Row> = rows
            .into_iter()
            .map(|row| row.map_values(|value| truncate_value(value, max)))
            .collect();

        if include_columns {
            render_records(&rows)
        } else {
            render_tuples(&rows)
        }
    }

    /// Tools exposed to the agent, in registration order.
    pub fn enabled_tools(&self) -> Vec<ToolName> {
        self.options.enabled_tools()
    }

    /// Function-calling definitions of the enabled tools.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.options.tool_definitions()
    }

    /// Calls a tool by name with JSON arguments, as delivered by an agent.
    ///
    /// Unknown or disabled tools and malformed arguments yield an
    /// `Error: ...` string instead of running anything.
    pub async fn dispatch(&self, name: &str, arguments: serde_json::Value) -> String {
        match self.try_dispatch(name, arguments).await {
            Ok(output) => output,
            Err(e) => {
                debug!("Rejected call to tool '{name}': {e}");
                format!("Error: {e}")
            }
        }
    }

    async fn try_dispatch(&self, name: &str, arguments: serde_json::Value) -> Result<String> {
        let tool: ToolName = name.parse()?;
        if !self.options.is_enabled(tool) {
            return Err(Db2iError::invalid_argument(format!(
                "Tool '{tool}' is not enabled"
            )));
        }

        let output = match tool {
            ToolName::ListTables => self.list_tables().await,
            ToolName::DescribeTable => {
                let input: DescribeTableInput = parse_arguments(tool, arguments)?;
                self.describe_table(&input.table_name).await
            }
            ToolName::RunSql => {
                let input: RunSqlInput = parse_arguments(tool, arguments)?;
                let parameters = input.parameters.unwrap_or_default();
                self.run_sql(&input.sql, &parameters, input.include_columns, input.fetch)
                    .await
            }
        };
        Ok(output)
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        let query = self.daemon.dialect().list_tables(&self.schema);
        let rows = self
            .query_rows(query.sql, &query.params, FetchMode::All)
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| row.get(NAME_COLUMN))
            .map(cell_text)
            .collect())
    }

    async fn table_definition(&self, table_name: &str) -> Result<String> {
        let query = self
            .daemon
            .dialect()
            .table_definition(table_name, &self.schema);
        let rows = self
            .query_rows(query.sql, &query.params, FetchMode::All)
            .await?;

        if rows.is_empty() {
            return Err(Db2iError::query(format!(
                "No definition found for {}.{table_name}",
                self.schema
            )));
        }

        let lines: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get(SOURCE_COLUMN))
            .map(cell_text)
            .collect();
        Ok(lines.join("\n"))
    }

    async fn query_rows(&self, sql: &str, params: &[Value], fetch: FetchMode) -> Result<Vec<Row>> {
        db::execute(self.daemon.as_ref(), sql, params, fetch)
            .await
            .inspect_err(|e| error!("Error running query: {e}\nSQL: {}", sql.trim()))
    }
}

fn cell_text(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_display_string(),
    }
}

fn to_json_array(names: &[String]) -> String {
    serde_json::to_string(names).unwrap_or_else(|_| "[]".to_string())
}
