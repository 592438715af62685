//! Tool definitions for LLM function calling.
//!
//! Describes the toolkit operations as JSON-schema tools and parses the
//! arguments an agent sends back.

use crate::db::{FetchMode, Value};
use crate::error::{Db2iError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Names of the operations the toolkit can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ListTables,
    DescribeTable,
    RunSql,
}

impl ToolName {
    /// Every tool, in registration order.
    pub const ALL: [ToolName; 3] = [Self::ListTables, Self::DescribeTable, Self::RunSql];

    /// Returns the name the agent calls the tool by.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListTables => "list_tables",
            Self::DescribeTable => "describe_table",
            Self::RunSql => "run_sql",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = Db2iError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().replace('-', "_").as_str() {
            "list_tables" => Ok(Self::ListTables),
            "describe_table" => Ok(Self::DescribeTable),
            "run_sql" | "run_sql_query" => Ok(Self::RunSql),
            _ => Err(Db2iError::invalid_argument(format!("Unknown tool '{s}'"))),
        }
    }
}

/// Tool definition for LLM function calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Input parameters for the describe_table tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeTableInput {
    pub table_name: String,
}

/// Input parameters for the run_sql tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSqlInput {
    pub sql: String,
    #[serde(default, alias = "options", skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Value>>,
    #[serde(default)]
    pub include_columns: bool,
    #[serde(default)]
    pub fetch: FetchMode,
}

/// Parses tool arguments, treating a missing payload as an empty object.
pub fn parse_arguments<T>(tool: ToolName, arguments: serde_json::Value) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let arguments = match arguments {
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments)
        .map_err(|e| Db2iError::invalid_argument(format!("Invalid arguments for {tool}: {e}")))
}

/// Returns the definition of a single tool.
pub fn definition(tool: ToolName) -> ToolDefinition {
    let (description, parameters) = match tool {
        ToolName::ListTables => (
            "Use this function to get a list of table names in the database schema. \
             Call it first so later queries only reference tables that exist.",
            serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        ),
        ToolName::DescribeTable => (
            "Use this function to describe a table. Returns the CREATE TABLE statement \
             with column names, types and constraints.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "table_name": {
                        "type": "string",
                        "description": "The name of the table to get the schema for"
                    }
                },
                "required": ["table_name"]
            }),
        ),
        ToolName::RunSql => (
            "Use this function to run a SQL query and return the result. \
             Returns an empty string when the query produced no rows.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "sql": {
                        "type": "string",
                        "description": "The SQL query to execute"
                    },
                    "parameters": {
                        "type": "array",
                        "items": { "type": ["string", "number", "boolean", "null"] },
                        "description": "Values bound to ? placeholders, in order (optional)"
                    },
                    "include_columns": {
                        "type": "boolean",
                        "description": "Return rows as column-name mappings instead of tuples (default: false)"
                    },
                    "fetch": {
                        "oneOf": [
                            { "type": "string", "enum": ["all", "one"] },
                            { "type": "integer", "minimum": 0 }
                        ],
                        "description": "How many rows to fetch: \"all\" (default), \"one\" or a row count"
                    }
                },
                "required": ["sql"]
            }),
        ),
    };

    ToolDefinition {
        name: tool.as_str().to_string(),
        description: description.to_string(),
        parameters,
    }
}
