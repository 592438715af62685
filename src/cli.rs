//! Command-line argument parsing for db2i-tools.

use clap::{Parser, Subcommand};
use db2i_tools::config::{ConnectionConfig, ToolsConfig};
use db2i_tools::db::{FetchMode, Value};
use db2i_tools::tools::{ToolName, ToolsOptions};
use std::path::PathBuf;

/// SQL tools for language-model agents working against Db2 for i.
#[derive(Parser, Debug)]
#[command(name = "db2i-tools")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Daemon host
    #[arg(short = 'H', long, value_name = "HOST", global = true)]
    pub host: Option<String>,

    /// User profile
    #[arg(short = 'U', long, value_name = "USER", global = true)]
    pub user: Option<String>,

    /// Daemon port [default: 8075]
    #[arg(short = 'p', long, value_name = "PORT", global = true)]
    pub port: Option<u16>,

    /// Schema (library) the tools operate on
    #[arg(short = 's', long, value_name = "SCHEMA", global = true)]
    pub schema: Option<String>,

    /// Use named connection from config
    #[arg(short = 'c', long, value_name = "NAME", global = true)]
    pub connection: Option<String>,

    /// Use a saved system, looked up by host
    #[arg(long, value_name = "HOST", global = true)]
    pub system: Option<String>,

    /// Run against a local SQLite database file instead of the daemon
    #[arg(long, value_name = "PATH", global = true)]
    pub sqlite: Option<PathBuf>,

    /// Config file path
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// State database path (saved systems)
    #[arg(long, value_name = "PATH", global = true)]
    pub state_db: Option<PathBuf>,

    /// Maximum characters kept from string cells
    #[arg(long, value_name = "N", global = true)]
    pub max_string_length: Option<usize>,

    /// Static table list returned by list-tables (comma-separated)
    #[arg(long, value_name = "TABLES", value_delimiter = ',', global = true)]
    pub tables: Vec<String>,

    /// Disable a tool (repeatable)
    #[arg(long, value_name = "TOOL", value_parser = parse_tool, global = true)]
    pub disable: Vec<ToolName>,

    /// Write logs to the log file instead of stderr
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the base tables of the schema
    ListTables,

    /// Print the CREATE TABLE statement of a table
    DescribeTable {
        /// Table name
        table: String,
    },

    /// Run a SQL statement
    RunSql {
        /// SQL text, with ? placeholders for parameters
        sql: String,

        /// Positional parameter (JSON scalar, or plain text)
        #[arg(long = "param", value_name = "VALUE", value_parser = parse_param)]
        params: Vec<Value>,

        /// Render rows as column-name mappings instead of tuples
        #[arg(long)]
        include_columns: bool,

        /// Rows to fetch: all, one or a count
        #[arg(long, value_name = "MODE", default_value = "all", value_parser = parse_fetch)]
        fetch: FetchMode,
    },

    /// Print the enabled tool definitions as JSON
    Tools,

    /// Call a tool by name with JSON arguments, as an agent would
    Call {
        /// Tool name
        tool: String,

        /// Arguments as a JSON object
        #[arg(value_name = "ARGS_JSON")]
        arguments: Option<String>,
    },

    /// Manage saved systems
    Systems {
        #[command(subcommand)]
        action: SystemsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum SystemsCommand {
    /// Save the resolved connection (flags, config, environment) as a system
    Add,

    /// Show a saved system
    Get {
        #[arg(value_name = "HOST")]
        target: String,
    },

    /// List saved systems
    List,

    /// Remove the systems saved for a host
    Remove {
        #[arg(value_name = "HOST")]
        target: String,
    },
}

fn parse_tool(s: &str) -> std::result::Result<ToolName, String> {
    s.parse().map_err(|e: db2i_tools::error::Db2iError| e.to_string())
}

fn parse_fetch(s: &str) -> std::result::Result<FetchMode, String> {
    s.parse().map_err(|e: db2i_tools::error::Db2iError| e.to_string())
}

/// Parses a parameter as a JSON scalar, falling back to plain text.
fn parse_param(s: &str) -> std::result::Result<Value, String> {
    match serde_json::from_str::<serde_json::Value>(s) {
        Ok(json) if !json.is_array() && !json.is_object() => Ok(Value::from(json)),
        _ => Ok(Value::String(s.to_string())),
    }
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Converts CLI arguments to a ConnectionConfig.
    ///
    /// The password never comes from the command line; it is read from the
    /// environment, the config file or a saved system.
    pub fn to_connection_config(&self) -> Option<ConnectionConfig> {
        if self.host.is_none()
            && self.user.is_none()
            && self.port.is_none()
            && self.schema.is_none()
        {
            return None;
        }

        Some(ConnectionConfig {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: None,
            schema: self.schema.clone(),
            ..Default::default()
        })
    }

    /// Returns the config file path to use.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(db2i_tools::config::Config::default_path)
    }

    /// Returns the named connection to use, if specified.
    pub fn connection_name(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    /// Toolkit options from the config file with CLI overrides applied.
    pub fn tools_options(&self, config: &ToolsConfig) -> ToolsOptions {
        let mut options = ToolsOptions::from(config);
        if let Some(length) = self.max_string_length {
            options = options.with_max_string_length(length);
        }
        if !self.tables.is_empty() {
            options = options.with_tables(self.tables.clone());
        }
        for tool in &self.disable {
            options = options.with_tool(*tool, false);
        }
        options
    }
}
