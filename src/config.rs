//! Configuration management for db2i-tools.
//!
//! Handles loading configuration from TOML files and environment variables,
//! with support for named daemon connections and toolkit settings.

use crate::error::{Db2iError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default Mapepire daemon port.
pub const DEFAULT_PORT: u16 = 8075;

/// Default maximum length of a string cell returned to the agent.
pub const DEFAULT_MAX_STRING_LENGTH: usize = 300;

const ENV_HOST: &str = "DB2I_HOST";
const ENV_USER: &str = "DB2I_USER";
const ENV_PASSWORD: &str = "DB2I_PASSWORD";
const ENV_PORT: &str = "DB2I_PORT";
const ENV_SCHEMA: &str = "DB2I_SCHEMA";

/// Main configuration structure for db2i-tools.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Toolkit settings.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Named daemon connections.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

/// Toolkit settings: which operations are exposed and how results are shaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Maximum characters kept from any string cell.
    #[serde(default = "default_max_string_length")]
    pub max_string_length: usize,

    /// Expose `list_tables`.
    #[serde(default = "default_true")]
    pub list_tables: bool,

    /// Expose `describe_table`.
    #[serde(default = "default_true")]
    pub describe_table: bool,

    /// Expose `run_sql`.
    #[serde(default = "default_true")]
    pub run_sql: bool,

    /// Static table allow-list returned by `list_tables` instead of the catalog.
    #[serde(default)]
    pub tables: Option<Vec<String>>,
}

fn default_max_string_length() -> usize {
    DEFAULT_MAX_STRING_LENGTH
}

fn default_true() -> bool {
    true
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_string_length: default_max_string_length(),
            list_tables: true,
            describe_table: true,
            run_sql: true,
            tables: None,
        }
    }
}

/// Daemon connection configuration as loaded from file, CLI or environment.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Daemon host.
    pub host: Option<String>,

    /// Daemon port; unset means the Mapepire default.
    #[serde(default)]
    pub port: Option<u16>,

    /// User profile.
    pub user: Option<String>,

    /// Password (prefer the environment or the systems registry).
    pub password: Option<String>,

    /// Schema (library) the tools operate on.
    pub schema: Option<String>,

    /// Accept self-signed or mismatched daemon certificates.
    #[serde(default = "default_true")]
    pub ignore_unauthorized: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            user: None,
            password: None,
            schema: None,
            ignore_unauthorized: true,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "******"))
            .field("schema", &self.schema)
            .field("ignore_unauthorized", &self.ignore_unauthorized)
            .finish()
    }
}

/// A complete connection descriptor for the daemon.
#[derive(Clone, PartialEq, Eq)]
pub struct DaemonServer {
    pub host: String,
    pub user: String,
    pub password: String,
    pub port: u16,
    pub ignore_unauthorized: bool,
}

impl fmt::Debug for DaemonServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonServer")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"******")
            .field("port", &self.port)
            .field("ignore_unauthorized", &self.ignore_unauthorized)
            .finish()
    }
}

impl ConnectionConfig {
    /// Builds the daemon descriptor, failing if host, user or password is missing.
    pub fn daemon_server(&self) -> Result<DaemonServer> {
        let host = self
            .host
            .clone()
            .ok_or_else(|| Db2iError::config(format!("Host is required (set {ENV_HOST})")))?;
        let user = self
            .user
            .clone()
            .ok_or_else(|| Db2iError::config(format!("User is required (set {ENV_USER})")))?;
        let password = self.password.clone().ok_or_else(|| {
            Db2iError::config(format!("Password is required (set {ENV_PASSWORD})"))
        })?;

        Ok(DaemonServer {
            host,
            user,
            password,
            port: self.port.unwrap_or(DEFAULT_PORT),
            ignore_unauthorized: self.ignore_unauthorized,
        })
    }

    /// Returns the configured schema, failing if none is set.
    pub fn schema(&self) -> Result<&str> {
        self.schema
            .as_deref()
            .ok_or_else(|| Db2iError::config(format!("Schema is required (set {ENV_SCHEMA})")))
    }

    /// Merges another config into this one, with the other taking precedence.
    pub fn merge(&mut self, other: &ConnectionConfig) {
        if other.host.is_some() {
            self.host = other.host.clone();
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.user.is_some() {
            self.user = other.user.clone();
        }
        if other.password.is_some() {
            self.password = other.password.clone();
        }
        if other.schema.is_some() {
            self.schema = other.schema.clone();
        }
        if !other.ignore_unauthorized {
            self.ignore_unauthorized = false;
        }
    }

    /// Applies environment variables (DB2I_HOST, DB2I_PORT, etc.) as defaults.
    pub fn apply_env_defaults(&mut self) {
        self.apply_defaults_from(|key| std::env::var(key).ok());
    }

    /// Fills unset fields from the given variable lookup.
    pub fn apply_defaults_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.host.is_none() {
            self.host = lookup(ENV_HOST);
        }
        if self.port.is_none() {
            self.port = lookup(ENV_PORT).and_then(|p| p.parse().ok());
        }
        if self.user.is_none() {
            self.user = lookup(ENV_USER);
        }
        if self.password.is_none() {
            self.password = lookup(ENV_PASSWORD);
        }
        if self.schema.is_none() {
            self.schema = lookup(ENV_SCHEMA);
        }
    }

    /// Returns a display-safe string (no password) for logs and output.
    pub fn display_string(&self) -> String {
        let host = self.host.as_deref().unwrap_or("unknown");
        let schema = self.schema.as_deref().unwrap_or("unknown");
        format!("{schema} @ {host}:{}", self.port.unwrap_or(DEFAULT_PORT))
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("db2i-tools")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Db2iError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            Db2iError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Gets a named connection, or the default connection if name is None.
    pub fn get_connection(&self, name: Option<&str>) -> Option<&ConnectionConfig> {
        let key = name.unwrap_or("default");
        self.connections.get(key)
    }
}
