//! Error types for db2i-tools.
//!
//! Defines the main error enum used throughout the crate. Public toolkit
//! operations never return it; they turn it into fallback strings.

use thiserror::Error;

/// Main error type for db2i-tools operations.
#[derive(Error, Debug)]
pub enum Db2iError {
    /// Daemon connection errors (host unreachable, auth failed, TLS, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// SQL execution errors (syntax errors, missing objects, permissions, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Caller supplied an argument outside the accepted set (fetch mode, tool name, etc.)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local state database errors (systems registry, keyring).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Internal errors (unexpected protocol states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Db2iError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an invalid-argument error with the given message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a persistence error with the given message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::InvalidArgument(_) => "Invalid Argument",
            Self::Config(_) => "Configuration Error",
            Self::Persistence(_) => "Persistence Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using Db2iError.
pub type Result<T> = std::result::Result<T, Db2iError>;
