//! db2i-tools - SQL tools for language-model agents working against Db2 for i.
//!
//! This library exposes the core modules for use by agent loops and in
//! integration tests.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod tools;

pub use tools::{Db2iTools, ToolsOptions};
