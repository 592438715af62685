//! Integration tests for db2i-tools.

pub mod daemon_test;
pub mod sqlite_test;
pub mod systems_test;
pub mod tools_test;
