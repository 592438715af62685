//! Mapepire daemon integration tests.
//!
//! These need a reachable daemon; they are skipped unless DB2I_HOST is set.

use db2i_tools::config::ConnectionConfig;
use db2i_tools::db::{execute, Daemon, FetchMode, MapepireDaemon, Value};
use db2i_tools::{Db2iTools, ToolsOptions};
use std::sync::Arc;

/// Builds a daemon and schema from the DB2I_* environment, if configured.
fn live_daemon() -> Option<(MapepireDaemon, String)> {
    std::env::var("DB2I_HOST").ok()?;

    let mut connection = ConnectionConfig::default();
    connection.apply_env_defaults();
    let server = connection.daemon_server().ok()?;
    let schema = connection.schema().ok()?.to_string();
    Some((MapepireDaemon::new(server), schema))
}

#[tokio::test]
async fn test_select_from_dummy_table() {
    let Some((daemon, _schema)) = live_daemon() else {
        eprintln!("Skipping test: DB2I_HOST not set");
        return;
    };

    let rows = execute(
        &daemon,
        "SELECT 1 AS ONE FROM SYSIBM.SYSDUMMY1",
        &[],
        FetchMode::All,
    )
    .await
    .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("ONE"), Some(&Value::Int(1)));
}

#[tokio::test]
async fn test_bound_parameters() {
    let Some((daemon, _schema)) = live_daemon() else {
        eprintln!("Skipping test: DB2I_HOST not set");
        return;
    };

    let rows = execute(
        &daemon,
        "SELECT CAST(? AS VARCHAR(10)) AS ECHO FROM SYSIBM.SYSDUMMY1",
        &[Value::from("hello")],
        FetchMode::One,
    )
    .await
    .unwrap();

    assert_eq!(rows[0].get("ECHO"), Some(&Value::from("hello")));
}

#[tokio::test]
async fn test_fetch_count_across_batches() {
    let Some((daemon, _schema)) = live_daemon() else {
        eprintln!("Skipping test: DB2I_HOST not set");
        return;
    };

    let rows = execute(
        &daemon,
        "SELECT TABLE_NAME FROM QSYS2.SYSTABLES",
        &[],
        FetchMode::Count(5),
    )
    .await
    .unwrap();

    assert_eq!(rows.len(), 5);
}

#[tokio::test]
async fn test_syntax_error_is_query_error() {
    let Some((daemon, _schema)) = live_daemon() else {
        eprintln!("Skipping test: DB2I_HOST not set");
        return;
    };

    let err = execute(&daemon, "SELEC 1 FROM SYSIBM.SYSDUMMY1", &[], FetchMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, db2i_tools::error::Db2iError::Query(_)), "{err}");
}

#[tokio::test]
async fn test_toolkit_against_schema() {
    let Some((daemon, schema)) = live_daemon() else {
        eprintln!("Skipping test: DB2I_HOST not set");
        return;
    };
    assert!(daemon.describe().contains('@'));

    let tools = Db2iTools::new(Arc::new(daemon), schema, ToolsOptions::default());

    let tables = tools.list_tables().await;
    let names: Vec<String> = serde_json::from_str(&tables).unwrap();

    if let Some(first) = names.first() {
        let ddl = tools.describe_table(first).await;
        assert!(ddl.contains("CREATE"), "{ddl}");
    }
}
