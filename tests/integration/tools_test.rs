//! Toolkit integration tests against scripted and unreachable daemons.

use db2i_tools::config::DaemonServer;
use db2i_tools::db::{Dialect, FailingDaemon, FetchMode, MapepireDaemon, MockDaemon, Row, Value};
use db2i_tools::tools::{truncate_word, ToolName};
use db2i_tools::{Db2iTools, ToolsOptions};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn row(cells: Vec<(&str, Value)>) -> Row {
    cells.into_iter().collect()
}

fn sample_daemon() -> MockDaemon {
    MockDaemon::new(Dialect::Db2i)
        .with_rows(
            "QSYS2.SYSTABLES",
            vec![
                row(vec![("NAME", Value::from("DEPARTMENT")), ("TABLE_TYPE", Value::from("T"))]),
                row(vec![("NAME", Value::from("EMPLOYEE")), ("TABLE_TYPE", Value::from("T"))]),
            ],
        )
        .with_rows(
            "GENERATE_SQL",
            vec![
                row(vec![("SRCDTA", Value::from("CREATE TABLE SAMPLE.DEPARTMENT ("))]),
                row(vec![("SRCDTA", Value::from("  DEPTNO CHAR(3) NOT NULL,"))]),
                row(vec![("SRCDTA", Value::from("  DEPTNAME VARCHAR(36) NOT NULL);"))]),
            ],
        )
        .with_rows(
            "FROM DEPARTMENT",
            vec![
                row(vec![
                    ("DEPTNO", Value::from("A00")),
                    ("DEPTNAME", Value::from("SPIFFY COMPUTER SERVICE DIV.")),
                ]),
                row(vec![
                    ("DEPTNO", Value::from("B01")),
                    ("DEPTNAME", Value::from("PLANNING")),
                ]),
            ],
        )
        .with_batch_limit(1)
}

fn unreachable_toolkit() -> Db2iTools {
    // Port 1 on loopback refuses connections immediately.
    let server = DaemonServer {
        host: "127.0.0.1".to_string(),
        user: "DEVUSER".to_string(),
        password: "secret".to_string(),
        port: 1,
        ignore_unauthorized: true,
    };
    Db2iTools::new(
        Arc::new(MapepireDaemon::new(server)),
        "SAMPLE",
        ToolsOptions::default(),
    )
}

#[tokio::test]
async fn test_agent_session_flow() {
    let daemon = sample_daemon();
    let tools = Db2iTools::new(Arc::new(daemon.clone()), "SAMPLE", ToolsOptions::default());

    assert_eq!(tools.list_tables().await, r#"["DEPARTMENT","EMPLOYEE"]"#);
    assert_eq!(
        tools.describe_table("DEPARTMENT").await,
        "CREATE TABLE SAMPLE.DEPARTMENT (\n  DEPTNO CHAR(3) NOT NULL,\n  DEPTNAME VARCHAR(36) NOT NULL);"
    );
    assert_eq!(
        tools
            .run_sql("SELECT DEPTNO, DEPTNAME FROM DEPARTMENT", &[], false, FetchMode::All)
            .await,
        "[('A00', 'SPIFFY COMPUTER SERVICE DIV.'), ('B01', 'PLANNING')]"
    );

    // One connection per operation, all of them closed.
    assert_eq!(daemon.connections_opened(), 3);
    assert_eq!(daemon.connections_closed(), 3);
}

#[tokio::test]
async fn test_fetch_modes() {
    let daemon = sample_daemon();
    let tools = Db2iTools::new(Arc::new(daemon), "SAMPLE", ToolsOptions::default());
    let sql = "SELECT DEPTNO FROM DEPARTMENT";

    let one = tools.run_sql(sql, &[], true, FetchMode::One).await;
    assert_eq!(one, "[{'DEPTNO': 'A00', 'DEPTNAME': 'SPIFFY COMPUTER SERVICE DIV.'}]");

    let many = tools.run_sql(sql, &[], false, FetchMode::Count(10)).await;
    assert!(many.starts_with("[('A00'"));
    assert!(many.ends_with("('B01', 'PLANNING')]"));
}

#[tokio::test]
async fn test_truncation_limit_applies_to_cells() {
    let daemon = sample_daemon();
    let tools = Db2iTools::new(
        Arc::new(daemon),
        "SAMPLE",
        ToolsOptions::default().with_max_string_length(12),
    );

    let output = tools
        .run_sql("SELECT * FROM DEPARTMENT", &[], false, FetchMode::One)
        .await;
    assert_eq!(output, "[('A00', 'SPIFFY...')]");
    assert_eq!(truncate_word("SPIFFY COMPUTER SERVICE DIV.", 12, "..."), "SPIFFY...");
}

#[tokio::test]
async fn test_unreachable_daemon_never_raises() {
    let tools = unreachable_toolkit();

    let tables = tools.list_tables().await;
    assert!(tables.contains("Error"), "{tables}");

    let ddl = tools.describe_table("EMPLOYEE").await;
    assert!(ddl.contains("Error"), "{ddl}");

    let rows = tools
        .run_sql("SELECT * FROM EMPLOYEE", &[], true, FetchMode::All)
        .await;
    assert_eq!(rows, "");
}

#[tokio::test]
async fn test_static_tables_bypass_unreachable_daemon() {
    let tools = Db2iTools::new(
        Arc::new(FailingDaemon::new("daemon down")),
        "SAMPLE",
        ToolsOptions::default().with_tables(vec!["EMPLOYEE".to_string()]),
    );

    assert_eq!(tools.list_tables().await, r#"["EMPLOYEE"]"#);
}

#[tokio::test]
async fn test_dispatch_matches_definitions() {
    let daemon = sample_daemon();
    let tools = Db2iTools::new(
        Arc::new(daemon),
        "SAMPLE",
        ToolsOptions::default().with_tool(ToolName::ListTables, false),
    );

    let names: Vec<String> = tools.tool_definitions().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["describe_table", "run_sql"]);

    let output = tools
        .dispatch(
            "run_sql",
            json!({
                "sql": "SELECT DEPTNO FROM DEPARTMENT WHERE DEPTNO = ?",
                "parameters": ["B01"],
                "include_columns": false,
                "fetch": 1
            }),
        )
        .await;
    assert_eq!(output, "[('A00', 'SPIFFY COMPUTER SERVICE DIV.')]");

    let rejected = tools.dispatch("list_tables", json!({})).await;
    assert!(rejected.starts_with("Error: "), "{rejected}");
}
