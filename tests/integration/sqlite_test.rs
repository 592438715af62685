//! Toolkit integration tests against a local SQLite database.

use db2i_tools::db::{execute, FetchMode, SqliteDaemon, Value};
use db2i_tools::{Db2iTools, ToolsOptions};
use pretty_assertions::assert_eq;
use serde_json::json;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

const SEED: &[&str] = &[
    "CREATE TABLE albums (AlbumId INTEGER PRIMARY KEY, Title TEXT NOT NULL, ArtistId INTEGER NOT NULL)",
    "CREATE TABLE artists (ArtistId INTEGER PRIMARY KEY, Name TEXT)",
    "CREATE VIEW artist_names AS SELECT Name FROM artists",
    "INSERT INTO artists VALUES (1, 'AC/DC'), (2, 'Accept'), (3, 'Aerosmith')",
    "INSERT INTO albums VALUES (1, 'For Those About To Rock We Salute You', 1), (2, 'Balls to the Wall', 2)",
];

async fn seeded_database(dir: &Path) -> SqliteDaemon {
    let path = dir.join("chinook.db");
    let mut conn = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    for statement in SEED {
        sqlx::query(statement).execute(&mut conn).await.unwrap();
    }
    conn.close().await.unwrap();

    SqliteDaemon::open(&path).unwrap()
}

async fn toolkit(dir: &Path, options: ToolsOptions) -> Db2iTools {
    Db2iTools::new(Arc::new(seeded_database(dir).await), "main", options)
}

#[tokio::test]
async fn test_list_tables_excludes_views() {
    let dir = tempdir().unwrap();
    let tools = toolkit(dir.path(), ToolsOptions::default()).await;

    assert_eq!(tools.list_tables().await, r#"["albums","artists"]"#);
}

#[tokio::test]
async fn test_list_tables_empty_database() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.db");
    let conn = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    conn.close().await.unwrap();

    let tools = Db2iTools::new(
        Arc::new(SqliteDaemon::open(&path).unwrap()),
        "main",
        ToolsOptions::default(),
    );
    assert_eq!(tools.list_tables().await, "[]");
}

#[tokio::test]
async fn test_list_tables_hides_only_internal_tables() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("internal.db");
    let mut conn = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    // AUTOINCREMENT makes SQLite create its internal sqlite_sequence table.
    for statement in [
        "CREATE TABLE tracks (TrackId INTEGER PRIMARY KEY AUTOINCREMENT, Name TEXT)",
        "CREATE TABLE sqlite1x (Id INTEGER)",
        "INSERT INTO tracks (Name) VALUES ('Jailbreak')",
    ] {
        sqlx::query(statement).execute(&mut conn).await.unwrap();
    }
    conn.close().await.unwrap();

    let tools = Db2iTools::new(
        Arc::new(SqliteDaemon::open(&path).unwrap()),
        "main",
        ToolsOptions::default(),
    );
    assert_eq!(tools.list_tables().await, r#"["sqlite1x","tracks"]"#);
}

#[tokio::test]
async fn test_describe_table_returns_ddl() {
    let dir = tempdir().unwrap();
    let tools = toolkit(dir.path(), ToolsOptions::default()).await;

    assert_eq!(
        tools.describe_table("artists").await,
        "CREATE TABLE artists (ArtistId INTEGER PRIMARY KEY, Name TEXT)"
    );

    let missing = tools.describe_table("tracks").await;
    assert!(missing.starts_with("Error getting table schema: "), "{missing}");
}

#[tokio::test]
async fn test_run_sql_shapes() {
    let dir = tempdir().unwrap();
    let tools = toolkit(dir.path(), ToolsOptions::default()).await;
    let sql = "SELECT ArtistId, Name FROM artists ORDER BY ArtistId";

    assert_eq!(
        tools.run_sql(sql, &[], false, FetchMode::Count(2)).await,
        "[(1, 'AC/DC'), (2, 'Accept')]"
    );
    assert_eq!(
        tools.run_sql(sql, &[], true, FetchMode::One).await,
        "[{'ArtistId': 1, 'Name': 'AC/DC'}]"
    );
    assert_eq!(
        tools
            .run_sql(
                "SELECT Name FROM artists WHERE ArtistId = ?",
                &[Value::Int(3)],
                false,
                FetchMode::All
            )
            .await,
        "[('Aerosmith',)]"
    );
}

#[tokio::test]
async fn test_run_sql_empty_and_failed() {
    let dir = tempdir().unwrap();
    let tools = toolkit(dir.path(), ToolsOptions::default()).await;

    assert_eq!(
        tools
            .run_sql("SELECT * FROM artists WHERE ArtistId > 100", &[], true, FetchMode::All)
            .await,
        ""
    );
    assert_eq!(
        tools
            .run_sql("SELECT * FROM no_such_table", &[], true, FetchMode::All)
            .await,
        ""
    );
}

#[tokio::test]
async fn test_run_sql_truncates_long_titles() {
    let dir = tempdir().unwrap();
    let tools = toolkit(dir.path(), ToolsOptions::default().with_max_string_length(20)).await;

    assert_eq!(
        tools
            .run_sql("SELECT Title FROM albums WHERE AlbumId = 1", &[], false, FetchMode::All)
            .await,
        "[('For Those About...',)]"
    );
}

#[tokio::test]
async fn test_statements_do_not_share_sessions() {
    let dir = tempdir().unwrap();
    let daemon = seeded_database(dir.path()).await;

    execute(&daemon, "CREATE TEMP TABLE scratch (Id INTEGER)", &[], FetchMode::All)
        .await
        .unwrap();

    // The temp table died with the connection that created it.
    let err = execute(&daemon, "SELECT * FROM scratch", &[], FetchMode::All)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("scratch"), "{err}");
}

#[tokio::test]
async fn test_dispatch_on_sqlite() {
    let dir = tempdir().unwrap();
    let tools = toolkit(dir.path(), ToolsOptions::default()).await;

    assert_eq!(
        tools
            .dispatch(
                "run_sql",
                json!({
                    "sql": "SELECT COUNT(*) AS N FROM artists",
                    "include_columns": true
                })
            )
            .await,
        "[{'N': 3}]"
    );
    assert_eq!(
        tools
            .dispatch("describe_table", json!({ "table_name": "albums" }))
            .await,
        "CREATE TABLE albums (AlbumId INTEGER PRIMARY KEY, Title TEXT NOT NULL, ArtistId INTEGER NOT NULL)"
    );
}
