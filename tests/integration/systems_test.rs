//! Integration tests for the saved systems registry.

use db2i_tools::config::ConnectionConfig;
use db2i_tools::persistence::{NewSystem, SecretStorage, StateDb};
use tempfile::tempdir;

async fn create_test_db() -> (StateDb, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.db");
    let db = StateDb::open_with_secrets(&path, SecretStorage::plaintext_only())
        .await
        .unwrap();
    (db, dir)
}

fn system(host: &str) -> NewSystem {
    NewSystem {
        host: host.to_string(),
        user: "DEVUSER".to_string(),
        password: "passw0rd".to_string(),
        port: 8076,
        schema: "SAMPLE".to_string(),
    }
}

#[tokio::test]
async fn test_system_crud() {
    let (db, _dir) = create_test_db().await;

    let created = db.create_system(&system("myibmi")).await.unwrap();
    assert_eq!(created.host, "myibmi");
    assert_eq!(created.port, 8076);

    let fetched = db.get_system("myibmi").await.unwrap().unwrap();
    assert_eq!(fetched.id, created.id);

    db.create_system(&system("otheribmi")).await.unwrap();
    assert_eq!(db.list_systems().await.unwrap().len(), 2);

    assert_eq!(db.delete_system("myibmi").await.unwrap(), 1);
    assert!(db.get_system("myibmi").await.unwrap().is_none());
    assert!(db.delete_system("myibmi").await.is_err());

    db.close().await;
}

#[tokio::test]
async fn test_saved_system_resolves_connection() {
    let (db, _dir) = create_test_db().await;
    db.create_system(&system("myibmi")).await.unwrap();

    let saved = db.get_system("myibmi").await.unwrap().unwrap();
    let password = db.get_system_password("myibmi").await.unwrap();
    let mut connection = ConnectionConfig {
        host: Some("config-host".to_string()),
        ..Default::default()
    };
    connection.merge(&saved.connection_config(password));

    let server = connection.daemon_server().unwrap();
    assert_eq!(server.host, "myibmi");
    assert_eq!(server.user, "DEVUSER");
    assert_eq!(server.password, "passw0rd");
    assert_eq!(server.port, 8076);
    assert_eq!(connection.schema().unwrap(), "SAMPLE");

    db.close().await;
}

#[tokio::test]
async fn test_password_not_serialized() {
    let (db, _dir) = create_test_db().await;
    let created = db.create_system(&system("myibmi")).await.unwrap();

    let json = serde_json::to_string(&created).unwrap();
    assert!(!json.contains("passw0rd"));
    assert!(json.contains("\"password_storage\":\"plaintext\""));

    db.close().await;
}
