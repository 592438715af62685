//! Saved system persistence.
//!
//! CRUD operations for the connection details of IBM i systems, looked up
//! by host name.

use crate::config::{ConnectionConfig, DEFAULT_PORT};
use crate::error::{Db2iError, Result};
use crate::persistence::secrets::SecretStorage;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use tracing::{debug, warn};

/// Where a system's password is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStorage {
    /// OS keyring, under [`SecretStorage::system_password_key`].
    Keyring,
    /// The `password_plaintext` column.
    Plaintext,
}

impl PasswordStorage {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Keyring => "keyring",
            Self::Plaintext => "plaintext",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "keyring" => Self::Keyring,
            _ => Self::Plaintext,
        }
    }
}

/// Raw database row for a system.
#[derive(Debug, Clone, FromRow)]
pub struct SystemRow {
    pub id: i64,
    pub host: String,
    pub user: String,
    pub port: i64,
    pub schema: String,
    pub password_storage: String,
    pub password_plaintext: Option<String>,
    pub created_at: String,
}

/// A saved system. The password is never part of this value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
    pub id: i64,
    pub host: String,
    pub user: String,
    pub port: u16,
    pub schema: String,
    pub password_storage: PasswordStorage,
    pub created_at: String,
}

impl From<SystemRow> for System {
    fn from(row: SystemRow) -> Self {
        Self {
            id: row.id,
            port: u16::try_from(row.port).unwrap_or(DEFAULT_PORT),
            host: row.host,
            user: row.user,
            schema: row.schema,
            password_storage: PasswordStorage::parse(&row.password_storage),
            created_at: row.created_at,
        }
    }
}

impl System {
    /// Connection settings for this system.
    pub fn connection_config(&self, password: Option<String>) -> ConnectionConfig {
        ConnectionConfig {
            host: Some(self.host.clone()),
            port: Some(self.port),
            user: Some(self.user.clone()),
            password,
            schema: Some(self.schema.clone()),
            ..Default::default()
        }
    }

    /// Returns a display-safe string (no password).
    pub fn display_string(&self) -> String {
        format!("{}@{}:{} ({})", self.user, self.host, self.port, self.schema)
    }
}

/// Details of a system to save.
#[derive(Clone)]
pub struct NewSystem {
    pub host: String,
    pub user: String,
    pub password: String,
    pub port: u16,
    pub schema: String,
}

impl std::fmt::Debug for NewSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewSystem")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"******")
            .field("port", &self.port)
            .field("schema", &self.schema)
            .finish()
    }
}

const SELECT_SYSTEM: &str = r#"
    SELECT id, host, user, port, schema, password_storage, password_plaintext, created_at
    FROM systems
"#;

/// Saves a system and returns it with its assigned id.
///
/// The row is only committed once the password is stored, so a keyring
/// failure leaves nothing behind.
pub async fn create_system(
    pool: &SqlitePool,
    system: &NewSystem,
    secrets: &SecretStorage,
) -> Result<System> {
    let (storage, plaintext) = if secrets.is_secure() {
        (PasswordStorage::Keyring, None)
    } else {
        (PasswordStorage::Plaintext, Some(system.password.as_str()))
    };

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Db2iError::persistence(format!("Failed to start transaction: {e}")))?;

    let row: SystemRow = sqlx::query_as(
        r#"
        INSERT INTO systems (host, user, port, schema, password_storage, password_plaintext)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id, host, user, port, schema, password_storage, password_plaintext, created_at
        "#,
    )
    .bind(&system.host)
    .bind(&system.user)
    .bind(i64::from(system.port))
    .bind(&system.schema)
    .bind(storage.as_str())
    .bind(plaintext)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| Db2iError::persistence(format!("Error creating system: {e}")))?;

    if storage == PasswordStorage::Keyring {
        let key = SecretStorage::system_password_key(row.id);
        secrets.store(&key, &system.password)?;
    }

    tx.commit()
        .await
        .map_err(|e| Db2iError::persistence(format!("Error creating system: {e}")))?;

    debug!("Saved system {} (id {})", row.host, row.id);
    Ok(System::from(row))
}

/// Gets the first system saved for `host`.
pub async fn get_system(pool: &SqlitePool, host: &str) -> Result<Option<System>> {
    Ok(fetch_system_row(pool, host).await?.map(System::from))
}

/// Lists all saved systems, ordered by host.
pub async fn list_systems(pool: &SqlitePool) -> Result<Vec<System>> {
    let rows: Vec<SystemRow> = sqlx::query_as(&format!("{SELECT_SYSTEM} ORDER BY host, id"))
        .fetch_all(pool)
        .await
        .map_err(|e| Db2iError::persistence(format!("Failed to list systems: {e}")))?;

    Ok(rows.into_iter().map(System::from).collect())
}

/// Deletes every system saved for `host` and their stored passwords.
///
/// Returns the number of systems removed.
pub async fn delete_system(pool: &SqlitePool, host: &str, secrets: &SecretStorage) -> Result<u64> {
    let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM systems WHERE host = ?")
        .bind(host)
        .fetch_all(pool)
        .await
        .map_err(|e| Db2iError::persistence(format!("Failed to delete system: {e}")))?;

    if ids.is_empty() {
        return Err(Db2iError::persistence(format!(
            "System '{host}' not found"
        )));
    }

    for (id,) in &ids {
        secrets.delete(&SecretStorage::system_password_key(*id))?;
    }

    let result = sqlx::query("DELETE FROM systems WHERE host = ?")
        .bind(host)
        .execute(pool)
        .await
        .map_err(|e| Db2iError::persistence(format!("Failed to delete system: {e}")))?;

    Ok(result.rows_affected())
}

/// Retrieves the password of the first system saved for `host`.
pub async fn get_system_password(
    pool: &SqlitePool,
    host: &str,
    secrets: &SecretStorage,
) -> Result<Option<String>> {
    let row = fetch_system_row(pool, host)
        .await?
        .ok_or_else(|| Db2iError::persistence(format!("System '{host}' not found")))?;

    match PasswordStorage::parse(&row.password_storage) {
        PasswordStorage::Plaintext => Ok(row.password_plaintext),
        PasswordStorage::Keyring => {
            let key = SecretStorage::system_password_key(row.id);
            let password = secrets.retrieve(&key)?;
            if password.is_none() {
                warn!(
                    "Password for system '{host}' is stored in the keyring but could not be \
                     retrieved. Remove and re-add the system to store it again."
                );
            }
            Ok(password)
        }
    }
}

async fn fetch_system_row(pool: &SqlitePool, host: &str) -> Result<Option<SystemRow>> {
    sqlx::query_as(&format!("{SELECT_SYSTEM} WHERE host = ? ORDER BY id LIMIT 1"))
        .bind(host)
        .fetch_optional(pool)
        .await
        .map_err(|e| Db2iError::persistence(format!("Failed to get system: {e}")))
}
