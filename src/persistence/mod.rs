//! Persistence layer for db2i-tools.
//!
//! Manages the local SQLite state database holding saved systems. Passwords
//! are stored via the OS keyring when available.

mod migrations;
mod secrets;
pub mod systems;

pub use secrets::{SecretStorage, SecretStorageStatus};
pub use systems::{NewSystem, PasswordStorage, System, SystemRow};

use crate::error::{Db2iError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY_MS: u64 = 100;

/// Main persistence interface for the application state database.
pub struct StateDb {
    pool: SqlitePool,
    db_path: PathBuf,
    secret_storage: SecretStorage,
}

impl StateDb {
    /// Opens or creates the state database at the default platform path.
    ///
    /// - Linux: `~/.config/db2i-tools/state.db`
    /// - macOS: `~/Library/Application Support/db2i-tools/state.db`
    /// - Windows: `%APPDATA%\db2i-tools\state.db`
    pub async fn open_default() -> Result<Self> {
        let path = Self::default_path()?;
        Self::open(&path).await
    }

    /// Opens or creates the state database at the specified path.
    pub async fn open(path: &Path) -> Result<Self> {
        Self::open_with_secrets(path, SecretStorage::new()).await
    }

    /// Opens the state database with an explicit secret storage backend.
    pub async fn open_with_secrets(path: &Path, secret_storage: SecretStorage) -> Result<Self> {
        Self::ensure_parent_dirs(path)?;

        match Self::try_open(path, &secret_storage).await {
            Ok(db) => Ok(db),
            Err(e) => {
                warn!("Failed to open state database: {e}. Attempting recovery...");
                Self::attempt_recovery(path, &secret_storage).await
            }
        }
    }

    /// Returns the default state database path for the current platform.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            Db2iError::persistence("Could not determine config directory")
        })?;
        Ok(config_dir.join("db2i-tools").join("state.db"))
    }

    /// Attempts to open the database with retries for lock contention.
    async fn try_open(path: &Path, secret_storage: &SecretStorage) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(
                    RETRY_DELAY_MS * 2u64.pow(attempt),
                ))
                .await;
            }

            match Self::connect(path).await {
                Ok(pool) => {
                    migrations::run_migrations(&pool).await?;
                    info!("State database opened at {}", path.display());
                    return Ok(Self {
                        pool,
                        db_path: path.to_path_buf(),
                        secret_storage: secret_storage.clone(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Db2iError::persistence("Failed to open database after retries")
        }))
    }

    /// Creates a connection pool to the SQLite database.
    async fn connect(path: &Path) -> Result<SqlitePool> {
        let conn_str = format!("sqlite:{}?mode=rwc", path.display());
        let options = SqliteConnectOptions::from_str(&conn_str)
            .map_err(|e| Db2iError::persistence(format!("Invalid database path: {e}")))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| Db2iError::persistence(format!("Failed to connect to state database: {e}")))
    }

    /// Ensures parent directories exist for the database path.
    fn ensure_parent_dirs(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Db2iError::persistence(format!(
                    "Failed to create config directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        Ok(())
    }

    /// Attempts to recover from a corrupted database by backing up and recreating.
    async fn attempt_recovery(path: &Path, secret_storage: &SecretStorage) -> Result<Self> {
        let backup_path = path.with_extension("db.bak");

        if path.exists() {
            std::fs::rename(path, &backup_path).map_err(|e| {
                Db2iError::persistence(format!(
                    "Failed to backup corrupted database to {}: {e}",
                    backup_path.display()
                ))
            })?;
            warn!(
                "Backed up corrupted database to {}",
                backup_path.display()
            );
        }

        Self::try_open(path, secret_storage).await.map_err(|e| {
            Db2iError::persistence(format!(
                "Failed to recreate database after backup: {e}"
            ))
        })
    }

    /// Returns the path to the state database.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Returns the secret storage interface.
    pub fn secrets(&self) -> &SecretStorage {
        &self.secret_storage
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Saves a system, storing its password per the available backend.
    pub async fn create_system(&self, system: &NewSystem) -> Result<System> {
        systems::create_system(&self.pool, system, &self.secret_storage).await
    }

    /// Gets the first system saved for `host`.
    pub async fn get_system(&self, host: &str) -> Result<Option<System>> {
        systems::get_system(&self.pool, host).await
    }

    /// Lists all saved systems.
    pub async fn list_systems(&self) -> Result<Vec<System>> {
        systems::list_systems(&self.pool).await
    }

    /// Deletes the systems saved for `host`.
    pub async fn delete_system(&self, host: &str) -> Result<u64> {
        systems::delete_system(&self.pool, host, &self.secret_storage).await
    }

    /// Retrieves the password of the first system saved for `host`.
    pub async fn get_system_password(&self, host: &str) -> Result<Option<String>> {
        systems::get_system_password(&self.pool, host, &self.secret_storage).await
    }

    /// Returns the status of secure storage availability.
    pub fn secret_storage_status(&self) -> SecretStorageStatus {
        self.secret_storage.status()
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
