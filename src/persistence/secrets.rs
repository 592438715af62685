//! Secret storage using the OS keyring.
//!
//! System passwords go to the keyring when it is usable. When it is not,
//! callers fall back to plaintext in the state database.

use crate::error::{Db2iError, Result};
use keyring::Entry;
use tracing::{debug, warn};

const SERVICE_NAME: &str = "db2i-tools";

/// Status of the secure storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStorageStatus {
    /// OS keyring is available and working.
    Secure,
    /// Keyring unavailable; secrets are kept in plaintext.
    Plaintext,
}

/// Manages storage of system passwords.
#[derive(Debug, Clone)]
pub struct SecretStorage {
    keyring_available: bool,
}

impl Default for SecretStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStorage {
    /// Creates a secret storage instance, probing keyring availability.
    pub fn new() -> Self {
        let keyring_available = Self::probe_keyring();
        debug!("Keyring available: {keyring_available}");
        Self { keyring_available }
    }

    /// Creates a storage that never touches the keyring.
    pub fn plaintext_only() -> Self {
        Self {
            keyring_available: false,
        }
    }

    /// Probes whether the OS keyring persists secrets.
    ///
    /// Writes through one entry and reads back through a fresh one, so
    /// in-memory stores that forget between entries count as unavailable.
    fn probe_keyring() -> bool {
        const PROBE_USER: &str = "__probe__";
        const PROBE_SECRET: &str = "db2i-tools-probe";

        let Ok(writer) = Entry::new(SERVICE_NAME, PROBE_USER) else {
            return false;
        };
        if writer.set_password(PROBE_SECRET).is_err() {
            return false;
        }

        let persisted = Entry::new(SERVICE_NAME, PROBE_USER)
            .and_then(|reader| reader.get_password())
            .map(|secret| secret == PROBE_SECRET)
            .unwrap_or(false);

        let _ = writer.delete_credential();
        persisted
    }

    /// Returns the current status of secret storage.
    pub fn status(&self) -> SecretStorageStatus {
        if self.keyring_available {
            SecretStorageStatus::Secure
        } else {
            SecretStorageStatus::Plaintext
        }
    }

    /// Returns whether secure storage (keyring) is available.
    pub fn is_secure(&self) -> bool {
        self.keyring_available
    }

    /// Stores a secret in the keyring.
    pub fn store(&self, key: &str, secret: &str) -> Result<()> {
        if !self.keyring_available {
            return Err(Db2iError::persistence("Keyring unavailable"));
        }

        let entry = Entry::new(SERVICE_NAME, key)
            .map_err(|e| Db2iError::persistence(format!("Failed to create keyring entry: {e}")))?;

        entry
            .set_password(secret)
            .map_err(|e| Db2iError::persistence(format!("Failed to store secret: {e}")))
    }

    /// Retrieves a secret from the keyring.
    pub fn retrieve(&self, key: &str) -> Result<Option<String>> {
        if !self.keyring_available {
            return Ok(None);
        }

        let entry = Entry::new(SERVICE_NAME, key)
            .map_err(|e| Db2iError::persistence(format!("Failed to access keyring: {e}")))?;

        match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Db2iError::persistence(format!(
                "Failed to retrieve secret: {e}"
            ))),
        }
    }

    /// Deletes a secret from the keyring. Missing entries are not an error.
    pub fn delete(&self, key: &str) -> Result<()> {
        if !self.keyring_available {
            return Ok(());
        }

        let entry = Entry::new(SERVICE_NAME, key)
            .map_err(|e| Db2iError::persistence(format!("Failed to access keyring: {e}")))?;

        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                warn!("Failed to delete secret from keyring: {e}");
                Ok(())
            }
        }
    }

    /// Keyring key for a saved system's password.
    pub fn system_password_key(system_id: i64) -> String {
        format!("system:{system_id}")
    }

    /// Masks a secret for display, showing only the last 4 characters.
    pub fn mask_secret(secret: &str) -> String {
        let count = secret.chars().count();
        if count <= 4 {
            "*".repeat(count)
        } else {
            let tail: String = secret.chars().skip(count - 4).collect();
            format!("****...{tail}")
        }
    }
}
