//! Boundary trait over persistent secret storage.

use parking_lot::Mutex;
use thiserror::Error;

/// Errors surfaced by a secret store backend.
#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("secret store backend failure: {0}")]
    Backend(String),
}

/// Persisted secrets the secure channel depends on: the derived symmetric key
/// and the device password. Backing storage (keychain, preferences, memory)
/// is opaque to the core.
pub trait SecretStore: Send + Sync {
    /// Persists the derived symmetric key, replacing any previous one.
    fn save_symmetric_key(&self, key: &[u8; 32]) -> Result<(), SecretStoreError>;

    /// Fetches the symmetric key, `None` when no exchange has run yet.
    fn symmetric_key(&self) -> Option<[u8; 32]>;

    /// Persists the device password, replacing any previous one.
    fn save_device_password(&self, password: &str) -> Result<(), SecretStoreError>;

    /// Fetches the device password, `None` when none was generated yet.
    fn device_password(&self) -> Option<String>;
}

/// Simple in-memory store useful for unit tests and examples.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    symmetric_key: Mutex<Option<[u8; 32]>>,
    device_password: Mutex<Option<String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn save_symmetric_key(&self, key: &[u8; 32]) -> Result<(), SecretStoreError> {
        *self.symmetric_key.lock() = Some(*key);
        Ok(())
    }

    fn symmetric_key(&self) -> Option<[u8; 32]> {
        *self.symmetric_key.lock()
    }

    fn save_device_password(&self, password: &str) -> Result<(), SecretStoreError> {
        *self.device_password.lock() = Some(password.to_owned());
        Ok(())
    }

    fn device_password(&self) -> Option<String> {
        self.device_password.lock().clone()
    }
}
