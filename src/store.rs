//! Pluggable persistence for seal state.
//!
//! The store is a generic named-blob backend: it holds the root key hash,
//! the wrapped encryption key, and the two derivation salts — nothing else,
//! and never a plaintext key. All values are transport-encoded (base64)
//! strings. Callers inject an alternative [`Store`] implementation without
//! changing [`crate::manager::KeyManager`].
//!
//! ## Persisted layout
//!
//! | name               | value                                      |
//! |--------------------|--------------------------------------------|
//! | `root_key`         | PBKDF2 hash of the root key token          |
//! | `encrypt_key`      | encryption key wrapped under the root key  |
//! | `root_key_salt`    | salt for the root-key-hash derivation      |
//! | `encrypt_key_salt` | salt for the encryption-key derivation     |

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use crate::error::SealcoreError;

/// Store name holding the hash of the root key.
pub const ROOT_KEY_HASH_NAME: &str = "root_key";

/// Store name holding the encryption key wrapped under the root key.
pub const WRAPPED_ENCRYPT_KEY_NAME: &str = "encrypt_key";

/// Store name holding the salt for the root-key-hash derivation.
pub const ROOT_KEY_SALT_NAME: &str = "root_key_salt";

/// Store name holding the salt for the encryption-key derivation.
pub const ENCRYPT_KEY_SALT_NAME: &str = "encrypt_key_salt";

/// A failure reported by a store implementation.
///
/// Carries the backend's own message; the manager wraps it into
/// [`SealcoreError::Backend`] so store failures are never confused with
/// cryptographic ones.
#[derive(Debug)]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<StoreError> for SealcoreError {
    fn from(err: StoreError) -> Self {
        SealcoreError::Backend(err.message)
    }
}

/// Named get / create-or-overwrite persistence.
///
/// Implementations must make `get` and `add` individually atomic. `update`
/// defaults to `add`; backends that distinguish create from overwrite can
/// override it.
pub trait Store: Send + Sync {
    /// Fetch a named value, `None` if it was never written.
    fn get(&self, name: &str) -> Result<Option<String>, StoreError>;

    /// Create or overwrite a named value.
    fn add(&self, name: &str, value: &str) -> Result<(), StoreError>;

    /// Overwrite an existing named value.
    fn update(&self, name: &str, value: &str) -> Result<(), StoreError> {
        self.add(name, value)
    }
}

/// In-memory store, the default backend.
///
/// Suitable for tests and single-process deployments; everything it holds
/// disappears with the process, which means the installation must be
/// re-initialized on every start.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        let values = self
            .values
            .lock()
            .map_err(|_| StoreError::new("memory store lock poisoned"))?;
        Ok(values.get(name).cloned())
    }

    fn add(&self, name: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| StoreError::new("memory store lock poisoned"))?;
        values.insert(name.to_string(), value.to_string());
        Ok(())
    }
}
