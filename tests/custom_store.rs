//! Tests for pluggable Store implementations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sealcore::store::{
    StoreError, ENCRYPT_KEY_SALT_NAME, ROOT_KEY_HASH_NAME, ROOT_KEY_SALT_NAME,
    WRAPPED_ENCRYPT_KEY_NAME,
};
use sealcore::{KeyManager, SealConfig, SealState, SealcoreError, Store, UnsealProgress};

/// A store backed by a shared map, standing in for an external backend that
/// outlives any single manager instance.
struct SharedMapStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl SharedMapStore {
    fn new(values: Arc<Mutex<HashMap<String, String>>>) -> Self {
        Self { values }
    }
}

impl Store for SharedMapStore {
    fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().unwrap().get(name).cloned())
    }

    fn add(&self, name: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}

/// A store whose backend is unreachable.
struct FailingStore;

impl Store for FailingStore {
    fn get(&self, _name: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::new("disk offline"))
    }

    fn add(&self, _name: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::new("disk offline"))
    }
}

#[test]
fn test_injected_store_receives_the_persisted_layout() {
    let values = Arc::new(Mutex::new(HashMap::new()));
    let manager = KeyManager::with_store(
        SharedMapStore::new(Arc::clone(&values)),
        SealConfig::default(),
    )
    .unwrap();
    manager.init().unwrap();

    let map = values.lock().unwrap();
    for name in [
        ROOT_KEY_HASH_NAME,
        WRAPPED_ENCRYPT_KEY_NAME,
        ROOT_KEY_SALT_NAME,
        ENCRYPT_KEY_SALT_NAME,
    ] {
        assert!(map.contains_key(name), "{name} missing from backend");
    }
    // Exactly the four names: the root key itself is never persisted.
    assert_eq!(map.len(), 4);
}

#[test]
fn test_restart_over_the_same_backend_stays_initialized() {
    // Goal: salts and hashes persist, so a fresh process over the same
    // backend comes up sealed and the original shares still work.

    let values = Arc::new(Mutex::new(HashMap::new()));

    let (output, ciphertext) = {
        let first = KeyManager::with_store(
            SharedMapStore::new(Arc::clone(&values)),
            SealConfig::default(),
        )
        .unwrap();
        let output = first.init().unwrap();
        let ciphertext = first.encrypt(b"survives restart").unwrap();
        (output, ciphertext)
        // `first` drops here; only the backend survives.
    };

    let restarted = KeyManager::with_store(
        SharedMapStore::new(Arc::clone(&values)),
        SealConfig::default(),
    )
    .unwrap();
    assert_eq!(restarted.state().unwrap(), SealState::Sealed);
    assert!(restarted.is_sealed().unwrap());
    assert!(matches!(
        restarted.init(),
        Err(SealcoreError::AlreadyInitialized)
    ));

    for token in &output.share_tokens[..2] {
        restarted.unseal(token).unwrap();
    }
    assert_eq!(
        restarted.unseal(&output.share_tokens[2]).unwrap(),
        UnsealProgress::Unsealed
    );

    // Derivation was stable: data encrypted before the restart opens.
    assert_eq!(
        restarted.decrypt(&ciphertext).unwrap(),
        b"survives restart"
    );
}

#[test]
fn test_backend_failure_surfaces_as_backend_error() {
    let err = KeyManager::with_store(FailingStore, SealConfig::default())
        .err()
        .expect("construction over a failing backend must error");
    match err {
        SealcoreError::Backend(message) => assert!(message.contains("disk offline")),
        other => panic!("expected Backend error, got {other:?}"),
    }
}
