//! Seal state machine and orchestration.
//!
//! [`KeyManager`] owns the seal lifecycle: `init` provisions a fresh root
//! key and share set, `unseal` collects shares until the threshold is met,
//! `seal` evicts key material from memory, and `encrypt`/`decrypt` protect
//! application data only while unsealed.
//!
//! All `SealState` transitions and pending-share mutations pass through a
//! single mutex, so two concurrent unseal calls cannot corrupt the share
//! buffer or race a seal. Key derivation and cipher work run on copies taken
//! under the lock.
//!
//! State diagram:
//!
//! ```text
//! Uninitialized --init--> Unsealed --seal--> Sealed --unseal xT--> Unsealed
//!                                              ^                      |
//!                                              +---------seal---------+
//! ```

use std::sync::{Mutex, MutexGuard};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::constant_time;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto;
use crate::error::SealcoreError;
use crate::keys::{self, EncryptionKey, RootKey, SaltContext};
use crate::shamir::{self, KeyShare};
use crate::store::{MemoryStore, Store, ROOT_KEY_HASH_NAME, WRAPPED_ENCRYPT_KEY_NAME};
use crate::token;

/// Share-distribution parameters for an installation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SealConfig {
    /// Number of key shares produced at `init`.
    pub share_count: usize,
    /// Number of distinct shares required to reconstruct the root key.
    pub threshold: usize,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            share_count: 5,
            threshold: 3,
        }
    }
}

impl SealConfig {
    /// The share token carries the index as two decimal digits, which caps
    /// an installation at 99 shares.
    pub fn validate(&self) -> Result<(), SealcoreError> {
        if self.threshold < 2 {
            return Err(SealcoreError::InvalidConfig("threshold must be at least 2"));
        }
        if self.threshold > self.share_count {
            return Err(SealcoreError::InvalidConfig(
                "threshold cannot exceed share count",
            ));
        }
        if self.share_count > token::MAX_SHARE_INDEX as usize {
            return Err(SealcoreError::InvalidConfig(
                "share count is limited to 99 by the token format",
            ));
        }
        Ok(())
    }
}

/// Lifecycle states of the seal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SealState {
    /// No root key hash has ever been persisted.
    Uninitialized,
    /// Initialized, no key material in memory.
    Sealed,
    /// Shares are being collected; the threshold has not been met.
    Unsealing,
    /// Root and encryption keys are cached in memory.
    Unsealed,
}

/// Root token and encoded shares, returned by [`KeyManager::init`] exactly
/// once. The caller is responsible for secure distribution and storage;
/// neither value can be recovered from the store afterwards.
#[derive(Debug, Serialize)]
pub struct InitOutput {
    /// Base64 form of the root key.
    pub root_token: String,
    /// One transport-encoded share per custodian.
    pub share_tokens: Vec<String>,
}

/// Outcome of submitting one share token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UnsealProgress {
    /// The threshold was met and the reconstructed root key authenticated.
    Unsealed,
    /// More shares are needed: `collected` of `threshold` so far.
    Waiting { collected: usize, threshold: usize },
    /// The system was already unsealed; the share was ignored.
    AlreadyUnsealed,
}

/// Outcome of an auto-unseal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AutoUnseal {
    /// The pre-shared trigger authenticated and the system is unsealed.
    Unsealed,
    /// No trigger was configured.
    Skipped,
}

/// Mutable state guarded by the manager lock.
struct SealInner {
    state: SealState,
    pending: Vec<KeyShare>,
    root_key: Option<RootKey>,
    encrypt_key: Option<EncryptionKey>,
}

/// Orchestrates init / seal / unseal and application-data encryption over a
/// pluggable [`Store`].
pub struct KeyManager<S: Store = MemoryStore> {
    store: S,
    config: SealConfig,
    inner: Mutex<SealInner>,
}

impl KeyManager<MemoryStore> {
    /// Manager over the in-memory store with the default 3-of-5 scheme.
    pub fn in_memory() -> Result<Self, SealcoreError> {
        Self::with_store(MemoryStore::new(), SealConfig::default())
    }
}

impl<S: Store> KeyManager<S> {
    /// Build a manager over `store`.
    ///
    /// The starting state is read from the store: `Sealed` if a root key
    /// hash is already persisted (a restarted installation), `Uninitialized`
    /// otherwise.
    pub fn with_store(store: S, config: SealConfig) -> Result<Self, SealcoreError> {
        config.validate()?;
        let state = match store.get(ROOT_KEY_HASH_NAME)? {
            Some(_) => SealState::Sealed,
            None => SealState::Uninitialized,
        };
        Ok(Self {
            store,
            config,
            inner: Mutex::new(SealInner {
                state,
                pending: Vec::new(),
                root_key: None,
                encrypt_key: None,
            }),
        })
    }

    pub fn config(&self) -> SealConfig {
        self.config
    }

    /// The backend handle, exposed so operators can reach the persisted
    /// layout directly.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current lifecycle state, as last committed.
    pub fn state(&self) -> Result<SealState, SealcoreError> {
        Ok(self.lock()?.state)
    }

    fn lock(&self) -> Result<MutexGuard<'_, SealInner>, SealcoreError> {
        // A panic mid-transition leaves the seal state unknown; refuse to
        // keep operating on it.
        self.inner.lock().map_err(|_| SealcoreError::CorruptState)
    }

    /// Provision a fresh root key and share set.
    ///
    /// Persists the root key hash, the derivation salts, and the encryption
    /// key wrapped under the root token; commits `Unsealed` with both keys
    /// cached. The returned [`InitOutput`] is the only moment the root token
    /// and shares exist outside process memory.
    ///
    /// Fails with `AlreadyInitialized` if a root key hash is already
    /// persisted; shares are never regenerated for an installation.
    pub fn init(&self) -> Result<InitOutput, SealcoreError> {
        let mut inner = self.lock()?;

        if self.store.get(ROOT_KEY_HASH_NAME)?.is_some() {
            return Err(SealcoreError::AlreadyInitialized);
        }

        let root_key = RootKey::generate()?;
        let shares = shamir::split(
            self.config.threshold,
            self.config.share_count,
            root_key.as_bytes(),
        )?;
        let share_tokens = shares
            .iter()
            .map(token::encode_share)
            .collect::<Result<Vec<_>, _>>()?;

        let root_token = root_key.token();

        // Only the hash of the token is persisted, never the token itself.
        let hash = keys::derive(&self.store, SaltContext::RootKeyHash, root_token.as_bytes())?;
        self.store.add(ROOT_KEY_HASH_NAME, &hash)?;

        let encoded_key =
            keys::derive(&self.store, SaltContext::EncryptKey, root_token.as_bytes())?;
        let wrapped = crypto::encrypt(root_token.as_bytes(), encoded_key.as_bytes())?;
        self.store.add(WRAPPED_ENCRYPT_KEY_NAME, &wrapped)?;

        inner.encrypt_key = Some(EncryptionKey::from_encoded(&encoded_key)?);
        inner.root_key = Some(root_key);
        inner.pending.clear();
        inner.state = SealState::Unsealed;

        Ok(InitOutput {
            root_token,
            share_tokens,
        })
    }

    /// Submit one share token toward unsealing.
    ///
    /// A pending share with the same index is replaced, otherwise the share
    /// is appended; the buffer is capped at `share_count` entries, dropping
    /// the oldest on overflow. Once the threshold is met, reconstruction
    /// uses exactly the first `threshold` buffered shares. On a failed
    /// attempt the buffer is kept, so a custodian can replace a bad share
    /// and retry without resubmitting the others.
    pub fn unseal(&self, share_token: &str) -> Result<UnsealProgress, SealcoreError> {
        let mut inner = self.lock()?;

        if inner.state == SealState::Unsealed {
            return Ok(UnsealProgress::AlreadyUnsealed);
        }

        let share =
            token::decode_share(share_token).map_err(|_| SealcoreError::InvalidUnsealShares)?;

        match inner.pending.iter().position(|s| s.index == share.index) {
            Some(position) => inner.pending[position] = share,
            None => {
                if inner.pending.len() >= self.config.share_count {
                    inner.pending.remove(0);
                }
                inner.pending.push(share);
            }
        }
        inner.state = SealState::Unsealing;

        if inner.pending.len() < self.config.threshold {
            return Ok(UnsealProgress::Waiting {
                collected: inner.pending.len(),
                threshold: self.config.threshold,
            });
        }

        let attempt: Vec<KeyShare> = inner.pending[..self.config.threshold].to_vec();
        let mut secret = shamir::combine(self.config.threshold, &attempt)?;
        let candidate = RootKey::try_from_slice(&secret)
            .map_err(|_| SealcoreError::InvalidUnsealShares);
        secret.zeroize();

        match self.authenticate(&mut inner, candidate?) {
            Ok(()) => Ok(UnsealProgress::Unsealed),
            Err(SealcoreError::InvalidRootKey) => Err(SealcoreError::InvalidUnsealShares),
            Err(err) => Err(err),
        }
    }

    /// Authenticate a candidate root key and commit the unsealed state.
    ///
    /// The hash comparison is constant-time. A hash match followed by a
    /// failed unwrap of the encryption key means the persisted state was
    /// tampered with — the same token wrapped it at `init`.
    fn authenticate(
        &self,
        inner: &mut SealInner,
        candidate: RootKey,
    ) -> Result<(), SealcoreError> {
        let stored_hash = self
            .store
            .get(ROOT_KEY_HASH_NAME)?
            .ok_or(SealcoreError::NotInitialized)?;

        let candidate_token = candidate.token();
        let computed_hash = keys::derive(
            &self.store,
            SaltContext::RootKeyHash,
            candidate_token.as_bytes(),
        )?;
        verify_hashes_match(&stored_hash, &computed_hash)?;

        let wrapped = self
            .store
            .get(WRAPPED_ENCRYPT_KEY_NAME)?
            .ok_or(SealcoreError::CorruptState)?;
        let unwrapped = crypto::decrypt(candidate_token.as_bytes(), &wrapped)
            .map_err(|_| SealcoreError::CorruptState)?;
        let encoded =
            std::str::from_utf8(&unwrapped).map_err(|_| SealcoreError::CorruptState)?;
        let encrypt_key =
            EncryptionKey::from_encoded(encoded).map_err(|_| SealcoreError::CorruptState)?;

        inner.encrypt_key = Some(encrypt_key);
        inner.root_key = Some(candidate);
        inner.pending.clear();
        inner.state = SealState::Unsealed;
        Ok(())
    }

    /// Seal the system, discarding cached key material.
    ///
    /// Requires a valid root token, re-authenticated against the persisted
    /// hash — any holder of the token may force a seal, independent of who
    /// performed the unseal.
    pub fn seal(&self, root_token: &str) -> Result<(), SealcoreError> {
        let mut inner = self.lock()?;

        let stored_hash = self
            .store
            .get(ROOT_KEY_HASH_NAME)?
            .ok_or(SealcoreError::NotInitialized)?;

        let candidate = RootKey::from_token(root_token)?;
        let computed_hash = keys::derive(
            &self.store,
            SaltContext::RootKeyHash,
            candidate.token().as_bytes(),
        )?;
        verify_hashes_match(&stored_hash, &computed_hash)?;

        inner.root_key = None;
        inner.encrypt_key = None;
        inner.pending.clear();
        inner.state = SealState::Sealed;
        Ok(())
    }

    /// Whether the system is sealed.
    ///
    /// Reports unsealed only when the committed state is `Unsealed` *and*
    /// the cached root key, re-hashed with the persisted salt, still matches
    /// the persisted hash. Uninitialized systems report sealed.
    pub fn is_sealed(&self) -> Result<bool, SealcoreError> {
        let inner = self.lock()?;

        if inner.state != SealState::Unsealed {
            return Ok(true);
        }
        let root_key = match &inner.root_key {
            Some(key) => key,
            None => return Ok(true),
        };
        let stored_hash = match self.store.get(ROOT_KEY_HASH_NAME)? {
            Some(hash) => hash,
            None => return Ok(true),
        };

        let computed_hash = keys::derive(
            &self.store,
            SaltContext::RootKeyHash,
            root_key.token().as_bytes(),
        )?;
        Ok(verify_hashes_match(&stored_hash, &computed_hash).is_err())
    }

    /// Unseal from a pre-shared trigger, bypassing share collection.
    ///
    /// An empty trigger is skipped. A 24-character trigger is parsed as the
    /// base64 root token and authenticated directly. URL triggers (remote
    /// unseal) are declared but not implemented.
    pub fn auto_unseal(&self, trigger: &str) -> Result<AutoUnseal, SealcoreError> {
        let trimmed = trigger.trim();
        if trimmed.is_empty() {
            return Ok(AutoUnseal::Skipped);
        }
        if trimmed.starts_with("http") {
            return Err(SealcoreError::Unsupported("remote unseal trigger"));
        }
        if trimmed.len() != keys::ROOT_TOKEN_LEN {
            return Err(SealcoreError::InvalidRootKey);
        }

        let candidate = RootKey::from_token(trimmed)?;
        let mut inner = self.lock()?;
        self.authenticate(&mut inner, candidate)?;
        Ok(AutoUnseal::Unsealed)
    }

    /// Encrypt application data under the cached encryption key.
    ///
    /// Fails fast with `Sealed` unless the system is unsealed.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, SealcoreError> {
        let mut key = self.encryption_key_bytes()?;
        let result = crypto::encrypt(&key, plaintext);
        key.zeroize();
        result
    }

    /// Decrypt application data produced by [`KeyManager::encrypt`].
    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>, SealcoreError> {
        let mut key = self.encryption_key_bytes()?;
        let result = crypto::decrypt(&key, encoded);
        key.zeroize();
        result
    }

    /// Copy the cached encryption key out under the lock so cipher work can
    /// run without holding it.
    fn encryption_key_bytes(&self) -> Result<[u8; keys::DERIVED_KEY_LEN], SealcoreError> {
        let inner = self.lock()?;
        if inner.state != SealState::Unsealed {
            return Err(SealcoreError::Sealed);
        }
        match &inner.encrypt_key {
            Some(key) => Ok(*key.as_bytes()),
            None => Err(SealcoreError::Sealed),
        }
    }
}

/// Constant-time comparison of two persisted (base64) hash values.
fn verify_hashes_match(stored: &str, computed: &str) -> Result<(), SealcoreError> {
    let stored_raw = STANDARD
        .decode(stored)
        .map_err(|_| SealcoreError::CorruptState)?;
    let computed_raw = STANDARD
        .decode(computed)
        .map_err(|_| SealcoreError::CorruptState)?;
    constant_time::verify_slices_are_equal(&stored_raw, &computed_raw)
        .map_err(|_| SealcoreError::InvalidRootKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_bounds() {
        assert!(SealConfig::default().validate().is_ok());
        assert!(SealConfig {
            share_count: 5,
            threshold: 1
        }
        .validate()
        .is_err());
        assert!(SealConfig {
            share_count: 2,
            threshold: 3
        }
        .validate()
        .is_err());
        assert!(SealConfig {
            share_count: 100,
            threshold: 3
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_auto_unseal_trigger_dispatch() {
        let manager = KeyManager::in_memory().unwrap();

        assert_eq!(manager.auto_unseal("  ").unwrap(), AutoUnseal::Skipped);
        assert!(matches!(
            manager.auto_unseal("https://unseal.example/key"),
            Err(SealcoreError::Unsupported(_))
        ));
        assert!(matches!(
            manager.auto_unseal("short-trigger"),
            Err(SealcoreError::InvalidRootKey)
        ));
    }

    #[test]
    fn test_unseal_before_init_reports_not_initialized_at_threshold() {
        let manager = KeyManager::in_memory().unwrap();
        let shares = crate::shamir::split(3, 5, &[9u8; 16]).unwrap();

        let first = crate::token::encode_share(&shares[0]).unwrap();
        let second = crate::token::encode_share(&shares[1]).unwrap();
        let third = crate::token::encode_share(&shares[2]).unwrap();

        assert_eq!(
            manager.unseal(&first).unwrap(),
            UnsealProgress::Waiting {
                collected: 1,
                threshold: 3
            }
        );
        assert_eq!(
            manager.unseal(&second).unwrap(),
            UnsealProgress::Waiting {
                collected: 2,
                threshold: 3
            }
        );
        assert!(matches!(
            manager.unseal(&third),
            Err(SealcoreError::NotInitialized)
        ));
    }

    #[test]
    fn test_resubmitted_index_replaces_pending_share() {
        let manager = KeyManager::in_memory().unwrap();
        let shares = crate::shamir::split(3, 5, &[4u8; 16]).unwrap();

        let token_a = crate::token::encode_share(&shares[0]).unwrap();
        manager.unseal(&token_a).unwrap();
        // Same index again: the buffer must not grow.
        let progress = manager.unseal(&token_a).unwrap();
        assert_eq!(
            progress,
            UnsealProgress::Waiting {
                collected: 1,
                threshold: 3
            }
        );
    }
}
