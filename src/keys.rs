//! Key derivation and ownership.
//!
//! This module owns two responsibilities:
//! 1. Deriving fixed-length keys from secret material using
//!    PBKDF2-HMAC-SHA256, with per-context salts persisted through the
//!    [`Store`].
//! 2. Holding key material in types that are opaque, non-cloneable, and
//!    zeroised on drop.
//!
//! This is one of exactly two modules permitted to touch primitives directly
//! (the other is `crypto`). The derivation logic lives here because it
//! operates on the key material itself — not on ciphertexts.
//!
//! ## Derivation structure
//!
//! ```text
//! PBKDF2-HMAC-SHA256(
//!     secret     = <caller material>,
//!     salt       = <persisted salt for the context>,
//!     iterations = 100_000,
//!     out        = 32 bytes
//! )
//! ```
//!
//! Each context owns an independent salt, generated once and persisted —
//! the first caller wins the salt for the life of the installation, so
//! derivation stays deterministic across restarts.

use std::num::NonZeroU32;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::pbkdf2;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto;
use crate::error::SealcoreError;
use crate::store::{self, Store};

/// PBKDF2 iteration count, fixed for the life of an installation.
const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => panic!("iteration count must be non-zero"),
};

/// Size of a derived key in bytes (256 bits).
pub(crate) const DERIVED_KEY_LEN: usize = 32;

/// Size of the root key in bytes (128 bits).
pub(crate) const ROOT_KEY_LEN: usize = 16;

/// Length of the base64 root token presented to operators.
pub(crate) const ROOT_TOKEN_LEN: usize = 24;

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// The derivation contexts. Each owns an independently persisted salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SaltContext {
    /// Hashing the root key token for authentication.
    RootKeyHash,
    /// Deriving the data encryption key from the root key token.
    EncryptKey,
}

impl SaltContext {
    fn store_name(self) -> &'static str {
        match self {
            Self::RootKeyHash => store::ROOT_KEY_SALT_NAME,
            Self::EncryptKey => store::ENCRYPT_KEY_SALT_NAME,
        }
    }

    fn salt_len(self) -> usize {
        match self {
            Self::RootKeyHash => 16,
            Self::EncryptKey => 32,
        }
    }
}

/// Look up the persisted salt for a context, generating and persisting one
/// on first use.
fn context_salt<S: Store>(store: &S, context: SaltContext) -> Result<Vec<u8>, SealcoreError> {
    if let Some(encoded) = store.get(context.store_name())? {
        return STANDARD
            .decode(encoded)
            .map_err(|_| SealcoreError::CorruptState);
    }

    let mut salt = vec![0u8; context.salt_len()];
    crypto::fill_random(&mut salt)?;
    store.add(context.store_name(), &STANDARD.encode(&salt))?;
    Ok(salt)
}

/// Derive a 32-byte key from `material` under the context's persisted salt.
///
/// Returns the key transport-encoded (base64). Deterministic given the same
/// material once the context's salt exists.
pub(crate) fn derive<S: Store>(
    store: &S,
    context: SaltContext,
    material: &[u8],
) -> Result<String, SealcoreError> {
    let salt = context_salt(store, context)?;

    let mut out = [0u8; DERIVED_KEY_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        PBKDF2_ITERATIONS,
        &salt,
        material,
        &mut out,
    );

    let encoded = STANDARD.encode(out);
    out.zeroize();
    Ok(encoded)
}

// ---------------------------------------------------------------------------
// Root key
// ---------------------------------------------------------------------------

/// The master unseal secret.
///
/// Exists only transiently at generation time and in process memory while
/// unsealed; it is never persisted — only its hash is. The 24-character
/// base64 *token* is the canonical operator form; hashing and key wrapping
/// both operate on the token bytes, so a reconstructed key authenticates
/// identically to the generated one.
///
/// - Not `Clone`. Cannot be duplicated without explicit conversion.
/// - Zeroised on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct RootKey {
    bytes: [u8; ROOT_KEY_LEN],
}

impl RootKey {
    /// Generate a fresh random root key.
    pub(crate) fn generate() -> Result<Self, SealcoreError> {
        let mut bytes = [0u8; ROOT_KEY_LEN];
        crypto::fill_random(&mut bytes)?;
        Ok(Self { bytes })
    }

    /// Rebuild a root key from reconstructed secret bytes.
    pub(crate) fn try_from_slice(secret: &[u8]) -> Result<Self, SealcoreError> {
        let bytes: [u8; ROOT_KEY_LEN] = secret
            .try_into()
            .map_err(|_| SealcoreError::InvalidRootKey)?;
        Ok(Self { bytes })
    }

    /// Parse a root key from its base64 token form.
    pub(crate) fn from_token(token: &str) -> Result<Self, SealcoreError> {
        let raw = STANDARD
            .decode(token.trim())
            .map_err(|_| SealcoreError::InvalidRootKey)?;
        Self::try_from_slice(&raw)
    }

    /// The base64 token presented to operators at `init`.
    pub(crate) fn token(&self) -> String {
        STANDARD.encode(self.bytes)
    }

    /// Borrow the raw secret bytes for splitting.
    ///
    /// `pub(crate)` — raw bytes never leave the crate.
    pub(crate) fn as_bytes(&self) -> &[u8; ROOT_KEY_LEN] {
        &self.bytes
    }
}

// ---------------------------------------------------------------------------
// Encryption key
// ---------------------------------------------------------------------------

/// The symmetric key protecting application data.
///
/// Derived from the root key token; persisted only in wrapped form and held
/// in plaintext exclusively while the system is unsealed.
///
/// - Not `Clone`.
/// - Zeroised on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct EncryptionKey {
    bytes: [u8; DERIVED_KEY_LEN],
}

impl EncryptionKey {
    /// Decode a key from its transport-encoded (base64) form.
    pub(crate) fn from_encoded(encoded: &str) -> Result<Self, SealcoreError> {
        let raw = STANDARD
            .decode(encoded)
            .map_err(|_| SealcoreError::CorruptState)?;
        let bytes: [u8; DERIVED_KEY_LEN] =
            raw.try_into().map_err(|_| SealcoreError::CorruptState)?;
        Ok(Self { bytes })
    }

    /// Borrow the raw key bytes for cipher operations.
    ///
    /// `pub(crate)` — raw bytes never leave the crate.
    pub(crate) fn as_bytes(&self) -> &[u8; DERIVED_KEY_LEN] {
        &self.bytes
    }
}
