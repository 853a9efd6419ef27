//! Error types for sealcore.
//!
//! Every error variant is a distinct failure mode in the seal lifecycle.
//! Error messages are intentionally minimal — they signal *what* failed
//! without revealing *why* in ways that could leak cryptographic state.
//!
//! "More shares needed" is a progress value on the unseal path, not an
//! error; it lives in [`crate::manager::UnsealProgress`].

use std::fmt;

/// The single error type for all sealcore operations.
#[derive(Debug)]
pub enum SealcoreError {
    /// A root key hash is already persisted. `init` must not run twice
    /// without explicit operator intent.
    AlreadyInitialized,

    /// No root key hash is persisted; the system has never been initialized.
    NotInitialized,

    /// The presented root key does not match the persisted hash.
    InvalidRootKey,

    /// The accumulated shares did not reconstruct an authentic root key,
    /// or a submitted share token could not be decoded.
    InvalidUnsealShares,

    /// Fewer shares than the reconstruction threshold were supplied.
    InsufficientShares { required: usize, provided: usize },

    /// Two shares carry the same index.
    DuplicateShareIndex(u8),

    /// A share token is malformed (bad base64, missing or non-decimal
    /// index suffix, index out of range).
    InvalidShareToken,

    /// The root key hash matched but the wrapped encryption key failed to
    /// unwrap. The persisted state has been tampered with or corrupted.
    CorruptState,

    /// Encryption or decryption failed: unsupported key length, malformed
    /// ciphertext, truncated input, or invalid padding.
    CryptoFailure,

    /// The system's random number generator failed to produce bytes.
    RandomnessFailure,

    /// The persistence backend reported a failure.
    Backend(String),

    /// Data encryption or decryption was attempted while the system is not
    /// unsealed.
    Sealed,

    /// The requested unseal trigger mechanism is declared but not
    /// implemented.
    Unsupported(&'static str),

    /// The seal configuration violates the threshold or share-count bounds.
    InvalidConfig(&'static str),
}

impl fmt::Display for SealcoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInitialized => write!(f, "already initialized"),
            Self::NotInitialized => write!(f, "not initialized"),
            Self::InvalidRootKey => write!(f, "invalid root key"),
            Self::InvalidUnsealShares => write!(f, "invalid unseal shares"),
            Self::InsufficientShares { required, provided } => {
                write!(f, "insufficient shares: {} provided, {} required", provided, required)
            }
            Self::DuplicateShareIndex(index) => {
                write!(f, "duplicate share index: {}", index)
            }
            Self::InvalidShareToken => write!(f, "invalid share token"),
            Self::CorruptState => write!(f, "persisted seal state is corrupt"),
            Self::CryptoFailure => write!(f, "encryption or decryption failed"),
            Self::RandomnessFailure => write!(f, "randomness source failed"),
            Self::Backend(message) => write!(f, "backend failure: {}", message),
            Self::Sealed => write!(f, "system is sealed"),
            Self::Unsupported(what) => write!(f, "unsupported: {}", what),
            Self::InvalidConfig(reason) => write!(f, "invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for SealcoreError {}
