//! # sealcore
//!
//! Threshold seal/unseal key management core.
//!
//! A random root key is split with Shamir secret sharing among N custodians;
//! any T of them can jointly reconstruct it to bring the system into an
//! unsealed state, in which a derived symmetric key protects application
//! data. The root key is never persisted — only its salted hash and the
//! wrapped encryption key are, through a pluggable [`store::Store`] backend.
//!
//! ## Public API
//!
//! The public surface of this crate is intentionally narrow. [`KeyManager`]
//! drives the whole lifecycle; the share types and their transport codec are
//! exposed for tooling that moves shares between custodians. Raw key
//! material never leaves the crate — operators only ever see base64 tokens.
//!
//! ```no_run
//! use sealcore::KeyManager;
//!
//! # fn main() -> Result<(), sealcore::SealcoreError> {
//! let manager = KeyManager::in_memory()?;
//! let output = manager.init()?;
//!
//! // Distribute output.share_tokens to custodians, then seal.
//! manager.seal(&output.root_token)?;
//!
//! // Any three custodians can unseal.
//! for token in &output.share_tokens[..3] {
//!     manager.unseal(token)?;
//! }
//! let protected = manager.encrypt(b"application data")?;
//! # let _ = protected;
//! # Ok(())
//! # }
//! ```

// Module declarations.
pub(crate) mod crypto;
pub mod error;
pub(crate) mod keys;
pub mod manager;
pub mod shamir;
pub mod store;
pub mod token;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub use error::SealcoreError;
pub use manager::{AutoUnseal, InitOutput, KeyManager, SealConfig, SealState, UnsealProgress};
pub use store::{MemoryStore, Store, StoreError};
