//! Low-level cryptographic operations.
//!
//! This module is one of exactly two places in the crate that touch cipher
//! and randomness primitives directly (the other is `keys`). All other
//! modules perform encryption and decryption exclusively through the
//! functions exposed here.
//!
//! Primitive choices:
//! - **Cipher**: AES in CBC mode with PKCS#7 padding
//! - **IV**: 128-bit (16 bytes), generated fresh per call via `SystemRandom`
//! - **Key sizes**: 128, 192 or 256 bits, selected by key length
//! - **Transport**: base64 of IV ‖ ciphertext
//!
//! CBC carries no authentication tag; callers that need tamper evidence
//! must verify the plaintext against independent state, which the manager
//! does through the persisted root key hash.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::SealcoreError;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Size of the initialization vector in bytes (one AES block).
pub(crate) const IV_LEN: usize = 16;

/// Fill `buf` with cryptographically secure random bytes.
///
/// Uses `ring::rand::SystemRandom` — the only source of randomness in the
/// crate. Key generation, salt generation, and IVs all come through here.
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<(), SealcoreError> {
    let rng = SystemRandom::new();
    rng.fill(buf).map_err(|_| SealcoreError::RandomnessFailure)
}

/// Encrypt a plaintext payload using AES-CBC with PKCS#7 padding.
///
/// A fresh random IV is generated for every call, so two encryptions of the
/// same input never produce the same output. Equality checks on protected
/// values must decrypt and compare, never compare ciphertexts.
///
/// The AES variant follows the key length: 16, 24 or 32 bytes select
/// AES-128, AES-192 or AES-256. Any other length is a `CryptoFailure`.
///
/// # Layout of the encoded bytes
/// ```text
/// base64( [ iv (16 bytes) ][ ciphertext ] )
/// ```
pub(crate) fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<String, SealcoreError> {
    let mut iv = [0u8; IV_LEN];
    fill_random(&mut iv)?;

    let ciphertext = match key.len() {
        16 => Aes128CbcEnc::new_from_slices(key, &iv)
            .map_err(|_| SealcoreError::CryptoFailure)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        24 => Aes192CbcEnc::new_from_slices(key, &iv)
            .map_err(|_| SealcoreError::CryptoFailure)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        32 => Aes256CbcEnc::new_from_slices(key, &iv)
            .map_err(|_| SealcoreError::CryptoFailure)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        _ => return Err(SealcoreError::CryptoFailure),
    };

    let mut output = Vec::with_capacity(IV_LEN + ciphertext.len());
    output.extend_from_slice(&iv);
    output.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(output))
}

/// Decrypt a payload produced by [`encrypt`].
///
/// Expects base64 of IV (16 bytes) followed by the ciphertext. Malformed
/// base64, truncated input, or invalid padding all return `CryptoFailure` —
/// this function never panics across the component boundary.
pub(crate) fn decrypt(key: &[u8], encoded: &str) -> Result<Vec<u8>, SealcoreError> {
    let raw = STANDARD
        .decode(encoded)
        .map_err(|_| SealcoreError::CryptoFailure)?;

    if raw.len() < IV_LEN {
        return Err(SealcoreError::CryptoFailure);
    }
    let (iv, ciphertext) = raw.split_at(IV_LEN);

    let plaintext = match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(|_| SealcoreError::CryptoFailure)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| SealcoreError::CryptoFailure)?,
        24 => Aes192CbcDec::new_from_slices(key, iv)
            .map_err(|_| SealcoreError::CryptoFailure)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| SealcoreError::CryptoFailure)?,
        32 => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|_| SealcoreError::CryptoFailure)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| SealcoreError::CryptoFailure)?,
        _ => return Err(SealcoreError::CryptoFailure),
    };

    Ok(plaintext)
}
