//! Threshold splitting of the root key.
//!
//! The root key is split into N key shares with a (T, N) Shamir scheme over
//! GF(256): one polynomial of degree T−1 per secret byte, evaluated at N
//! distinct nonzero points. Any T shares determine the secret by Lagrange
//! interpolation at zero; any T−1 shares are information-theoretically
//! independent of it.
//!
//! Shares carry no authentication. Reconstruction from a consistent set
//! always succeeds, and reconstruction from a poisoned set silently yields a
//! *wrong* secret — the manager catches that downstream by authenticating
//! the candidate against the persisted root key hash.

use std::collections::HashSet;

use sharks::{Share, Sharks};

use crate::error::SealcoreError;

/// One of N outputs of splitting the root key under a threshold scheme.
///
/// `index` tags the nonzero evaluation point and lies in `[1, N]`; `data`
/// has the same length as the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShare {
    pub index: u8,
    pub data: Vec<u8>,
}

impl KeyShare {
    pub fn new(index: u8, data: Vec<u8>) -> Self {
        Self { index, data }
    }

    /// Convert to the field share format (index byte followed by payload).
    fn to_field_share(&self) -> Result<Share, SealcoreError> {
        let mut bytes = Vec::with_capacity(1 + self.data.len());
        bytes.push(self.index);
        bytes.extend_from_slice(&self.data);
        Share::try_from(bytes.as_slice()).map_err(|_| SealcoreError::InvalidShareToken)
    }

    fn from_field_share(share: &Share) -> Self {
        let bytes: Vec<u8> = share.into();
        Self {
            index: bytes[0],
            data: bytes[1..].to_vec(),
        }
    }
}

/// Split `secret` into `share_count` shares, any `threshold` of which
/// reconstruct it.
///
/// Evaluation points are assigned sequentially, so the returned shares carry
/// indices `1..=share_count`.
pub fn split(
    threshold: usize,
    share_count: usize,
    secret: &[u8],
) -> Result<Vec<KeyShare>, SealcoreError> {
    if threshold == 0 {
        return Err(SealcoreError::InvalidConfig("threshold must be non-zero"));
    }
    if threshold > share_count {
        return Err(SealcoreError::InvalidConfig(
            "threshold cannot exceed share count",
        ));
    }
    if share_count > 255 {
        return Err(SealcoreError::InvalidConfig(
            "share indices are single field elements; at most 255 shares",
        ));
    }
    if secret.is_empty() {
        return Err(SealcoreError::InvalidConfig("secret must not be empty"));
    }

    let dealer = Sharks(threshold as u8).dealer(secret);
    let shares: Vec<KeyShare> = dealer
        .take(share_count)
        .map(|share| KeyShare::from_field_share(&share))
        .collect();

    Ok(shares)
}

/// Reconstruct the secret from the given shares.
///
/// Requires at least `threshold` shares with pairwise-distinct nonzero
/// indices and equal payload lengths. Interpolation runs over every share
/// provided; consistency of shares beyond the threshold is not
/// cross-checked, so callers holding extras should pass exactly the first
/// `threshold` of them.
pub fn combine(threshold: usize, shares: &[KeyShare]) -> Result<Vec<u8>, SealcoreError> {
    if threshold == 0 || threshold > 255 {
        return Err(SealcoreError::InvalidConfig("threshold out of range"));
    }
    if shares.len() < threshold {
        return Err(SealcoreError::InsufficientShares {
            required: threshold,
            provided: shares.len(),
        });
    }

    let mut seen = HashSet::new();
    for share in shares {
        if share.index == 0 {
            return Err(SealcoreError::InvalidShareToken);
        }
        if !seen.insert(share.index) {
            return Err(SealcoreError::DuplicateShareIndex(share.index));
        }
    }

    let payload_len = shares[0].data.len();
    if payload_len == 0 || shares.iter().any(|s| s.data.len() != payload_len) {
        return Err(SealcoreError::InvalidUnsealShares);
    }

    let field_shares: Vec<Share> = shares
        .iter()
        .map(KeyShare::to_field_share)
        .collect::<Result<_, _>>()?;

    Sharks(threshold as u8)
        .recover(&field_shares)
        .map_err(|_| SealcoreError::InvalidUnsealShares)
}
