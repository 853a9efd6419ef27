//! Transport encoding of key shares.
//!
//! A share travels as `base64(payload ‖ index)`, where the index is written
//! as exactly two ASCII decimal digits. The two-digit suffix bounds an
//! installation at 99 shares; [`crate::manager::SealConfig`] enforces the
//! bound up front rather than truncating here.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::SealcoreError;
use crate::shamir::KeyShare;

/// Largest share index the two-digit wire format can carry.
pub const MAX_SHARE_INDEX: u8 = 99;

/// Encode a share as transport text.
pub fn encode_share(share: &KeyShare) -> Result<String, SealcoreError> {
    if share.index == 0 || share.index > MAX_SHARE_INDEX {
        return Err(SealcoreError::InvalidShareToken);
    }

    let mut raw = Vec::with_capacity(share.data.len() + 2);
    raw.extend_from_slice(&share.data);
    raw.extend_from_slice(format!("{:02}", share.index).as_bytes());
    Ok(STANDARD.encode(raw))
}

/// Decode transport text back into a share.
pub fn decode_share(token: &str) -> Result<KeyShare, SealcoreError> {
    let raw = STANDARD
        .decode(token.trim())
        .map_err(|_| SealcoreError::InvalidShareToken)?;

    // At least one payload byte ahead of the two index digits.
    if raw.len() < 3 {
        return Err(SealcoreError::InvalidShareToken);
    }

    let (payload, digits) = raw.split_at(raw.len() - 2);
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(SealcoreError::InvalidShareToken);
    }

    let text = std::str::from_utf8(digits).map_err(|_| SealcoreError::InvalidShareToken)?;
    let index: u8 = text.parse().map_err(|_| SealcoreError::InvalidShareToken)?;
    if index == 0 {
        return Err(SealcoreError::InvalidShareToken);
    }

    Ok(KeyShare::new(index, payload.to_vec()))
}
