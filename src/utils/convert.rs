//! Fixed-width big-endian key encoding for the sled record trees.
//!
//! Every identifier key is 8 bytes so that lexicographic key order equals
//! numeric order; composite keys concatenate fixed-width segments, which is
//! what makes the per-book reservation scan come back in FIFO order.

use crate::ConvertError;
use crate::Result;

/// Converts a `u64` identifier to an 8-byte array in big-endian byte order.
pub const fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Recovers a `u64` identifier from an 8-byte big-endian key.
pub fn key_id<K: AsRef<[u8]>>(bytes: K) -> Result<u64> {
    let bytes = bytes.as_ref();
    if bytes.len() != 8 {
        return Err(ConvertError::InvalidLength {
            expected: 8,
            actual: bytes.len(),
        }
        .into());
    }
    let array: [u8; 8] = bytes.try_into().expect("Guaranteed safe after length check");
    Ok(u64::from_be_bytes(array))
}

/// Composite key of two identifiers (16 bytes).
pub fn pair_key(
    a: u64,
    b: u64,
) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&a.to_be_bytes());
    key[8..].copy_from_slice(&b.to_be_bytes());
    key
}

/// Composite key of three identifiers (24 bytes).
pub fn triple_key(
    a: u64,
    b: u64,
    c: u64,
) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..8].copy_from_slice(&a.to_be_bytes());
    key[8..16].copy_from_slice(&b.to_be_bytes());
    key[16..].copy_from_slice(&c.to_be_bytes());
    key
}

/// Splits a 24-byte composite key back into its three segments.
pub fn split_triple_key<K: AsRef<[u8]>>(bytes: K) -> Result<(u64, u64, u64)> {
    let bytes = bytes.as_ref();
    if bytes.len() != 24 {
        return Err(ConvertError::InvalidLength {
            expected: 24,
            actual: bytes.len(),
        }
        .into());
    }
    Ok((key_id(&bytes[..8])?, key_id(&bytes[8..16])?, key_id(&bytes[16..])?))
}
