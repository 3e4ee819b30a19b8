// Submodule declaration
// -----------------------------------------------------------------------------
mod backup;
mod records;
mod sled_store;

// Re-export
// -----------------------------------------------------------------------------
pub use backup::*;
pub use records::*;
pub use sled_store::*;

#[cfg(test)]
mod backup_test;

// -----------------------------------------------------------------------------
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Result;

/// Record value encoding shared by every tree.
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}
