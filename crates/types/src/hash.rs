//! Keccak-256 digests.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error parsing a hex-encoded digest.
#[derive(Debug, Error, PartialEq)]
#[error("Invalid hex encoding: {0}")]
pub struct HexError(#[from] hex::FromHexError);

/// A 32-byte Keccak-256 digest.
///
/// Hex-encoded in human-readable formats (JSON), raw bytes on the binary
/// wire. Used for block hashes and for the prehash that signatures are
/// computed over.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The all-zero hash.
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// Compute the Keccak-256 digest of `bytes`.
    pub fn digest(bytes: &[u8]) -> Self {
        Hash(keccak_hash::keccak(bytes).0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Hash(out))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Abbreviate for logs; full digests are noise in trace output.
        write!(f, "Hash({}..)", &self.to_hex()[..8])
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_fixed(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_fixed(deserializer).map(Hash)
    }
}

/// Serialize a fixed-size byte array: hex string for human-readable formats,
/// raw bytes otherwise.
pub(crate) fn serialize_fixed<S: Serializer>(
    bytes: &[u8],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    if serializer.is_human_readable() {
        serializer.serialize_str(&hex::encode(bytes))
    } else {
        serializer.serialize_bytes(bytes)
    }
}

/// Deserialize a 32-byte array written by [`serialize_fixed`].
pub(crate) fn deserialize_fixed<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<[u8; 32], D::Error> {
    let mut out = [0u8; 32];
    if deserializer.is_human_readable() {
        let s = String::deserialize(deserializer)?;
        hex::decode_to_slice(&s, &mut out).map_err(D::Error::custom)?;
    } else {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        if bytes.len() != 32 {
            return Err(D::Error::custom(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        out.copy_from_slice(&bytes);
    }
    Ok(out)
}
