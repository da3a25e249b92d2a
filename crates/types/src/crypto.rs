//! Recoverable secp256k1 signatures.
//!
//! Signatures are 65 bytes, `[r ‖ s ‖ v]`, computed over a 32-byte prehash.
//! The signer's public key is recovered from the signature and compared
//! against the declared [`Signatory`], so messages carry no separate public
//! key material.

use std::fmt;

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::hash::{self, Hash};
use crate::identifiers::Signatory;

/// Errors from signing and recovery.
///
/// A replica that cannot sign cannot participate; signer-side errors are
/// treated as fatal by the shell.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid secret key material")]
    InvalidSecretKey,

    #[error("Signing failed: {0}")]
    Signing(k256::ecdsa::Error),

    #[error("Malformed signature")]
    MalformedSignature,

    #[error("Signature recovery failed: {0}")]
    Recovery(k256::ecdsa::Error),
}

/// A secp256k1 keypair.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        KeyPair {
            signing_key: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    /// Build a keypair from 32 bytes of secret scalar material.
    ///
    /// Fails if the bytes are zero or exceed the curve order.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_slice(seed).map_err(|_| CryptoError::InvalidSecretKey)?;
        Ok(KeyPair { signing_key })
    }

    /// The signatory identity derived from this keypair's public key.
    pub fn signatory(&self) -> Signatory {
        signatory_of(self.signing_key.verifying_key())
    }

    /// Sign a 32-byte prehash, producing a recoverable signature.
    pub fn sign(&self, prehash: &Hash) -> Result<Signature, CryptoError> {
        let (sig, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(prehash.as_bytes())
            .map_err(CryptoError::Signing)?;
        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&sig.to_bytes());
        bytes[64] = recovery_id.to_byte();
        Ok(Signature(bytes))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair({:?})", self.signatory())
    }
}

fn signatory_of(key: &VerifyingKey) -> Signatory {
    let point = key.to_encoded_point(false);
    Signatory::from_uncompressed_key(point.as_bytes())
}

/// A 65-byte recoverable secp256k1 signature `[r ‖ s ‖ v]`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 65]);

impl Signature {
    /// A zero signature, only meaningful as a placeholder in tests.
    pub fn zero() -> Self {
        Signature([0u8; 65])
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// Recover the signatory that produced this signature over `prehash`.
    pub fn recover(&self, prehash: &Hash) -> Result<Signatory, CryptoError> {
        let sig = EcdsaSignature::from_slice(&self.0[..64])
            .map_err(|_| CryptoError::MalformedSignature)?;
        let recovery_id =
            RecoveryId::from_byte(self.0[64]).ok_or(CryptoError::MalformedSignature)?;
        let key = VerifyingKey::recover_from_prehash(prehash.as_bytes(), &sig, recovery_id)
            .map_err(CryptoError::Recovery)?;
        Ok(signatory_of(&key))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", &hex::encode(&self.0[..4]))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hash::serialize_fixed(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut out = [0u8; 65];
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex::decode_to_slice(&s, &mut out).map_err(D::Error::custom)?;
        } else {
            let bytes = Vec::<u8>::deserialize(deserializer)?;
            if bytes.len() != 65 {
                return Err(D::Error::custom(format!(
                    "expected 65 bytes, got {}",
                    bytes.len()
                )));
            }
            out.copy_from_slice(&bytes);
        }
        Ok(Signature(out))
    }
}
