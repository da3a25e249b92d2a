//! Blocks and proposer-signed blocks.

use serde::{Deserialize, Serialize};

use crate::crypto::{CryptoError, KeyPair, Signature};
use crate::hash::Hash;
use crate::identifiers::{Height, Signatory};
use crate::signing;

/// A proposed block.
///
/// The payload is opaque to consensus; only the height and the content hash
/// matter here. The hash is computed once at construction and carried with
/// the block, so equality checks and vote aggregation never re-hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: Height,
    pub parent: Hash,
    pub timestamp: u64,
    pub payload: Vec<u8>,
    pub hash: Hash,
}

impl Block {
    pub fn new(height: Height, parent: Hash, timestamp: u64, payload: Vec<u8>) -> Self {
        let hash = Self::compute_hash(height, &parent, timestamp, &payload);
        Block {
            height,
            parent,
            timestamp,
            payload,
            hash,
        }
    }

    /// Check that the carried hash matches the block's contents.
    ///
    /// Deserialized blocks carry their hash on the wire; a block whose hash
    /// does not cover its contents is malformed.
    pub fn verify_hash(&self) -> bool {
        self.hash == Self::compute_hash(self.height, &self.parent, self.timestamp, &self.payload)
    }

    fn compute_hash(height: Height, parent: &Hash, timestamp: u64, payload: &[u8]) -> Hash {
        let mut buf = Vec::with_capacity(8 + 32 + 8 + payload.len());
        buf.extend_from_slice(&height.0.to_be_bytes());
        buf.extend_from_slice(parent.as_bytes());
        buf.extend_from_slice(&timestamp.to_be_bytes());
        buf.extend_from_slice(payload);
        Hash::digest(&buf)
    }
}

/// A block plus its producer's identity and signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlock {
    pub block: Block,
    pub signatory: Signatory,
    pub signature: Signature,
}

impl SignedBlock {
    /// Sign a block as its producer.
    pub fn sign(block: Block, keypair: &KeyPair) -> Result<Self, CryptoError> {
        let digest = signing::propose_digest(&block);
        let signature = keypair.sign(&digest)?;
        Ok(SignedBlock {
            block,
            signatory: keypair.signatory(),
            signature,
        })
    }

    /// Check that the hash covers the block's contents and the signature
    /// recovers to the declared signatory.
    pub fn verify(&self) -> bool {
        if !self.block.verify_hash() {
            return false;
        }
        let digest = signing::propose_digest(&self.block);
        matches!(self.signature.recover(&digest), Ok(s) if s == self.signatory)
    }
}
