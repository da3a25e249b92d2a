//! Votes, polkas, and commits.
//!
//! A prevote names a block (or nil) at a `(height, round)`. A polka is the
//! evidence that at least a quorum of prevotes agreed on one block choice at
//! a single `(height, round)`. A precommit endorses a polka, and a commit is
//! the evidence that a quorum of precommits agreed on a block-bearing polka.

use serde::{Deserialize, Serialize};

use crate::block::SignedBlock;
use crate::crypto::{CryptoError, KeyPair, Signature};
use crate::hash::Hash;
use crate::identifiers::{Height, Round, Signatory};
use crate::signing;

/// A vote for a block (or for nil) at a `(height, round)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreVote {
    pub block: Option<SignedBlock>,
    pub height: Height,
    pub round: Round,
}

impl PreVote {
    /// The block-choice hash this vote agrees on, `None` for nil.
    pub fn block_hash(&self) -> Option<Hash> {
        self.block.as_ref().map(|b| b.block.hash)
    }
}

/// A prevote plus its voter's identity and signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPreVote {
    pub vote: PreVote,
    pub signatory: Signatory,
    pub signature: Signature,
}

impl SignedPreVote {
    pub fn sign(vote: PreVote, keypair: &KeyPair) -> Result<Self, CryptoError> {
        let digest = signing::prevote_digest(&vote);
        let signature = keypair.sign(&digest)?;
        Ok(SignedPreVote {
            vote,
            signatory: keypair.signatory(),
            signature,
        })
    }

    pub fn verify(&self) -> bool {
        let digest = signing::prevote_digest(&self.vote);
        matches!(self.signature.recover(&digest), Ok(s) if s == self.signatory)
    }
}

/// Proof of lock change: at least a quorum of prevotes agreeing on one block
/// choice (block or nil) at a single `(height, round)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polka {
    pub block: Option<SignedBlock>,
    pub height: Height,
    pub round: Round,
    pub signatures: Vec<SignedPreVote>,
}

impl Polka {
    pub fn block_hash(&self) -> Option<Hash> {
        self.block.as_ref().map(|b| b.block.hash)
    }
}

/// A vote endorsing a polka.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreCommit {
    pub polka: Polka,
}

/// A precommit plus its voter's identity and signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPreCommit {
    pub precommit: PreCommit,
    pub signatory: Signatory,
    pub signature: Signature,
}

impl SignedPreCommit {
    pub fn sign(precommit: PreCommit, keypair: &KeyPair) -> Result<Self, CryptoError> {
        let digest = signing::precommit_digest(&precommit);
        let signature = keypair.sign(&digest)?;
        Ok(SignedPreCommit {
            precommit,
            signatory: keypair.signatory(),
            signature,
        })
    }

    pub fn verify(&self) -> bool {
        let digest = signing::precommit_digest(&self.precommit);
        matches!(self.signature.recover(&digest), Ok(s) if s == self.signatory)
    }
}

/// Proof of decision: a quorum of precommits agreeing on one polka at a
/// single `(height, round)`.
///
/// A commit whose polka carries a block is decisive. A commit with a nil
/// polka only terminates a round; the state machine synthesizes these when
/// advancing rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub polka: Polka,
    pub signatures: Vec<SignedPreCommit>,
}

impl Commit {
    /// A synthesized round-advance commit: a nil polka at `(height, round)`
    /// with no evidence. Emitted when a round terminates without a decision.
    pub fn round_advance(height: Height, round: Round) -> Self {
        Commit {
            polka: Polka {
                block: None,
                height,
                round,
                signatures: Vec::new(),
            },
            signatures: Vec::new(),
        }
    }
}
