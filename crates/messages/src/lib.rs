//! Network messages for riptide consensus.
//!
//! A [`Message`] is a shard tag plus a signed payload. The shard isolates
//! one consensus instance from another on a shared transport; replicas drop
//! messages carrying a foreign shard before any further inspection.
//!
//! Messages travel in two interchangeable encodings, JSON and a versioned
//! binary frame, both lossless: `serialize → deserialize → serialize` is
//! byte-identical. See [`codec`].

pub mod codec;

use riptide_types::{
    Height, Round, Shard, Signatory, SignedBlock, SignedPreCommit, SignedPreVote,
};
use serde::{Deserialize, Serialize};

/// The signed payload of a consensus message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// A proposer's block.
    Propose(SignedBlock),

    /// A validator's prevote.
    PreVote(SignedPreVote),

    /// A validator's precommit.
    PreCommit(SignedPreCommit),
}

impl Payload {
    /// Get the payload type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::Propose(_) => "Propose",
            Payload::PreVote(_) => "PreVote",
            Payload::PreCommit(_) => "PreCommit",
        }
    }

    /// The consensus height this payload refers to.
    pub fn height(&self) -> Height {
        match self {
            Payload::Propose(block) => block.block.height,
            Payload::PreVote(vote) => vote.vote.height,
            Payload::PreCommit(precommit) => precommit.precommit.polka.height,
        }
    }

    /// The round this payload refers to.
    ///
    /// A proposal has no round of its own; it is valid for whichever round
    /// the receiver is at, so its round reads as 0.
    pub fn round(&self) -> Round {
        match self {
            Payload::Propose(_) => Round(0),
            Payload::PreVote(vote) => vote.vote.round,
            Payload::PreCommit(precommit) => precommit.precommit.polka.round,
        }
    }

    /// The declared signer of this payload.
    pub fn signatory(&self) -> Signatory {
        match self {
            Payload::Propose(block) => block.signatory,
            Payload::PreVote(vote) => vote.signatory,
            Payload::PreCommit(precommit) => precommit.signatory,
        }
    }

    /// Check that the payload is authentic: the signature recovers to the
    /// declared signatory (and, for proposals, the block hash covers the
    /// block's contents).
    pub fn verify(&self) -> bool {
        match self {
            Payload::Propose(block) => block.verify(),
            Payload::PreVote(vote) => vote.verify(),
            Payload::PreCommit(precommit) => precommit.verify(),
        }
    }
}

/// A consensus message: a shard tag plus a signed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub shard: Shard,
    pub payload: Payload,
}
