//! Domain-separated signing digests.
//!
//! Every signature in the protocol is computed over
//! `keccak256(domain_tag ‖ canonical encoding of the message minus its
//! signature field)`. Distinct domain tags keep proposals, prevotes, and
//! precommits from being replayed as one another.

use crate::block::Block;
use crate::hash::Hash;
use crate::identifiers::{Height, Round};
use crate::vote::{PreCommit, PreVote};

pub const DOMAIN_PROPOSE: &[u8] = b"riptide/propose/1";
pub const DOMAIN_PREVOTE: &[u8] = b"riptide/prevote/1";
pub const DOMAIN_PRECOMMIT: &[u8] = b"riptide/precommit/1";

/// Digest a proposal: the block hash already commits to every header field.
pub fn propose_digest(block: &Block) -> Hash {
    let mut buf = Vec::with_capacity(DOMAIN_PROPOSE.len() + 32);
    buf.extend_from_slice(DOMAIN_PROPOSE);
    buf.extend_from_slice(block.hash.as_bytes());
    Hash::digest(&buf)
}

/// Digest a prevote: `(height, round, block-choice)`.
pub fn prevote_digest(vote: &PreVote) -> Hash {
    Hash::digest(&vote_message(
        DOMAIN_PREVOTE,
        vote.height,
        vote.round,
        vote.block_hash(),
    ))
}

/// Digest a precommit: `(height, round, block-choice)` of the endorsed polka.
///
/// The polka's evidence set is deliberately excluded: two validators
/// endorsing the same polka may hold different (but equally valid) quorums
/// of prevote evidence, and their precommits must still aggregate.
pub fn precommit_digest(precommit: &PreCommit) -> Hash {
    let polka = &precommit.polka;
    Hash::digest(&vote_message(
        DOMAIN_PRECOMMIT,
        polka.height,
        polka.round,
        polka.block_hash(),
    ))
}

fn vote_message(domain: &[u8], height: Height, round: Round, choice: Option<Hash>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(domain.len() + 8 + 8 + 33);
    buf.extend_from_slice(domain);
    buf.extend_from_slice(&height.0.to_be_bytes());
    buf.extend_from_slice(&round.0.to_be_bytes());
    match choice {
        // Tag byte keeps a nil choice from colliding with any block hash.
        Some(hash) => {
            buf.push(0x01);
            buf.extend_from_slice(hash.as_bytes());
        }
        None => buf.push(0x00),
    }
    buf
}
