//! Foundation types for riptide consensus.
//!
//! This crate provides the types used throughout the consensus
//! implementation:
//!
//! - **Primitives**: Keccak-256 hashes, recoverable secp256k1 keys and
//!   signatures
//! - **Identifiers**: [`Height`], [`Round`], [`Shard`], [`Signatory`]
//! - **Consensus types**: [`Block`], votes, [`Polka`], [`Commit`],
//!   [`ValidatorSet`]
//! - **Signing**: domain-separated digest construction
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not
//! depend on any other workspace crates, making it the foundation layer.

mod block;
mod crypto;
mod hash;
mod identifiers;
mod signing;
mod validator;
mod vote;

pub use block::{Block, SignedBlock};
pub use crypto::{CryptoError, KeyPair, Signature};
pub use hash::{Hash, HexError};
pub use identifiers::{Height, Round, Shard, Signatory};
pub use signing::{
    precommit_digest, prevote_digest, propose_digest, DOMAIN_PRECOMMIT, DOMAIN_PREVOTE,
    DOMAIN_PROPOSE,
};
pub use validator::ValidatorSet;
pub use vote::{Commit, Polka, PreCommit, PreVote, SignedPreCommit, SignedPreVote};
