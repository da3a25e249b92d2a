//! Consensus state machine for riptide.
//!
//! This crate implements a Tendermint-family BFT consensus core as a
//! synchronous, transition-driven model: the [`Machine`] consumes
//! [`Transition`]s and returns at most one [`Action`] per call. All I/O is
//! performed by the replica shell.
//!
//! [`Transition`]: riptide_core::Transition
//! [`Action`]: riptide_core::Action
//!
//! # Protocol
//!
//! Each height runs rounds of three steps:
//!
//! 1. **WaitingForPropose** → on a proposal (or timeout), prevote the
//!    proposed block (or nil) and move on
//! 2. **WaitingForPolka** → when ≥2/3 prevotes agree at the current round,
//!    precommit the polka and lock on its block
//! 3. **WaitingForCommit** → when ≥2/3 precommits agree on a block-bearing
//!    polka, decide; a nil commit or timeout terminates the round instead
//!
//! ## Safety
//!
//! - **Locking**: precommitting a block at round R locks `(R, block)`; all
//!   later prevotes at this height repeat the locked block until a polka at
//!   a round above R justifies unlocking.
//!
//! - **Quorum intersection**: any two ≥2/3 quorums overlap in an honest
//!   validator, so conflicting blocks cannot both gather commits at one
//!   height.
//!
//! ## Liveness
//!
//! - **Round skipping**: observing ≥2/3 prevotes (or precommits) of any
//!   kind at a higher round jumps the round counter forward.
//!
//! - **Timeout-driven advancement**: each step has an externally scheduled
//!   timeout with exponential backoff ([`Options`]); rounds that stall
//!   terminate and restart with a fresh proposal.
//!
//! Vote admission (signature verification, validator membership, shard
//! checks) happens in the replica shell before anything reaches this crate;
//! the builders here only ever see authentic votes and deduplicate them.

mod config;
mod machine;
mod vote_set;

pub use config::Options;
pub use machine::Machine;
pub use vote_set::{AggregatedVote, CommitBuilder, PolkaBuilder, VoteSet};
