//! Action types for the consensus state machine.

use riptide_types::{Commit, PreCommit, PreVote};

/// Actions the state machine wants to perform.
///
/// Actions are **commands** - the shell executes them and performs the
/// actual I/O: votes are signed and broadcast, commits are persisted and
/// surfaced to the embedding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Broadcast a prevote for the current round.
    PreVote(PreVote),

    /// Broadcast a precommit endorsing the best polka at the current round.
    PreCommit(PreCommit),

    /// A round terminated.
    ///
    /// A block-bearing commit is a decision for the current height; the
    /// shell persists the block and the machine has already advanced to the
    /// next height. A nil commit signals a round advance: its polka round is
    /// the round the machine advanced *to*, which drivers use to schedule
    /// the next round's timers.
    Commit(Commit),
}

impl Action {
    /// Get the action type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::PreVote(_) => "PreVote",
            Action::PreCommit(_) => "PreCommit",
            Action::Commit(_) => "Commit",
        }
    }
}
