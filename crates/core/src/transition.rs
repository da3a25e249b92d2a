//! Transition types for the consensus state machine.

use riptide_types::{SignedBlock, SignedPreCommit, SignedPreVote};

/// All possible inputs to the state machine.
///
/// Transitions are **passive data** - they describe something that happened.
/// The state machine consumes transitions and returns at most one action.
#[derive(Debug, Clone)]
pub enum Transition {
    /// A block was proposed for the current height.
    Proposed(SignedBlock),

    /// A prevote arrived from a validator (possibly ourselves).
    PreVoted(SignedPreVote),

    /// A precommit arrived from a validator (possibly ourselves).
    PreCommitted(SignedPreCommit),

    /// The timeout for the current `(height, round, step)` expired.
    ///
    /// The driver is responsible for gating stale timeouts; the state
    /// machine treats every delivered timeout as current.
    TimedOut,
}

impl Transition {
    /// Get the transition type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Transition::Proposed(_) => "Proposed",
            Transition::PreVoted(_) => "PreVoted",
            Transition::PreCommitted(_) => "PreCommitted",
            Transition::TimedOut => "TimedOut",
        }
    }
}
