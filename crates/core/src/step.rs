//! The state tag of the consensus state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which input the state machine is currently waiting for.
///
/// Persisted as part of the process state for crash recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    /// Waiting for a proposal (or the propose timeout) at the current round.
    WaitingForPropose,
    /// Prevoted; waiting for a polka to form at the current round.
    WaitingForPolka,
    /// Precommitted; waiting for a commit to form at the current round.
    WaitingForCommit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::WaitingForPropose => "WaitingForPropose",
            Step::WaitingForPolka => "WaitingForPolka",
            Step::WaitingForCommit => "WaitingForCommit",
        };
        f.write_str(name)
    }
}
