//! The trait implemented by consensus state machines.

use riptide_types::{Height, Round};

use crate::{Action, Step, Transition};

/// A per-replica consensus state machine.
///
/// The machine is:
/// - **Synchronous**: no async, no I/O
/// - **Deterministic**: same state + transition = same action
/// - **Pure-ish**: mutates self, but every side effect is returned as an
///   [`Action`] for the shell to execute
pub trait StateMachine {
    /// The height currently being decided.
    fn height(&self) -> Height;

    /// The attempt number within the current height.
    fn round(&self) -> Round;

    /// The input currently being waited for.
    fn step(&self) -> Step;

    /// Drive the machine with one transition, returning at most one action.
    fn transition(&mut self, transition: Transition) -> Option<Action>;

    /// Discard aggregated votes below the current height.
    ///
    /// Called by the shell after the machine leaves a height, so builders
    /// do not accumulate state for instances that can no longer decide.
    fn drop_votes(&mut self);
}
