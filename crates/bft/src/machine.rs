//! The consensus state machine.
//!
//! Three steps, repeated per round: wait for a proposal, prevote; wait for a
//! polka, precommit; wait for a commit, decide or advance the round. Safety
//! rests on the locking discipline: precommitting a block locks it, and the
//! lock constrains future prevotes until a higher-round polka releases it.

use riptide_core::{Action, StateMachine, Step, Transition};
use riptide_types::{Commit, Height, Polka, PreCommit, PreVote, Round, SignedBlock};
use tracing::{debug, info};

use crate::vote_set::{CommitBuilder, PolkaBuilder};

/// The per-replica consensus state machine.
///
/// Synchronous and deterministic; every transition returns at most one
/// action for the shell to execute. Vote admission (signatures, validator
/// set membership, shard) happens upstream - by the time a vote reaches the
/// machine it is authentic, and insertion can only be a duplicate, never
/// invalid.
pub struct Machine {
    step: Step,
    height: Height,
    round: Round,

    /// The lock: the round we locked at and the block we locked on.
    ///
    /// Held as a single pair so the two halves can never disagree.
    locked: Option<(Round, SignedBlock)>,

    polka_builder: PolkaBuilder,
    commit_builder: CommitBuilder,
    threshold: usize,
}

impl Machine {
    /// A fresh machine at `(height 0, round 0)`, waiting for a proposal.
    pub fn new(threshold: usize) -> Self {
        Self::restore(
            Step::WaitingForPropose,
            Height(0),
            Round(0),
            None,
            threshold,
        )
    }

    /// Restore a machine from persisted state (crash recovery).
    pub fn restore(
        step: Step,
        height: Height,
        round: Round,
        locked: Option<(Round, SignedBlock)>,
        threshold: usize,
    ) -> Self {
        Machine {
            step,
            height,
            round,
            locked,
            polka_builder: PolkaBuilder::new(),
            commit_builder: CommitBuilder::new(),
            threshold,
        }
    }

    /// The round we are locked at, if any.
    pub fn locked_round(&self) -> Option<Round> {
        self.locked.as_ref().map(|(round, _)| *round)
    }

    /// The block we are locked on, if any.
    pub fn locked_block(&self) -> Option<&SignedBlock> {
        self.locked.as_ref().map(|(_, block)| block)
    }

    fn wait_for_propose(&mut self, transition: Transition) -> Option<Action> {
        match transition {
            Transition::Proposed(block) => {
                self.step = Step::WaitingForPolka;
                return self.pre_vote(Some(&block));
            }

            Transition::PreVoted(vote) => {
                let _ = self.polka_builder.insert(vote);
            }

            Transition::PreCommitted(precommit) => {
                let _ = self.commit_builder.insert(precommit);
            }

            Transition::TimedOut => {
                debug!(height = %self.height, round = %self.round, "Propose timed out");
                self.step = Step::WaitingForPolka;
                return self.pre_vote(None);
            }
        }

        self.check_common_exit_conditions()
    }

    fn wait_for_polka(&mut self, transition: Transition) -> Option<Action> {
        match transition {
            // A proposal is no longer useful once we have prevoted.
            Transition::Proposed(_) => {}

            Transition::PreVoted(vote) => {
                if !self.polka_builder.insert(vote) {
                    return None;
                }

                let (polka, _) = self.polka_builder.polka(self.height, self.threshold);
                if let Some(polka) = polka {
                    if polka.round == self.round {
                        self.step = Step::WaitingForCommit;
                        return self.pre_commit();
                    }
                }
            }

            Transition::PreCommitted(precommit) => {
                if !self.commit_builder.insert(precommit) {
                    return None;
                }
            }

            Transition::TimedOut => {
                let (_, prevoting_round) = self.polka_builder.polka(self.height, self.threshold);
                if prevoting_round.is_none() {
                    return None;
                }

                debug!(height = %self.height, round = %self.round, "Polka wait timed out");
                self.step = Step::WaitingForCommit;
                return self.pre_commit();
            }
        }

        self.check_common_exit_conditions()
    }

    fn wait_for_commit(&mut self, transition: Transition) -> Option<Action> {
        match transition {
            Transition::Proposed(_) => {}

            Transition::PreVoted(vote) => {
                let _ = self.polka_builder.insert(vote);
            }

            Transition::PreCommitted(precommit) => {
                if !self.commit_builder.insert(precommit) {
                    return None;
                }

                let (commit, _) = self.commit_builder.commit(self.height, self.threshold);
                if let Some(commit) = commit {
                    if commit.polka.block.is_none() && commit.polka.round == self.round {
                        return Some(self.advance_round());
                    }
                }
            }

            Transition::TimedOut => {
                let (_, precommitting_round) =
                    self.commit_builder.commit(self.height, self.threshold);
                if precommitting_round.is_none() {
                    return None;
                }

                debug!(height = %self.height, round = %self.round, "Commit wait timed out");
                return Some(self.advance_round());
            }
        }

        self.check_common_exit_conditions()
    }

    /// Terminate the current round without a decision.
    ///
    /// The round counter is incremented before the nil polka is built, so
    /// the emitted `polka.round` names the round being advanced *to*;
    /// drivers key the next round's timers off it.
    fn advance_round(&mut self) -> Action {
        self.step = Step::WaitingForPropose;
        self.round = self.round.next();
        info!(height = %self.height, round = %self.round, "Advancing round");
        Action::Commit(Commit::round_advance(self.height, self.round))
    }

    /// Emit a prevote at `(height, round)`: the locked block if the lock
    /// holds, else the proposed block if it matches our height, else nil.
    fn pre_vote(&mut self, proposed: Option<&SignedBlock>) -> Option<Action> {
        let (polka, _) = self.polka_builder.polka(self.height, self.threshold);

        if let (Some((locked_round, _)), Some(polka)) = (&self.locked, &polka) {
            // A polka at a later round than the lock justifies unlocking.
            if *locked_round < polka.round {
                info!(
                    height = %self.height,
                    locked_round = %locked_round,
                    polka_round = %polka.round,
                    "Releasing lock: newer polka observed"
                );
                self.locked = None;
            }
        }

        if let Some((_, locked_block)) = &self.locked {
            return Some(Action::PreVote(PreVote {
                block: Some(locked_block.clone()),
                height: self.height,
                round: self.round,
            }));
        }

        if let Some(block) = proposed {
            if block.block.height == self.height {
                return Some(Action::PreVote(PreVote {
                    block: Some(block.clone()),
                    height: self.height,
                    round: self.round,
                }));
            }
        }

        Some(Action::PreVote(PreVote {
            block: None,
            height: self.height,
            round: self.round,
        }))
    }

    /// Emit a precommit for the best polka at the current height, updating
    /// the lock to match it.
    fn pre_commit(&mut self) -> Option<Action> {
        let (polka, _) = self.polka_builder.polka(self.height, self.threshold);

        if let Some(polka) = polka {
            if let Some(block) = &polka.block {
                info!(
                    height = %self.height,
                    round = %polka.round,
                    block = ?block.block.hash,
                    "Locking on polka"
                );
                self.locked = Some((polka.round, block.clone()));
                return Some(Action::PreCommit(PreCommit { polka }));
            }

            // A nil polka releases the lock.
            self.locked = None;
            return Some(Action::PreCommit(PreCommit { polka }));
        }

        // No polka at all: keep the lock unchanged and precommit over an
        // empty polka at the current (height, round).
        Some(Action::PreCommit(PreCommit {
            polka: Polka {
                block: None,
                height: self.height,
                round: self.round,
                signatures: Vec::new(),
            },
        }))
    }

    /// Checks shared by every non-decisive transition, in priority order:
    /// decide on a block-bearing commit, skip to a higher prevoting round,
    /// skip to a higher precommitting round.
    fn check_common_exit_conditions(&mut self) -> Option<Action> {
        let (commit, precommitting_round) =
            self.commit_builder.commit(self.height, self.threshold);
        if let Some(commit) = commit {
            if commit.polka.block.is_some() {
                info!(
                    height = %self.height,
                    round = %commit.polka.round,
                    block = ?commit.polka.block_hash(),
                    "Committing block"
                );
                self.step = Step::WaitingForPropose;
                self.height = commit.polka.height.next();
                self.round = Round(0);
                self.locked = None;
                return Some(Action::Commit(commit));
            }
        }

        let (_, prevoting_round) = self.polka_builder.polka(self.height, self.threshold);
        if let Some(prevoting_round) = prevoting_round {
            if prevoting_round > self.round {
                // Skip to the higher round and prevote there. The step is
                // deliberately left unchanged: re-entering the propose wait
                // after a skip would stall the round.
                debug!(height = %self.height, from = %self.round, to = %prevoting_round, "Skipping to prevoting round");
                self.round = prevoting_round;
                return self.pre_vote(None);
            }
        }

        if let Some(precommitting_round) = precommitting_round {
            if precommitting_round > self.round {
                debug!(height = %self.height, from = %self.round, to = %precommitting_round, "Skipping to precommitting round");
                self.step = Step::WaitingForCommit;
                self.round = precommitting_round;
                return self.pre_commit();
            }
        }

        None
    }
}

impl StateMachine for Machine {
    fn height(&self) -> Height {
        self.height
    }

    fn round(&self) -> Round {
        self.round
    }

    fn step(&self) -> Step {
        self.step
    }

    fn transition(&mut self, transition: Transition) -> Option<Action> {
        match self.step {
            Step::WaitingForPropose => self.wait_for_propose(transition),
            Step::WaitingForPolka => self.wait_for_polka(transition),
            Step::WaitingForCommit => self.wait_for_commit(transition),
        }
    }

    fn drop_votes(&mut self) {
        self.polka_builder.drop(self.height);
        self.commit_builder.drop(self.height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riptide_types::{Block, Hash, KeyPair, SignedPreCommit, SignedPreVote};

    const THRESHOLD: usize = 3;

    struct Fixture {
        keys: Vec<KeyPair>,
        machine: Machine,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                keys: (0..4).map(|_| KeyPair::generate()).collect(),
                machine: Machine::new(THRESHOLD),
            }
        }

        fn block(&self, height: Height, timestamp: u64) -> SignedBlock {
            SignedBlock::sign(
                Block::new(height, Hash::ZERO, timestamp, vec![]),
                &self.keys[0],
            )
            .unwrap()
        }

        fn prevote(
            &self,
            key: usize,
            block: Option<SignedBlock>,
            height: Height,
            round: Round,
        ) -> SignedPreVote {
            SignedPreVote::sign(
                PreVote {
                    block,
                    height,
                    round,
                },
                &self.keys[key],
            )
            .unwrap()
        }

        fn precommit(&self, key: usize, polka: Polka) -> SignedPreCommit {
            SignedPreCommit::sign(PreCommit { polka }, &self.keys[key]).unwrap()
        }

        /// Deliver prevotes for `block` from validators `0..n` and return
        /// the last action.
        fn deliver_prevotes(
            &mut self,
            n: usize,
            block: Option<SignedBlock>,
            height: Height,
            round: Round,
        ) -> Option<Action> {
            let mut last = None;
            for key in 0..n {
                let vote = self.prevote(key, block.clone(), height, round);
                last = self.machine.transition(Transition::PreVoted(vote));
            }
            last
        }

        fn deliver_precommits(&mut self, n: usize, polka: Polka) -> Option<Action> {
            let mut last = None;
            for key in 0..n {
                let precommit = self.precommit(key, polka.clone());
                last = self.machine.transition(Transition::PreCommitted(precommit));
            }
            last
        }
    }

    fn expect_prevote(action: Option<Action>) -> PreVote {
        match action {
            Some(Action::PreVote(vote)) => vote,
            other => panic!("expected PreVote action, got {other:?}"),
        }
    }

    fn expect_precommit(action: Option<Action>) -> PreCommit {
        match action {
            Some(Action::PreCommit(precommit)) => precommit,
            other => panic!("expected PreCommit action, got {other:?}"),
        }
    }

    fn expect_commit(action: Option<Action>) -> Commit {
        match action {
            Some(Action::Commit(commit)) => commit,
            other => panic!("expected Commit action, got {other:?}"),
        }
    }

    #[test]
    fn test_happy_path_commit() {
        let mut f = Fixture::new();
        let block = f.block(Height(0), 0);

        // Propose: the machine prevotes the block and waits for a polka.
        let action = f.machine.transition(Transition::Proposed(block.clone()));
        let vote = expect_prevote(action);
        assert_eq!(vote.block_hash(), Some(block.block.hash));
        assert_eq!(f.machine.step(), Step::WaitingForPolka);

        // Three prevotes form a polka: the machine precommits and locks.
        let action = f.deliver_prevotes(3, Some(block.clone()), Height(0), Round(0));
        let precommit = expect_precommit(action);
        assert_eq!(precommit.polka.block_hash(), Some(block.block.hash));
        assert_eq!(f.machine.step(), Step::WaitingForCommit);
        assert_eq!(f.machine.locked_round(), Some(Round(0)));
        assert_eq!(
            f.machine.locked_block().map(|b| b.block.hash),
            Some(block.block.hash)
        );

        // Three precommits form a commit: decide, advance height, unlock.
        let action = f.deliver_precommits(3, precommit.polka.clone());
        let commit = expect_commit(action);
        assert_eq!(commit.polka.block_hash(), Some(block.block.hash));
        assert_eq!(f.machine.step(), Step::WaitingForPropose);
        assert_eq!(f.machine.height(), Height(1));
        assert_eq!(f.machine.round(), Round(0));
        assert!(f.machine.locked_round().is_none());
        assert!(f.machine.locked_block().is_none());
    }

    #[test]
    fn test_timeout_on_propose_prevotes_nil() {
        let mut f = Fixture::new();
        let action = f.machine.transition(Transition::TimedOut);
        let vote = expect_prevote(action);
        assert!(vote.block.is_none());
        assert_eq!(vote.height, Height(0));
        assert_eq!(vote.round, Round(0));
        assert_eq!(f.machine.step(), Step::WaitingForPolka);
    }

    #[test]
    fn test_nil_polka_then_nil_commit_advances_round() {
        let mut f = Fixture::new();

        // Timeout: prevote nil.
        expect_prevote(f.machine.transition(Transition::TimedOut));

        // Three nil prevotes: precommit the nil polka.
        let action = f.deliver_prevotes(3, None, Height(0), Round(0));
        let precommit = expect_precommit(action);
        assert!(precommit.polka.block.is_none());
        assert_eq!(f.machine.step(), Step::WaitingForCommit);

        // Three nil precommits: the round terminates; the synthesized
        // commit names the round advanced to.
        let action = f.deliver_precommits(3, precommit.polka.clone());
        let commit = expect_commit(action);
        assert!(commit.polka.block.is_none());
        assert_eq!(commit.polka.height, Height(0));
        assert_eq!(commit.polka.round, Round(1));
        assert_eq!(f.machine.step(), Step::WaitingForPropose);
        assert_eq!(f.machine.height(), Height(0));
        assert_eq!(f.machine.round(), Round(1));
    }

    #[test]
    fn test_lock_preserved_across_rounds() {
        let mut f = Fixture::new();
        let block = f.block(Height(0), 0);

        // Lock on the block at round 0.
        f.machine.transition(Transition::Proposed(block.clone()));
        let action = f.deliver_prevotes(3, Some(block.clone()), Height(0), Round(0));
        expect_precommit(action);
        assert_eq!(f.machine.locked_round(), Some(Round(0)));

        // Threshold prevotes at round 1 without an agreeing polka (two nil,
        // one for another block) skip the machine forward; the lock
        // overrides and it prevotes the locked block at the new round.
        let other = f.block(Height(0), 7);
        f.deliver_prevotes(2, None, Height(0), Round(1));
        let split = f.prevote(2, Some(other), Height(0), Round(1));
        let action = f.machine.transition(Transition::PreVoted(split));
        let vote = expect_prevote(action);
        assert_eq!(f.machine.round(), Round(1));
        assert_eq!(vote.round, Round(1));
        assert_eq!(vote.block_hash(), Some(block.block.hash));
        assert_eq!(f.machine.locked_round(), Some(Round(0)));
    }

    #[test]
    fn test_lock_released_by_higher_polka() {
        let mut f = Fixture::new();
        let block_a = f.block(Height(0), 1);
        let block_b = f.block(Height(0), 2);

        // Lock on block A at round 0.
        f.machine.transition(Transition::Proposed(block_a.clone()));
        let action = f.deliver_prevotes(3, Some(block_a.clone()), Height(0), Round(0));
        expect_precommit(action);
        assert_eq!(f.machine.locked_round(), Some(Round(0)));

        // A polka for block B forms at round 2; the round skip prevotes
        // there and the newer polka releases the lock.
        let action = f.deliver_prevotes(3, Some(block_b.clone()), Height(0), Round(2));
        let vote = expect_prevote(action);
        assert_eq!(f.machine.round(), Round(2));
        assert_eq!(vote.round, Round(2));
        assert!(f.machine.locked_round().is_none());
        assert!(f.machine.locked_block().is_none());
    }

    #[test]
    fn test_duplicate_prevote_has_no_effect() {
        let mut f = Fixture::new();
        let block = f.block(Height(0), 0);
        f.machine.transition(Transition::Proposed(block.clone()));

        let vote = f.prevote(1, Some(block.clone()), Height(0), Round(0));
        let first = f.machine.transition(Transition::PreVoted(vote.clone()));
        assert!(first.is_none(), "one prevote is below threshold");

        // The duplicate short-circuits: no common-exit checks, no action.
        let second = f.machine.transition(Transition::PreVoted(vote));
        assert!(second.is_none());
        assert_eq!(f.machine.step(), Step::WaitingForPolka);
        assert_eq!(f.machine.round(), Round(0));
    }

    #[test]
    fn test_commit_wait_timeout_without_precommits_is_noop() {
        let mut f = Fixture::new();
        let block = f.block(Height(0), 0);
        f.machine.transition(Transition::Proposed(block.clone()));
        let action = f.deliver_prevotes(3, Some(block), Height(0), Round(0));
        expect_precommit(action);

        // No precommitting round anywhere: the timeout does nothing.
        let action = f.machine.transition(Transition::TimedOut);
        assert!(action.is_none());
        assert_eq!(f.machine.step(), Step::WaitingForCommit);
        assert_eq!(f.machine.round(), Round(0));
    }

    #[test]
    fn test_commit_completes_after_partial_precommits() {
        let mut f = Fixture::new();
        let block = f.block(Height(0), 0);
        f.machine.transition(Transition::Proposed(block.clone()));
        let action = f.deliver_prevotes(3, Some(block), Height(0), Round(0));
        let precommit = expect_precommit(action);

        // Two precommits: below threshold, no commit forms.
        let action = f.deliver_precommits(2, precommit.polka.clone());
        assert!(action.is_none());

        // A timeout with no threshold anywhere is still a no-op.
        assert!(f.machine.transition(Transition::TimedOut).is_none());

        // The third precommit completes the commit.
        let third = f.precommit(2, precommit.polka.clone());
        let commit = expect_commit(f.machine.transition(Transition::PreCommitted(third)));
        assert!(commit.polka.block.is_some());
        assert_eq!(f.machine.height(), Height(1));
    }

    #[test]
    fn test_commit_wait_timeout_with_split_precommits_advances() {
        let mut f = Fixture::new();
        let block = f.block(Height(0), 0);
        f.machine.transition(Transition::Proposed(block.clone()));
        let action = f.deliver_prevotes(3, Some(block.clone()), Height(0), Round(0));
        let precommit = expect_precommit(action);

        // Split precommits at round 0: two endorse the block polka, one a
        // nil polka. Threshold votes observed, no agreeing commit.
        f.deliver_precommits(2, precommit.polka.clone());
        let nil_polka = Polka {
            block: None,
            height: Height(0),
            round: Round(0),
            signatures: vec![],
        };
        let split = f.precommit(2, nil_polka);
        assert!(f
            .machine
            .transition(Transition::PreCommitted(split))
            .is_none());

        // The timeout sees a precommitting round and terminates the round.
        let commit = expect_commit(f.machine.transition(Transition::TimedOut));
        assert!(commit.polka.block.is_none());
        assert_eq!(commit.polka.round, Round(1));
        assert_eq!(f.machine.round(), Round(1));
        assert_eq!(f.machine.step(), Step::WaitingForPropose);
    }

    #[test]
    fn test_polka_wait_timeout_without_prevotes_is_noop() {
        let mut f = Fixture::new();
        let block = f.block(Height(0), 0);
        f.machine.transition(Transition::Proposed(block));

        let action = f.machine.transition(Transition::TimedOut);
        assert!(action.is_none());
        assert_eq!(f.machine.step(), Step::WaitingForPolka);
    }

    #[test]
    fn test_polka_wait_timeout_with_split_prevotes_precommits() {
        let mut f = Fixture::new();
        let block_a = f.block(Height(0), 1);
        let block_b = f.block(Height(0), 2);
        f.machine.transition(Transition::Proposed(block_a.clone()));

        // Split prevotes: threshold votes observed but no agreeing polka.
        f.deliver_prevotes(2, Some(block_a), Height(0), Round(0));
        let vote = f.prevote(2, Some(block_b), Height(0), Round(0));
        f.machine.transition(Transition::PreVoted(vote));

        // The timeout moves to the commit wait with an empty-polka
        // precommit (no polka formed, lock unchanged).
        let action = f.machine.transition(Transition::TimedOut);
        let precommit = expect_precommit(action);
        assert!(precommit.polka.block.is_none());
        assert!(precommit.polka.signatures.is_empty());
        assert_eq!(f.machine.step(), Step::WaitingForCommit);
        assert!(f.machine.locked_round().is_none());
    }

    #[test]
    fn test_proposal_for_wrong_height_prevotes_nil() {
        let mut f = Fixture::new();
        let block = f.block(Height(5), 0);
        let action = f.machine.transition(Transition::Proposed(block));
        let vote = expect_prevote(action);
        assert!(vote.block.is_none());
        assert_eq!(vote.height, Height(0));
    }

    #[test]
    fn test_skip_to_higher_precommitting_round() {
        let mut f = Fixture::new();
        let block = f.block(Height(0), 0);
        let polka = Polka {
            block: Some(block.clone()),
            height: Height(0),
            round: Round(3),
            signatures: vec![],
        };

        // Threshold precommits at round 3 while we idle at round 0: the
        // common exit skips the round and precommits there. The commit also
        // forms immediately, so the decisive check wins.
        let action = f.deliver_precommits(3, polka);
        let commit = expect_commit(action);
        assert_eq!(commit.polka.round, Round(3));
        assert_eq!(f.machine.height(), Height(1));
    }

    #[test]
    fn test_higher_round_nil_commit_skips_and_reprecommits() {
        let mut f = Fixture::new();
        let block = f.block(Height(0), 0);
        f.machine.transition(Transition::Proposed(block.clone()));
        let action = f.deliver_prevotes(3, Some(block), Height(0), Round(0));
        expect_precommit(action);
        assert_eq!(f.machine.step(), Step::WaitingForCommit);

        // Threshold nil precommits at round 2 (not our round 0): the nil
        // fast path does not fire; common-exit rule 3 skips to round 2 and
        // re-precommits there.
        let nil_polka = Polka {
            block: None,
            height: Height(0),
            round: Round(2),
            signatures: vec![],
        };
        let action = f.deliver_precommits(3, nil_polka);
        let precommit = expect_precommit(action);
        assert_eq!(f.machine.round(), Round(2));
        assert_eq!(f.machine.step(), Step::WaitingForCommit);
        // The best polka at the height is still the round-0 block polka,
        // so the re-precommit endorses it and the lock stands.
        assert_eq!(precommit.polka.round, Round(0));
        assert!(precommit.polka.block.is_some());
        assert_eq!(f.machine.locked_round(), Some(Round(0)));
    }

    #[test]
    fn test_drop_votes_discards_committed_height() {
        let mut f = Fixture::new();
        let block = f.block(Height(0), 0);
        f.machine.transition(Transition::Proposed(block.clone()));
        let action = f.deliver_prevotes(3, Some(block), Height(0), Round(0));
        let precommit = expect_precommit(action);
        expect_commit(f.deliver_precommits(3, precommit.polka.clone()));

        // Height advanced to 1; dropping discards everything below it.
        f.machine.drop_votes();

        // Votes at the new height still aggregate: a threshold of prevotes
        // at round 1 triggers the round skip.
        let action = f.deliver_prevotes(3, None, Height(1), Round(1));
        let vote = expect_prevote(action);
        assert_eq!(vote.height, Height(1));
        assert_eq!(vote.round, Round(1));
        assert_eq!(f.machine.round(), Round(1));
    }
}
