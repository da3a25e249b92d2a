//! The admission shell around the consensus state machine.

use riptide_bft::{Machine, Options};
use riptide_core::{Action, StateMachine, Step, TimerId, Transition};
use riptide_messages::{Message, Payload};
use riptide_types::{
    Commit, CryptoError, Height, KeyPair, Round, Shard, Signatory, SignedPreCommit, SignedPreVote,
    ValidatorSet,
};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::broadcaster::Broadcaster;
use crate::metrics::{drop_reason, metrics};
use crate::store::{BlockStore, ProcessState, ProcessStore, StoreError};

/// Fatal replica errors.
///
/// Admission failures are not errors - they are counted and dropped. What
/// remains is a replica that cannot sign or cannot persist, and either one
/// means it cannot participate.
#[derive(Debug, Error)]
pub enum ReplicaError {
    #[error("Signer failure: {0}")]
    Signer(#[from] CryptoError),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

/// A single consensus replica.
///
/// Admission-controls inbound messages (shard, signature, validator-set
/// membership), lifts them into transitions for the state machine, and
/// executes the returned actions: votes are signed and broadcast, commits
/// are persisted and handed back to the caller.
///
/// The replica is single-threaded: one logical task drives it with
/// messages and timeouts. Replicas for different shards share nothing.
pub struct Replica<B: Broadcaster> {
    options: Options,
    shard: Shard,
    validators: ValidatorSet,
    keypair: KeyPair,
    machine: Machine,
    broadcaster: B,
    block_store: Box<dyn BlockStore + Send>,
    process_store: Box<dyn ProcessStore + Send>,
}

impl<B: Broadcaster> Replica<B> {
    /// Build a replica, resuming from persisted process state if present.
    pub fn new(
        options: Options,
        shard: Shard,
        validators: ValidatorSet,
        keypair: KeyPair,
        broadcaster: B,
        block_store: Box<dyn BlockStore + Send>,
        process_store: Box<dyn ProcessStore + Send>,
    ) -> Result<Self, ReplicaError> {
        let threshold = validators.threshold();
        let machine = match process_store.load_state()? {
            Some(state) => {
                info!(
                    height = %state.height,
                    round = %state.round,
                    step = %state.step,
                    "Restoring consensus state"
                );
                Machine::restore(state.step, state.height, state.round, state.locked, threshold)
            }
            None => Machine::new(threshold),
        };

        Ok(Replica {
            options,
            shard,
            validators,
            keypair,
            machine,
            broadcaster,
            block_store,
            process_store,
        })
    }

    pub fn shard(&self) -> Shard {
        self.shard
    }

    pub fn signatory(&self) -> Signatory {
        self.keypair.signatory()
    }

    pub fn height(&self) -> Height {
        self.machine.height()
    }

    pub fn round(&self) -> Round {
        self.machine.round()
    }

    pub fn step(&self) -> Step {
        self.machine.step()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The timer the driver should have pending for the machine's current
    /// position.
    pub fn next_timer(&self) -> (TimerId, std::time::Duration) {
        let round = self.machine.round();
        let id = TimerId {
            height: self.machine.height(),
            round,
            step: self.machine.step(),
        };
        (id, self.options.timeout_for_round(round))
    }

    /// Handle an inbound message.
    ///
    /// Returns the commit if this message completed one; the caller
    /// reschedules timers and surfaces the decision.
    pub fn handle_message(&mut self, message: Message) -> Result<Option<Commit>, ReplicaError> {
        metrics().messages_received.inc();

        if message.shard != self.shard {
            debug!(
                shard = %message.shard,
                local = %self.shard,
                "Dropping message for foreign shard"
            );
            metrics()
                .messages_dropped
                .with_label_values(&[drop_reason::SHARD])
                .inc();
            return Ok(None);
        }

        if !message.payload.verify() {
            warn!(
                kind = message.payload.type_name(),
                signatory = %message.payload.signatory(),
                "Dropping message with bad signature"
            );
            metrics()
                .messages_dropped
                .with_label_values(&[drop_reason::SIGNATURE])
                .inc();
            return Ok(None);
        }

        let signatory = message.payload.signatory();
        if !self.validators.contains(&signatory) {
            warn!(%signatory, "Dropping message from non-validator");
            metrics()
                .messages_dropped
                .with_label_values(&[drop_reason::MEMBERSHIP])
                .inc();
            return Ok(None);
        }

        trace!(
            kind = message.payload.type_name(),
            height = %message.payload.height(),
            round = %message.payload.round(),
            %signatory,
            "Accepting message"
        );

        let transition = match message.payload {
            Payload::Propose(block) => Transition::Proposed(block),
            Payload::PreVote(vote) => Transition::PreVoted(vote),
            Payload::PreCommit(precommit) => Transition::PreCommitted(precommit),
        };
        self.step_machine(transition)
    }

    /// Handle a fired timeout.
    ///
    /// Stale timers - anything but the machine's current `(height, round)` -
    /// are dropped here; the state machine itself assumes every timeout it
    /// sees is current.
    pub fn handle_timeout(&mut self, timer: TimerId) -> Result<Option<Commit>, ReplicaError> {
        if timer.height != self.machine.height() || timer.round != self.machine.round() {
            trace!(
                ?timer,
                height = %self.machine.height(),
                round = %self.machine.round(),
                "Dropping stale timeout"
            );
            return Ok(None);
        }
        self.step_machine(Transition::TimedOut)
    }

    fn step_machine(&mut self, transition: Transition) -> Result<Option<Commit>, ReplicaError> {
        let Some(action) = self.machine.transition(transition) else {
            return Ok(None);
        };

        match action {
            Action::PreVote(vote) => {
                let signed = SignedPreVote::sign(vote, &self.keypair)?;
                // Persist before broadcast: a replica that forgets what it
                // voted for can equivocate after a restart.
                self.persist_state()?;
                self.broadcast(Payload::PreVote(signed));
                Ok(None)
            }

            Action::PreCommit(precommit) => {
                let signed = SignedPreCommit::sign(precommit, &self.keypair)?;
                self.persist_state()?;
                self.broadcast(Payload::PreCommit(signed));
                Ok(None)
            }

            Action::Commit(commit) => {
                if let Some(block) = &commit.polka.block {
                    info!(
                        height = %block.block.height,
                        block = ?block.block.hash,
                        "Committing block"
                    );
                    self.block_store.append_block(block)?;
                    metrics().blocks_committed.inc();
                } else {
                    debug!(
                        height = %commit.polka.height,
                        round = %commit.polka.round,
                        "Round terminated without a decision"
                    );
                }
                self.machine.drop_votes();
                self.persist_state()?;
                metrics().height.set(self.machine.height().0 as f64);
                metrics().round.set(self.machine.round().0 as f64);
                Ok(Some(commit))
            }
        }
    }

    fn broadcast(&self, payload: Payload) {
        metrics()
            .actions_broadcast
            .with_label_values(&[payload.type_name()])
            .inc();
        self.broadcaster.broadcast(Message {
            shard: self.shard,
            payload,
        });
    }

    fn persist_state(&mut self) -> Result<(), ReplicaError> {
        let state = ProcessState {
            step: self.machine.step(),
            height: self.machine.height(),
            round: self.machine.round(),
            locked: self
                .machine
                .locked_round()
                .zip(self.machine.locked_block().cloned()),
        };
        self.process_store.save_state(&state)?;
        Ok(())
    }
}
