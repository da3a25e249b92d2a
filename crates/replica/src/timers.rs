//! Timer management for the consensus driver.
//!
//! Timers are spawned as tokio tasks and can be cancelled. Each fired timer
//! delivers its [`TimerId`] back over a channel; the driver feeds it to
//! [`Replica::handle_timeout`](crate::Replica::handle_timeout), which gates
//! stale `(height, round)` pairs before the state machine sees a timeout.

use std::collections::HashMap;
use std::time::Duration;

use riptide_bft::Options;
use riptide_core::{Step, TimerId};
use riptide_types::{Height, Round};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Manages consensus timeouts.
///
/// Each timer is a tokio task that sleeps for the specified duration and
/// then sends its id to the driver channel.
pub struct TimerManager {
    /// Active timers (id -> task handle).
    timers: HashMap<TimerId, JoinHandle<()>>,
    /// Sender for timer fires.
    timer_tx: mpsc::Sender<TimerId>,
}

impl TimerManager {
    pub fn new(timer_tx: mpsc::Sender<TimerId>) -> Self {
        Self {
            timers: HashMap::new(),
            timer_tx,
        }
    }

    /// Schedule the timeout for a `(height, round, step)`, using the
    /// backed-off duration for the round.
    pub fn schedule(&mut self, options: &Options, height: Height, round: Round, step: Step) {
        let id = TimerId {
            height,
            round,
            step,
        };
        self.set_timer(id, options.timeout_for_round(round));
    }

    /// Set a timer that will fire after the given duration.
    ///
    /// If a timer with the same id already exists, it is cancelled first.
    pub fn set_timer(&mut self, id: TimerId, duration: Duration) {
        self.cancel_timer(id);

        let timer_tx = self.timer_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            trace!(?id, "Timer fired");
            let _ = timer_tx.send(id).await;
        });

        self.timers.insert(id, handle);
        debug!(?id, ?duration, "Timer set");
    }

    /// Cancel a timer.
    ///
    /// If the timer doesn't exist or has already fired, this is a no-op.
    pub fn cancel_timer(&mut self, id: TimerId) {
        if let Some(handle) = self.timers.remove(&id) {
            handle.abort();
            debug!(?id, "Timer cancelled");
        }
    }

    /// Cancel every timer whose `(height, round)` is behind the given pair.
    ///
    /// Called when the machine advances; stale timers that already fired
    /// are additionally gated by the replica.
    pub fn cancel_stale(&mut self, height: Height, round: Round) {
        let stale: Vec<TimerId> = self
            .timers
            .keys()
            .filter(|id| id.height < height || (id.height == height && id.round < round))
            .copied()
            .collect();
        for id in stale {
            self.cancel_timer(id);
        }
    }

    /// Cancel all timers. Called during shutdown.
    pub fn cancel_all(&mut self) {
        for (id, handle) in self.timers.drain() {
            handle.abort();
            trace!(?id, "Timer cancelled (shutdown)");
        }
    }

    /// Get the number of active timers.
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
