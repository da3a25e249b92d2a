//! Store interfaces and the in-memory implementation.
//!
//! Consensus needs two pieces of persistence: the append-only log of
//! committed blocks, and the machine's own state for crash recovery. Both
//! are consumed through traits; [`MemoryStore`] backs tests and
//! [`RocksDbStore`](crate::RocksDbStore) backs production.

use std::collections::BTreeMap;

use riptide_core::Step;
use riptide_types::{Height, Round, SignedBlock};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Height {0} already has a committed block")]
    HeightOccupied(Height),
}

/// The state machine's persisted state.
///
/// Saved before every broadcast so that a restarted replica resumes at the
/// same `(step, height, round)` with its lock intact and cannot equivocate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessState {
    pub step: Step,
    pub height: Height,
    pub round: Round,
    pub locked: Option<(Round, SignedBlock)>,
}

/// Append-only log of committed blocks, indexed by height.
pub trait BlockStore {
    /// Append a committed block. Appending a second block at the same
    /// height is an error: heights decide exactly once.
    fn append_block(&mut self, block: &SignedBlock) -> Result<(), StoreError>;

    /// The block committed at `height`, if any.
    fn block_at(&self, height: Height) -> Result<Option<SignedBlock>, StoreError>;

    /// The highest committed height, if any block has been committed.
    fn latest_height(&self) -> Result<Option<Height>, StoreError>;
}

/// Persistence for the state machine's own state.
pub trait ProcessStore {
    fn save_state(&mut self, state: &ProcessState) -> Result<(), StoreError>;

    fn load_state(&self) -> Result<Option<ProcessState>, StoreError>;
}

/// In-memory store for tests and ephemeral replicas.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: BTreeMap<Height, SignedBlock>,
    state: Option<ProcessState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockStore for MemoryStore {
    fn append_block(&mut self, block: &SignedBlock) -> Result<(), StoreError> {
        let height = block.block.height;
        if self.blocks.contains_key(&height) {
            return Err(StoreError::HeightOccupied(height));
        }
        self.blocks.insert(height, block.clone());
        Ok(())
    }

    fn block_at(&self, height: Height) -> Result<Option<SignedBlock>, StoreError> {
        Ok(self.blocks.get(&height).cloned())
    }

    fn latest_height(&self) -> Result<Option<Height>, StoreError> {
        Ok(self.blocks.keys().next_back().copied())
    }
}

impl ProcessStore for MemoryStore {
    fn save_state(&mut self, state: &ProcessState) -> Result<(), StoreError> {
        self.state = Some(state.clone());
        Ok(())
    }

    fn load_state(&self) -> Result<Option<ProcessState>, StoreError> {
        Ok(self.state.clone())
    }
}
