//! Replica shell for riptide consensus.
//!
//! This crate wraps the synchronous state machine with everything it needs
//! to participate in a real network:
//!
//! - [`Replica`]: admission control, transition lifting, action execution
//! - [`Broadcaster`]: the outbound transport boundary
//! - [`BlockStore`] / [`ProcessStore`]: persistence boundaries, with
//!   in-memory and RocksDB implementations
//! - [`TimerManager`]: tokio-based timeout scheduling with per-round
//!   exponential backoff
//!
//! # Driving a replica
//!
//! One logical task owns the replica and feeds it from two sources: decoded
//! network messages ([`Replica::handle_message`]) and fired timers
//! ([`Replica::handle_timeout`]). After any call that returns a commit, the
//! driver cancels stale timers and schedules the one described by
//! [`Replica::next_timer`]. The transport must deliver the replica's own
//! broadcasts back to it, as gossip transports do.

mod broadcaster;
mod metrics;
mod replica;
mod storage;
mod store;
mod timers;

pub use broadcaster::{Broadcaster, ChannelBroadcaster};
pub use metrics::{drop_reason, metrics, Metrics};
pub use replica::{Replica, ReplicaError};
pub use storage::RocksDbStore;
pub use store::{BlockStore, MemoryStore, ProcessState, ProcessStore, StoreError};
pub use timers::TimerManager;
