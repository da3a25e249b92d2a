//! Replica metrics using the native Prometheus client.
//!
//! Metrics are domain-specific rather than generic event counters. Use
//! traces for event-level granularity during investigations.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Gauge,
};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Admission drop reasons, used as the label of
/// [`Metrics::messages_dropped`].
pub mod drop_reason {
    pub const SHARD: &str = "shard";
    pub const SIGNATURE: &str = "signature";
    pub const MEMBERSHIP: &str = "membership";
}

/// Domain-specific metrics for replica monitoring.
pub struct Metrics {
    // === Admission ===
    pub messages_received: Counter,
    pub messages_dropped: CounterVec,

    // === Consensus ===
    pub actions_broadcast: CounterVec,
    pub blocks_committed: Counter,
    pub height: Gauge,
    pub round: Gauge,
}

impl Metrics {
    fn new() -> Self {
        Self {
            messages_received: register_counter!(
                "riptide_messages_received_total",
                "Total number of consensus messages received"
            )
            .unwrap(),

            messages_dropped: register_counter_vec!(
                "riptide_messages_dropped_total",
                "Messages dropped at admission, by reason",
                &["reason"]
            )
            .unwrap(),

            actions_broadcast: register_counter_vec!(
                "riptide_actions_broadcast_total",
                "Actions signed and broadcast, by kind",
                &["kind"]
            )
            .unwrap(),

            blocks_committed: register_counter!(
                "riptide_blocks_committed_total",
                "Total number of blocks committed"
            )
            .unwrap(),

            height: register_gauge!(
                "riptide_height",
                "Current consensus height"
            )
            .unwrap(),

            round: register_gauge!(
                "riptide_round",
                "Current round within the current height"
            )
            .unwrap(),
        }
    }
}

/// Get the global metrics registry, initializing it on first use.
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
