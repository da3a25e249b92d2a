//! Consensus timing options.

use std::time::Duration;

use riptide_types::Round;

/// Semantic knobs for the consensus driver.
///
/// Only timing is configurable; there are no flags that alter protocol
/// behavior. Logging goes through `tracing` and is configured
/// process-globally by the embedding binary.
#[derive(Debug, Clone)]
pub struct Options {
    /// Base of the per-round exponential timeout backoff.
    pub backoff_exp: f64,

    /// Timeout for round 0.
    pub min_timeout: Duration,

    /// Ceiling for the backed-off timeout.
    pub max_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            backoff_exp: 1.6,
            min_timeout: Duration::from_secs(1),
            max_timeout: Duration::from_secs(30),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backoff base.
    pub fn with_backoff_exp(mut self, backoff_exp: f64) -> Self {
        self.backoff_exp = backoff_exp;
        self
    }

    /// Set the round-0 timeout.
    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    /// Set the timeout ceiling.
    pub fn with_max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }

    /// The timeout for a round: `min_timeout · backoff_exp^round`, capped
    /// at `max_timeout`.
    pub fn timeout_for_round(&self, round: Round) -> Duration {
        // Exponent capped well past where any sane backoff saturates the
        // ceiling, keeping powi in range for pathological round numbers.
        let exp = round.0.min(1024) as i32;
        let scaled = self.min_timeout.as_secs_f64() * self.backoff_exp.powi(exp);
        if !scaled.is_finite() || scaled >= self.max_timeout.as_secs_f64() {
            self.max_timeout
        } else {
            Duration::from_secs_f64(scaled)
        }
    }
}
