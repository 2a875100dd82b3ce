//! Circuit breaker over a source's consecutive-failure counter.
//!
//! The counter is stored as a plain integer on the source row. In memory it is
//! interpreted as a [`BreakerState`]:
//!
//! - `Active` while `counter < threshold`
//! - `DisabledByRequest` when `counter == threshold + 1` (explicit pause)
//! - `DisabledByError` for any other `counter >= threshold`
//!
//! Only `Active` sources are eligible for scheduled polling. Fetch reports for a
//! source that is not `Active` are ignored, so a pause cannot be undone by a fetch
//! that was already in flight.

use tracing::{debug, warn};

use super::repository::SourceRepository;
use super::types::Source;
use crate::db::DbPool;
use crate::{FeedRelayError, Result};

/// Interpreted state of a source's failure counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Eligible for polling, with the current number of consecutive failures.
    Active { failures: i64 },
    /// Tripped by consecutive failures.
    DisabledByError,
    /// Paused explicitly.
    DisabledByRequest,
}

impl BreakerState {
    /// Whether the source may be polled.
    pub fn is_eligible(&self) -> bool {
        matches!(self, BreakerState::Active { .. })
    }
}

/// Failure-counting circuit breaker.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreaker {
    threshold: i64,
}

impl CircuitBreaker {
    /// Create a breaker that trips after `threshold` consecutive failures.
    pub fn new(threshold: i64) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    /// The configured failure threshold.
    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    /// Counter value that marks a source as paused on request.
    ///
    /// New sources are created with this value so their initial ingestion is
    /// never counted as a scheduled poll.
    pub fn paused_count(&self) -> i64 {
        self.threshold + 1
    }

    /// Interpret a raw counter value.
    pub fn state(&self, error_count: i64) -> BreakerState {
        if error_count < self.threshold {
            BreakerState::Active {
                failures: error_count.max(0),
            }
        } else if error_count == self.paused_count() {
            BreakerState::DisabledByRequest
        } else {
            BreakerState::DisabledByError
        }
    }

    /// Whether the source is eligible for scheduled polling.
    pub fn is_eligible(&self, source: &Source) -> bool {
        self.state(source.error_count).is_eligible()
    }

    /// Counter after a successful fetch.
    fn after_success(&self, error_count: i64) -> i64 {
        match self.state(error_count) {
            BreakerState::Active { .. } => 0,
            _ => error_count,
        }
    }

    /// Counter after a failed fetch.
    fn after_failure(&self, error_count: i64) -> i64 {
        match self.state(error_count) {
            BreakerState::Active { failures } => failures + 1,
            _ => error_count,
        }
    }

    /// Counter after a toggle request.
    fn after_toggle(&self, error_count: i64) -> i64 {
        if self.state(error_count).is_eligible() {
            self.paused_count()
        } else {
            0
        }
    }

    /// Record a successful fetch for a source.
    pub async fn record_success(&self, pool: &DbPool, source_id: i64) -> Result<BreakerState> {
        self.apply(pool, source_id, |count| self.after_success(count))
            .await
    }

    /// Record a failed fetch for a source.
    pub async fn record_failure(&self, pool: &DbPool, source_id: i64) -> Result<BreakerState> {
        let mut tripped = false;
        let state = self
            .apply(pool, source_id, |count| {
                let next = self.after_failure(count);
                tripped = next != count && !self.state(next).is_eligible();
                next
            })
            .await?;
        if tripped {
            warn!(
                "Source {} disabled after {} consecutive errors",
                source_id, self.threshold
            );
        }
        Ok(state)
    }

    /// Pause polling of a source regardless of its current state.
    pub async fn pause(&self, pool: &DbPool, source_id: i64) -> Result<BreakerState> {
        let paused = self.paused_count();
        self.apply(pool, source_id, |_| paused).await
    }

    /// Resume polling of a source, clearing its failure counter.
    pub async fn resume(&self, pool: &DbPool, source_id: i64) -> Result<BreakerState> {
        self.apply(pool, source_id, |_| 0).await
    }

    /// Pause an eligible source, or resume a disabled one.
    pub async fn toggle(&self, pool: &DbPool, source_id: i64) -> Result<BreakerState> {
        self.apply(pool, source_id, |count| self.after_toggle(count))
            .await
    }

    /// Read the source, compute its next counter and write it back.
    async fn apply<F>(&self, pool: &DbPool, source_id: i64, next: F) -> Result<BreakerState>
    where
        F: FnOnce(i64) -> i64,
    {
        let repo = SourceRepository::new(pool);
        let mut source = repo
            .get_by_id(source_id)
            .await?
            .ok_or_else(|| FeedRelayError::NotFound(format!("source {}", source_id)))?;

        let updated = next(source.error_count);
        if updated != source.error_count {
            debug!(
                "Source {} error count {} -> {}",
                source_id, source.error_count, updated
            );
            source.error_count = updated;
            repo.upsert(&source).await?;
        }

        Ok(self.state(updated))
    }
}
