//! Polling scheduler.
//!
//! A single loop ticks at a whole number of minutes. Every tick decrements the
//! wait counter of each subscription by the minutes elapsed; pairings that
//! reach zero are due and have their counter reset to their interval. Each due source is polled by an
//! independent task, at most one at a time per source.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::dispatch::{DispatchReport, Dispatcher};
use crate::pipeline::Pipeline;
use crate::source::{CircuitBreaker, Source, SourceRepository};
use crate::subscription::SubscriptionRepository;
use crate::Result;

type InFlight = Arc<Mutex<HashSet<i64>>>;

/// Result of one source's poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The feed was fetched; `new_items` were ingested and dispatched.
    Fetched {
        source_id: i64,
        new_items: usize,
        dispatch: DispatchReport,
    },
    /// Fetching or parsing failed and was reported to the breaker.
    Failed { source_id: i64, error: String },
}

/// What a tick did.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Poll cycles started by this tick.
    pub launched: Vec<(i64, JoinHandle<CycleOutcome>)>,
    /// Due sources skipped because the breaker disabled them.
    pub disabled: Vec<i64>,
    /// Due sources skipped because a cycle was already in flight.
    pub in_flight: Vec<i64>,
}

impl TickReport {
    /// Wait for every launched cycle to finish.
    pub async fn join(self) -> Vec<CycleOutcome> {
        let mut outcomes = Vec::with_capacity(self.launched.len());
        for (source_id, handle) in self.launched {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Poll cycle for source {} aborted: {}", source_id, e),
            }
        }
        outcomes
    }
}

/// Removes a source from the in-flight set when dropped.
struct InFlightGuard {
    set: InFlight,
    source_id: i64,
}

impl InFlightGuard {
    fn acquire(set: &InFlight, source_id: i64) -> Option<Self> {
        if lock(set).insert(source_id) {
            Some(Self {
                set: Arc::clone(set),
                source_id,
            })
        } else {
            None
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.source_id);
    }
}

fn lock(set: &InFlight) -> MutexGuard<'_, HashSet<i64>> {
    // The set stays consistent even if a holder panicked
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Everything a poll cycle needs, cheap to clone into a task.
#[derive(Clone)]
struct Worker {
    db: Arc<Database>,
    pipeline: Arc<Pipeline>,
    dispatcher: Arc<Dispatcher>,
    breaker: CircuitBreaker,
}

impl Worker {
    /// Poll one source: fetch, report to the breaker, then deliver.
    async fn cycle(self, source: Source) -> CycleOutcome {
        let pool = self.db.pool();

        let items = match self.pipeline.run(&source).await {
            Ok(items) => items,
            Err(e) => {
                warn!("Failed to fetch source {} ({}): {}", source.id, source.link, e);
                if let Err(err) = self.breaker.record_failure(pool, source.id).await {
                    error!("Failed to record failure for source {}: {}", source.id, err);
                }
                return CycleOutcome::Failed {
                    source_id: source.id,
                    error: e.to_string(),
                };
            }
        };

        if let Err(e) = self.breaker.record_success(pool, source.id).await {
            error!("Failed to record success for source {}: {}", source.id, e);
        }

        let dispatch = if items.is_empty() {
            DispatchReport::default()
        } else {
            match SubscriptionRepository::new(pool).list_by_source(source.id).await {
                Ok(subs) => self.dispatcher.dispatch(&source, &items, &subs).await,
                Err(e) => {
                    error!("Failed to list subscriptions of source {}: {}", source.id, e);
                    DispatchReport::default()
                }
            }
        };

        CycleOutcome::Fetched {
            source_id: source.id,
            new_items: items.len(),
            dispatch,
        }
    }
}

/// Process-wide polling scheduler.
pub struct Scheduler {
    worker: Worker,
    in_flight: InFlight,
    tick_interval: Duration,
    minutes_per_tick: i64,
}

impl Scheduler {
    /// Create a scheduler that ticks every `tick_secs` seconds.
    ///
    /// Wait counters are kept in minutes; a tick shorter than a minute still
    /// counts as one.
    pub fn new(
        db: Arc<Database>,
        pipeline: Arc<Pipeline>,
        dispatcher: Arc<Dispatcher>,
        breaker: CircuitBreaker,
        tick_secs: u64,
    ) -> Self {
        Self {
            worker: Worker {
                db,
                pipeline,
                dispatcher,
                breaker,
            },
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            tick_interval: Duration::from_secs(tick_secs.max(1)),
            minutes_per_tick: i64::try_from(tick_secs / 60).unwrap_or(i64::MAX).max(1),
        }
    }

    /// Whether a poll cycle for the source is currently running.
    pub fn is_in_flight(&self, source_id: i64) -> bool {
        lock(&self.in_flight).contains(&source_id)
    }

    /// Run one tick.
    ///
    /// Returns once every due source has been gated and its cycle spawned;
    /// it never waits for a fetch. Only failing to list subscriptions fails
    /// the tick; per-row errors are logged and the row is skipped.
    pub async fn tick(&self) -> Result<TickReport> {
        let pool = self.worker.db.pool();
        let subs = SubscriptionRepository::new(pool);

        let mut due = BTreeSet::new();
        for sub in subs.list_all().await? {
            let wait = sub.wait_time.saturating_sub(self.minutes_per_tick);
            let next = if wait > 0 {
                wait
            } else {
                due.insert(sub.source_id);
                sub.interval_minutes.max(1)
            };
            if let Err(e) = subs
                .set_wait_time(sub.subscriber_id, sub.source_id, next)
                .await
            {
                error!(
                    "Failed to update wait time of subscriber {} on source {}: {}",
                    sub.subscriber_id, sub.source_id, e
                );
            }
        }

        let mut report = TickReport::default();
        let sources = SourceRepository::new(pool);
        for source_id in due {
            let source = match sources.get_by_id(source_id).await {
                Ok(Some(source)) => source,
                Ok(None) => {
                    debug!("Skipping subscription to missing source {}", source_id);
                    continue;
                }
                Err(e) => {
                    error!("Failed to load source {}: {}", source_id, e);
                    continue;
                }
            };

            if !self.worker.breaker.is_eligible(&source) {
                debug!("Source {} is disabled, skipping", source_id);
                report.disabled.push(source_id);
                continue;
            }

            let Some(guard) = InFlightGuard::acquire(&self.in_flight, source_id) else {
                debug!("Source {} is already being fetched", source_id);
                report.in_flight.push(source_id);
                continue;
            };

            let worker = self.worker.clone();
            let handle = tokio::spawn(async move {
                let _guard = guard;
                worker.cycle(source).await
            });
            report.launched.push((source_id, handle));
        }

        debug!(
            "Tick: {} launched, {} disabled, {} in flight",
            report.launched.len(),
            report.disabled.len(),
            report.in_flight.len()
        );
        Ok(report)
    }

    /// Run the tick loop forever.
    pub async fn run(&self) {
        info!(
            "Scheduler started (tick: {} seconds)",
            self.tick_interval.as_secs()
        );

        let mut timer = interval(self.tick_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            if let Err(e) = self.tick().await {
                error!("Scheduler tick failed: {}", e);
            }
        }
    }

    /// Run the tick loop until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = self.run() => {}
            _ = shutdown => {
                info!("Scheduler stopped");
            }
        }
    }
}
