//! Recurring prefetch timer.
//!
//! One [`Scheduler`] is built at startup and shared. [`Scheduler::start`]
//! registers the timer at most once; a tick that lands while the previous
//! pass is still running is dropped rather than queued.

use crate::refresh::{BatchRefresher, RefreshError};
use airwaves_core::RefreshSummary;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// A unit of recurring work.
#[async_trait]
pub trait RefreshJob: Send + Sync {
    async fn run(&self) -> Result<RefreshSummary, RefreshError>;
}

#[async_trait]
impl RefreshJob for BatchRefresher {
    async fn run(&self) -> Result<RefreshSummary, RefreshError> {
        self.refresh_followed().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Started,
    /// A pass was already running.
    Skipped,
}

pub struct Scheduler {
    job: Arc<dyn RefreshJob>,
    interval: Duration,
    running: Arc<AtomicBool>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(job: Arc<dyn RefreshJob>, interval: Duration) -> Self {
        Self {
            job,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            timer: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Register the recurring timer and fire the first pass immediately.
    /// Returns `false` if the timer was already registered.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.is_some() {
            tracing::debug!("scheduler already started");
            return false;
        }

        let scheduler = Arc::clone(self);
        *timer = Some(tokio::spawn(async move {
            let mut ticks = tokio::time::interval(scheduler.interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately.
                ticks.tick().await;
                scheduler.tick();
            }
        }));
        tracing::info!(interval_secs = self.interval.as_secs(), "prefetch scheduler started");
        true
    }

    /// Start one pass unless one is already running.
    pub fn tick(&self) -> TickOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("previous refresh pass still running; skipping tick");
            return TickOutcome::Skipped;
        }

        let job = Arc::clone(&self.job);
        let guard = RunningGuard(Arc::clone(&self.running));
        tokio::spawn(async move {
            let _guard = guard;
            match job.run().await {
                Ok(summary) => tracing::info!(
                    cached = summary.cached,
                    synced = summary.synced,
                    "scheduled refresh complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduled refresh failed"),
            }
        });
        TickOutcome::Started
    }
}

/// Clears the running flag however the pass ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
