//! Tick scheduler
//!
//! Drives a document's session callbacks. Each tick:
//! 1. Snapshot the registry and pick the due callbacks (capped per tick)
//! 2. Spawn the `nolock` callbacks concurrently
//! 3. Run the locked callbacks one by one, in registration order; each one
//!    takes the document lock for its whole run
//! 4. Join the unlocked ones and collect failures
//!
//! Callback failures are logged and reported, never abort the tick.
//! A callback removed before its turn is skipped.

use docsync_core::{
    CallbackError, CallbackId, CallbackKind, CallbackKindName, Document, SchedulerConfig,
    SessionCallback,
};
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

/// A callback that failed during a tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackFailure {
    /// Failed callback
    pub callback: CallbackId,
    /// Its kind
    pub kind: CallbackKindName,
    /// Error or panic message
    pub message: String,
}

/// Outcome of a single tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Tick sequence number, starting at 1
    pub tick: u64,
    /// Callbacks that ran to completion
    pub fired: usize,
    /// Due callbacks removed before they could run
    pub skipped: usize,
    /// Due callbacks left for a later tick by the per-tick cap
    pub deferred: usize,
    /// Callbacks that returned an error or panicked
    pub failures: Vec<CallbackFailure>,
}

/// Cumulative scheduler statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Ticks executed
    pub ticks: u64,
    /// Callbacks run successfully
    pub fired: u64,
    /// Callbacks that failed
    pub failed: u64,
    /// Callbacks skipped after removal
    pub skipped: u64,
}

impl SchedulerStats {
    fn absorb(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.fired += report.fired as u64;
        self.failed += report.failures.len() as u64;
        self.skipped += report.skipped as u64;
    }
}

type Outcome = (CallbackId, CallbackKindName, Result<bool, String>);

/// Scheduler bound to one document
#[derive(Debug)]
pub struct TickScheduler {
    document: Document,
    config: SchedulerConfig,
    // `None` marks a periodic callback whose next firing is beyond `Instant`'s range
    next_due: HashMap<CallbackId, Option<Instant>>,
    stats: SchedulerStats,
}

impl TickScheduler {
    /// Create a scheduler for `document`
    ///
    /// A zero tick interval or per-tick cap is raised to 1; either would
    /// otherwise stall or panic the tick loop.
    #[must_use]
    pub fn new(document: Document, config: SchedulerConfig) -> Self {
        let config = normalize(config);
        Self {
            document,
            config,
            next_due: HashMap::new(),
            stats: SchedulerStats::default(),
        }
    }

    /// The scheduled document
    #[inline]
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Effective settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Statistics so far
    #[inline]
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Fire every due callback once
    pub async fn tick(&mut self) -> TickReport {
        let now = Instant::now();
        let (due, deferred) = self.collect_due(now);

        let mut report = TickReport {
            tick: self.stats.ticks + 1,
            deferred,
            ..TickReport::default()
        };

        let (unlocked, locked): (Vec<_>, Vec<_>) = due.into_iter().partition(SessionCallback::nolock);

        let mut tasks = JoinSet::new();
        for callback in unlocked {
            tasks.spawn(fire(callback));
        }

        for callback in locked {
            record(&mut report, fire(callback).await);
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => record(&mut report, outcome),
                Err(err) => {
                    tracing::error!(error = %err, "unlocked callback task did not complete");
                }
            }
        }

        if report.fired > 0 || !report.failures.is_empty() {
            tracing::debug!(
                document = %self.document.id(),
                tick = report.tick,
                fired = report.fired,
                failed = report.failures.len(),
                skipped = report.skipped,
                deferred = report.deferred,
                "tick complete"
            );
        }

        self.stats.absorb(&report);
        report
    }

    /// Tick every `tick_interval` until `shutdown` resolves
    pub async fn run_until<F>(&mut self, shutdown: F) -> SchedulerStats
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            document = %self.document.id(),
            interval_ms = self.config.tick_interval_ms,
            "scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }

        tracing::info!(
            document = %self.document.id(),
            ticks = self.stats.ticks,
            fired = self.stats.fired,
            failed = self.stats.failed,
            "scheduler stopped"
        );
        self.stats
    }

    /// Run exactly `ticks` ticks, `tick_interval` apart
    pub async fn run_ticks(&mut self, ticks: u64) -> SchedulerStats {
        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for _ in 0..ticks {
            interval.tick().await;
            self.tick().await;
        }
        self.stats
    }

    fn collect_due(&mut self, now: Instant) -> (Vec<SessionCallback>, usize) {
        let registered = self.document.session_callbacks();
        self.next_due
            .retain(|id, _| registered.iter().any(|callback| callback.id() == *id));

        let limit = self.config.max_callbacks_per_tick;
        let mut due = Vec::new();
        let mut deferred = 0;

        for callback in registered {
            let due_at = match callback.kind() {
                CallbackKind::NextTick => Some(callback.registered_at()),
                CallbackKind::Timeout { delay } => callback.registered_at().checked_add(delay),
                CallbackKind::Periodic { period } => *self
                    .next_due
                    .entry(callback.id())
                    .or_insert_with(|| callback.registered_at().checked_add(period)),
            };

            // unrepresentable due instants never come due
            let Some(due_at) = due_at else { continue };
            if due_at > now {
                continue;
            }
            if due.len() >= limit {
                deferred += 1;
                continue;
            }
            if let CallbackKind::Periodic { period } = callback.kind() {
                self.next_due.insert(callback.id(), now.checked_add(period));
            }
            due.push(callback);
        }

        (due, deferred)
    }
}

fn normalize(mut config: SchedulerConfig) -> SchedulerConfig {
    if config.tick_interval_ms == 0 {
        tracing::warn!("scheduler tick_interval_ms is zero, using 1");
        config.tick_interval_ms = 1;
    }
    if config.max_callbacks_per_tick == 0 {
        tracing::warn!("scheduler max_callbacks_per_tick is zero, using 1");
        config.max_callbacks_per_tick = 1;
    }
    config
}

async fn fire(callback: SessionCallback) -> Outcome {
    let id = callback.id();
    let kind = callback.kind().name();
    let bound = callback.callback().clone();

    let result = match AssertUnwindSafe(bound.invoke_if_registered()).catch_unwind().await {
        Ok(Ok(fired)) => Ok(fired),
        Ok(Err(CallbackError::Failed(err))) => Err(format!("{err:#}")),
        Ok(Err(err)) => Err(err.to_string()),
        Err(panic) => Err(panic_message(panic.as_ref())),
    };
    (id, kind, result)
}

fn record(report: &mut TickReport, (callback, kind, result): Outcome) {
    match result {
        Ok(true) => report.fired += 1,
        Ok(false) => report.skipped += 1,
        Err(message) => {
            tracing::error!(%callback, %kind, error = %message, "session callback failed");
            report.failures.push(CallbackFailure {
                callback,
                kind,
                message,
            });
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("callback panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("callback panicked: {message}")
    } else {
        "callback panicked".to_string()
    }
}
