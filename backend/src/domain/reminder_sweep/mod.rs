//! Periodic reminder fan-out for upcoming visits.
//!
//! A sweep reads every non-cancelled record in `[now, now + lookahead)` and
//! publishes one `REMINDER` event per record. Duplicate reminders across
//! sweeps are acceptable. Overlapping sweeps are not: a sweep that starts
//! while another is still running is skipped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::TimeDelta;
use mockable::Clock;
use tracing::{info, warn};

use crate::domain::Error;
use crate::domain::ports::{
    LifecycleEvent, LifecycleEventKind, LifecycleEventPublisher, SchedulingRepository,
    SchedulingRepositoryError,
};

mod runtime;

pub use runtime::ReminderSweepHandle;

/// Sweep schedule and window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderSweepConfig {
    /// Time between sweep starts.
    pub period: Duration,
    /// Forward window scanned by each sweep.
    pub lookahead: Duration,
}

impl Default for ReminderSweepConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(60 * 60),
            lookahead: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Result of one sweep invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The sweep ran to completion.
    Completed {
        /// Reminders handed to the publisher.
        published: usize,
        /// Reminders the publisher refused.
        failed: usize,
    },
    /// Another sweep was still running.
    Skipped,
}

/// Reminder sweep job.
pub struct ReminderSweep {
    schedulings: Arc<dyn SchedulingRepository>,
    events: Arc<dyn LifecycleEventPublisher>,
    clock: Arc<dyn Clock>,
    config: ReminderSweepConfig,
    running: AtomicBool,
}

/// Clears the running flag when a sweep ends, including by panic.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ReminderSweep {
    /// Build a sweep over the given store and publisher.
    pub fn new(
        schedulings: Arc<dyn SchedulingRepository>,
        events: Arc<dyn LifecycleEventPublisher>,
        clock: Arc<dyn Clock>,
        config: ReminderSweepConfig,
    ) -> Self {
        Self {
            schedulings,
            events,
            clock,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Configured schedule.
    pub fn config(&self) -> ReminderSweepConfig {
        self.config
    }

    /// Run one sweep now, unless one is already in flight.
    ///
    /// # Errors
    ///
    /// Fails only when the store query fails. Publisher failures are counted
    /// in [`SweepOutcome::Completed::failed`].
    pub async fn run_once(&self) -> Result<SweepOutcome, Error> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("reminder sweep already running; skipping");
            return Ok(SweepOutcome::Skipped);
        }
        let _guard = RunningGuard(&self.running);

        let start = self.clock.utc();
        let lookahead = TimeDelta::from_std(self.config.lookahead)
            .map_err(|err| Error::internal(format!("reminder lookahead out of range: {err}")))?;
        let end = start
            .checked_add_signed(lookahead)
            .ok_or_else(|| Error::internal("reminder window ends past the representable range"))?;

        let due = self
            .schedulings
            .find_in_range(start, end)
            .await
            .map_err(map_sweep_error)?;

        let mut published = 0;
        let mut failed = 0;
        for record in &due {
            let event = LifecycleEvent::new(LifecycleEventKind::Reminder, record.id);
            match self.events.publish(event).await {
                Ok(()) => published += 1,
                Err(error) => {
                    failed += 1;
                    warn!(scheduling_id = %record.id, error = %error, "reminder not queued");
                }
            }
        }
        info!(%start, %end, published, failed, "reminder sweep finished");
        Ok(SweepOutcome::Completed { published, failed })
    }
}

fn map_sweep_error(error: SchedulingRepositoryError) -> Error {
    warn!(error = %error, "reminder sweep query failed");
    match error {
        SchedulingRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("scheduling store unavailable: {message}"))
        }
        other => Error::internal(other.to_string()),
    }
}
