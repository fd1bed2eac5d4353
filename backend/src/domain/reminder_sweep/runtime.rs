//! Background schedule for [`ReminderSweep`].

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use super::ReminderSweep;

/// Start/stop handle for a running sweep schedule.
pub struct ReminderSweepHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReminderSweep {
    /// Start sweeping every `config().period` on the current runtime.
    ///
    /// Each tick runs in its own task so a slow sweep never delays the
    /// schedule; the running guard turns an overlapping tick into a skip.
    /// The first sweep runs immediately.
    pub fn start(self: Arc<Self>) -> ReminderSweepHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let period = self.config.period;
        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(period_secs = period.as_secs(), "reminder sweep scheduled");
            loop {
                tokio::select! {
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let sweep = Arc::clone(&self);
                        tokio::spawn(async move {
                            if let Err(err) = sweep.run_once().await {
                                error!(error = %err, "reminder sweep failed");
                            }
                        });
                    }
                }
            }
            info!("reminder sweep stopped");
        });
        ReminderSweepHandle { shutdown, task }
    }
}

impl ReminderSweepHandle {
    /// Stop scheduling new sweeps and wait for the scheduler task to exit.
    ///
    /// A sweep already in flight finishes on its own.
    pub async fn stop(self) {
        if self.shutdown.send(true).is_err() {
            debug!("reminder sweep scheduler already stopped");
        }
        if let Err(err) = self.task.await {
            error!(error = %err, "reminder sweep task ended abnormally");
        }
    }

    /// Whether the scheduler task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
