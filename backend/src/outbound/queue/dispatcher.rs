//! In-process buffer in front of the lifecycle event channel.
//!
//! `publish` only enqueues into a bounded buffer, so callers never wait on
//! the transport. A single worker drains the buffer in order. While the
//! service runs, an unavailable channel is retried with capped, jittered
//! exponential backoff until it recovers; events queue behind the one in
//! flight. Once shutdown begins, each event gets at most `max_attempts`
//! tries. Events the channel rejects outright are logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::ports::{
    LifecycleEvent, LifecycleEventChannel, LifecycleEventChannelError, LifecycleEventPublishError,
    LifecycleEventPublisher,
};

/// Buffer and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Events held before `publish` reports a full buffer.
    pub capacity: usize,
    /// Delivery attempts per event once shutdown has begun, including the
    /// first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Cap on the un-jittered delay.
    pub max_backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Async sleep used between delivery attempts.
#[async_trait]
pub trait DispatchSleeper: Send + Sync {
    /// Wait for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Jitter applied to retry delays.
pub trait DispatchJitter: Send + Sync {
    /// Return the delay to wait for `attempt`, given its exponential base.
    fn jittered_delay(&self, base: Duration, attempt: u32) -> Duration;
}

/// Tokio-based sleeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl DispatchSleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Adds up to a quarter of the base delay at random.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl DispatchJitter for RandomJitter {
    fn jittered_delay(&self, base: Duration, _attempt: u32) -> Duration {
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let max_extra = (base_ms / 4).max(1);
        let extra = rand::thread_rng().gen_range(0..=max_extra);
        Duration::from_millis(base_ms.saturating_add(extra))
    }
}

/// Sleep and jitter strategies for the worker.
pub struct DispatcherRuntime {
    /// Async sleep implementation.
    pub sleeper: Arc<dyn DispatchSleeper>,
    /// Jitter strategy for retry delays.
    pub jitter: Arc<dyn DispatchJitter>,
}

impl Default for DispatcherRuntime {
    fn default() -> Self {
        Self {
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(RandomJitter),
        }
    }
}

/// Delivery counters reported when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events the channel accepted.
    pub delivered: u64,
    /// Events given up on.
    pub dropped: u64,
}

/// Buffered lifecycle event publisher.
pub struct BufferedEventDispatcher {
    sender: mpsc::Sender<LifecycleEvent>,
    capacity: usize,
}

/// Handle used to stop the delivery worker.
pub struct DispatcherHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<DispatchStats>,
}

impl BufferedEventDispatcher {
    /// Spawn the delivery worker on the current runtime.
    pub fn spawn(
        channel: Arc<dyn LifecycleEventChannel>,
        config: DispatcherConfig,
        runtime: DispatcherRuntime,
    ) -> (Self, DispatcherHandle) {
        let capacity = config.capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let (shutdown, stop) = watch::channel(false);
        let worker = DeliveryWorker {
            channel,
            config,
            sleeper: runtime.sleeper,
            jitter: runtime.jitter,
            draining: stop.clone(),
            stats: DispatchStats::default(),
        };
        let task = tokio::spawn(worker.run(receiver, stop));
        (
            Self { sender, capacity },
            DispatcherHandle { shutdown, task },
        )
    }
}

#[async_trait]
impl LifecycleEventPublisher for BufferedEventDispatcher {
    async fn publish(&self, event: LifecycleEvent) -> Result<(), LifecycleEventPublishError> {
        self.sender.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => LifecycleEventPublishError::buffer_full(format!(
                "{} events queued",
                self.capacity
            )),
            mpsc::error::TrySendError::Closed(_) => {
                LifecycleEventPublishError::closed("dispatcher worker stopped")
            }
        })
    }
}

impl DispatcherHandle {
    /// Stop accepting events, deliver what is already buffered, and wait for
    /// the worker to finish.
    pub async fn shutdown(self) -> DispatchStats {
        if self.shutdown.send(true).is_err() {
            debug!("event dispatcher worker already stopped");
        }
        match self.task.await {
            Ok(stats) => stats,
            Err(err) => {
                error!(error = %err, "event dispatcher task ended abnormally");
                DispatchStats::default()
            }
        }
    }
}

struct DeliveryWorker {
    channel: Arc<dyn LifecycleEventChannel>,
    config: DispatcherConfig,
    sleeper: Arc<dyn DispatchSleeper>,
    jitter: Arc<dyn DispatchJitter>,
    draining: watch::Receiver<bool>,
    stats: DispatchStats,
}

impl DeliveryWorker {
    async fn run(
        mut self,
        mut receiver: mpsc::Receiver<LifecycleEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> DispatchStats {
        info!(capacity = self.config.capacity, "event dispatcher started");
        loop {
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                next = receiver.recv() => match next {
                    Some(event) => self.deliver(event).await,
                    None => break,
                },
            }
        }

        receiver.close();
        while let Some(event) = receiver.recv().await {
            self.deliver(event).await;
        }
        info!(
            delivered = self.stats.delivered,
            dropped = self.stats.dropped,
            "event dispatcher stopped"
        );
        self.stats
    }

    async fn deliver(&mut self, event: LifecycleEvent) {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            match self.channel.send(&event).await {
                Ok(()) => {
                    debug!(
                        kind = %event.kind,
                        scheduling_id = %event.scheduling_id,
                        attempt,
                        "lifecycle event delivered"
                    );
                    self.stats.delivered += 1;
                    return;
                }
                Err(LifecycleEventChannelError::Unavailable { message })
                    if self.may_retry(attempt) =>
                {
                    let delay = self
                        .jitter
                        .jittered_delay(self.retry_base_delay(attempt), attempt);
                    warn!(
                        kind = %event.kind,
                        scheduling_id = %event.scheduling_id,
                        attempt,
                        error = %message,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "lifecycle event delivery failed; retrying"
                    );
                    self.sleeper.sleep(delay).await;
                }
                Err(err) => {
                    error!(
                        kind = %event.kind,
                        scheduling_id = %event.scheduling_id,
                        attempt,
                        error = %err,
                        "lifecycle event dropped"
                    );
                    self.stats.dropped += 1;
                    return;
                }
            }
        }
    }

    /// Unbounded while running; bounded by `max_attempts` once draining.
    fn may_retry(&self, attempt: u32) -> bool {
        !*self.draining.borrow() || attempt < self.config.max_attempts.max(1)
    }

    fn retry_base_delay(&self, attempt: u32) -> Duration {
        let exponent = 2_u32.saturating_pow(attempt.saturating_sub(1));
        let base_ms = u64::try_from(self.config.initial_backoff.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.config.max_backoff.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(u64::from(exponent)).min(max_ms))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::SchedulingId;
    use crate::domain::ports::LifecycleEventKind;
    use crate::test_support::doubles::ScriptedEventChannel;

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn delays(&self) -> Vec<Duration> {
            self.delays.lock().expect("sleeper lock").clone()
        }
    }

    #[async_trait]
    impl DispatchSleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().expect("sleeper lock").push(duration);
        }
    }

    struct NoJitter;

    impl DispatchJitter for NoJitter {
        fn jittered_delay(&self, base: Duration, _attempt: u32) -> Duration {
            base
        }
    }

    #[fixture]
    fn sleeper() -> Arc<RecordingSleeper> {
        Arc::new(RecordingSleeper::default())
    }

    fn runtime(sleeper: &Arc<RecordingSleeper>) -> DispatcherRuntime {
        DispatcherRuntime {
            sleeper: sleeper.clone(),
            jitter: Arc::new(NoJitter),
        }
    }

    fn event(id: i64) -> LifecycleEvent {
        LifecycleEvent::new(LifecycleEventKind::Created, SchedulingId::new(id))
    }

    fn unavailable() -> Result<(), LifecycleEventChannelError> {
        Err(LifecycleEventChannelError::unavailable("connection reset"))
    }

    #[rstest]
    #[tokio::test]
    async fn delivers_in_publish_order(sleeper: Arc<RecordingSleeper>) {
        let channel = Arc::new(ScriptedEventChannel::new(Vec::new()));
        let (dispatcher, handle) = BufferedEventDispatcher::spawn(
            channel.clone(),
            DispatcherConfig::default(),
            runtime(&sleeper),
        );

        for id in 1..=3 {
            dispatcher.publish(event(id)).await.expect("buffered");
        }
        channel.wait_for_deliveries(3).await;

        let ids: Vec<_> = channel
            .delivered()
            .iter()
            .map(|event| event.scheduling_id.get())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(
            handle.shutdown().await,
            DispatchStats {
                delivered: 3,
                dropped: 0
            }
        );
    }

    #[rstest]
    #[tokio::test]
    async fn retries_with_exponential_backoff(sleeper: Arc<RecordingSleeper>) {
        let channel = Arc::new(ScriptedEventChannel::new(vec![unavailable(), unavailable()]));
        let (dispatcher, handle) = BufferedEventDispatcher::spawn(
            channel.clone(),
            DispatcherConfig::default(),
            runtime(&sleeper),
        );

        dispatcher.publish(event(9)).await.expect("buffered");
        channel.wait_for_deliveries(1).await;

        assert_eq!(channel.attempts(), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
        assert_eq!(handle.shutdown().await.delivered, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn outage_longer_than_the_attempt_budget_still_delivers(
        sleeper: Arc<RecordingSleeper>,
    ) {
        let channel = Arc::new(ScriptedEventChannel::new(vec![unavailable(); 8]));
        let config = DispatcherConfig {
            max_attempts: 3,
            ..DispatcherConfig::default()
        };
        let (dispatcher, handle) =
            BufferedEventDispatcher::spawn(channel.clone(), config, runtime(&sleeper));

        dispatcher.publish(event(1)).await.expect("buffered");
        dispatcher.publish(event(2)).await.expect("buffered");
        channel.wait_for_deliveries(2).await;

        let ids: Vec<_> = channel
            .delivered()
            .iter()
            .map(|event| event.scheduling_id.get())
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(channel.attempts(), 10);
        assert_eq!(
            sleeper.delays().last().copied(),
            Some(DispatcherConfig::default().max_backoff)
        );
        assert_eq!(
            handle.shutdown().await,
            DispatchStats {
                delivered: 2,
                dropped: 0
            }
        );
    }

    #[rstest]
    #[tokio::test]
    async fn draining_gives_up_after_max_attempts(sleeper: Arc<RecordingSleeper>) {
        let channel = Arc::new(ScriptedEventChannel::new(vec![unavailable(); 3]));
        let config = DispatcherConfig {
            max_attempts: 3,
            ..DispatcherConfig::default()
        };
        let (dispatcher, handle) =
            BufferedEventDispatcher::spawn(channel.clone(), config, runtime(&sleeper));

        // Current-thread runtime: the worker first runs inside `shutdown`,
        // so both events are delivered under the drain budget.
        dispatcher.publish(event(1)).await.expect("buffered");
        dispatcher.publish(event(2)).await.expect("buffered");
        let stats = handle.shutdown().await;

        assert_eq!(
            stats,
            DispatchStats {
                delivered: 1,
                dropped: 1
            }
        );
        assert_eq!(channel.delivered()[0].scheduling_id.get(), 2);
        assert_eq!(channel.attempts(), 4);
    }

    #[rstest]
    #[tokio::test]
    async fn rejected_events_are_not_retried(sleeper: Arc<RecordingSleeper>) {
        let channel = Arc::new(ScriptedEventChannel::new(vec![Err(
            LifecycleEventChannelError::rejected("WRONGTYPE"),
        )]));
        let (dispatcher, handle) = BufferedEventDispatcher::spawn(
            channel.clone(),
            DispatcherConfig::default(),
            runtime(&sleeper),
        );

        dispatcher.publish(event(4)).await.expect("buffered");
        let stats = handle.shutdown().await;

        assert_eq!(stats.dropped, 1);
        assert_eq!(channel.attempts(), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn shutdown_drains_the_buffer_then_closes(sleeper: Arc<RecordingSleeper>) {
        let channel = Arc::new(ScriptedEventChannel::new(Vec::new()));
        let (dispatcher, handle) = BufferedEventDispatcher::spawn(
            channel.clone(),
            DispatcherConfig::default(),
            runtime(&sleeper),
        );

        for id in 1..=5 {
            dispatcher.publish(event(id)).await.expect("buffered");
        }
        let stats = handle.shutdown().await;

        assert_eq!(stats.delivered, 5);
        assert_eq!(channel.delivered().len(), 5);
        let err = dispatcher.publish(event(6)).await.expect_err("worker gone");
        assert!(matches!(err, LifecycleEventPublishError::Closed { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn shutdown_after_the_worker_exits_still_reports(sleeper: Arc<RecordingSleeper>) {
        let channel = Arc::new(ScriptedEventChannel::new(Vec::new()));
        let (dispatcher, handle) = BufferedEventDispatcher::spawn(
            channel.clone(),
            DispatcherConfig::default(),
            runtime(&sleeper),
        );

        dispatcher.publish(event(1)).await.expect("buffered");
        drop(dispatcher);
        while !handle.task.is_finished() {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            handle.shutdown().await,
            DispatchStats {
                delivered: 1,
                dropped: 0
            }
        );
    }

    #[rstest]
    #[tokio::test]
    async fn full_buffer_is_reported_without_waiting(sleeper: Arc<RecordingSleeper>) {
        let channel = Arc::new(ScriptedEventChannel::new(Vec::new()));
        let config = DispatcherConfig {
            capacity: 1,
            ..DispatcherConfig::default()
        };
        let (dispatcher, handle) =
            BufferedEventDispatcher::spawn(channel.clone(), config, runtime(&sleeper));

        // Current-thread runtime: the worker cannot run until this task
        // yields, so the second publish finds the single slot taken.
        dispatcher.publish(event(1)).await.expect("buffered");
        let err = dispatcher.publish(event(2)).await.expect_err("buffer full");
        assert!(matches!(err, LifecycleEventPublishError::BufferFull { .. }));

        assert_eq!(handle.shutdown().await.delivered, 1);
    }

    #[rstest]
    #[case(1, 100)]
    #[case(3, 400)]
    #[case(10, 5_000)]
    fn backoff_doubles_up_to_the_cap(#[case] attempt: u32, #[case] expected_ms: u64) {
        let worker = DeliveryWorker {
            channel: Arc::new(ScriptedEventChannel::new(Vec::new())),
            config: DispatcherConfig::default(),
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(NoJitter),
            draining: watch::channel(false).1,
            stats: DispatchStats::default(),
        };
        assert_eq!(
            worker.retry_base_delay(attempt),
            Duration::from_millis(expected_ms)
        );
    }

    #[rstest]
    fn random_jitter_stays_within_a_quarter() {
        let base = Duration::from_millis(400);
        for attempt in 1..=20 {
            let delay = RandomJitter.jittered_delay(base, attempt);
            assert!(delay >= base && delay <= Duration::from_millis(500));
        }
    }
}
