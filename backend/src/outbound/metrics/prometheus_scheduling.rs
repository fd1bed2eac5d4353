//! Prometheus adapter for scheduling lifecycle metrics.
//!
//! Metrics are registered with a provided registry and exposed via the
//! `/metrics` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use prometheus::{Counter, CounterVec, HistogramOpts, HistogramVec, Opts, Registry};

use crate::domain::SchedulingStatus;
use crate::domain::ports::{SchedulingMetrics, SchedulingMetricsError, SchedulingMutation};

/// Prometheus-backed scheduling metrics recorder.
///
/// # Metrics
///
/// - `scheduler_scheduling_total` (counter): records created.
/// - `scheduler_scheduling_status_total` (counter, label `status`): records
///   entering each status.
/// - `scheduler_scheduling_duration_seconds` (histogram, label `operation`:
///   `create`, `update`, or `delete`): mutation latency.
pub struct PrometheusSchedulingMetrics {
    created_total: Counter,
    status_total: CounterVec,
    duration_seconds: HistogramVec,
}

impl PrometheusSchedulingMetrics {
    /// Create and register metrics with the given registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric cannot be registered (e.g., if a metric
    /// with the same name already exists in the registry).
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let created_total = Counter::with_opts(Opts::new(
            "scheduler_scheduling_total",
            "Total scheduling records created",
        ))?;
        let status_total = CounterVec::new(
            Opts::new(
                "scheduler_scheduling_status_total",
                "Scheduling records entering each status",
            ),
            &["status"],
        )?;
        let duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "scheduler_scheduling_duration_seconds",
                "Latency of scheduling mutations",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(created_total.clone()))?;
        registry.register(Box::new(status_total.clone()))?;
        registry.register(Box::new(duration_seconds.clone()))?;
        Ok(Self {
            created_total,
            status_total,
            duration_seconds,
        })
    }
}

#[async_trait]
impl SchedulingMetrics for PrometheusSchedulingMetrics {
    async fn record_created(&self) -> Result<(), SchedulingMetricsError> {
        self.created_total.inc();
        Ok(())
    }

    async fn record_status(&self, status: SchedulingStatus) -> Result<(), SchedulingMetricsError> {
        self.status_total
            .with_label_values(&[status.as_str()])
            .inc();
        Ok(())
    }

    async fn observe_mutation(
        &self,
        mutation: SchedulingMutation,
        elapsed: Duration,
    ) -> Result<(), SchedulingMetricsError> {
        self.duration_seconds
            .with_label_values(&[mutation.label()])
            .observe(elapsed.as_secs_f64());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn counts_creations_and_status_changes() {
        let registry = Registry::new();
        let metrics = PrometheusSchedulingMetrics::new(&registry)
            .expect("metric registration should succeed");

        metrics.record_created().await.expect("recorded");
        metrics
            .record_status(SchedulingStatus::Pending)
            .await
            .expect("recorded");
        metrics
            .record_status(SchedulingStatus::Pending)
            .await
            .expect("recorded");

        assert_eq!(metrics.created_total.get() as u64, 1);
        let pending = metrics.status_total.with_label_values(&["PENDING"]);
        assert_eq!(pending.get() as u64, 2);
    }

    #[rstest]
    #[tokio::test]
    async fn observes_mutation_latency_per_operation() {
        let registry = Registry::new();
        let metrics = PrometheusSchedulingMetrics::new(&registry)
            .expect("metric registration should succeed");

        metrics
            .observe_mutation(SchedulingMutation::Update, Duration::from_millis(30))
            .await
            .expect("observed");

        let histogram = metrics.duration_seconds.with_label_values(&["update"]);
        assert_eq!(histogram.get_sample_count(), 1);
        assert!((histogram.get_sample_sum() - 0.03).abs() < 1e-9);
    }

    #[rstest]
    fn double_registration_fails() {
        let registry = Registry::new();
        PrometheusSchedulingMetrics::new(&registry).expect("first registration");
        assert!(PrometheusSchedulingMetrics::new(&registry).is_err());
    }
}
