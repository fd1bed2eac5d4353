//! Domain port surface for scheduling counters and mutation timings.
//!
//! Recording is best-effort: services discard errors from this port after
//! logging them.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::SchedulingStatus;

use super::define_port_error;

define_port_error! {
    /// Errors exposed when recording scheduling metrics.
    pub enum SchedulingMetricsError {
        /// Metric exporter rejected the write.
        Export { message: String } =>
            "scheduling metrics exporter failed: {message}",
    }
}

/// Mutation paths timed by the duration histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulingMutation {
    /// Record creation.
    Create,
    /// Record update.
    Update,
    /// Record deletion.
    Delete,
}

impl SchedulingMutation {
    /// Label value for the `operation` dimension.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Metrics recording port for the lifecycle service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchedulingMetrics: Send + Sync {
    /// Count one newly created record.
    async fn record_created(&self) -> Result<(), SchedulingMetricsError>;

    /// Count one record entering `status`.
    async fn record_status(&self, status: SchedulingStatus) -> Result<(), SchedulingMetricsError>;

    /// Observe how long a mutation took, successful or not.
    async fn observe_mutation(
        &self,
        mutation: SchedulingMutation,
        elapsed: Duration,
    ) -> Result<(), SchedulingMetricsError>;
}

/// No-op implementation used when metrics are disabled or in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSchedulingMetrics;

#[async_trait]
impl SchedulingMetrics for NoOpSchedulingMetrics {
    async fn record_created(&self) -> Result<(), SchedulingMetricsError> {
        Ok(())
    }

    async fn record_status(
        &self,
        _status: SchedulingStatus,
    ) -> Result<(), SchedulingMetricsError> {
        Ok(())
    }

    async fn observe_mutation(
        &self,
        _mutation: SchedulingMutation,
        _elapsed: Duration,
    ) -> Result<(), SchedulingMetricsError> {
        Ok(())
    }
}
