//! Driving port for scheduling reads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Error, SchedulingId, SchedulingView, TechnicianId, TechnicianPerformance};

/// Driving port for scheduling read operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchedulingQuery: Send + Sync {
    /// Every record owned by `technician_id`, latest first.
    async fn list_for_technician(
        &self,
        technician_id: TechnicianId,
    ) -> Result<Vec<SchedulingView>, Error>;

    /// Records owned by `technician_id` scheduled strictly after `now`,
    /// earliest first.
    async fn list_upcoming_for_technician(
        &self,
        technician_id: TechnicianId,
        now: DateTime<Utc>,
    ) -> Result<Vec<SchedulingView>, Error>;

    /// One record owned by `caller`, served from cache when possible.
    async fn get_by_id(
        &self,
        id: SchedulingId,
        caller: TechnicianId,
    ) -> Result<SchedulingView, Error>;

    /// One record without an ownership check, always read from the store.
    ///
    /// Used by asynchronous consumers that act outside a technician session.
    async fn get_by_id_for_system(&self, id: SchedulingId) -> Result<SchedulingView, Error>;

    /// Store-side performance aggregates for a technician.
    async fn technician_performance(
        &self,
        technician_id: TechnicianId,
    ) -> Result<TechnicianPerformance, Error>;
}
