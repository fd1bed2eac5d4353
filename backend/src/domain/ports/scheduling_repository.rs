//! Port for the authoritative scheduling store.
//!
//! Every mutating method is a single store transaction: a record and its
//! child collections are written, replaced, or removed together or not at
//! all. Returned records always carry their child collections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    ChildReplacement, NewSchedulingRecord, PerformanceAggregates, SchedulingId, SchedulingRecord,
    TechnicianId,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by scheduling repository adapters.
    pub enum SchedulingRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "scheduling repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "scheduling repository query failed: {message}",
        /// The record disappeared between read and write.
        Missing { id: i64 } =>
            "scheduling {id} no longer exists",
    }
}

/// Port for reading and writing scheduling records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchedulingRepository: Send + Sync {
    /// Insert a record with its children and return it with assigned ids.
    async fn create(
        &self,
        record: &NewSchedulingRecord,
    ) -> Result<SchedulingRecord, SchedulingRepositoryError>;

    /// Load one record by id.
    async fn find_by_id(
        &self,
        id: SchedulingId,
    ) -> Result<Option<SchedulingRecord>, SchedulingRepositoryError>;

    /// All records owned by a technician, latest `scheduled_at` first.
    async fn list_for_technician(
        &self,
        technician_id: &TechnicianId,
    ) -> Result<Vec<SchedulingRecord>, SchedulingRepositoryError>;

    /// Records owned by a technician scheduled strictly after `after`,
    /// earliest first.
    async fn list_upcoming_for_technician(
        &self,
        technician_id: &TechnicianId,
        after: DateTime<Utc>,
    ) -> Result<Vec<SchedulingRecord>, SchedulingRepositoryError>;

    /// Non-cancelled records with `start <= scheduled_at < end`, across all
    /// technicians.
    async fn find_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SchedulingRecord>, SchedulingRepositoryError>;

    /// Overwrite the record's scalar fields and replace the supplied child
    /// collections. Returns the stored record as re-read inside the same
    /// transaction.
    async fn update(
        &self,
        record: &SchedulingRecord,
        children: &ChildReplacement,
    ) -> Result<SchedulingRecord, SchedulingRepositoryError>;

    /// Remove a record and its children. Returns whether a row was removed.
    async fn delete(&self, id: SchedulingId) -> Result<bool, SchedulingRepositoryError>;

    /// Rating, completion count, and duration aggregates for a technician.
    async fn performance_for_technician(
        &self,
        technician_id: &TechnicianId,
    ) -> Result<PerformanceAggregates, SchedulingRepositoryError>;
}

/// Fixture implementation that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureSchedulingRepository;

#[async_trait]
impl SchedulingRepository for FixtureSchedulingRepository {
    async fn create(
        &self,
        _record: &NewSchedulingRecord,
    ) -> Result<SchedulingRecord, SchedulingRepositoryError> {
        Err(SchedulingRepositoryError::query(
            "fixture repository does not persist records",
        ))
    }

    async fn find_by_id(
        &self,
        _id: SchedulingId,
    ) -> Result<Option<SchedulingRecord>, SchedulingRepositoryError> {
        Ok(None)
    }

    async fn list_for_technician(
        &self,
        _technician_id: &TechnicianId,
    ) -> Result<Vec<SchedulingRecord>, SchedulingRepositoryError> {
        Ok(Vec::new())
    }

    async fn list_upcoming_for_technician(
        &self,
        _technician_id: &TechnicianId,
        _after: DateTime<Utc>,
    ) -> Result<Vec<SchedulingRecord>, SchedulingRepositoryError> {
        Ok(Vec::new())
    }

    async fn find_in_range(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<SchedulingRecord>, SchedulingRepositoryError> {
        Ok(Vec::new())
    }

    async fn update(
        &self,
        record: &SchedulingRecord,
        _children: &ChildReplacement,
    ) -> Result<SchedulingRecord, SchedulingRepositoryError> {
        Err(SchedulingRepositoryError::missing(record.id.get()))
    }

    async fn delete(&self, _id: SchedulingId) -> Result<bool, SchedulingRepositoryError> {
        Ok(false)
    }

    async fn performance_for_technician(
        &self,
        _technician_id: &TechnicianId,
    ) -> Result<PerformanceAggregates, SchedulingRepositoryError> {
        Ok(PerformanceAggregates::default())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[tokio::test]
    async fn fixture_lookups_are_empty() {
        let repo = FixtureSchedulingRepository;
        let found = repo
            .find_by_id(SchedulingId::new(1))
            .await
            .expect("fixture lookup succeeds");
        assert!(found.is_none());
        let listed = repo
            .list_for_technician(&TechnicianId::random())
            .await
            .expect("fixture list succeeds");
        assert!(listed.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn fixture_performance_is_zeroed() {
        let aggregates = FixtureSchedulingRepository
            .performance_for_technician(&TechnicianId::random())
            .await
            .expect("fixture aggregates");
        assert_eq!(aggregates.completed_visits, 0);
        assert!(aggregates.average_rating.is_none());
    }

    #[rstest]
    fn missing_error_names_the_record() {
        let err = SchedulingRepositoryError::missing(42_i64);
        assert!(err.to_string().contains("42"));
    }
}
