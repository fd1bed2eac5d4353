//! Scheduling lifecycle service.
//!
//! Each mutation is two phases. The store write is one atomic call to
//! [`SchedulingRepository`] and its failure is the operation's failure.
//! Once it commits, enrichment, caching, and event publication run
//! best-effort (see `post_commit`) and can never undo or fail the write.
//!
//! Single-record reads go through the view cache. A cached view is only
//! served to the technician recorded on it; any other caller falls through
//! to the store and its ownership check.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use mockable::Clock;
use tracing::{debug, info, warn};

use crate::domain::ports::{
    ClientFeedbackRequest, CreateSchedulingRequest, GeocodingSource, LifecycleEventKind,
    LifecycleEventPublisher, SchedulingCache, SchedulingCacheKey, SchedulingCommand,
    SchedulingMetrics, SchedulingMutation, SchedulingQuery, SchedulingRepository,
    TechnicianRepository, UpdateSchedulingRequest,
};
use crate::domain::{
    ChildReplacement, ClientRating, Error, NewSchedulingRecord, SchedulingId, SchedulingRecord,
    SchedulingStatus, SchedulingValidationError, SchedulingView, ServicePriority, TechnicianId,
    TechnicianPerformance, limit_text, parse_or_default, require_text, validate_coordinates,
    validate_email, validate_not_in_past,
};

mod mapping;
mod patch;
mod post_commit;

use mapping::{
    map_feedback_error, map_repository_error, map_technician_error, map_validation_error,
    scheduling_not_found, technician_not_found,
};

/// Tunables for the lifecycle service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingLifecycleConfig {
    /// Time-to-live for cached views.
    pub cache_ttl: Duration,
    /// Upper bound on a single reverse-geocoding call.
    pub enrichment_timeout: Duration,
}

impl Default for SchedulingLifecycleConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            enrichment_timeout: Duration::from_secs(2),
        }
    }
}

/// Port bundle required by the lifecycle service.
pub struct SchedulingLifecyclePorts {
    /// Authoritative store.
    pub schedulings: Arc<dyn SchedulingRepository>,
    /// Technician identity lookups.
    pub technicians: Arc<dyn TechnicianRepository>,
    /// View cache.
    pub cache: Arc<dyn SchedulingCache>,
    /// Reverse geocoder used for enrichment.
    pub geocoder: Arc<dyn GeocodingSource>,
    /// Lifecycle event publisher.
    pub events: Arc<dyn LifecycleEventPublisher>,
    /// Counters and mutation timings.
    pub metrics: Arc<dyn SchedulingMetrics>,
}

/// Orchestrates reads and writes of scheduling records.
pub struct SchedulingLifecycleService {
    schedulings: Arc<dyn SchedulingRepository>,
    technicians: Arc<dyn TechnicianRepository>,
    cache: Arc<dyn SchedulingCache>,
    geocoder: Arc<dyn GeocodingSource>,
    events: Arc<dyn LifecycleEventPublisher>,
    metrics: Arc<dyn SchedulingMetrics>,
    clock: Arc<dyn Clock>,
    config: SchedulingLifecycleConfig,
}

impl SchedulingLifecycleService {
    /// Build the service.
    pub fn new(
        ports: SchedulingLifecyclePorts,
        clock: Arc<dyn Clock>,
        config: SchedulingLifecycleConfig,
    ) -> Self {
        Self {
            schedulings: ports.schedulings,
            technicians: ports.technicians,
            cache: ports.cache,
            geocoder: ports.geocoder,
            events: ports.events,
            metrics: ports.metrics,
            clock,
            config,
        }
    }

    /// Load a record visible to `caller`.
    async fn load_owned(
        &self,
        id: SchedulingId,
        caller: &TechnicianId,
    ) -> Result<SchedulingRecord, Error> {
        match self.load(id).await? {
            record if record.is_owned_by(caller) => Ok(record),
            _ => {
                debug!(scheduling_id = %id, technician_id = %caller, "ownership check failed");
                Err(scheduling_not_found(id))
            }
        }
    }

    async fn load(&self, id: SchedulingId) -> Result<SchedulingRecord, Error> {
        self.schedulings
            .find_by_id(id)
            .await
            .map_err(map_repository_error)?
            .ok_or_else(|| scheduling_not_found(id))
    }

    async fn materialise_all(&self, records: &[SchedulingRecord]) -> Vec<SchedulingView> {
        join_all(records.iter().map(|record| self.materialise(record))).await
    }

    async fn cached_view_for(
        &self,
        id: SchedulingId,
        caller: &TechnicianId,
    ) -> Option<SchedulingView> {
        let key = SchedulingCacheKey::for_scheduling(id);
        match self.cache.get(&key).await {
            Ok(Some(view)) if view.technician_id == *caller => {
                debug!(scheduling_id = %id, "scheduling cache hit");
                Some(view)
            }
            Ok(Some(_)) => {
                debug!(
                    scheduling_id = %id,
                    technician_id = %caller,
                    "cached view belongs to another technician; reading store"
                );
                None
            }
            Ok(None) => {
                debug!(scheduling_id = %id, "scheduling cache miss");
                None
            }
            Err(error) => {
                warn!(scheduling_id = %id, error = %error, "scheduling cache read failed");
                None
            }
        }
    }

    async fn create_record(
        &self,
        request: CreateSchedulingRequest,
        caller: TechnicianId,
    ) -> Result<SchedulingView, Error> {
        let now = self.clock.utc();
        validate_create(&request, now).map_err(map_validation_error)?;

        self.technicians
            .find_by_id(&caller)
            .await
            .map_err(map_technician_error)?
            .ok_or_else(|| technician_not_found(&caller))?;

        let new_record = NewSchedulingRecord {
            technician_id: caller,
            priority: parse_or_default(request.priority.as_deref(), ServicePriority::Medium),
            status: SchedulingStatus::Pending,
            farm_name: request.farm_name,
            client_name: request.client_name,
            client_email: request.client_email,
            address: request.address,
            latitude: request.latitude,
            longitude: request.longitude,
            scheduled_at: request.scheduled_at,
            service_description: request.service_description,
            equipment: request.equipment,
            spare_parts: request.spare_parts,
        };
        let record = self
            .schedulings
            .create(&new_record)
            .await
            .map_err(map_repository_error)?;
        info!(scheduling_id = %record.id, technician_id = %caller, "scheduling created");

        self.record_created().await;
        self.record_status(SchedulingStatus::Pending).await;
        let view = self.materialise(&record).await;
        self.publish(LifecycleEventKind::Created, record.id).await;
        Ok(view)
    }

    async fn update_record(
        &self,
        id: SchedulingId,
        request: UpdateSchedulingRequest,
        caller: TechnicianId,
    ) -> Result<SchedulingView, Error> {
        let mut record = self.load_owned(id, &caller).await?;
        let applied = patch::apply_update(&mut record, request, self.clock.utc())?;
        let stored = self
            .schedulings
            .update(&record, &applied.children)
            .await
            .map_err(map_repository_error)?;
        info!(scheduling_id = %id, status = %stored.status, "scheduling updated");

        if let Some(status) = applied.status_changed {
            self.record_status(status).await;
        }
        let view = self.materialise(&stored).await;
        if applied.status_supplied {
            self.publish(LifecycleEventKind::Updated, id).await;
        }
        Ok(view)
    }

    async fn delete_record(&self, id: SchedulingId, caller: TechnicianId) -> Result<(), Error> {
        self.load_owned(id, &caller).await?;
        let removed = self
            .schedulings
            .delete(id)
            .await
            .map_err(map_repository_error)?;
        if !removed {
            return Err(scheduling_not_found(id));
        }
        info!(scheduling_id = %id, technician_id = %caller, "scheduling deleted");

        self.evict(id).await;
        self.publish(LifecycleEventKind::Deleted, id).await;
        Ok(())
    }

    async fn timed<T, F>(&self, mutation: SchedulingMutation, operation: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        let started = Instant::now();
        let outcome = operation.await;
        self.observe(mutation, started.elapsed()).await;
        outcome
    }
}

fn validate_create(
    request: &CreateSchedulingRequest,
    now: DateTime<Utc>,
) -> Result<(), SchedulingValidationError> {
    validate_not_in_past(request.scheduled_at, now)?;
    require_text("farm name", &request.farm_name)?;
    require_text("client name", &request.client_name)?;
    require_text("client email", &request.client_email)?;
    validate_email(&request.client_email)?;
    require_text("address", &request.address)?;
    validate_coordinates(request.latitude, request.longitude)?;
    limit_text("service description", request.service_description.as_deref())?;
    for item in &request.equipment {
        item.validate()?;
    }
    for item in &request.spare_parts {
        item.validate()?;
    }
    Ok(())
}

#[async_trait]
impl SchedulingCommand for SchedulingLifecycleService {
    async fn create(
        &self,
        request: CreateSchedulingRequest,
        caller: TechnicianId,
    ) -> Result<SchedulingView, Error> {
        self.timed(
            SchedulingMutation::Create,
            self.create_record(request, caller),
        )
        .await
    }

    async fn update(
        &self,
        id: SchedulingId,
        request: UpdateSchedulingRequest,
        caller: TechnicianId,
    ) -> Result<SchedulingView, Error> {
        self.timed(
            SchedulingMutation::Update,
            self.update_record(id, request, caller),
        )
        .await
    }

    async fn delete(&self, id: SchedulingId, caller: TechnicianId) -> Result<(), Error> {
        self.timed(SchedulingMutation::Delete, self.delete_record(id, caller))
            .await
    }

    async fn add_client_feedback(
        &self,
        id: SchedulingId,
        request: ClientFeedbackRequest,
    ) -> Result<SchedulingView, Error> {
        let rating = ClientRating::new(request.rating).map_err(map_validation_error)?;
        limit_text("client feedback", request.feedback.as_deref()).map_err(map_validation_error)?;

        let mut record = self.load(id).await?;
        record
            .attach_feedback(rating, request.feedback)
            .map_err(map_feedback_error)?;
        let stored = self
            .schedulings
            .update(&record, &ChildReplacement::keep())
            .await
            .map_err(map_repository_error)?;
        info!(scheduling_id = %id, rating = rating.get(), "client feedback recorded");

        Ok(self.materialise(&stored).await)
    }
}

#[async_trait]
impl SchedulingQuery for SchedulingLifecycleService {
    async fn list_for_technician(
        &self,
        technician_id: TechnicianId,
    ) -> Result<Vec<SchedulingView>, Error> {
        let records = self
            .schedulings
            .list_for_technician(&technician_id)
            .await
            .map_err(map_repository_error)?;
        Ok(self.materialise_all(&records).await)
    }

    async fn list_upcoming_for_technician(
        &self,
        technician_id: TechnicianId,
        now: DateTime<Utc>,
    ) -> Result<Vec<SchedulingView>, Error> {
        let records = self
            .schedulings
            .list_upcoming_for_technician(&technician_id, now)
            .await
            .map_err(map_repository_error)?;
        Ok(self.materialise_all(&records).await)
    }

    async fn get_by_id(
        &self,
        id: SchedulingId,
        caller: TechnicianId,
    ) -> Result<SchedulingView, Error> {
        if let Some(view) = self.cached_view_for(id, &caller).await {
            return Ok(view);
        }
        let record = self.load_owned(id, &caller).await?;
        Ok(self.materialise(&record).await)
    }

    async fn get_by_id_for_system(&self, id: SchedulingId) -> Result<SchedulingView, Error> {
        let record = self.load(id).await?;
        Ok(self.materialise(&record).await)
    }

    async fn technician_performance(
        &self,
        technician_id: TechnicianId,
    ) -> Result<TechnicianPerformance, Error> {
        let technician = self
            .technicians
            .find_by_id(&technician_id)
            .await
            .map_err(map_technician_error)?
            .ok_or_else(|| technician_not_found(&technician_id))?;
        let aggregates = self
            .schedulings
            .performance_for_technician(&technician_id)
            .await
            .map_err(map_repository_error)?;

        Ok(TechnicianPerformance {
            technician_id,
            technician_name: technician.full_name,
            average_rating: aggregates.average_rating,
            completed_visits: aggregates.completed_visits,
            average_visit_duration_hours: aggregates.average_visit_duration_hours,
        })
    }
}

#[cfg(test)]
mod tests;
