//! Best-effort work that runs after a store write has committed.
//!
//! Nothing here returns an error. Enrichment, cache writes, event hand-off,
//! and metrics each log their own failure and let the caller continue with
//! the committed result.

use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::ports::{
    LifecycleEvent, LifecycleEventKind, SchedulingCacheKey, SchedulingMutation,
};
use crate::domain::{
    LocationDetails, SchedulingId, SchedulingRecord, SchedulingStatus, SchedulingView,
};

use super::SchedulingLifecycleService;

impl SchedulingLifecycleService {
    /// Enrich, build the view, and write it to the cache.
    pub(super) async fn materialise(&self, record: &SchedulingRecord) -> SchedulingView {
        let location = self.enrich(record).await;
        let view = SchedulingView::from_record(record, location);
        self.cache_view(&view).await;
        view
    }

    async fn enrich(&self, record: &SchedulingRecord) -> Option<LocationDetails> {
        let lookup = self.geocoder.reverse(record.latitude, record.longitude);
        match tokio::time::timeout(self.config.enrichment_timeout, lookup).await {
            Ok(Ok(details)) => Some(details),
            Ok(Err(error)) => {
                warn!(scheduling_id = %record.id, error = %error, "location enrichment failed");
                None
            }
            Err(_) => {
                warn!(
                    scheduling_id = %record.id,
                    timeout_ms = duration_millis(self.config.enrichment_timeout),
                    "location enrichment timed out"
                );
                None
            }
        }
    }

    async fn cache_view(&self, view: &SchedulingView) {
        let key = SchedulingCacheKey::for_scheduling(view.id);
        if let Err(error) = self.cache.put(&key, view, self.config.cache_ttl).await {
            warn!(scheduling_id = %view.id, error = %error, "scheduling cache write failed");
        }
    }

    pub(super) async fn evict(&self, id: SchedulingId) {
        let key = SchedulingCacheKey::for_scheduling(id);
        if let Err(error) = self.cache.delete(&key).await {
            warn!(scheduling_id = %id, error = %error, "scheduling cache eviction failed");
        }
    }

    /// Hand an event to the publisher. Callers must have committed first.
    pub(super) async fn publish(&self, kind: LifecycleEventKind, id: SchedulingId) {
        match self.events.publish(LifecycleEvent::new(kind, id)).await {
            Ok(()) => debug!(scheduling_id = %id, kind = %kind, "lifecycle event queued"),
            Err(error) => {
                warn!(scheduling_id = %id, kind = %kind, error = %error, "lifecycle event dropped");
            }
        }
    }

    pub(super) async fn record_created(&self) {
        if let Err(error) = self.metrics.record_created().await {
            warn!(error = %error, "scheduling counter write failed");
        }
    }

    pub(super) async fn record_status(&self, status: SchedulingStatus) {
        if let Err(error) = self.metrics.record_status(status).await {
            warn!(status = %status, error = %error, "status counter write failed");
        }
    }

    pub(super) async fn observe(&self, mutation: SchedulingMutation, elapsed: Duration) {
        if let Err(error) = self.metrics.observe_mutation(mutation, elapsed).await {
            warn!(operation = mutation.label(), error = %error, "duration histogram write failed");
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
