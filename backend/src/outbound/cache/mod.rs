//! Redis-backed scheduling view cache.
//!
//! Views are stored as JSON strings under `scheduling:<id>` with a per-entry
//! expiry (`SET .. EX`). Redis owns expiry and eviction; this adapter only
//! translates between the port and Redis commands.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::redis::{AsyncCommands, RedisError};
use tracing::debug;

use crate::domain::SchedulingView;
use crate::domain::ports::{SchedulingCache, SchedulingCacheError, SchedulingCacheKey};

use super::redis::{RedisPool, RedisPoolError};

/// Scheduling view cache backed by a Redis pool.
#[derive(Clone)]
pub struct RedisSchedulingCache {
    pool: RedisPool,
}

impl RedisSchedulingCache {
    /// Create a cache over the given pool.
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: RedisPoolError) -> SchedulingCacheError {
    SchedulingCacheError::backend(error.to_string())
}

fn map_redis_error(error: RedisError) -> SchedulingCacheError {
    SchedulingCacheError::backend(error.to_string())
}

fn encode_view(view: &SchedulingView) -> Result<String, SchedulingCacheError> {
    serde_json::to_string(view).map_err(|err| SchedulingCacheError::serialization(err.to_string()))
}

fn decode_view(payload: &str) -> Result<SchedulingView, SchedulingCacheError> {
    serde_json::from_str(payload)
        .map_err(|err| SchedulingCacheError::serialization(err.to_string()))
}

/// Redis expiries are whole seconds and must be positive.
fn expiry_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl SchedulingCache for RedisSchedulingCache {
    async fn get(
        &self,
        key: &SchedulingCacheKey,
    ) -> Result<Option<SchedulingView>, SchedulingCacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let payload: Option<String> = conn.get(key.as_str()).await.map_err(map_redis_error)?;
        debug!(key = %key, hit = payload.is_some(), "scheduling cache lookup");
        payload.as_deref().map(decode_view).transpose()
    }

    async fn put(
        &self,
        key: &SchedulingCacheKey,
        view: &SchedulingView,
        ttl: Duration,
    ) -> Result<(), SchedulingCacheError> {
        let payload = encode_view(view)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let _: () = conn
            .set_ex(key.as_str(), payload, expiry_seconds(ttl))
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn delete(&self, key: &SchedulingCacheKey) -> Result<(), SchedulingCacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let _: () = conn.del(key.as_str()).await.map_err(map_redis_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        LocationDetails, SchedulingId, SchedulingRecord, SchedulingStatus, ServicePriority,
    };
    use crate::test_support::fixtures::{reference_now, technician};
    use rstest::rstest;

    fn view() -> SchedulingView {
        let record = SchedulingRecord {
            id: SchedulingId::new(12),
            technician: technician("cache"),
            farm_name: "Fazenda Azul".to_owned(),
            client_name: "Marta".to_owned(),
            client_email: "marta@farm.example".to_owned(),
            address: "Rod. 101".to_owned(),
            latitude: -15.5,
            longitude: -47.75,
            scheduled_at: reference_now(),
            completed_at: None,
            service_description: Some("Annual check".to_owned()),
            status: SchedulingStatus::Confirmed,
            priority: ServicePriority::Medium,
            client_rating: None,
            client_feedback: None,
            equipment: Vec::new(),
            spare_parts: Vec::new(),
        };
        SchedulingView::from_record(&record, Some(LocationDetails::at(-15.5, -47.75)))
    }

    #[rstest]
    fn cached_payload_decodes_to_the_same_view() {
        let original = view();
        let payload = encode_view(&original).expect("encodes");
        assert_eq!(decode_view(&payload).expect("decodes"), original);
    }

    #[rstest]
    fn corrupt_payload_is_a_serialisation_error() {
        let err = decode_view("{\"id\":").expect_err("truncated json");
        assert!(matches!(err, SchedulingCacheError::Serialization { .. }));
    }

    #[rstest]
    #[case(Duration::from_secs(86_400), 86_400)]
    #[case(Duration::from_millis(1_500), 1)]
    #[case(Duration::ZERO, 1)]
    fn expiry_is_whole_positive_seconds(#[case] ttl: Duration, #[case] expected: u64) {
        assert_eq!(expiry_seconds(ttl), expected);
    }
}
